pub mod analysis_clock;
