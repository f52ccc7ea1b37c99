pub mod contract;
pub mod metrics;
pub mod recommendation;
pub mod report;
pub mod section;
pub mod security;
pub mod snapshot;
