use clap::{Parser, Subcommand};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod check;
mod report;

#[derive(Debug, Parser)]
#[command(name = "finbot", about = "Render and check equity analysis reports")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Validate a report input, render it to markdown and self-check the result.
    Render(report::RenderArgs),

    /// Check an existing markdown report against the report format.
    Check(check::CheckArgs),

    /// Print the validated fundamental metrics of a report input.
    Metrics(report::MetricsArgs),
}

fn main() -> anyhow::Result<ExitCode> {
    dotenvy::dotenv().ok();

    let settings = finbot_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();

    let result = match &args.command {
        Command::Render(a) => report::run_render(a, &settings).map(|()| ExitCode::SUCCESS),
        Command::Check(a) => check::run_check(a, &settings),
        Command::Metrics(a) => report::run_metrics(a, &settings).map(|()| ExitCode::SUCCESS),
    };

    match result {
        Ok(code) => Ok(code),
        Err(err) => {
            sentry_anyhow::capture_anyhow(&err);
            tracing::error!(error = %format!("{err:#}"), "finbot command failed");
            Err(err)
        }
    }
}

fn init_sentry(settings: &finbot_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
