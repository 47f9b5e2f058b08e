use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;
mod commands;
mod config;

use cli::{Args, Command};

/// Initialize tracing with dual output:
/// 1. Console (stderr) - human-readable progress
/// 2. File (logs/strato.log) - persistent record of what was created/released
fn initialize_tracing() -> Result<()> {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "info,strato_cli=debug,strato_orchestrations=debug".into()
    });

    let log_dir = std::env::var("STRATO_LOG_DIR").unwrap_or_else(|_| "logs".to_string());
    std::fs::create_dir_all(&log_dir).ok();

    let file_appender = tracing_appender::rolling::never(&log_dir, "strato.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    // Dropping the guard stops file logging; keep it for the process lifetime.
    std::mem::forget(guard);

    let file_layer = fmt::layer().with_writer(file_writer).with_ansi(false);
    let console_layer = fmt::layer().with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(console_layer)
        .init();

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();

    initialize_tracing()?;

    match args.command {
        Command::Provision { spec, only } => commands::provision::run(spec, only).await,
        Command::Decommission {
            ids,
            kind,
            eips,
            file,
            yes,
        } => commands::decommission::run(ids, kind, eips, file, yes).await,
        Command::List { kind, output } => commands::list::run(kind, output).await,
    }
}
