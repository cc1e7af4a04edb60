//! Tracing setup for the embedding process.

use std::path::Path;
use tracing_subscriber::prelude::*;

/// Initialize logging: human-readable output on stdout plus a non-blocking
/// append-only file under `data_dir/logs`. Keep the returned guard alive for
/// the life of the process or buffered log lines are lost on exit.
///
/// Call once from the process entry point; components themselves only emit
/// through the `tracing` macros.
pub fn init(data_dir: &Path) -> std::io::Result<tracing_appender::non_blocking::WorkerGuard> {
    let log_dir = data_dir.join("logs");
    std::fs::create_dir_all(&log_dir)?;
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("charisma.log"))?;
    let (non_blocking, guard) = tracing_appender::non_blocking(log_file);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stdout)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                ),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                ),
        )
        .init();

    Ok(guard)
}
