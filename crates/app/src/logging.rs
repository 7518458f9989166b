use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LogConfig;

/// Keeps the background file writer alive; drop it last to flush.
pub struct FileLogGuard {
    _guard: WorkerGuard,
}

/// Logs go to stderr so they never interleave with the flashcard prompt on stdout.
pub fn init_tracing(config: &LogConfig) -> Option<FileLogGuard> {
    let env_filter = EnvFilter::try_new(&config.level).unwrap_or_else(|_| EnvFilter::new("info"));
    let stderr_layer = fmt::layer().with_target(true).with_writer(std::io::stderr);

    if config.file_logs {
        if let Err(err) = std::fs::create_dir_all(&config.dir) {
            eprintln!("failed to create log directory {}: {err}", config.dir.display());
        } else {
            let file_appender = RollingFileAppender::new(Rotation::DAILY, &config.dir, "learn.log");
            let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
            let file_layer = fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false)
                .with_target(true);

            tracing_subscriber::registry()
                .with(env_filter)
                .with(stderr_layer)
                .with(file_layer)
                .init();

            return Some(FileLogGuard { _guard: guard });
        }
    }

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .init();

    None
}
