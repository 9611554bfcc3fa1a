use crate::constants::env;
use std::fs::OpenOptions;
use tracing_subscriber::filter::{EnvFilter, LevelFilter};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, Layer};

/// Install the global subscriber: stderr output filtered by `RUST_LOG`
/// (info by default), plus a debug-level file log when
/// `DEVBENCH_LOG_FILE` names a writable path.
///
/// Safe to call more than once; later calls leave the first subscriber in place.
pub fn init_tracing() {
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        );

    let registry = tracing_subscriber::registry().with(stderr_layer);

    let file_layer = std::env::var(env::LOG_FILE).ok().and_then(|log_path| {
        match OpenOptions::new().create(true).append(true).open(&log_path) {
            Ok(file) => Some(
                fmt::layer()
                    .with_writer(file)
                    .with_ansi(false)
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_filter(LevelFilter::DEBUG),
            ),
            Err(e) => {
                eprintln!("Could not open log file {}: {}", log_path, e);
                None
            }
        }
    });

    // Option<Layer> is itself a layer; None is a no-op
    let _ = registry.with(file_layer).try_init();
}
