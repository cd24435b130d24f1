pub mod utils;

use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

pub use utils::{register_panic_logger, report_build_info};

/// Initialize logging and the panic handler.
///
/// Everything goes to stderr: stdout carries filter payloads. `RUST_LOG`
/// overrides `level`. The returned guard must be kept alive for the
/// duration of the program.
pub fn init_logging(level: Level) -> WorkerGuard {
    let (stderr_writer, stderr_guard) = tracing_appender::non_blocking(std::io::stderr());

    let stderr_env_filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    let stderr_layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_target(false)
        .with_writer(stderr_writer)
        .with_filter(stderr_env_filter);

    // A second init (tests, embedding) keeps the first subscriber
    let _ = tracing_subscriber::registry()
        .with(stderr_layer)
        .try_init();

    register_panic_logger();
    report_build_info();

    stderr_guard
}
