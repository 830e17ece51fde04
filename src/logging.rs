//! Logging setup
//!
//! Console output only, filtered by `RUST_LOG` (defaults to `info`).

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Install the global subscriber.
///
/// `verbose` lowers the default filter to `debug` for this crate. Calling it
/// twice is harmless; the second call is ignored.
pub fn init_logging(verbose: bool, ansi: bool) {
    let default_filter = if verbose {
        "info,audience_mapper=debug"
    } else {
        "info"
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(ansi)
        .with_target(true);

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .try_init();
}
