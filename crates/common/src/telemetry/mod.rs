//! Tracing subscriber setup shared by the SAMAY binaries

use crate::config::ObservabilityConfig;
use tracing_subscriber::EnvFilter;

/// Install the global subscriber.
///
/// `RUST_LOG` wins over the configured level. Logs go to stderr so that
/// command output on stdout stays machine-readable.
pub fn init_tracing(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);

    // try_init: a second call (tests, embedded use) keeps the first subscriber
    let _ = if config.json_logging {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}
