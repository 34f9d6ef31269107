//! Logging configuration using tracing.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the stderr subscriber.
///
/// `RUST_LOG` wins when set; otherwise only warnings are shown, and nothing
/// at all in silent mode.
pub fn init(silent: bool) {
    let default_level = if silent { "off" } else { "warn" };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    // A second init (tests) keeps the first subscriber
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}
