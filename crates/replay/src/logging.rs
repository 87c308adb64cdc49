//! Tracing subscriber setup.

use std::sync::Once;
use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// Install the global subscriber, writing to stderr.
///
/// `RUST_LOG` takes precedence over `level`. Later calls are ignored.
pub fn setup_logging(level: &str, json: bool) {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(level))
            .unwrap_or_else(|_| EnvFilter::new("info"));

        let builder = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(std::io::stderr);

        if json {
            builder.json().init();
        } else {
            builder.init();
        }
    });
}
