//! Diagnostic logging setup.

use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter.
const LOG_ENV: &str = "PATCHBAY_LOG";

/// Install the stderr log subscriber.
///
/// Filter comes from `PATCHBAY_LOG` (e.g. `patchbay_core=debug`),
/// defaulting to warnings only.
pub fn init() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
