// ============================================================================
// File: src/telemetry.rs
// Diagnostic logging setup
// ============================================================================

use tracing_subscriber::{fmt, EnvFilter};

/// Install the global subscriber. Logs go to stderr so they stay out of the
/// interactive output; `RUST_LOG` overrides the default level.
pub fn init(verbose: bool) {
    let default_level = if verbose { "paperchat=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    // Enable JSON logs if PAPERCHAT_LOG_JSON=1
    if std::env::var("PAPERCHAT_LOG_JSON").ok().as_deref() == Some("1") {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}
