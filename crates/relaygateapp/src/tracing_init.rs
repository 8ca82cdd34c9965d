//! Diagnostics setup.
//!
//! Store and restore failures are reported through `tracing`. Diagnostics go
//! to stderr so command output on stdout stays clean for scripting.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Default filter when `RUST_LOG` is unset.
pub fn default_filter(verbose: bool) -> &'static str {
    if verbose {
        "relaygateapp=debug,relaygate=debug"
    } else {
        "relaygateapp=warn,relaygate=warn"
    }
}

/// Install the global subscriber.
///
/// * `default_filter` -- used when `RUST_LOG` is not set.
/// * `log_json` -- emit JSON lines instead of the human-readable format.
///
/// A second call is a no-op, so tests and embedders can call it freely.
pub fn init_tracing(default_filter: &str, log_json: bool) {
    let env_filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter.into()),
    );
    let result = if log_json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()
    };
    // Already installed by an earlier call.
    let _ = result;
}
