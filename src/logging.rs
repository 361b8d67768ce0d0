//! # Log output for hosts without their own subscriber.
//!
//! Enabled via the `logging` feature. Installs a `tracing-subscriber` fmt layer
//! on stderr; `RUST_LOG` takes precedence over the default filter.
//!
//! ```text
//! debug = false  → "warn,nbprogress=info"
//! debug = true   → "info,nbprogress=trace"
//! ```

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Installs the global subscriber.
///
/// Returns `false` if another subscriber was already installed; that one is kept.
pub fn init(debug: bool) -> bool {
    let default_filter = if debug {
        "info,nbprogress=trace"
    } else {
        "warn,nbprogress=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_thread_names(true)
                .with_writer(std::io::stderr),
        )
        .try_init()
        .is_ok()
}
