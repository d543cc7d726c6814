//! Observability for the gateway
//!
//! Structured logging goes through `tracing`. Each record carries an
//! `event` field naming one [`Event`].
//!
//! ```ignore
//! use restgate::observability::{self, Event};
//!
//! observability::init_logging(false);
//! observability::log_event(Event::SchemaLoaded);
//! ```

mod events;

pub use events::Event;

use tracing_subscriber::EnvFilter;

/// Install the global subscriber.
///
/// Honours `RUST_LOG`, defaulting to `info`. Calling it twice is harmless.
pub fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

/// Log a lifecycle event
pub fn log_event(event: Event) {
    if event.is_failure() {
        tracing::warn!(event = event.as_str());
    } else {
        tracing::info!(event = event.as_str());
    }
}
