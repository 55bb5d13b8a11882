//! Structured logging setup.

use anyhow::Result;
use tracing_subscriber::EnvFilter;

/// Install the global `tracing` subscriber.
///
/// `RUST_LOG` is honoured; `default_directive` (e.g. `"engine_app=info"`) is
/// added on top. A subscriber that is already installed is left in place.
///
/// # Errors
///
/// Fails if `default_directive` is not a valid filter directive.
pub fn init(default_directive: &str) -> Result<()> {
    let filter = EnvFilter::from_default_env().add_directive(default_directive.parse()?);
    if tracing_subscriber::fmt().with_env_filter(filter).try_init().is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
    Ok(())
}
