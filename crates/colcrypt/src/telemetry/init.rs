//! Global subscriber initialisation.

use anyhow::Result;
use tracing_subscriber::EnvFilter;

/// Initialise a JSON-formatted tracing subscriber at `log_level`.
///
/// # Errors
///
/// Returns an error if a global subscriber has already been set.
pub fn init(log_level: &str) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .with_current_span(true)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialise colcrypt tracing subscriber: {e}"))
}
