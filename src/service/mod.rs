//! Service wiring and lifecycle
//!
//! The [`AppState`] assembles the steward's components; logging setup lives
//! here so embedding binaries initialize it the same way.

pub mod app;

pub use app::AppState;

use crate::error::Result;

/// Initialize structured logging with the configured level
///
/// `RUST_LOG` takes precedence over the configured level when set.
pub fn init_logging(log_level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with_target(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}
