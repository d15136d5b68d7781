//! Application layer: Use cases and services.
//!
//! This module orchestrates domain logic with ports to implement
//! the two use cases of the service: predicting risk and managing sessions.
//!
//! Port calls are synchronous (SQLite, model math) and run on tokio's
//! blocking pool under a deadline, see [`run_bounded`].

mod auth;
mod prediction;

pub use auth::AuthService;
pub use prediction::PredictionService;

use std::time::Duration;

use crate::{CardioError, Result};

/// Run a blocking call on the blocking pool, failing with
/// `CardioError::Timeout(what)` if it does not finish within `limit`.
///
/// The blocking task is not cancelled on timeout; its result is discarded.
///
/// # Errors
/// Returns the call's own error, `Timeout` on deadline, or `Internal` if the
/// task panicked.
pub async fn run_bounded<T, F>(limit: Duration, what: &'static str, f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    match tokio::time::timeout(limit, tokio::task::spawn_blocking(f)).await {
        Ok(Ok(result)) => result,
        Ok(Err(join)) => {
            tracing::error!("{what} task failed: {join}");
            Err(CardioError::Internal(format!("{what} task failed")))
        }
        Err(_) => {
            tracing::warn!("{what} exceeded {}ms", limit.as_millis());
            Err(CardioError::Timeout(what))
        }
    }
}

/// Run CPU-bound work (password hashing) off the async workers, without a deadline.
///
/// # Errors
/// Returns the call's own error, or `Internal` if the task panicked.
pub async fn run_blocking<T, F>(what: &'static str, f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|join| {
        tracing::error!("{what} task failed: {join}");
        CardioError::Internal(format!("{what} task failed"))
    })?
}
