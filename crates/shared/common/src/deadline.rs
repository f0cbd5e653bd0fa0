//! Deadline propagation for service calls.
//!
//! Dropping a returned future cancels the work at its next await point. A
//! configured deadline turns an overrun into [`AppError::Cancelled`].

use std::future::Future;
use std::time::Duration;

use crate::error::{AppError, AppResult};

/// Run `fut`, failing with `Cancelled` if `limit` elapses first.
pub async fn with_deadline<T, F>(limit: Option<Duration>, fut: F) -> AppResult<T>
where
    F: Future<Output = AppResult<T>>,
{
    match limit {
        Some(limit) => tokio::time::timeout(limit, fut).await.unwrap_or_else(|_| {
            tracing::warn!(timeout_ms = limit.as_millis() as u64, "operation deadline exceeded");
            Err(AppError::Cancelled)
        }),
        None => fut.await,
    }
}
