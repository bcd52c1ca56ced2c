use std::future::Future;

use crate::error::Result;

/// Runs `f`, and runs it exactly once more if the first try hit a storage conflict.
pub async fn retry_once_on_conflict<F, Fut, T>(operation: &str, mut f: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    match f().await {
        Err(e) if e.is_conflict() => {
            tracing::warn!(operation, error = %e, "storage conflict, retrying once");
            f().await
        }
        other => other,
    }
}
