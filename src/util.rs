//! Shared async helpers.

use std::future::Future;
use std::time::Duration;

use tokio::task::spawn_blocking;
use tokio::time::timeout;

use crate::{Error, Result};

/// Run blocking filesystem work off the async runtime.
pub async fn blocking<F, T>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    spawn_blocking(f)
        .await
        .map_err(|e| Error::TaskJoin(e.to_string()))?
}

/// Await `fut`, failing with `Error::Timeout` once `limit` elapses.
/// A `limit` of `None` waits indefinitely.
pub async fn with_timeout<F, T>(limit: Option<Duration>, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match limit {
        Some(duration) => match timeout(duration, fut).await {
            Ok(inner) => inner,
            Err(_) => Err(Error::Timeout(duration)),
        },
        None => fut.await,
    }
}
