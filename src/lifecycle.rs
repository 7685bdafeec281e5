//! Ties in-flight requests to the lifetime of the screen that issued them.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use futures::future::{AbortHandle, Abortable};
use tracing::debug;

use crate::errors::ServiceError;

/// Owner of the requests started by one view.
///
/// Dropping or cancelling the scope aborts every outstanding request; their
/// results are discarded and callers see [`ServiceError::Cancelled`].
#[derive(Debug, Default)]
pub struct RequestScope {
    next_id: AtomicU64,
    in_flight: Mutex<HashMap<u64, AbortHandle>>,
    cancelled: AtomicBool,
}

impl RequestScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.lock().map(|map| map.len()).unwrap_or(0)
    }

    /// Runs `fut` inside the scope.
    pub async fn run<F, T, E>(&self, fut: F) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
        E: From<ServiceError>,
    {
        if self.is_cancelled() {
            return Err(ServiceError::Cancelled.into());
        }

        let (handle, registration) = AbortHandle::new_pair();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut map) = self.in_flight.lock() {
            map.insert(id, handle);
        }

        let outcome = Abortable::new(fut, registration).await;

        if let Ok(mut map) = self.in_flight.lock() {
            map.remove(&id);
        }

        match outcome {
            // A result that lands after cancellation is still discarded.
            Ok(_) if self.is_cancelled() => Err(ServiceError::Cancelled.into()),
            Ok(result) => result,
            Err(aborted) => Err(ServiceError::from(aborted).into()),
        }
    }

    pub fn cancel(&self) {
        if self.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Ok(mut map) = self.in_flight.lock() {
            debug!(outstanding = map.len(), "cancelling request scope");
            for (_, handle) in map.drain() {
                handle.abort();
            }
        }
    }
}

impl Drop for RequestScope {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn completed_request_passes_result_through() {
        let scope = RequestScope::new();
        let value = scope.run(async { Ok::<_, ServiceError>(42) }).await.unwrap();
        assert_eq!(value, 42);
        assert_eq!(scope.in_flight(), 0);
    }

    #[tokio::test]
    async fn cancelling_aborts_outstanding_requests() {
        let scope = Arc::new(RequestScope::new());
        let task_scope = scope.clone();
        let task = tokio::spawn(async move {
            task_scope
                .run(async {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Ok::<_, ServiceError>(())
                })
                .await
        });

        while scope.in_flight() == 0 {
            tokio::task::yield_now().await;
        }
        scope.cancel();

        assert_matches!(task.await.unwrap(), Err(ServiceError::Cancelled));
    }

    #[tokio::test]
    async fn cancelled_scope_refuses_new_work() {
        let scope = RequestScope::new();
        scope.cancel();
        let result = scope.run(async { Ok::<_, ServiceError>(1) }).await;
        assert_matches!(result, Err(ServiceError::Cancelled));
    }
}
