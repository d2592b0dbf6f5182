//! Shared async initialization of a backend.
//!
//! A backend may not be usable yet when the tools start (network down,
//! service still booting). [`ReadyStore`] runs a bounded connect loop:
//! attempts are retried every `poll` until one succeeds or `timeout`
//! elapses, and the outcome is shared by every caller waiting on it. A
//! timeout surfaces as a store error with the `unavailable` code. A
//! successful init is kept for good; a failed one is dropped, so the next
//! caller starts a fresh bounded attempt.

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::{ContentStore, DeleteOutcome, StoreError};
use crate::model::{NewRecord, NewsId, NewsRecord, RecordPatch};

type ReadyFuture<S> = Shared<BoxFuture<'static, Result<Arc<S>, StoreError>>>;
type Starter<S> = Arc<dyn Fn() -> ReadyFuture<S> + Send + Sync>;

pub struct ReadyStore<S> {
    start: Starter<S>,
    current: Arc<Mutex<ReadyFuture<S>>>,
}

impl<S> Clone for ReadyStore<S> {
    fn clone(&self) -> Self {
        Self {
            start: self.start.clone(),
            current: self.current.clone(),
        }
    }
}

impl<S> std::fmt::Debug for ReadyStore<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let resolved = self
            .current
            .lock()
            .map(|fut| fut.peek().is_some())
            .unwrap_or(false);
        f.debug_struct("ReadyStore")
            .field("resolved", &resolved)
            .finish()
    }
}

impl<S: Send + Sync + 'static> ReadyStore<S> {
    fn with_starter(start: Starter<S>) -> Self {
        let current = Arc::new(Mutex::new(start()));
        Self { start, current }
    }

    /// Wrap a backend that is usable immediately.
    pub fn ready(store: S) -> Self {
        let store = Arc::new(store);
        Self::with_starter(Arc::new(move || {
            let fut: BoxFuture<'static, Result<Arc<S>, StoreError>> =
                futures::future::ready(Ok(store.clone())).boxed();
            fut.shared()
        }))
    }

    /// Build a store whose backend comes from `attempt`, retried every `poll`
    /// until `timeout`. Nothing runs until the first caller awaits it.
    pub fn connect<F, Fut>(attempt: F, poll: Duration, timeout: Duration) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<S, StoreError>> + Send + 'static,
    {
        let attempt = Arc::new(attempt);
        Self::with_starter(Arc::new(move || {
            let fut: BoxFuture<'static, Result<Arc<S>, StoreError>> =
                connect_within(attempt.clone(), poll, timeout).boxed();
            fut.shared()
        }))
    }

    fn slot(&self) -> MutexGuard<'_, ReadyFuture<S>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Wait for initialization. Callers waiting together see the same
    /// outcome; after a failure the next call reconnects.
    pub async fn get(&self) -> Result<Arc<S>, StoreError> {
        let pending = self.slot().clone();
        let outcome = pending.clone().await;
        if outcome.is_err() {
            let mut slot = self.slot();
            // Another caller may already have replaced it.
            if slot.ptr_eq(&pending) {
                debug!("content store init failed; next caller reconnects");
                *slot = (self.start)();
            }
        }
        outcome
    }
}

async fn connect_within<S, F, Fut>(
    attempt: Arc<F>,
    poll: Duration,
    timeout: Duration,
) -> Result<Arc<S>, StoreError>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<S, StoreError>> + Send,
{
    let deadline = Instant::now() + timeout;
    let mut tries = 0u32;
    loop {
        tries += 1;
        let last = match tokio::time::timeout_at(deadline, attempt()).await {
            Ok(Ok(store)) => {
                info!(tries, "content store ready");
                return Ok(Arc::new(store));
            }
            Ok(Err(err)) => err,
            Err(_) => StoreError::unavailable("connect attempt timed out"),
        };
        if Instant::now() + poll >= deadline {
            warn!(tries, err = %last, "content store did not become ready");
            return Err(StoreError::unavailable(format!(
                "content store not ready after {} ms: {}",
                timeout.as_millis(),
                last.message
            )));
        }
        debug!(tries, err = %last, "content store not ready yet");
        tokio::time::sleep(poll).await;
    }
}

#[async_trait]
impl<S: ContentStore + 'static> ContentStore for ReadyStore<S> {
    async fn insert(&self, record: &NewRecord) -> Result<NewsRecord, StoreError> {
        self.get().await?.insert(record).await
    }

    async fn list_all(&self) -> Result<Vec<NewsRecord>, StoreError> {
        self.get().await?.list_all().await
    }

    async fn update_by_id(
        &self,
        id: &NewsId,
        patch: &RecordPatch,
    ) -> Result<NewsRecord, StoreError> {
        self.get().await?.update_by_id(id, patch).await
    }

    async fn delete_by_id(&self, id: &NewsId) -> Result<DeleteOutcome, StoreError> {
        self.get().await?.delete_by_id(id).await
    }

    async fn upload_image(&self, bytes: &[u8], ext: &str) -> Result<String, StoreError> {
        self.get().await?.upload_image(bytes, ext).await
    }
}
