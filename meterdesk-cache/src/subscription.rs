use std::future::Future;
use std::sync::Arc;

use meterdesk_core::PortalError;
use tokio::sync::{broadcast::error::RecvError, watch};
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::debug;
use ulid::Ulid;

use crate::{CacheKey, Orchestrator};

/// What a reactive consumer renders from.
#[derive(Debug)]
pub struct ResourceState<V> {
    pub data: Option<Arc<V>>,
    pub loading: bool,
    pub error: Option<PortalError>,
}

impl<V> ResourceState<V> {
    fn loading() -> Self {
        Self {
            data: None,
            loading: true,
            error: None,
        }
    }
}

impl<V> Clone for ResourceState<V> {
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
            loading: self.loading,
            error: self.error.clone(),
        }
    }
}

/// Handle on a live resource. Dropping it stops the background task; a
/// fetch already running still lands in the cache for other readers.
pub struct Subscription<V> {
    id: Ulid,
    key: CacheKey,
    receiver: watch::Receiver<ResourceState<V>>,
    _guard: DropGuard,
}

impl<V> Subscription<V>
where
    V: Send + Sync + 'static,
{
    pub(crate) fn spawn<F, Fut>(orchestrator: Orchestrator, key: CacheKey, fetcher: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<V, PortalError>> + Send + 'static,
    {
        let id = Ulid::new();
        let token = CancellationToken::new();
        let (sender, receiver) = watch::channel(ResourceState::loading());
        let mut invalidations = orchestrator.store().subscribe_invalidations();
        let fetcher = Arc::new(fetcher);

        let task_token = token.clone();
        let task_key = key.clone();
        tokio::spawn(async move {
            let key = task_key;
            loop {
                sender.send_modify(|state| state.loading = true);

                let fetch = {
                    let fetcher = fetcher.clone();
                    orchestrator.fetch(key.clone(), move || fetcher())
                };
                let result = tokio::select! {
                    biased;
                    _ = task_token.cancelled() => break,
                    result = fetch => result,
                };

                // the consumer may have gone away while the fetch resolved
                if task_token.is_cancelled() {
                    break;
                }
                sender.send_modify(|state| {
                    state.loading = false;
                    match result {
                        Ok(value) => {
                            state.data = Some(value);
                            state.error = None;
                        }
                        Err(e) => state.error = Some(e),
                    }
                });

                loop {
                    tokio::select! {
                        biased;
                        _ = task_token.cancelled() => return,
                        event = invalidations.recv() => match event {
                            Ok(pattern) if pattern.matches(&key) => break,
                            Ok(_) => continue,
                            // missed events may have concerned us
                            Err(RecvError::Lagged(_)) => break,
                            Err(RecvError::Closed) => return,
                        },
                    }
                }
                debug!(subscription = %id, %key, "refetching after invalidation");
            }
            debug!(subscription = %id, %key, "subscription dropped");
        });

        Self {
            id,
            key,
            receiver,
            _guard: token.drop_guard(),
        }
    }
}

impl<V> Subscription<V> {
    pub fn id(&self) -> Ulid {
        self.id
    }

    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    pub fn state(&self) -> ResourceState<V> {
        self.receiver.borrow().clone()
    }

    /// Waits for the next state change. `false` once the task has stopped.
    pub async fn changed(&mut self) -> bool {
        self.receiver.changed().await.is_ok()
    }

    /// Waits until no fetch is running and returns that state.
    pub async fn settled(&mut self) -> ResourceState<V> {
        if let Ok(state) = self.receiver.wait_for(|state| !state.loading).await {
            return state.clone();
        }
        self.receiver.borrow().clone()
    }
}
