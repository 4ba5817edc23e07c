use std::any::type_name;
use std::future::Future;
use std::sync::Arc;

use meterdesk_core::{ErrorCategory, PortalError};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::store::{Begin, Outcome, Shared};
use crate::{CacheKey, CacheStore, Clock, KeyPattern, StalenessPolicy, Subscription};

/// Fetch-and-cache primitive shared by the imperative and reactive access
/// modes.
#[derive(Clone)]
pub struct Orchestrator {
    store: CacheStore,
    clock: Arc<dyn Clock>,
    policy: Arc<StalenessPolicy>,
}

impl Orchestrator {
    pub fn new(store: CacheStore, clock: Arc<dyn Clock>, policy: StalenessPolicy) -> Self {
        Self {
            store,
            clock,
            policy: Arc::new(policy),
        }
    }

    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn policy(&self) -> &StalenessPolicy {
        &self.policy
    }

    /// Returns the cached value for `key` if fresh, otherwise runs `fetcher`.
    ///
    /// Concurrent calls for one key share a single `fetcher` run and all
    /// observe its outcome. The run completes and populates the cache even
    /// if every caller is dropped.
    pub async fn fetch<V, F, Fut>(&self, key: CacheKey, fetcher: F) -> Result<Arc<V>, PortalError>
    where
        V: Send + Sync + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<V, PortalError>> + Send + 'static,
    {
        self.run(key, false, fetcher).await
    }

    /// Like [`Orchestrator::fetch`] but ignores freshness. Still coalesced.
    pub async fn fetch_fresh<V, F, Fut>(
        &self,
        key: CacheKey,
        fetcher: F,
    ) -> Result<Arc<V>, PortalError>
    where
        V: Send + Sync + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<V, PortalError>> + Send + 'static,
    {
        self.run(key, true, fetcher).await
    }

    /// Live view of `key`, refetched whenever the key is invalidated.
    pub fn subscribe<V, F, Fut>(&self, key: CacheKey, fetcher: F) -> Subscription<V>
    where
        V: Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<V, PortalError>> + Send + 'static,
    {
        Subscription::spawn(self.clone(), key, fetcher)
    }

    pub fn invalidate(&self, patterns: &[KeyPattern]) -> usize {
        self.store.invalidate(patterns)
    }

    async fn run<V, F, Fut>(
        &self,
        key: CacheKey,
        force: bool,
        fetcher: F,
    ) -> Result<Arc<V>, PortalError>
    where
        V: Send + Sync + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<V, PortalError>> + Send + 'static,
    {
        let started = self.clock.now();

        let receiver = match self.store.begin(&key, started.timestamp(), force) {
            Begin::Hit(value) => {
                debug!(%key, "cache hit");
                return downcast(&key, value);
            }
            Begin::Wait(receiver) => {
                debug!(%key, "joining in-flight request");
                receiver
            }
            Begin::Lead(lead) => {
                let receiver = lead.subscribe();
                let staleness = self.policy.staleness(key.kind);

                tokio::spawn(async move {
                    info!(key = %lead.key(), "fetching from backend");
                    let outcome: Outcome = fetcher().await.map(|value| Arc::new(value) as Shared);

                    if let Err(e) = &outcome {
                        warn!(key = %lead.key(), category = ?e.category, "fetch failed");
                    }

                    // freshness counts from the request start, so data that
                    // predates a cutover is never kept past it
                    let expires_at = staleness.expires_at(&started);
                    lead.complete(outcome, started.timestamp(), expires_at);
                });
                receiver
            }
        };

        let outcome = wait(receiver).await?;
        downcast(&key, outcome)
    }
}

async fn wait(mut receiver: watch::Receiver<Option<Outcome>>) -> Outcome {
    match receiver.wait_for(Option::is_some).await {
        Ok(outcome) => outcome
            .clone()
            .unwrap_or_else(|| Err(PortalError::from_category(ErrorCategory::Unknown))),
        Err(_) => Err(PortalError::from_category(ErrorCategory::Unknown)),
    }
}

fn downcast<V: Send + Sync + 'static>(key: &CacheKey, value: Shared) -> Result<Arc<V>, PortalError> {
    value.downcast::<V>().map_err(|_| {
        warn!(%key, expected = type_name::<V>(), "cached value has unexpected type");
        PortalError::from_category(ErrorCategory::Unknown)
    })
}
