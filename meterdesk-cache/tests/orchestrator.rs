use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use jiff::{SignedDuration, Zoned, civil::date, tz::TimeZone};
use meterdesk_cache::{
    CacheKey, CacheStore, EntryInfo, KeyPattern, ManualClock, Orchestrator, ResourceKind,
    StalenessPolicy,
};
use meterdesk_core::{ErrorCategory, PortalError};
use tokio::sync::Notify;

/// Stand-in for a backend endpoint: counts calls, optionally waits on a gate.
struct Source {
    calls: AtomicUsize,
    gate: Notify,
    gated: bool,
}

impl Source {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            gate: Notify::new(),
            gated: false,
        })
    }

    fn gated() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            gate: Notify::new(),
            gated: true,
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn call(&self) -> Result<usize, PortalError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.gated {
            self.gate.notified().await;
        }
        Ok(n)
    }

    async fn fail(&self) -> Result<usize, PortalError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.gated {
            self.gate.notified().await;
        }
        Err(PortalError::from_category(ErrorCategory::Server))
    }
}

fn morning() -> Zoned {
    date(2024, 3, 10)
        .at(9, 0, 0, 0)
        .to_zoned(TimeZone::UTC)
        .unwrap()
}

fn setup() -> (Orchestrator, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(morning()));
    let orchestrator = Orchestrator::new(
        CacheStore::new(),
        clock.clone(),
        StalenessPolicy::default(),
    );
    (orchestrator, clock)
}

async fn read(
    orchestrator: &Orchestrator,
    key: CacheKey,
    source: &Arc<Source>,
) -> Result<Arc<usize>, PortalError> {
    let source = source.clone();
    orchestrator
        .fetch(key, move || async move { source.call().await })
        .await
}

#[tokio::test]
async fn concurrent_reads_share_one_call() {
    let (orchestrator, _clock) = setup();
    let source = Source::gated();
    let key = CacheKey::new(ResourceKind::Buildings);

    let (a, b, ()) = tokio::join!(
        read(&orchestrator, key.clone(), &source),
        read(&orchestrator, key.clone(), &source),
        async {
            tokio::task::yield_now().await;
            source.gate.notify_one();
        }
    );

    assert_eq!(source.calls(), 1);
    assert_eq!(*a.unwrap(), 1);
    assert_eq!(*b.unwrap(), 1);
}

#[tokio::test]
async fn concurrent_reads_share_one_error() {
    let (orchestrator, _clock) = setup();
    let source = Source::gated();
    let key = CacheKey::new(ResourceKind::Invoices);

    let fail = |source: Arc<Source>| move || async move { source.fail().await };
    let (a, b, ()) = tokio::join!(
        orchestrator.fetch(key.clone(), fail(source.clone())),
        orchestrator.fetch(key.clone(), fail(source.clone())),
        async {
            tokio::task::yield_now().await;
            source.gate.notify_one();
        }
    );

    assert_eq!(source.calls(), 1);
    assert_eq!(a.unwrap_err(), b.unwrap_err());
    assert!(orchestrator.store().info(&key).is_none());
}

#[tokio::test]
async fn batch_resource_stays_fresh_until_cutover() {
    let (orchestrator, clock) = setup();
    let source = Source::new();
    let key = CacheKey::with_id(ResourceKind::Building, "12");

    read(&orchestrator, key.clone(), &source).await.unwrap();
    clock.set(
        date(2024, 3, 11)
            .at(3, 59, 59, 0)
            .to_zoned(TimeZone::UTC)
            .unwrap(),
    );
    read(&orchestrator, key.clone(), &source).await.unwrap();
    assert_eq!(source.calls(), 1);

    clock.advance(SignedDuration::from_secs(1));
    let value = read(&orchestrator, key.clone(), &source).await.unwrap();
    assert_eq!(source.calls(), 2);
    assert_eq!(*value, 2);
}

#[tokio::test]
async fn interactive_resource_uses_short_window() {
    let (orchestrator, clock) = setup();
    let source = Source::new();
    let key = CacheKey::new(ResourceKind::Tickets);

    read(&orchestrator, key.clone(), &source).await.unwrap();
    clock.advance(SignedDuration::from_mins(4));
    read(&orchestrator, key.clone(), &source).await.unwrap();
    assert_eq!(source.calls(), 1);

    clock.advance(SignedDuration::from_mins(1));
    read(&orchestrator, key.clone(), &source).await.unwrap();
    assert_eq!(source.calls(), 2);
}

#[tokio::test]
async fn operator_details_always_refetch() {
    let (orchestrator, _clock) = setup();
    let source = Source::new();
    let key = CacheKey::with_id(ResourceKind::OperatorDetails, "7");

    read(&orchestrator, key.clone(), &source).await.unwrap();
    read(&orchestrator, key.clone(), &source).await.unwrap();
    assert_eq!(source.calls(), 2);
}

#[tokio::test]
async fn invalidation_forces_refetch_of_exact_and_aggregate_keys() {
    let (orchestrator, _clock) = setup();
    let source = Source::new();
    let ticket = CacheKey::with_id(ResourceKind::Ticket, "T1");
    let tickets = CacheKey::new(ResourceKind::Tickets);
    let other = CacheKey::with_id(ResourceKind::Ticket, "T2");

    for key in [&ticket, &tickets, &other] {
        read(&orchestrator, key.clone(), &source).await.unwrap();
    }
    assert_eq!(source.calls(), 3);

    let touched = orchestrator.invalidate(&[
        KeyPattern::Exact(ticket.clone()),
        KeyPattern::Kind(ResourceKind::Tickets),
    ]);
    assert_eq!(touched, 2);

    read(&orchestrator, other.clone(), &source).await.unwrap();
    assert_eq!(source.calls(), 3);
    read(&orchestrator, ticket.clone(), &source).await.unwrap();
    read(&orchestrator, tickets.clone(), &source).await.unwrap();
    assert_eq!(source.calls(), 5);
}

#[tokio::test]
async fn read_after_invalidation_does_not_join_older_request() {
    let (orchestrator, _clock) = setup();
    let source = Source::gated();
    let key = CacheKey::new(ResourceKind::Tickets);

    let before = tokio::spawn({
        let orchestrator = orchestrator.clone();
        let (key, source) = (key.clone(), source.clone());
        async move { read(&orchestrator, key, &source).await }
    });
    while source.calls() < 1 {
        tokio::task::yield_now().await;
    }

    orchestrator.invalidate(&[KeyPattern::Kind(ResourceKind::Tickets)]);

    let after = tokio::spawn({
        let orchestrator = orchestrator.clone();
        let (key, source) = (key.clone(), source.clone());
        async move { read(&orchestrator, key, &source).await }
    });
    while source.calls() < 2 {
        tokio::task::yield_now().await;
    }

    source.gate.notify_waiters();
    assert_eq!(*before.await.unwrap().unwrap(), 1);
    assert_eq!(*after.await.unwrap().unwrap(), 2);

    // the older response never overwrites the newer one
    assert_eq!(*read(&orchestrator, key, &source).await.unwrap(), 2);
    assert_eq!(source.calls(), 2);
}

#[tokio::test]
async fn dropped_caller_still_fills_cache() {
    let (orchestrator, _clock) = setup();
    let source = Source::gated();
    let key = CacheKey::new(ResourceKind::Leaks);

    let abandoned = tokio::time::timeout(
        Duration::from_millis(20),
        read(&orchestrator, key.clone(), &source),
    )
    .await;
    assert!(abandoned.is_err());
    assert_eq!(
        orchestrator.store().info(&key),
        Some(EntryInfo::InFlight { invalidated: false })
    );

    source.gate.notify_one();
    let value = read(&orchestrator, key.clone(), &source).await.unwrap();
    assert_eq!(*value, 1);
    assert_eq!(source.calls(), 1);
}

#[tokio::test]
async fn force_refresh_bypasses_freshness() {
    let (orchestrator, _clock) = setup();
    let source = Source::new();
    let key = CacheKey::new(ResourceKind::Buildings);

    read(&orchestrator, key.clone(), &source).await.unwrap();
    let src = source.clone();
    let value = orchestrator
        .fetch_fresh(key.clone(), move || async move { src.call().await })
        .await
        .unwrap();

    assert_eq!(*value, 2);
    assert_eq!(*read(&orchestrator, key, &source).await.unwrap(), 2);
}

#[tokio::test]
async fn subscription_refetches_on_invalidation() {
    let (orchestrator, _clock) = setup();
    let source = Source::new();
    let key = CacheKey::with_id(ResourceKind::BuildingHousings, "12");

    let src = source.clone();
    let mut subscription = orchestrator.subscribe(key.clone(), move || {
        let src = src.clone();
        async move { src.call().await }
    });

    let state = subscription.settled().await;
    assert_eq!(state.data.as_deref(), Some(&1));
    assert!(state.error.is_none());

    orchestrator.invalidate(&[KeyPattern::Id(ResourceKind::BuildingHousings, "12".into())]);
    assert!(subscription.changed().await);
    let state = subscription.settled().await;
    assert_eq!(state.data.as_deref(), Some(&2));

    orchestrator.invalidate(&[KeyPattern::Kind(ResourceKind::Buildings)]);
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(source.calls(), 2);
}

#[tokio::test]
async fn dropped_subscription_stops_refetching() {
    let (orchestrator, _clock) = setup();
    let source = Source::new();
    let key = CacheKey::new(ResourceKind::Operators);

    let src = source.clone();
    let mut subscription = orchestrator.subscribe(key.clone(), move || {
        let src = src.clone();
        async move { src.call().await }
    });
    subscription.settled().await;
    drop(subscription);

    orchestrator.invalidate(&[KeyPattern::Kind(ResourceKind::Operators)]);
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(source.calls(), 1);
}

#[tokio::test]
async fn subscription_dropped_mid_fetch_leaves_value_cached() {
    let (orchestrator, _clock) = setup();
    let source = Source::gated();
    let key = CacheKey::new(ResourceKind::Interventions);

    let src = source.clone();
    let subscription = orchestrator.subscribe(key.clone(), move || {
        let src = src.clone();
        async move { src.call().await }
    });
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(subscription.state().loading);
    drop(subscription);

    source.gate.notify_one();
    let value = read(&orchestrator, key, &source).await.unwrap();
    assert_eq!(*value, 1);
    assert_eq!(source.calls(), 1);
}

#[tokio::test]
async fn subscription_reports_errors_as_state() {
    let (orchestrator, _clock) = setup();
    let source = Source::new();

    let src = source.clone();
    let mut subscription = orchestrator.subscribe(CacheKey::new(ResourceKind::Invoices), move || {
        let src = src.clone();
        async move { src.fail().await }
    });

    let state = subscription.settled().await;
    assert!(state.data.is_none());
    assert_eq!(
        state.error.map(|e| e.category),
        Some(ErrorCategory::Server)
    );
}
