use std::any::Any;
use std::sync::Arc;

use dashmap::{DashMap, mapref::entry::Entry};
use jiff::Timestamp;
use meterdesk_core::PortalError;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info};
use ulid::Ulid;

use crate::{CacheKey, KeyPattern};

pub(crate) type Shared = Arc<dyn Any + Send + Sync>;
pub(crate) type Outcome = Result<Shared, PortalError>;

const INVALIDATION_BUFFER: usize = 256;

struct ReadyEntry {
    value: Shared,
    fetched_at: Timestamp,
    expires_at: Timestamp,
    stale: bool,
}

impl ReadyEntry {
    fn is_fresh(&self, now: Timestamp) -> bool {
        !self.stale && now < self.expires_at
    }
}

struct InFlight {
    id: Ulid,
    receiver: watch::Receiver<Option<Outcome>>,
    invalidated: bool,
}

enum Slot {
    Ready(ReadyEntry),
    InFlight(InFlight),
}

/// Snapshot of one entry, for diagnostics and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryInfo {
    Ready {
        fetched_at: Timestamp,
        expires_at: Timestamp,
        stale: bool,
    },
    InFlight {
        invalidated: bool,
    },
}

pub(crate) enum Begin {
    Hit(Shared),
    Wait(watch::Receiver<Option<Outcome>>),
    Lead(Lead),
}

/// Process-wide response cache.
///
/// Cloning shares the same entries. Entries are only written by the
/// orchestrator's completion path and by [`CacheStore::invalidate`].
#[derive(Clone)]
pub struct CacheStore {
    slots: Arc<DashMap<CacheKey, Slot>>,
    invalidations: broadcast::Sender<KeyPattern>,
}

impl CacheStore {
    pub fn new() -> Self {
        let (invalidations, _) = broadcast::channel(INVALIDATION_BUFFER);
        Self {
            slots: Arc::new(DashMap::new()),
            invalidations,
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn info(&self, key: &CacheKey) -> Option<EntryInfo> {
        self.slots.get(key).map(|slot| match slot.value() {
            Slot::Ready(entry) => EntryInfo::Ready {
                fetched_at: entry.fetched_at,
                expires_at: entry.expires_at,
                stale: entry.stale,
            },
            Slot::InFlight(flight) => EntryInfo::InFlight {
                invalidated: flight.invalidated,
            },
        })
    }

    /// Drops every entry. In-flight requests still answer their waiters
    /// but do not repopulate the store.
    pub fn clear(&self) {
        info!(entries = self.slots.len(), "clearing cache");
        self.slots.clear();
    }

    /// Marks every matching entry stale and notifies live subscriptions.
    ///
    /// Returns the number of entries touched.
    pub fn invalidate(&self, patterns: &[KeyPattern]) -> usize {
        let mut touched = 0;
        for mut slot in self.slots.iter_mut() {
            if !patterns.iter().any(|pattern| pattern.matches(slot.key())) {
                continue;
            }
            touched += 1;
            match slot.value_mut() {
                Slot::Ready(entry) => entry.stale = true,
                Slot::InFlight(flight) => flight.invalidated = true,
            }
        }

        info!(patterns = patterns.len(), touched, "invalidated cache entries");
        for pattern in patterns {
            // no receivers is fine
            let _ = self.invalidations.send(pattern.clone());
        }
        touched
    }

    pub fn subscribe_invalidations(&self) -> broadcast::Receiver<KeyPattern> {
        self.invalidations.subscribe()
    }

    /// Atomically decides between a fresh hit, joining an in-flight
    /// request, or leading a new one.
    pub(crate) fn begin(&self, key: &CacheKey, now: Timestamp, force: bool) -> Begin {
        match self.slots.entry(key.clone()) {
            Entry::Occupied(mut occupied) => {
                let decision = match occupied.get() {
                    Slot::Ready(entry) if !force && entry.is_fresh(now) => {
                        Some(Begin::Hit(entry.value.clone()))
                    }
                    // a request started before an invalidation may carry
                    // pre-mutation data; later readers lead a new one
                    Slot::InFlight(flight) if !flight.invalidated => {
                        Some(Begin::Wait(flight.receiver.clone()))
                    }
                    Slot::InFlight(_) | Slot::Ready(_) => None,
                };
                if let Some(decision) = decision {
                    return decision;
                }
                let (lead, slot) = Lead::start(self.clone(), key.clone());
                occupied.insert(slot);
                Begin::Lead(lead)
            }
            Entry::Vacant(vacant) => {
                let (lead, slot) = Lead::start(self.clone(), key.clone());
                vacant.insert(slot);
                Begin::Lead(lead)
            }
        }
    }

    fn finish(&self, lead: &Lead, outcome: &Outcome, fetched_at: Timestamp, expires_at: Timestamp) {
        let Entry::Occupied(mut occupied) = self.slots.entry(lead.key.clone()) else {
            debug!(key = %lead.key, "entry cleared while in flight, not storing");
            return;
        };
        let invalidated = match occupied.get() {
            Slot::InFlight(flight) if flight.id == lead.id => flight.invalidated,
            _ => return,
        };

        match outcome {
            Ok(value) => {
                occupied.insert(Slot::Ready(ReadyEntry {
                    value: value.clone(),
                    fetched_at,
                    expires_at,
                    stale: invalidated,
                }));
            }
            Err(_) => {
                occupied.remove();
            }
        }
    }

    fn abandon(&self, lead: &Lead) {
        self.slots.remove_if(&lead.key, |_, slot| {
            matches!(slot, Slot::InFlight(flight) if flight.id == lead.id)
        });
    }
}

impl Default for CacheStore {
    fn default() -> Self {
        Self::new()
    }
}

/// The one caller allowed to perform the request for a key.
///
/// Dropping it without completing releases the key, so waiters observe a
/// closed channel instead of hanging.
pub(crate) struct Lead {
    store: CacheStore,
    key: CacheKey,
    id: Ulid,
    sender: watch::Sender<Option<Outcome>>,
    done: bool,
}

impl Lead {
    fn start(store: CacheStore, key: CacheKey) -> (Self, Slot) {
        let (sender, receiver) = watch::channel(None);
        let id = Ulid::new();
        let slot = Slot::InFlight(InFlight {
            id,
            receiver,
            invalidated: false,
        });
        let lead = Self {
            store,
            key,
            id,
            sender,
            done: false,
        };
        (lead, slot)
    }

    pub(crate) fn key(&self) -> &CacheKey {
        &self.key
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<Option<Outcome>> {
        self.sender.subscribe()
    }

    pub(crate) fn complete(mut self, outcome: Outcome, fetched_at: Timestamp, expires_at: Timestamp) {
        self.store.finish(&self, &outcome, fetched_at, expires_at);
        self.done = true;
        self.sender.send_replace(Some(outcome));
    }
}

impl Drop for Lead {
    fn drop(&mut self) {
        if !self.done {
            self.store.abandon(self);
        }
    }
}
