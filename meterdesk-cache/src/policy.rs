use std::collections::HashMap;

use jiff::{SignedDuration, Timestamp, Zoned};
use serde::{Deserialize, Serialize};

/// Every cached resource of the portal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Buildings,
    BuildingSearch,
    Building,
    BuildingHousings,
    BuildingDevices,
    Housing,
    Leaks,
    Dysfunctions,
    Interventions,
    Invoices,
    Consumption,
    Tickets,
    Ticket,
    Operators,
    OperatorDetails,
    ExportEligibility,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Buildings => "buildings",
            ResourceKind::BuildingSearch => "building_search",
            ResourceKind::Building => "building",
            ResourceKind::BuildingHousings => "building_housings",
            ResourceKind::BuildingDevices => "building_devices",
            ResourceKind::Housing => "housing",
            ResourceKind::Leaks => "leaks",
            ResourceKind::Dysfunctions => "dysfunctions",
            ResourceKind::Interventions => "interventions",
            ResourceKind::Invoices => "invoices",
            ResourceKind::Consumption => "consumption",
            ResourceKind::Tickets => "tickets",
            ResourceKind::Ticket => "ticket",
            ResourceKind::Operators => "operators",
            ResourceKind::OperatorDetails => "operator_details",
            ResourceKind::ExportEligibility => "export_eligibility",
        }
    }

    /// Default staleness class of the resource.
    pub fn class(&self) -> StalenessClass {
        match self {
            ResourceKind::Buildings
            | ResourceKind::BuildingSearch
            | ResourceKind::Building
            | ResourceKind::BuildingHousings
            | ResourceKind::BuildingDevices
            | ResourceKind::Housing
            | ResourceKind::Leaks
            | ResourceKind::Dysfunctions
            | ResourceKind::Interventions
            | ResourceKind::Invoices
            | ResourceKind::Consumption => StalenessClass::BatchSynchronized,
            ResourceKind::Tickets
            | ResourceKind::Ticket
            | ResourceKind::Operators
            | ResourceKind::ExportEligibility => StalenessClass::Interactive,
            ResourceKind::OperatorDetails => StalenessClass::Volatile,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StalenessClass {
    /// Only changed by the nightly upstream job.
    BatchSynchronized,
    /// Changed by user actions within the session.
    Interactive,
    /// Never served from cache.
    Volatile,
}

/// How long a value fetched at some instant may be reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Staleness {
    /// Fresh until the next occurrence of `hour:00` in the clock's zone.
    UntilCutover { hour: i8 },
    Window(SignedDuration),
    Always,
}

impl Staleness {
    pub fn expires_at(&self, fetched_at: &Zoned) -> Timestamp {
        match self {
            Staleness::UntilCutover { hour } => next_cutover(fetched_at, *hour),
            Staleness::Window(window) => fetched_at
                .timestamp()
                .checked_add(*window)
                .unwrap_or(Timestamp::MAX),
            Staleness::Always => fetched_at.timestamp(),
        }
    }

    /// Time left before a value fetched `now` turns stale.
    pub fn remaining(&self, now: &Zoned) -> SignedDuration {
        self.expires_at(now).duration_since(now.timestamp())
    }

    pub fn is_stale(&self, fetched_at: &Zoned, now: Timestamp) -> bool {
        now >= self.expires_at(fetched_at)
    }
}

/// First cutover strictly after `now`: today's if not yet reached, else
/// tomorrow's. Computed on the civil calendar so DST days stay correct.
fn next_cutover(now: &Zoned, hour: i8) -> Timestamp {
    let hour = hour.clamp(0, 23);
    let tz = now.time_zone().clone();

    if let Ok(today) = now.date().at(hour, 0, 0, 0).to_zoned(tz.clone())
        && today.timestamp() > now.timestamp()
    {
        return today.timestamp();
    }

    now.date()
        .tomorrow()
        .and_then(|date| date.at(hour, 0, 0, 0).to_zoned(tz))
        .map(|cutover| cutover.timestamp())
        .unwrap_or(Timestamp::MAX)
}

pub const DEFAULT_CUTOVER_HOUR: i8 = 4;
pub const DEFAULT_INTERACTIVE_WINDOW: SignedDuration = SignedDuration::from_mins(5);

/// Maps resource kinds to their staleness.
#[derive(Debug, Clone)]
pub struct StalenessPolicy {
    cutover_hour: i8,
    interactive_window: SignedDuration,
    overrides: HashMap<ResourceKind, Staleness>,
}

impl StalenessPolicy {
    pub fn new(cutover_hour: i8, interactive_window: SignedDuration) -> Self {
        Self {
            cutover_hour: cutover_hour.clamp(0, 23),
            interactive_window,
            overrides: HashMap::new(),
        }
    }

    pub fn with_override(mut self, kind: ResourceKind, staleness: Staleness) -> Self {
        self.overrides.insert(kind, staleness);
        self
    }

    pub fn cutover_hour(&self) -> i8 {
        self.cutover_hour
    }

    pub fn staleness(&self, kind: ResourceKind) -> Staleness {
        if let Some(staleness) = self.overrides.get(&kind) {
            return *staleness;
        }
        match kind.class() {
            StalenessClass::BatchSynchronized => Staleness::UntilCutover {
                hour: self.cutover_hour,
            },
            StalenessClass::Interactive => Staleness::Window(self.interactive_window),
            StalenessClass::Volatile => Staleness::Always,
        }
    }
}

impl Default for StalenessPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_CUTOVER_HOUR, DEFAULT_INTERACTIVE_WINDOW)
    }
}
