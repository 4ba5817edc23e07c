//! Export workflows: one manager per export kind, each running at most one
//! download at a time.

use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use jiff::civil::Date;
use meterdesk_client::{QueryParams, endpoints};
use meterdesk_core::{BuildingId, ErrorCategory, PortalError};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use ulid::Ulid;

/// Longest date range an export may cover, in days.
pub const MAX_RANGE_DAYS: i32 = 366;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ExportKind {
    BuildingsWorkbook,
    BuildingReport,
    HousingList,
    InvoicesWorkbook,
    LeaksWorkbook,
    MalfunctionsWorkbook,
    InterventionsWorkbook,
    ConsumptionReport,
    TicketsWorkbook,
}

impl ExportKind {
    pub const ALL: [ExportKind; 9] = [
        ExportKind::BuildingsWorkbook,
        ExportKind::BuildingReport,
        ExportKind::HousingList,
        ExportKind::InvoicesWorkbook,
        ExportKind::LeaksWorkbook,
        ExportKind::MalfunctionsWorkbook,
        ExportKind::InterventionsWorkbook,
        ExportKind::ConsumptionReport,
        ExportKind::TicketsWorkbook,
    ];

    /// Path segment of the backend export endpoint.
    pub fn slug(&self) -> &'static str {
        match self {
            ExportKind::BuildingsWorkbook => "immeubles",
            ExportKind::BuildingReport => "rapport-immeuble",
            ExportKind::HousingList => "logements",
            ExportKind::InvoicesWorkbook => "factures",
            ExportKind::LeaksWorkbook => "fuites",
            ExportKind::MalfunctionsWorkbook => "dysfonctionnements",
            ExportKind::InterventionsWorkbook => "interventions",
            ExportKind::ConsumptionReport => "rapport-consommation",
            ExportKind::TicketsWorkbook => "tickets",
        }
    }

    pub fn file_stem(&self) -> &'static str {
        match self {
            ExportKind::BuildingsWorkbook => "buildings",
            ExportKind::BuildingReport => "building_report",
            ExportKind::HousingList => "housings",
            ExportKind::InvoicesWorkbook => "invoices",
            ExportKind::LeaksWorkbook => "leaks",
            ExportKind::MalfunctionsWorkbook => "malfunctions",
            ExportKind::InterventionsWorkbook => "interventions",
            ExportKind::ConsumptionReport => "consumption_report",
            ExportKind::TicketsWorkbook => "tickets",
        }
    }

    pub fn default_extension(&self) -> &'static str {
        match self {
            ExportKind::BuildingReport | ExportKind::ConsumptionReport => "pdf",
            _ => "xlsx",
        }
    }

    pub fn requires_building(&self) -> bool {
        matches!(
            self,
            ExportKind::BuildingReport | ExportKind::HousingList | ExportKind::ConsumptionReport
        )
    }

    pub fn requires_range(&self) -> bool {
        matches!(
            self,
            ExportKind::InvoicesWorkbook | ExportKind::ConsumptionReport
        )
    }
}

impl fmt::Display for ExportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_stem())
    }
}

impl FromStr for ExportKind {
    type Err = ExportError;

    /// Accepts the file stem, with `-` or `_`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('-', "_");
        ExportKind::ALL
            .into_iter()
            .find(|kind| kind.file_stem() == wanted)
            .ok_or_else(|| ExportError::UnknownKind(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExportError {
    #[error("unknown export kind `{0}`")]
    UnknownKind(String),
    #[error("{0} export needs a building")]
    MissingBuilding(ExportKind),
    #[error("{0} export needs both a start and an end date")]
    MissingRange(ExportKind),
    #[error("start date {from} is after end date {to}")]
    InvertedRange { from: Date, to: Date },
    #[error("date range of {days} days exceeds 366 days")]
    RangeTooLong { days: i32 },
}

impl From<ExportError> for PortalError {
    fn from(e: ExportError) -> Self {
        PortalError::validation(e.to_string())
    }
}

/// Inputs of one export run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportParams {
    pub building: Option<BuildingId>,
    pub from: Option<Date>,
    pub to: Option<Date>,
}

impl ExportParams {
    pub fn for_building(id: impl Into<String>) -> Self {
        Self {
            building: Some(BuildingId::new(id)),
            ..Self::default()
        }
    }

    pub fn between(mut self, from: Date, to: Date) -> Self {
        self.from = Some(from);
        self.to = Some(to);
        self
    }

    /// Checked before anything is sent to the backend.
    pub fn validate(&self, kind: ExportKind) -> Result<(), ExportError> {
        if kind.requires_building()
            && self
                .building
                .as_ref()
                .is_none_or(|id| id.as_str().trim().is_empty())
        {
            return Err(ExportError::MissingBuilding(kind));
        }

        match (self.from, self.to) {
            (None, None) if !kind.requires_range() => Ok(()),
            (Some(from), Some(to)) => {
                if from > to {
                    return Err(ExportError::InvertedRange { from, to });
                }
                let days = to
                    .since(from)
                    .map(|span| span.get_days())
                    .unwrap_or(i32::MAX);
                if days > MAX_RANGE_DAYS {
                    return Err(ExportError::RangeTooLong { days });
                }
                Ok(())
            }
            _ => Err(ExportError::MissingRange(kind)),
        }
    }

    pub fn to_query(&self) -> QueryParams {
        QueryParams::new()
            .optional_text("immeuble", self.building.as_ref().map(BuildingId::as_str))
            .optional_text("du", self.from.map(|d| d.to_string()))
            .optional_text("au", self.to.map(|d| d.to_string()))
    }

    /// Part of the saved file name telling exports of the same day apart.
    pub fn discriminator(&self) -> String {
        match &self.building {
            Some(id) => id.to_string(),
            None => "all".to_string(),
        }
    }
}

pub fn export_path(kind: ExportKind) -> String {
    endpoints::export(kind.slug())
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ExportState {
    #[default]
    Idle,
    InFlight {
        attempt: Ulid,
    },
    Failed(PortalError),
}

impl ExportState {
    pub fn is_in_flight(&self) -> bool {
        matches!(self, ExportState::InFlight { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Triggered {
    Started(Ulid),
    /// A run was already in flight; nothing was started.
    AlreadyRunning,
    /// Refused before any backend call.
    Rejected,
}

/// Runs one kind of export, at most once at a time.
#[derive(Clone)]
pub struct ExportManager {
    kind: ExportKind,
    state: Arc<watch::Sender<ExportState>>,
    completed: Arc<AtomicU64>,
}

impl ExportManager {
    pub fn new(kind: ExportKind) -> Self {
        let (state, _) = watch::channel(ExportState::Idle);
        Self {
            kind,
            state: Arc::new(state),
            completed: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn kind(&self) -> ExportKind {
        self.kind
    }

    pub fn state(&self) -> ExportState {
        self.state.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<ExportState> {
        self.state.subscribe()
    }

    /// Number of runs that finished successfully.
    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::SeqCst)
    }

    /// Starts `operation` unless a run is already in flight.
    ///
    /// The outcome is only observable through [`ExportManager::state`]: a
    /// failure, or a panic of the operation, ends in [`ExportState::Failed`].
    pub fn trigger<F, Fut>(&self, operation: F) -> Triggered
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), PortalError>> + Send + 'static,
    {
        let Some(attempt) = self.begin() else {
            debug!(kind = ?self.kind, "export already running");
            return Triggered::AlreadyRunning;
        };

        let this = self.clone();
        tokio::spawn(async move {
            info!(kind = ?this.kind, %attempt, "export started");
            let outcome = match tokio::spawn(operation()).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(kind = ?this.kind, %attempt, error = %e, "export task aborted");
                    Err(PortalError::from_category(ErrorCategory::Unknown))
                }
            };
            this.finish(attempt, outcome);
        });

        Triggered::Started(attempt)
    }

    /// Records a failure found before starting, unless a run is in flight.
    pub fn reject(&self, error: PortalError) -> Triggered {
        let rejected = self.state.send_if_modified(|state| {
            if state.is_in_flight() {
                return false;
            }
            *state = ExportState::Failed(error);
            true
        });
        if rejected {
            warn!(kind = ?self.kind, "export rejected before start");
            Triggered::Rejected
        } else {
            Triggered::AlreadyRunning
        }
    }

    /// Clears a failure. No effect in any other state.
    pub fn dismiss(&self) {
        self.state.send_if_modified(|state| {
            if matches!(state, ExportState::Failed(_)) {
                *state = ExportState::Idle;
                return true;
            }
            false
        });
    }

    /// Waits until no run is in flight and returns that state.
    pub async fn settled(&self) -> ExportState {
        let mut receiver = self.state.subscribe();
        if let Ok(state) = receiver.wait_for(|state| !state.is_in_flight()).await {
            return state.clone();
        }
        self.state()
    }

    // the check and the transition happen under the channel lock, so two
    // racing triggers cannot both start
    fn begin(&self) -> Option<Ulid> {
        let mut started = None;
        self.state.send_if_modified(|state| {
            if state.is_in_flight() {
                return false;
            }
            let attempt = Ulid::new();
            *state = ExportState::InFlight { attempt };
            started = Some(attempt);
            true
        });
        started
    }

    fn finish(&self, attempt: Ulid, outcome: Result<(), PortalError>) {
        let next = match outcome {
            Ok(()) => {
                self.completed.fetch_add(1, Ordering::SeqCst);
                info!(kind = ?self.kind, %attempt, "export completed");
                ExportState::Idle
            }
            Err(e) => {
                warn!(kind = ?self.kind, %attempt, category = ?e.category, "export failed");
                ExportState::Failed(e)
            }
        };
        self.state.send_replace(next);
    }
}

/// One [`ExportManager`] per [`ExportKind`].
#[derive(Clone)]
pub struct Exports {
    managers: Arc<[ExportManager]>,
}

impl Exports {
    pub fn new() -> Self {
        Self {
            managers: ExportKind::ALL.into_iter().map(ExportManager::new).collect(),
        }
    }

    pub fn manager(&self, kind: ExportKind) -> &ExportManager {
        // ALL lists every kind once, in declaration order
        &self.managers[kind as usize]
    }

    pub fn iter(&self) -> impl Iterator<Item = &ExportManager> {
        self.managers.iter()
    }
}

impl Default for Exports {
    fn default() -> Self {
        Self::new()
    }
}
