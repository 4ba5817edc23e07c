use std::sync::Arc;

use jiff::SignedDuration;
use meterdesk_cache::{
    CacheStore, Clock, KeyPattern, Orchestrator, ResourceKind, StalenessPolicy, Subscription,
    SystemClock,
};
use meterdesk_client::{Backend, HttpBackend, MutationMethod, endpoints};
use meterdesk_core::{BuildingId, HousingId, OperatorId, PortalError, TicketId};
use meterdesk_list::{ListState, Listable};
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::config::{Config, ConfigError};
use crate::export::{ExportKind, ExportParams, ExportState, Exports, Triggered, export_path};
use crate::resources::Resource;
use crate::sink::{DirectorySink, Document, DownloadSink};

/// Occupant fields editable from a housing page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OccupantUpdate {
    pub name: String,
    pub reference: Option<String>,
}

/// Entry point used by presentation code: cached reads in both access
/// modes, mutations, and exports.
#[derive(Clone)]
pub struct Portal {
    backend: Arc<dyn Backend>,
    orchestrator: Orchestrator,
    exports: Exports,
    sink: Arc<dyn DownloadSink>,
    page_size: usize,
}

impl Portal {
    pub fn new(
        backend: Arc<dyn Backend>,
        orchestrator: Orchestrator,
        sink: Arc<dyn DownloadSink>,
    ) -> Self {
        Self {
            backend,
            orchestrator,
            exports: Exports::new(),
            sink,
            page_size: meterdesk_list::DEFAULT_PAGE_SIZE,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        config.validate()?;

        let mut http =
            HttpBackend::with_timeout(&config.backend.base_url, config.backend.timeout())?;
        if let Some(token) = &config.backend.token {
            http = http.with_token(token);
        }

        let clock: Arc<dyn Clock> = match &config.cache.time_zone {
            Some(name) => Arc::new(SystemClock::named(name)),
            None => Arc::new(SystemClock::default()),
        };
        let window = i64::try_from(config.cache.interactive_window_secs)
            .map(SignedDuration::from_secs)
            .map_err(|_| {
                ConfigError::Invalid("cache.interactive_window_secs is too large".to_string())
            })?;
        let policy = StalenessPolicy::new(config.cache.cutover_hour, window);

        info!(
            base_url = %config.backend.base_url,
            cutover_hour = config.cache.cutover_hour,
            exports = %config.export.directory.display(),
            "portal configured"
        );

        let portal = Self::new(
            Arc::new(http),
            Orchestrator::new(CacheStore::new(), clock, policy),
            Arc::new(DirectorySink::new(&config.export.directory)),
        );
        Ok(portal.with_page_size(config.list.page_size))
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    pub fn exports(&self) -> &Exports {
        &self.exports
    }

    /// Fresh list state using the configured page size.
    pub fn list_state<T: Listable>(&self) -> ListState<T> {
        ListState::new(self.page_size)
    }

    /// One-shot read through the cache.
    pub async fn fetch<V>(&self, resource: Resource<V>) -> Result<Arc<V>, PortalError>
    where
        V: Send + Sync + 'static,
    {
        let Resource { key, path, query, decode } = resource;
        let backend = self.backend.clone();
        self.orchestrator
            .fetch(key, move || async move {
                let payload = backend.get_json(&path, &query).await?;
                Ok::<V, PortalError>(decode(&payload))
            })
            .await
    }

    /// Like [`Portal::fetch`] but skips a fresh cache entry.
    pub async fn refresh<V>(&self, resource: Resource<V>) -> Result<Arc<V>, PortalError>
    where
        V: Send + Sync + 'static,
    {
        let Resource { key, path, query, decode } = resource;
        let backend = self.backend.clone();
        self.orchestrator
            .fetch_fresh(key, move || async move {
                let payload = backend.get_json(&path, &query).await?;
                Ok::<V, PortalError>(decode(&payload))
            })
            .await
    }

    /// Live read, refetched whenever a mutation invalidates it.
    pub fn subscribe<V>(&self, resource: Resource<V>) -> Subscription<V>
    where
        V: Send + Sync + 'static,
    {
        let Resource { key, path, query, decode } = resource;
        let backend = self.backend.clone();
        let request = Arc::new((path, query));
        self.orchestrator.subscribe(key, move || {
            let backend = backend.clone();
            let request = request.clone();
            async move {
                let (path, query) = &*request;
                let payload = backend.get_json(path, query).await?;
                Ok::<V, PortalError>(decode(&payload))
            }
        })
    }

    /// Drops every cached response.
    pub fn reload(&self) {
        self.orchestrator.store().clear();
    }

    pub async fn assign_building(
        &self,
        operator: &OperatorId,
        building: &BuildingId,
    ) -> Result<(), PortalError> {
        self.mutate(
            MutationMethod::Post,
            &endpoints::operator_building(operator, building),
            None,
        )
        .await?;
        self.invalidate_operator(operator);
        Ok(())
    }

    pub async fn unassign_building(
        &self,
        operator: &OperatorId,
        building: &BuildingId,
    ) -> Result<(), PortalError> {
        self.mutate(
            MutationMethod::Delete,
            &endpoints::operator_building(operator, building),
            None,
        )
        .await?;
        self.invalidate_operator(operator);
        Ok(())
    }

    pub async fn delete_operator(&self, operator: &OperatorId) -> Result<(), PortalError> {
        self.mutate(MutationMethod::Delete, &endpoints::operator(operator), None)
            .await?;
        self.invalidate_operator(operator);
        Ok(())
    }

    pub async fn close_ticket(
        &self,
        ticket: &TicketId,
        comment: Option<&str>,
    ) -> Result<(), PortalError> {
        let body = comment.map(|comment| json!({ "Commentaire": comment }));
        self.mutate(MutationMethod::Post, &endpoints::ticket_close(ticket), body)
            .await?;
        self.orchestrator.invalidate(&[
            KeyPattern::Id(ResourceKind::Ticket, ticket.to_string()),
            KeyPattern::Kind(ResourceKind::Tickets),
        ]);
        Ok(())
    }

    pub async fn update_occupant(
        &self,
        housing: &HousingId,
        update: &OccupantUpdate,
    ) -> Result<(), PortalError> {
        let body = json!({
            "NomOccupant": update.name,
            "RefOccupant": update.reference,
        });
        self.mutate(
            MutationMethod::Put,
            &endpoints::housing_occupant(housing),
            Some(body),
        )
        .await?;
        // the housing does not know which building list it appears in
        self.orchestrator.invalidate(&[
            KeyPattern::Id(ResourceKind::Housing, housing.to_string()),
            KeyPattern::Kind(ResourceKind::BuildingHousings),
        ]);
        Ok(())
    }

    /// Validates `params`, then downloads the export in the background and
    /// hands it to the download sink. Returns the manager state right after
    /// the trigger.
    pub fn trigger_export(&self, kind: ExportKind, params: ExportParams) -> ExportState {
        let manager = self.exports.manager(kind);

        if let Err(e) = params.validate(kind) {
            if manager.reject(e.into()) == Triggered::AlreadyRunning {
                info!(?kind, "export already running, invalid request ignored");
            }
            return manager.state();
        }

        let backend = self.backend.clone();
        let sink = self.sink.clone();
        let today = self.orchestrator.clock().now().date();
        manager.trigger(move || async move {
            let payload = backend
                .get_binary(&export_path(kind), &params.to_query())
                .await?;
            let document = Document {
                kind,
                discriminator: params.discriminator(),
                date: today,
                payload,
            };
            sink.save(document).await?;
            Ok::<(), PortalError>(())
        });
        manager.state()
    }

    async fn mutate(
        &self,
        method: MutationMethod,
        path: &str,
        body: Option<Value>,
    ) -> Result<(), PortalError> {
        let envelope = self.backend.mutate(method, path, body).await?;
        if !envelope.success {
            warn!(path, message = ?envelope.message, "mutation rejected");
            return Err(PortalError::conflict(envelope.message.as_deref()));
        }
        info!(path, "mutation applied");
        Ok(())
    }

    fn invalidate_operator(&self, operator: &OperatorId) {
        self.orchestrator.invalidate(&[
            KeyPattern::Id(ResourceKind::OperatorDetails, operator.to_string()),
            KeyPattern::Kind(ResourceKind::Operators),
        ]);
    }
}
