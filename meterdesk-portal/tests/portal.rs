use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use jiff::{civil::date, tz::TimeZone};
use meterdesk_cache::{CacheStore, ManualClock, Orchestrator, StalenessPolicy};
use meterdesk_client::{
    Backend, BinaryPayload, Envelope, MutationMethod, QueryParams, TransportError,
};
use meterdesk_core::{BuildingId, ErrorCategory, OperatorId, TicketId, TicketStatus};
use meterdesk_portal::{
    DirectorySink, ExportKind, ExportParams, ExportState, OccupantUpdate, Portal, resources,
};
use serde_json::{Value, json};
use tokio::sync::Notify;

#[derive(Default)]
struct FakeBackend {
    json: Mutex<HashMap<String, Value>>,
    gets: Mutex<Vec<String>>,
    downloads: Mutex<Vec<(String, QueryParams)>>,
    mutations: Mutex<Vec<(MutationMethod, String, Option<Value>)>>,
    envelope: Mutex<Option<Envelope>>,
    binary_status: Mutex<Option<u16>>,
    gate: Option<Arc<Notify>>,
}

impl FakeBackend {
    fn gated(gate: Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::default()
        }
    }

    fn serve(&self, path: &str, payload: Value) {
        self.json.lock().unwrap().insert(path.to_string(), payload);
    }

    fn gets_of(&self, path: &str) -> usize {
        self.gets.lock().unwrap().iter().filter(|p| *p == path).count()
    }

    fn download_count(&self) -> usize {
        self.downloads.lock().unwrap().len()
    }

    fn reject_mutations(&self, message: &str) {
        *self.envelope.lock().unwrap() = Some(Envelope {
            success: false,
            message: Some(message.to_string()),
        });
    }
}

#[async_trait]
impl Backend for FakeBackend {
    async fn get_json(&self, path: &str, _query: &QueryParams) -> Result<Value, TransportError> {
        self.gets.lock().unwrap().push(path.to_string());
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        let payload = self.json.lock().unwrap().get(path).cloned();
        payload.ok_or(TransportError::Status {
            status: 404,
            body: String::new(),
        })
    }

    async fn get_binary(
        &self,
        path: &str,
        query: &QueryParams,
    ) -> Result<BinaryPayload, TransportError> {
        self.downloads
            .lock()
            .unwrap()
            .push((path.to_string(), query.clone()));
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if let Some(status) = *self.binary_status.lock().unwrap() {
            return Err(TransportError::Status {
                status,
                body: String::new(),
            });
        }
        Ok(BinaryPayload {
            bytes: b"PK\x03\x04".to_vec(),
            content_type: Some(
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet".to_string(),
            ),
            file_name: None,
        })
    }

    async fn mutate(
        &self,
        method: MutationMethod,
        path: &str,
        body: Option<Value>,
    ) -> Result<Envelope, TransportError> {
        self.mutations
            .lock()
            .unwrap()
            .push((method, path.to_string(), body));
        Ok(self.envelope.lock().unwrap().clone().unwrap_or(Envelope {
            success: true,
            message: None,
        }))
    }
}

fn portal_with(backend: Arc<FakeBackend>, exports: PathBuf) -> Portal {
    let now = date(2024, 3, 10)
        .at(9, 0, 0, 0)
        .to_zoned(TimeZone::UTC)
        .unwrap();
    let orchestrator = Orchestrator::new(
        CacheStore::new(),
        Arc::new(ManualClock::new(now)),
        StalenessPolicy::default(),
    );
    Portal::new(backend, orchestrator, Arc::new(DirectorySink::new(exports)))
}

fn portal(backend: Arc<FakeBackend>) -> Portal {
    portal_with(backend, std::env::temp_dir().join("meterdesk-unused"))
}

fn buildings_payload() -> Value {
    json!({
        "Data": [
            { "IdImmeuble": 1, "RefImmeuble": "R1", "NbFuites": "0" },
            { "IdImmeuble": 2, "refImmeuble": "R2", "Alertes": { "NbFuites": 2 } },
            { "idImmeuble": "3", "RefImmeuble": "R3", "nbFuites": 1 },
        ]
    })
}

#[tokio::test]
async fn concurrent_reads_hit_the_backend_once() {
    let gate = Arc::new(Notify::new());
    let backend = Arc::new(FakeBackend::gated(gate.clone()));
    backend.serve("/api/immeubles", buildings_payload());
    let portal = portal(backend.clone());

    let (a, b, ()) = tokio::join!(
        portal.fetch(resources::buildings()),
        portal.fetch(resources::buildings()),
        async {
            tokio::task::yield_now().await;
            gate.notify_one();
        }
    );

    assert_eq!(backend.gets_of("/api/immeubles"), 1);
    let a = a.unwrap();
    assert_eq!(a, b.unwrap());
    assert_eq!(a.len(), 3);
    let leaks: Vec<u32> = a.iter().map(|b| b.issues.leaks).collect();
    assert_eq!(leaks, [0, 2, 1]);
}

#[tokio::test]
async fn missing_resource_surfaces_not_found() {
    let backend = Arc::new(FakeBackend::default());
    let portal = portal(backend);

    let error = portal
        .fetch(resources::building(&BuildingId::new("404")))
        .await
        .unwrap_err();
    assert_eq!(error.category, ErrorCategory::NotFound);
}

#[tokio::test]
async fn closing_a_ticket_refetches_detail_and_list() {
    let backend = Arc::new(FakeBackend::default());
    backend.serve("/api/tickets", json!([{ "IdTicket": "T1", "Statut": "En cours" }]));
    backend.serve("/api/tickets/T1", json!({ "IdTicket": "T1", "Statut": "En cours" }));
    let portal = portal(backend.clone());
    let id = TicketId::new("T1");

    portal.fetch(resources::ticket(&id)).await.unwrap();
    portal.fetch(resources::tickets()).await.unwrap();
    portal.fetch(resources::tickets()).await.unwrap();
    assert_eq!(backend.gets_of("/api/tickets"), 1);

    backend.serve("/api/tickets/T1", json!({ "IdTicket": "T1", "Statut": "Clôturé" }));
    portal.close_ticket(&id, Some("réparé")).await.unwrap();

    let ticket = portal.fetch(resources::ticket(&id)).await.unwrap();
    portal.fetch(resources::tickets()).await.unwrap();
    assert_eq!(ticket.status, TicketStatus::Closed);
    assert_eq!(backend.gets_of("/api/tickets/T1"), 2);
    assert_eq!(backend.gets_of("/api/tickets"), 2);

    let mutations = backend.mutations.lock().unwrap();
    assert_eq!(mutations[0].0, MutationMethod::Post);
    assert_eq!(mutations[0].1, "/api/tickets/T1/cloture");
    assert_eq!(mutations[0].2, Some(json!({ "Commentaire": "réparé" })));
}

#[tokio::test]
async fn rejected_mutation_keeps_cache_and_reports_backend_message() {
    let backend = Arc::new(FakeBackend::default());
    backend.serve("/api/gestionnaires", json!([{ "IdGestionnaire": 7 }]));
    backend.reject_mutations("Immeuble déjà affecté");
    let portal = portal(backend.clone());

    portal.fetch(resources::operators()).await.unwrap();
    let error = portal
        .assign_building(&OperatorId::new("7"), &BuildingId::new("12"))
        .await
        .unwrap_err();

    assert_eq!(error.category, ErrorCategory::Conflict);
    assert_eq!(error.message, "Immeuble déjà affecté");
    portal.fetch(resources::operators()).await.unwrap();
    assert_eq!(backend.gets_of("/api/gestionnaires"), 1);
}

#[tokio::test]
async fn assignment_refetches_operator_views() {
    let backend = Arc::new(FakeBackend::default());
    backend.serve("/api/gestionnaires", json!([{ "IdGestionnaire": 7 }]));
    let portal = portal(backend.clone());

    portal.fetch(resources::operators()).await.unwrap();
    portal
        .unassign_building(&OperatorId::new("7"), &BuildingId::new("12"))
        .await
        .unwrap();
    portal.fetch(resources::operators()).await.unwrap();

    assert_eq!(backend.gets_of("/api/gestionnaires"), 2);
    let mutations = backend.mutations.lock().unwrap();
    assert_eq!(mutations[0].0, MutationMethod::Delete);
    assert_eq!(mutations[0].1, "/api/gestionnaires/7/immeubles/12");
}

#[tokio::test]
async fn occupant_update_refetches_housing_lists() {
    let backend = Arc::new(FakeBackend::default());
    backend.serve("/api/immeubles/12/logements", json!([{ "IdLogement": 1 }]));
    let portal = portal(backend.clone());
    let building = BuildingId::new("12");

    portal
        .fetch(resources::building_housings(&building))
        .await
        .unwrap();
    portal
        .update_occupant(
            &meterdesk_core::HousingId::new("1"),
            &OccupantUpdate {
                name: "Durand".into(),
                reference: None,
            },
        )
        .await
        .unwrap();
    portal
        .fetch(resources::building_housings(&building))
        .await
        .unwrap();

    assert_eq!(backend.gets_of("/api/immeubles/12/logements"), 2);
}

#[tokio::test]
async fn subscription_follows_mutations() {
    let backend = Arc::new(FakeBackend::default());
    backend.serve("/api/tickets", json!([{ "IdTicket": "T1", "Statut": "Nouveau" }]));
    let portal = portal(backend.clone());

    let mut tickets = portal.subscribe(resources::tickets());
    let state = tickets.settled().await;
    assert_eq!(state.data.unwrap()[0].status, TicketStatus::New);

    backend.serve("/api/tickets", json!([{ "IdTicket": "T1", "Statut": "Fermé" }]));
    portal.close_ticket(&TicketId::new("T1"), None).await.unwrap();

    assert!(tickets.changed().await);
    let state = tickets.settled().await;
    assert_eq!(state.data.unwrap()[0].status, TicketStatus::Closed);
    assert!(state.error.is_none());
}

#[tokio::test]
async fn reload_empties_the_cache() {
    let backend = Arc::new(FakeBackend::default());
    backend.serve("/api/immeubles", buildings_payload());
    let portal = portal(backend.clone());

    portal.fetch(resources::buildings()).await.unwrap();
    portal.reload();
    assert!(portal.orchestrator().store().is_empty());
    portal.fetch(resources::buildings()).await.unwrap();
    assert_eq!(backend.gets_of("/api/immeubles"), 2);
}

#[tokio::test]
async fn invalid_export_never_reaches_the_backend() {
    let backend = Arc::new(FakeBackend::default());
    let portal = portal(backend.clone());

    let state = portal.trigger_export(
        ExportKind::InvoicesWorkbook,
        ExportParams::default().between(date(2024, 5, 1), date(2024, 4, 1)),
    );

    let ExportState::Failed(error) = state else {
        panic!("expected a validation failure");
    };
    assert_eq!(error.category, ErrorCategory::Validation);
    assert_eq!(backend.download_count(), 0);

    portal.exports().manager(ExportKind::InvoicesWorkbook).dismiss();
    assert_eq!(
        portal.exports().manager(ExportKind::InvoicesWorkbook).state(),
        ExportState::Idle
    );
}

#[tokio::test]
async fn quick_double_trigger_downloads_once() {
    let dir = tempfile::tempdir().unwrap();
    let gate = Arc::new(Notify::new());
    let backend = Arc::new(FakeBackend::gated(gate.clone()));
    let portal = portal_with(backend.clone(), dir.path().to_path_buf());
    let params = ExportParams::for_building("12");

    let first = portal.trigger_export(ExportKind::HousingList, params.clone());
    let second = portal.trigger_export(ExportKind::HousingList, params);
    assert!(first.is_in_flight());
    assert_eq!(first, second);

    gate.notify_one();
    let manager = portal.exports().manager(ExportKind::HousingList);
    assert_eq!(manager.settled().await, ExportState::Idle);
    assert_eq!(manager.completed(), 1);
    assert_eq!(backend.download_count(), 1);

    let (path, query) = backend.downloads.lock().unwrap()[0].clone();
    assert_eq!(path, "/api/exports/logements");
    assert_eq!(
        query.pairs(),
        [("immeuble".to_string(), "12".to_string())]
    );

    let saved = dir.path().join("housings_12_2024-03-10.xlsx");
    assert_eq!(std::fs::read(saved).unwrap(), b"PK\x03\x04");
}

#[tokio::test]
async fn failed_download_is_reported_and_retryable() {
    let dir = tempfile::tempdir().unwrap();
    let backend = Arc::new(FakeBackend::default());
    *backend.binary_status.lock().unwrap() = Some(503);
    let portal = portal_with(backend.clone(), dir.path().to_path_buf());
    let manager = portal.exports().manager(ExportKind::LeaksWorkbook).clone();

    portal.trigger_export(ExportKind::LeaksWorkbook, ExportParams::default());
    let ExportState::Failed(error) = manager.settled().await else {
        panic!("expected the download to fail");
    };
    assert_eq!(error.category, ErrorCategory::Server);

    *backend.binary_status.lock().unwrap() = None;
    portal.trigger_export(ExportKind::LeaksWorkbook, ExportParams::default());
    assert_eq!(manager.settled().await, ExportState::Idle);
    assert!(dir.path().join("leaks_all_2024-03-10.xlsx").exists());
    assert_eq!(backend.download_count(), 2);
}
