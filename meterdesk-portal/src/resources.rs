//! Every cacheable read of the portal, as a typed descriptor.
//!
//! A [`Resource`] names its cache key, the endpoint serving it and how the
//! payload is normalized. Hand it to [`crate::Portal::fetch`] for a one-shot
//! read or to [`crate::Portal::subscribe`] for a live one.

use jiff::civil::Date;
use meterdesk_cache::{CacheKey, ResourceKind};
use meterdesk_client::{QueryParams, endpoints};
use meterdesk_core::normalize::{normalize_issue, normalize_list, normalize_list_with, normalize_one};
use meterdesk_core::{
    Building, BuildingId, ConsumptionSummary, Device, DeviceCategory, ExportEligibility, Housing,
    HousingId, Invoice, IssueKind, IssueRecord, Operator, OperatorDetails, OperatorId, Ticket,
    TicketId,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Keys the backend wraps list payloads in.
const ENVELOPE: &[&str] = &["Data", "Items", "Liste", "Resultats"];

pub struct Resource<V> {
    pub(crate) key: CacheKey,
    pub(crate) path: String,
    pub(crate) query: QueryParams,
    pub(crate) decode: fn(&Value) -> V,
}

impl<V> Clone for Resource<V> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            path: self.path.clone(),
            query: self.query.clone(),
            decode: self.decode,
        }
    }
}

impl<V> Resource<V> {
    fn new(key: CacheKey, path: impl Into<String>, decode: fn(&Value) -> V) -> Self {
        Self {
            key,
            path: path.into(),
            query: QueryParams::new(),
            decode,
        }
    }

    /// Query parameters also discriminate the cache key.
    fn with_query(mut self, query: QueryParams) -> Self {
        self.key = self.key.params(query.to_map());
        self.query = query;
        self
    }

    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> &QueryParams {
        &self.query
    }
}

fn list<T: meterdesk_core::Normalize>(payload: &Value) -> Vec<T> {
    normalize_list(payload, ENVELOPE)
}

fn one<T: meterdesk_core::Normalize>(payload: &Value) -> T {
    normalize_one(payload)
}

fn leak_list(payload: &Value) -> Vec<IssueRecord> {
    normalize_list_with(payload, ENVELOPE, |raw| normalize_issue(IssueKind::Leak, raw))
}

fn dysfunction_list(payload: &Value) -> Vec<IssueRecord> {
    normalize_list_with(payload, ENVELOPE, |raw| {
        normalize_issue(IssueKind::Dysfunction, raw)
    })
}

fn intervention_list(payload: &Value) -> Vec<IssueRecord> {
    normalize_list_with(payload, ENVELOPE, |raw| {
        normalize_issue(IssueKind::Intervention, raw)
    })
}

/// Server-side building search filters. Unset fields are not sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildingSearch {
    pub text: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    pub has_leaks: Option<bool>,
    pub has_malfunctions: Option<bool>,
    pub remote_reading: Option<bool>,
}

impl BuildingSearch {
    pub fn to_query(&self) -> QueryParams {
        QueryParams::new()
            .optional_text("recherche", self.text.as_deref())
            .optional_text("ville", self.city.as_deref())
            .optional_text("codePostal", self.postal_code.as_deref())
            .optional_flag("avecFuites", self.has_leaks)
            .optional_flag("avecDysfonctionnements", self.has_malfunctions)
            .optional_flag("teleReleve", self.remote_reading)
    }
}

/// Invoice list filters: edition date range and building.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InvoiceFilter {
    pub building: Option<BuildingId>,
    pub from: Option<Date>,
    pub to: Option<Date>,
}

impl InvoiceFilter {
    pub fn to_query(&self) -> QueryParams {
        QueryParams::new()
            .optional_text("immeuble", self.building.as_ref().map(BuildingId::as_str))
            .optional_text("du", self.from.map(|d| d.to_string()))
            .optional_text("au", self.to.map(|d| d.to_string()))
    }
}

fn scoped(building: Option<&BuildingId>) -> QueryParams {
    QueryParams::new().optional_text("immeuble", building.map(BuildingId::as_str))
}

pub fn buildings() -> Resource<Vec<Building>> {
    Resource::new(
        CacheKey::new(ResourceKind::Buildings),
        endpoints::BUILDINGS,
        list,
    )
}

pub fn building(id: &BuildingId) -> Resource<Building> {
    Resource::new(
        CacheKey::with_id(ResourceKind::Building, id.as_str()),
        endpoints::building(id),
        one,
    )
}

pub fn search_buildings(search: &BuildingSearch) -> Resource<Vec<Building>> {
    Resource::new(
        CacheKey::new(ResourceKind::BuildingSearch),
        endpoints::BUILDING_SEARCH,
        list,
    )
    .with_query(search.to_query())
}

pub fn building_housings(id: &BuildingId) -> Resource<Vec<Housing>> {
    Resource::new(
        CacheKey::with_id(ResourceKind::BuildingHousings, id.as_str()),
        endpoints::building_housings(id),
        list,
    )
}

pub fn housing(id: &HousingId) -> Resource<Housing> {
    Resource::new(
        CacheKey::with_id(ResourceKind::Housing, id.as_str()),
        endpoints::housing(id),
        one,
    )
}

/// Devices of one building and category; each category is cached apart.
pub fn building_devices(id: &BuildingId, category: DeviceCategory) -> Resource<Vec<Device>> {
    Resource::new(
        CacheKey::with_id(ResourceKind::BuildingDevices, id.as_str()),
        endpoints::building_devices(id),
        list,
    )
    .with_query(QueryParams::new().text("type", category.code()))
}

pub fn leaks(building: Option<&BuildingId>) -> Resource<Vec<IssueRecord>> {
    Resource::new(CacheKey::new(ResourceKind::Leaks), endpoints::LEAKS, leak_list)
        .with_query(scoped(building))
}

pub fn dysfunctions(building: Option<&BuildingId>) -> Resource<Vec<IssueRecord>> {
    Resource::new(
        CacheKey::new(ResourceKind::Dysfunctions),
        endpoints::DYSFUNCTIONS,
        dysfunction_list,
    )
    .with_query(scoped(building))
}

pub fn interventions(building: Option<&BuildingId>) -> Resource<Vec<IssueRecord>> {
    Resource::new(
        CacheKey::new(ResourceKind::Interventions),
        endpoints::INTERVENTIONS,
        intervention_list,
    )
    .with_query(scoped(building))
}

pub fn invoices(filter: &InvoiceFilter) -> Resource<Vec<Invoice>> {
    Resource::new(
        CacheKey::new(ResourceKind::Invoices),
        endpoints::INVOICES,
        list,
    )
    .with_query(filter.to_query())
}

pub fn consumption(id: &BuildingId) -> Resource<ConsumptionSummary> {
    Resource::new(
        CacheKey::with_id(ResourceKind::Consumption, id.as_str()),
        endpoints::building_consumption(id),
        one,
    )
}

pub fn tickets() -> Resource<Vec<Ticket>> {
    Resource::new(
        CacheKey::new(ResourceKind::Tickets),
        endpoints::TICKETS,
        list,
    )
}

pub fn ticket(id: &TicketId) -> Resource<Ticket> {
    Resource::new(
        CacheKey::with_id(ResourceKind::Ticket, id.as_str()),
        endpoints::ticket(id),
        one,
    )
}

pub fn operators() -> Resource<Vec<Operator>> {
    Resource::new(
        CacheKey::new(ResourceKind::Operators),
        endpoints::OPERATORS,
        list,
    )
}

pub fn operator_details(id: &OperatorId) -> Resource<OperatorDetails> {
    Resource::new(
        CacheKey::with_id(ResourceKind::OperatorDetails, id.as_str()),
        endpoints::operator(id),
        one,
    )
}

pub fn export_eligibility(id: &BuildingId) -> Resource<ExportEligibility> {
    Resource::new(
        CacheKey::with_id(ResourceKind::ExportEligibility, id.as_str()),
        endpoints::building_exports(id),
        one,
    )
}
