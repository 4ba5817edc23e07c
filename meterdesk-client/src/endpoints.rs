//! Paths of the legacy backend, relative to the base URL.

use meterdesk_core::{BuildingId, HousingId, OperatorId, TicketId};

pub const BUILDINGS: &str = "/api/immeubles";
pub const BUILDING_SEARCH: &str = "/api/immeubles/recherche";
pub const LEAKS: &str = "/api/fuites";
pub const DYSFUNCTIONS: &str = "/api/dysfonctionnements";
pub const INTERVENTIONS: &str = "/api/interventions";
pub const TICKETS: &str = "/api/tickets";
pub const INVOICES: &str = "/api/factures";
pub const OPERATORS: &str = "/api/gestionnaires";

pub fn building(id: &BuildingId) -> String {
    format!("{BUILDINGS}/{id}")
}

pub fn building_housings(id: &BuildingId) -> String {
    format!("{BUILDINGS}/{id}/logements")
}

/// Devices of one building, filtered by the `type` query parameter.
pub fn building_devices(id: &BuildingId) -> String {
    format!("{BUILDINGS}/{id}/appareils")
}

pub fn building_consumption(id: &BuildingId) -> String {
    format!("{BUILDINGS}/{id}/consommation")
}

pub fn building_exports(id: &BuildingId) -> String {
    format!("{BUILDINGS}/{id}/exports")
}

pub fn housing(id: &HousingId) -> String {
    format!("/api/logements/{id}")
}

pub fn housing_occupant(id: &HousingId) -> String {
    format!("/api/logements/{id}/occupant")
}

pub fn ticket(id: &TicketId) -> String {
    format!("{TICKETS}/{id}")
}

pub fn ticket_close(id: &TicketId) -> String {
    format!("{TICKETS}/{id}/cloture")
}

pub fn operator(id: &OperatorId) -> String {
    format!("{OPERATORS}/{id}")
}

pub fn operator_building(operator: &OperatorId, building: &BuildingId) -> String {
    format!("{OPERATORS}/{operator}/immeubles/{building}")
}

/// Export endpoints answer with the document bytes.
pub fn export(slug: &str) -> String {
    format!("/api/exports/{slug}")
}
