pub mod error;
pub mod normalize;

use std::collections::BTreeSet;
use std::fmt;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

pub use error::{ErrorCategory, PortalError};
pub use normalize::{Normalize, RawRecord};

macro_rules! string_id {
    ($($name:ident),* $(,)?) => {
        $(
            #[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
            pub struct $name(pub String);

            impl $name {
                pub fn new(id: impl Into<String>) -> Self {
                    Self(id.into())
                }

                pub fn as_str(&self) -> &str {
                    &self.0
                }
            }

            impl fmt::Display for $name {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(&self.0)
                }
            }
        )*
    };
}

string_id!(
    BuildingId,
    HousingId,
    DeviceId,
    IssueId,
    OperatorId,
    TicketId,
    InvoiceId,
);

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub line1: String,
    pub line2: String,
    pub postal_code: String,
    pub city: String,
}

/// Number of installed devices per metering category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceCounts {
    pub cold_water: u32,
    pub hot_water: u32,
    pub heat_cost_allocators: u32,
    pub energy_meters: u32,
}

/// Open issues per category. Always non-negative.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueCounts {
    pub leaks: u32,
    pub malfunctions: u32,
    pub repairs_in_progress: u32,
    pub anomalies: u32,
}

impl IssueCounts {
    pub fn total(&self) -> u32 {
        self.leaks
            .saturating_add(self.malfunctions)
            .saturating_add(self.repairs_in_progress)
            .saturating_add(self.anomalies)
    }
}

/// Tri-state capability flags. `None` means the backend did not say.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildingCapabilities {
    pub remote_reading: Option<bool>,
    pub invoices: Option<bool>,
    pub heat_cost_allocation: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Building {
    pub id: BuildingId,
    pub reference: String,
    pub address: Address,
    pub manager_code: String,
    pub devices: DeviceCounts,
    pub issues: IssueCounts,
    pub first_activation: Option<jiff::civil::Date>,
    pub last_reading: Option<jiff::civil::Date>,
    pub capabilities: BuildingCapabilities,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Fluid {
    ColdWater,
    HotWater,
    Heat,
    Electricity,
    Gas,
    #[default]
    Unknown,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceCategory {
    WaterMeter,
    HeatCostAllocator,
    EnergyMeter,
    #[default]
    Unknown,
}

impl DeviceCategory {
    /// Discriminator sent to the backend when listing devices of one category.
    pub fn code(&self) -> &'static str {
        match self {
            DeviceCategory::WaterMeter => "EAU",
            DeviceCategory::HeatCostAllocator => "REPART",
            DeviceCategory::EnergyMeter => "ENERGIE",
            DeviceCategory::Unknown => "",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub id: DeviceId,
    pub serial_number: String,
    pub location: String,
    pub fluid: Fluid,
    pub category: DeviceCategory,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Housing {
    pub id: HousingId,
    pub building_id: BuildingId,
    pub occupant_reference: String,
    pub occupant_name: String,
    pub floor: String,
    pub unit_order: u32,
    pub issues: IssueCounts,
    pub devices: Vec<Device>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IssueKind {
    #[default]
    Leak,
    Dysfunction,
    Intervention,
}

/// A leak, malfunction or repair record. References are weak lookups.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueRecord {
    pub id: IssueId,
    pub kind: IssueKind,
    pub device_id: Option<DeviceId>,
    pub device_serial: String,
    pub housing_id: Option<HousingId>,
    pub building_id: Option<BuildingId>,
    pub occupant_name: String,
    pub day_count: u32,
    pub status: String,
    pub report: String,
    pub detected_on: Option<jiff::civil::Date>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operator {
    pub id: OperatorId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub buildings: BTreeSet<BuildingId>,
}

impl Operator {
    pub fn display_name(&self) -> String {
        match (self.first_name.is_empty(), self.last_name.is_empty()) {
            (true, true) => String::new(),
            (true, false) => self.last_name.clone(),
            (false, true) => self.first_name.clone(),
            (false, false) => format!("{} {}", self.first_name, self.last_name),
        }
    }
}

/// An operator with the buildings that could still be assigned to them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorDetails {
    pub operator: Operator,
    pub available: Vec<Building>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TicketStatus {
    New,
    #[default]
    Open,
    ScheduledIntervention,
    Closed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: TicketId,
    pub case_number: String,
    pub requester_name: String,
    pub requester_email: String,
    pub housing_id: Option<HousingId>,
    pub building_id: Option<BuildingId>,
    pub status: TicketStatus,
    pub status_label: String,
    pub created_at: Option<jiff::civil::DateTime>,
    pub updated_at: Option<jiff::civil::DateTime>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: InvoiceId,
    pub number: String,
    pub building_id: Option<BuildingId>,
    pub customer_code: String,
    pub manager_code: String,
    pub address: Address,
    pub amount_excl_tax: OrderedFloat<f64>,
    pub amount_incl_tax: OrderedFloat<f64>,
    pub amount_excl_tax_display: String,
    pub amount_incl_tax_display: String,
    pub edited_on: Option<jiff::civil::Date>,
    pub due_on: Option<jiff::civil::Date>,
}

/// Which exports the backend offers for one building.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportEligibility {
    pub building_id: BuildingId,
    pub leaks: Option<bool>,
    pub invoices: Option<bool>,
    pub consumption: Option<bool>,
    pub housings: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopConsumer {
    pub housing_id: Option<HousingId>,
    pub occupant_name: String,
    pub volume: OrderedFloat<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumptionSummary {
    pub building_id: BuildingId,
    pub cold_water: Vec<TopConsumer>,
    pub hot_water: Vec<TopConsumer>,
    pub heat: Vec<TopConsumer>,
}
