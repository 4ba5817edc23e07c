use std::borrow::Cow;

use meterdesk_core::Building;

use super::{count, optional};
use crate::Listable;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuildingColumn {
    Reference,
    Address,
    PostalCode,
    City,
    ManagerCode,
    Leaks,
    Malfunctions,
    RepairsInProgress,
    Anomalies,
    LastReading,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuildingPredicate {
    HasLeaks,
    HasMalfunctions,
    HasRepairsInProgress,
    HasAnomalies,
    HasColdWater,
    HasHotWater,
    HasHeatCostAllocators,
    HasEnergyMeters,
    /// Only buildings the backend reports as remotely read.
    HasRemoteReading,
}

impl Listable for Building {
    type Column = BuildingColumn;
    type Predicate = BuildingPredicate;

    const SEARCHABLE: &'static [BuildingColumn] = &[
        BuildingColumn::Reference,
        BuildingColumn::Address,
        BuildingColumn::PostalCode,
        BuildingColumn::City,
        BuildingColumn::ManagerCode,
    ];

    fn project(&self, column: BuildingColumn) -> Cow<'_, str> {
        match column {
            BuildingColumn::Reference => Cow::Borrowed(&self.reference),
            BuildingColumn::Address => {
                let address = &self.address;
                if address.line2.is_empty() {
                    Cow::Borrowed(&address.line1)
                } else {
                    Cow::Owned(format!("{} {}", address.line1, address.line2))
                }
            }
            BuildingColumn::PostalCode => Cow::Borrowed(&self.address.postal_code),
            BuildingColumn::City => Cow::Borrowed(&self.address.city),
            BuildingColumn::ManagerCode => Cow::Borrowed(&self.manager_code),
            BuildingColumn::Leaks => count(self.issues.leaks),
            BuildingColumn::Malfunctions => count(self.issues.malfunctions),
            BuildingColumn::RepairsInProgress => count(self.issues.repairs_in_progress),
            BuildingColumn::Anomalies => count(self.issues.anomalies),
            BuildingColumn::LastReading => optional(self.last_reading.as_ref()),
        }
    }

    fn test(&self, predicate: BuildingPredicate) -> bool {
        match predicate {
            BuildingPredicate::HasLeaks => self.issues.leaks > 0,
            BuildingPredicate::HasMalfunctions => self.issues.malfunctions > 0,
            BuildingPredicate::HasRepairsInProgress => self.issues.repairs_in_progress > 0,
            BuildingPredicate::HasAnomalies => self.issues.anomalies > 0,
            BuildingPredicate::HasColdWater => self.devices.cold_water > 0,
            BuildingPredicate::HasHotWater => self.devices.hot_water > 0,
            BuildingPredicate::HasHeatCostAllocators => self.devices.heat_cost_allocators > 0,
            BuildingPredicate::HasEnergyMeters => self.devices.energy_meters > 0,
            BuildingPredicate::HasRemoteReading => self.capabilities.remote_reading == Some(true),
        }
    }
}
