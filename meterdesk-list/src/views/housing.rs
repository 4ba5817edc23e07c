use std::borrow::Cow;

use meterdesk_core::{DeviceCategory, Housing};

use super::count;
use crate::Listable;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HousingColumn {
    OccupantReference,
    OccupantName,
    Floor,
    UnitOrder,
    Leaks,
    Malfunctions,
    Devices,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HousingPredicate {
    HasLeaks,
    HasMalfunctions,
    HasIssues,
    HasDevices,
    HasDeviceOf(DeviceCategory),
}

impl Listable for Housing {
    type Column = HousingColumn;
    type Predicate = HousingPredicate;

    const SEARCHABLE: &'static [HousingColumn] = &[
        HousingColumn::OccupantReference,
        HousingColumn::OccupantName,
        HousingColumn::Floor,
    ];

    fn project(&self, column: HousingColumn) -> Cow<'_, str> {
        match column {
            HousingColumn::OccupantReference => Cow::Borrowed(&self.occupant_reference),
            HousingColumn::OccupantName => Cow::Borrowed(&self.occupant_name),
            HousingColumn::Floor => Cow::Borrowed(&self.floor),
            HousingColumn::UnitOrder => count(self.unit_order),
            HousingColumn::Leaks => count(self.issues.leaks),
            HousingColumn::Malfunctions => count(self.issues.malfunctions),
            HousingColumn::Devices => Cow::Owned(self.devices.len().to_string()),
        }
    }

    fn test(&self, predicate: HousingPredicate) -> bool {
        match predicate {
            HousingPredicate::HasLeaks => self.issues.leaks > 0,
            HousingPredicate::HasMalfunctions => self.issues.malfunctions > 0,
            HousingPredicate::HasIssues => self.issues.total() > 0,
            HousingPredicate::HasDevices => !self.devices.is_empty(),
            HousingPredicate::HasDeviceOf(category) => {
                self.devices.iter().any(|device| device.category == category)
            }
        }
    }
}
