use std::borrow::Cow;

use meterdesk_core::{IssueKind, IssueRecord};

use super::{count, optional};
use crate::Listable;

/// Columns shared by the leak, malfunction and intervention lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IssueColumn {
    DeviceSerial,
    Occupant,
    Building,
    Housing,
    DayCount,
    Status,
    Report,
    DetectedOn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IssuePredicate {
    Kind(IssueKind),
    /// Ongoing for at least this many days.
    MinDays(u32),
    HasReport,
    HasHousing,
}

impl Listable for IssueRecord {
    type Column = IssueColumn;
    type Predicate = IssuePredicate;

    const SEARCHABLE: &'static [IssueColumn] = &[
        IssueColumn::DeviceSerial,
        IssueColumn::Occupant,
        IssueColumn::Building,
        IssueColumn::Housing,
        IssueColumn::Status,
        IssueColumn::Report,
    ];

    fn project(&self, column: IssueColumn) -> Cow<'_, str> {
        match column {
            IssueColumn::DeviceSerial => Cow::Borrowed(&self.device_serial),
            IssueColumn::Occupant => Cow::Borrowed(&self.occupant_name),
            IssueColumn::Building => optional(self.building_id.as_ref()),
            IssueColumn::Housing => optional(self.housing_id.as_ref()),
            IssueColumn::DayCount => count(self.day_count),
            IssueColumn::Status => Cow::Borrowed(&self.status),
            IssueColumn::Report => Cow::Borrowed(&self.report),
            IssueColumn::DetectedOn => optional(self.detected_on.as_ref()),
        }
    }

    fn test(&self, predicate: IssuePredicate) -> bool {
        match predicate {
            IssuePredicate::Kind(kind) => self.kind == kind,
            IssuePredicate::MinDays(days) => self.day_count >= days,
            IssuePredicate::HasReport => !self.report.trim().is_empty(),
            IssuePredicate::HasHousing => self.housing_id.is_some(),
        }
    }
}
