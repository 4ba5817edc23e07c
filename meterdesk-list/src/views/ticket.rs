use std::borrow::Cow;

use meterdesk_core::{Ticket, TicketStatus};

use super::optional;
use crate::Listable;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TicketColumn {
    CaseNumber,
    Requester,
    RequesterEmail,
    Building,
    Housing,
    Status,
    CreatedAt,
    UpdatedAt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TicketPredicate {
    Status(TicketStatus),
    /// Anything not closed yet.
    Pending,
}

impl Listable for Ticket {
    type Column = TicketColumn;
    type Predicate = TicketPredicate;

    const SEARCHABLE: &'static [TicketColumn] = &[
        TicketColumn::CaseNumber,
        TicketColumn::Requester,
        TicketColumn::RequesterEmail,
        TicketColumn::Status,
    ];

    fn project(&self, column: TicketColumn) -> Cow<'_, str> {
        match column {
            TicketColumn::CaseNumber => Cow::Borrowed(&self.case_number),
            TicketColumn::Requester => Cow::Borrowed(&self.requester_name),
            TicketColumn::RequesterEmail => Cow::Borrowed(&self.requester_email),
            TicketColumn::Building => optional(self.building_id.as_ref()),
            TicketColumn::Housing => optional(self.housing_id.as_ref()),
            TicketColumn::Status => Cow::Borrowed(&self.status_label),
            TicketColumn::CreatedAt => optional(self.created_at.as_ref()),
            TicketColumn::UpdatedAt => optional(self.updated_at.as_ref()),
        }
    }

    fn test(&self, predicate: TicketPredicate) -> bool {
        match predicate {
            TicketPredicate::Status(status) => self.status == status,
            TicketPredicate::Pending => self.status != TicketStatus::Closed,
        }
    }
}
