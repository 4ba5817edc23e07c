//! Columns and predicates of every list the portal shows.

mod building;
mod housing;
mod invoice;
mod issue;
mod operator;
mod ticket;

pub use building::{BuildingColumn, BuildingPredicate};
pub use housing::{HousingColumn, HousingPredicate};
pub use invoice::{InvoiceColumn, InvoicePredicate};
pub use issue::{IssueColumn, IssuePredicate};
pub use operator::{OperatorColumn, OperatorPredicate};
pub use ticket::{TicketColumn, TicketPredicate};

use std::borrow::Cow;

fn count(value: u32) -> Cow<'static, str> {
    Cow::Owned(value.to_string())
}

fn optional<T: ToString>(value: Option<&T>) -> Cow<'static, str> {
    match value {
        Some(value) => Cow::Owned(value.to_string()),
        None => Cow::Borrowed(""),
    }
}
