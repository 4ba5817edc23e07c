use std::borrow::Cow;
use std::cmp::Ordering;

use meterdesk_core::Invoice;
use ordered_float::OrderedFloat;

use super::optional;
use crate::{Listable, natural_cmp};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InvoiceColumn {
    Number,
    Building,
    CustomerCode,
    ManagerCode,
    Address,
    PostalCode,
    City,
    AmountExclTax,
    AmountInclTax,
    EditedOn,
    DueOn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InvoicePredicate {
    HasAmount,
    HasBuilding,
}

/// The backend's formatted amount, or a plain rendering when it sent none.
fn amount<'a>(display: &'a str, value: OrderedFloat<f64>) -> Cow<'a, str> {
    if display.is_empty() {
        Cow::Owned(format!("{:.2}", value.0))
    } else {
        Cow::Borrowed(display)
    }
}

impl Listable for Invoice {
    type Column = InvoiceColumn;
    type Predicate = InvoicePredicate;

    const SEARCHABLE: &'static [InvoiceColumn] = &[
        InvoiceColumn::Number,
        InvoiceColumn::Building,
        InvoiceColumn::CustomerCode,
        InvoiceColumn::ManagerCode,
        InvoiceColumn::Address,
        InvoiceColumn::PostalCode,
        InvoiceColumn::City,
        InvoiceColumn::AmountExclTax,
        InvoiceColumn::AmountInclTax,
        InvoiceColumn::EditedOn,
        InvoiceColumn::DueOn,
    ];

    fn project(&self, column: InvoiceColumn) -> Cow<'_, str> {
        match column {
            InvoiceColumn::Number => Cow::Borrowed(&self.number),
            InvoiceColumn::Building => optional(self.building_id.as_ref()),
            InvoiceColumn::CustomerCode => Cow::Borrowed(&self.customer_code),
            InvoiceColumn::ManagerCode => Cow::Borrowed(&self.manager_code),
            InvoiceColumn::Address if self.address.line2.is_empty() => {
                Cow::Borrowed(&self.address.line1)
            }
            InvoiceColumn::Address => {
                Cow::Owned(format!("{} {}", self.address.line1, self.address.line2))
            }
            InvoiceColumn::PostalCode => Cow::Borrowed(&self.address.postal_code),
            InvoiceColumn::City => Cow::Borrowed(&self.address.city),
            InvoiceColumn::AmountExclTax => {
                amount(&self.amount_excl_tax_display, self.amount_excl_tax)
            }
            InvoiceColumn::AmountInclTax => {
                amount(&self.amount_incl_tax_display, self.amount_incl_tax)
            }
            InvoiceColumn::EditedOn => optional(self.edited_on.as_ref()),
            InvoiceColumn::DueOn => optional(self.due_on.as_ref()),
        }
    }

    fn test(&self, predicate: InvoicePredicate) -> bool {
        match predicate {
            InvoicePredicate::HasAmount => self.amount_incl_tax.0 != 0.0,
            InvoicePredicate::HasBuilding => self.building_id.is_some(),
        }
    }

    // amounts and dates order by value; credit notes are negative
    fn compare(&self, other: &Self, column: InvoiceColumn) -> Ordering {
        match column {
            InvoiceColumn::AmountExclTax => self.amount_excl_tax.cmp(&other.amount_excl_tax),
            InvoiceColumn::AmountInclTax => self.amount_incl_tax.cmp(&other.amount_incl_tax),
            InvoiceColumn::EditedOn => self.edited_on.cmp(&other.edited_on),
            InvoiceColumn::DueOn => self.due_on.cmp(&other.due_on),
            _ => natural_cmp(&self.project(column), &other.project(column)),
        }
    }
}
