use std::borrow::Cow;

use meterdesk_core::Operator;

use crate::Listable;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperatorColumn {
    Name,
    FirstName,
    LastName,
    Email,
    Phone,
    Buildings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperatorPredicate {
    HasBuildings,
    Unassigned,
}

impl Listable for Operator {
    type Column = OperatorColumn;
    type Predicate = OperatorPredicate;

    const SEARCHABLE: &'static [OperatorColumn] = &[
        OperatorColumn::FirstName,
        OperatorColumn::LastName,
        OperatorColumn::Email,
        OperatorColumn::Phone,
    ];

    fn project(&self, column: OperatorColumn) -> Cow<'_, str> {
        match column {
            OperatorColumn::Name => Cow::Owned(self.display_name()),
            OperatorColumn::FirstName => Cow::Borrowed(&self.first_name),
            OperatorColumn::LastName => Cow::Borrowed(&self.last_name),
            OperatorColumn::Email => Cow::Borrowed(&self.email),
            OperatorColumn::Phone => Cow::Borrowed(&self.phone),
            OperatorColumn::Buildings => Cow::Owned(self.buildings.len().to_string()),
        }
    }

    fn test(&self, predicate: OperatorPredicate) -> bool {
        match predicate {
            OperatorPredicate::HasBuildings => !self.buildings.is_empty(),
            OperatorPredicate::Unassigned => self.buildings.is_empty(),
        }
    }
}
