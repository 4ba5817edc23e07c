use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortOrder {
    Asc,
    Desc,
}

/// Column sort of a list. Clicking a column header cycles it through
/// ascending, descending and back to unsorted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortState<C> {
    Unsorted,
    Sorted { column: C, order: SortOrder },
}

impl<C> Default for SortState<C> {
    fn default() -> Self {
        SortState::Unsorted
    }
}

impl<C: Copy + Eq> SortState<C> {
    pub fn ascending(column: C) -> Self {
        SortState::Sorted {
            column,
            order: SortOrder::Asc,
        }
    }

    pub fn descending(column: C) -> Self {
        SortState::Sorted {
            column,
            order: SortOrder::Desc,
        }
    }

    pub fn toggle(self, clicked: C) -> Self {
        match self {
            SortState::Sorted {
                column,
                order: SortOrder::Asc,
            } if column == clicked => Self::descending(clicked),
            SortState::Sorted {
                column,
                order: SortOrder::Desc,
            } if column == clicked => SortState::Unsorted,
            _ => Self::ascending(clicked),
        }
    }

    pub fn column(&self) -> Option<C> {
        match self {
            SortState::Unsorted => None,
            SortState::Sorted { column, .. } => Some(*column),
        }
    }

    /// Order applied to `column`, if it is the sorted one.
    pub fn order_of(&self, column: C) -> Option<SortOrder> {
        match self {
            SortState::Sorted { column: c, order } if *c == column => Some(*order),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Col {
        Name,
        City,
    }

    #[test]
    fn toggle_cycles_three_states() {
        let sort = SortState::Unsorted.toggle(Col::Name);
        assert_eq!(sort, SortState::ascending(Col::Name));
        let sort = sort.toggle(Col::Name);
        assert_eq!(sort, SortState::descending(Col::Name));
        let sort = sort.toggle(Col::Name);
        assert_eq!(sort, SortState::Unsorted);
    }

    #[test]
    fn other_column_restarts_ascending() {
        let sort = SortState::descending(Col::Name).toggle(Col::City);
        assert_eq!(sort, SortState::ascending(Col::City));
        assert_eq!(sort.order_of(Col::Name), None);
        assert_eq!(sort.order_of(Col::City), Some(SortOrder::Asc));
        assert_eq!(sort.column(), Some(Col::City));
    }
}
