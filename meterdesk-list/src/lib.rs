//! Client-side search, filtering, sorting and pagination of entity lists.
//!
//! Every list in the portal runs through [`view`]: free text over the
//! entity's searchable columns, then the AND of the selected predicates,
//! then a stable natural sort, then one page.

mod natural;
mod sort;
mod state;
pub mod views;

use std::borrow::Cow;
use std::cmp::Ordering;
use std::fmt::Debug;

pub use natural::{fold, natural_cmp};
pub use sort::{SortOrder, SortState};
pub use state::ListState;

pub const DEFAULT_PAGE_SIZE: usize = 20;

/// An entity that can be shown in a list.
pub trait Listable {
    type Column: Copy + Eq + Debug + 'static;
    type Predicate: Copy + Eq + Debug + 'static;

    /// Columns the free-text query is matched against.
    const SEARCHABLE: &'static [Self::Column];

    /// Text of one column, used both for search and for sorting.
    fn project(&self, column: Self::Column) -> Cow<'_, str>;

    fn test(&self, predicate: Self::Predicate) -> bool;

    /// Ascending order of two entities on `column`. Natural order of the
    /// projections unless the column has a better key.
    fn compare(&self, other: &Self, column: Self::Column) -> Ordering {
        natural_cmp(&self.project(column), &other.project(column))
    }
}

/// One page of a filtered, sorted list.
#[derive(Debug)]
pub struct ListView<'a, T> {
    pub items: Vec<&'a T>,
    /// Matches before pagination.
    pub total_count: usize,
    pub page_count: usize,
    /// The page actually shown, after clamping.
    pub page: usize,
}

pub fn view<'a, T: Listable>(
    entities: &'a [T],
    query: &str,
    predicates: &[T::Predicate],
    sort: SortState<T::Column>,
    page: i64,
    page_size: usize,
) -> ListView<'a, T> {
    let filtered = filter_entities(entities, query, predicates);
    let sorted = sort_entities(filtered, sort);
    paginate_entities(sorted, page, page_size)
}

fn filter_entities<'a, T: Listable>(
    entities: &'a [T],
    query: &str,
    predicates: &[T::Predicate],
) -> Vec<&'a T> {
    let needle = fold(query.trim());
    entities
        .iter()
        .filter(|entity| {
            if !needle.is_empty()
                && !T::SEARCHABLE
                    .iter()
                    .any(|column| fold(&entity.project(*column)).contains(&needle))
            {
                return false;
            }
            predicates.iter().all(|predicate| entity.test(*predicate))
        })
        .collect()
}

fn sort_entities<T: Listable>(mut entities: Vec<&T>, sort: SortState<T::Column>) -> Vec<&T> {
    let SortState::Sorted { column, order } = sort else {
        return entities;
    };

    // sort_by is stable; reversing the comparison keeps ties in input order
    entities.sort_by(|a, b| {
        let ord = a.compare(b, column);
        match order {
            SortOrder::Asc => ord,
            SortOrder::Desc => ord.reverse(),
        }
    });
    entities
}

fn paginate_entities<T>(entities: Vec<&T>, page: i64, page_size: usize) -> ListView<'_, T> {
    let page_size = page_size.max(1);
    let total_count = entities.len();
    let page_count = total_count.div_ceil(page_size).max(1);
    let page = usize::try_from(page).unwrap_or(0).clamp(1, page_count);

    let items = entities
        .into_iter()
        .skip((page - 1) * page_size)
        .take(page_size)
        .collect();

    ListView {
        items,
        total_count,
        page_count,
        page,
    }
}
