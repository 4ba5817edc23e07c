use crate::{DEFAULT_PAGE_SIZE, ListView, Listable, SortState, view};

/// Query, predicates, sort and page of one list on screen.
///
/// Changing what is shown sends the user back to the first page.
#[derive(Debug, Clone)]
pub struct ListState<T: Listable> {
    query: String,
    predicates: Vec<T::Predicate>,
    sort: SortState<T::Column>,
    page: usize,
    page_size: usize,
}

impl<T: Listable> Default for ListState<T> {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl<T: Listable> ListState<T> {
    pub fn new(page_size: usize) -> Self {
        Self {
            query: String::new(),
            predicates: Vec::new(),
            sort: SortState::Unsorted,
            page: 1,
            page_size: page_size.max(1),
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn predicates(&self) -> &[T::Predicate] {
        &self.predicates
    }

    pub fn sort(&self) -> SortState<T::Column> {
        self.sort
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn set_query(&mut self, query: impl Into<String>) {
        self.query = query.into();
        self.page = 1;
    }

    /// Adds the predicate if absent, removes it otherwise.
    pub fn toggle_predicate(&mut self, predicate: T::Predicate) {
        if let Some(pos) = self.predicates.iter().position(|p| *p == predicate) {
            self.predicates.remove(pos);
        } else {
            self.predicates.push(predicate);
        }
        self.page = 1;
    }

    pub fn set_predicates(&mut self, predicates: impl IntoIterator<Item = T::Predicate>) {
        self.predicates.clear();
        for predicate in predicates {
            if !self.predicates.contains(&predicate) {
                self.predicates.push(predicate);
            }
        }
        self.page = 1;
    }

    pub fn toggle_sort(&mut self, column: T::Column) {
        self.sort = self.sort.toggle(column);
        self.page = 1;
    }

    pub fn set_sort(&mut self, sort: SortState<T::Column>) {
        self.sort = sort;
        self.page = 1;
    }

    pub fn set_page(&mut self, page: i64) {
        self.page = usize::try_from(page).unwrap_or(0).max(1);
    }

    /// Moves forward, staying on the last of `page_count` pages.
    pub fn next_page(&mut self, page_count: usize) {
        self.page = self.page.saturating_add(1).min(page_count.max(1));
    }

    /// Moves back from the page actually shown for `page_count` pages.
    pub fn previous_page(&mut self, page_count: usize) {
        self.page = self.page.min(page_count.max(1)).saturating_sub(1).max(1);
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.page_size);
    }

    pub fn view<'a>(&self, entities: &'a [T]) -> ListView<'a, T> {
        let page = i64::try_from(self.page).unwrap_or(i64::MAX);
        view(
            entities,
            &self.query,
            &self.predicates,
            self.sort,
            page,
            self.page_size,
        )
    }
}
