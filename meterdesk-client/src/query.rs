use std::collections::BTreeMap;

/// Flat query string for listing and filter endpoints.
///
/// Flags are sent as `0`/`1`; empty values are omitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: &str, value: impl AsRef<str>) -> Self {
        let value = value.as_ref().trim();
        if !value.is_empty() {
            self.set(name, value.to_string());
        }
        self
    }

    pub fn flag(mut self, name: &str, value: bool) -> Self {
        self.set(name, if value { "1" } else { "0" }.to_string());
        self
    }

    pub fn id(mut self, name: &str, value: impl std::fmt::Display) -> Self {
        self.set(name, value.to_string());
        self
    }

    /// Sets the flag only when it is known.
    pub fn optional_flag(self, name: &str, value: Option<bool>) -> Self {
        match value {
            Some(value) => self.flag(name, value),
            None => self,
        }
    }

    pub fn optional_text(self, name: &str, value: Option<impl AsRef<str>>) -> Self {
        match value {
            Some(value) => self.text(name, value),
            None => self,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    /// Sorted view, used as cache key discriminators.
    pub fn to_map(&self) -> BTreeMap<String, String> {
        self.pairs.iter().cloned().collect()
    }

    fn set(&mut self, name: &str, value: String) {
        match self.pairs.iter_mut().find(|(key, _)| key == name) {
            Some(pair) => pair.1 = value,
            None => self.pairs.push((name.to_string(), value)),
        }
    }
}
