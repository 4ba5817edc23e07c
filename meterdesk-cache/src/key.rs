use std::collections::BTreeMap;
use std::fmt;

use crate::ResourceKind;

/// One cached response: resource kind, optional identifier and any
/// discriminators that change the backend answer.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CacheKey {
    pub kind: ResourceKind,
    pub id: Option<String>,
    pub params: BTreeMap<String, String>,
}

impl CacheKey {
    pub fn new(kind: ResourceKind) -> Self {
        Self {
            kind,
            id: None,
            params: BTreeMap::new(),
        }
    }

    pub fn with_id(kind: ResourceKind, id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::new(kind)
        }
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    pub fn params(mut self, params: BTreeMap<String, String>) -> Self {
        self.params.extend(params);
        self
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind.as_str())?;
        if let Some(id) = &self.id {
            write!(f, "/{id}")?;
        }
        for (i, (name, value)) in self.params.iter().enumerate() {
            let sep = if i == 0 { '?' } else { '&' };
            write!(f, "{sep}{name}={value}")?;
        }
        Ok(())
    }
}

/// Selects keys to invalidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyPattern {
    Exact(CacheKey),
    /// Every key of the kind, whatever its id and discriminators.
    Kind(ResourceKind),
    /// Every key of the kind with this id, whatever its discriminators.
    Id(ResourceKind, String),
}

impl KeyPattern {
    pub fn matches(&self, key: &CacheKey) -> bool {
        match self {
            KeyPattern::Exact(exact) => exact == key,
            KeyPattern::Kind(kind) => *kind == key.kind,
            KeyPattern::Id(kind, id) => *kind == key.kind && key.id.as_deref() == Some(id),
        }
    }
}

impl From<CacheKey> for KeyPattern {
    fn from(key: CacheKey) -> Self {
        KeyPattern::Exact(key)
    }
}
