//! Raw backend records to canonical entities.
//!
//! The backend answers with PascalCase or camelCase keys, sometimes nests
//! category sub-records (`EF`, `EC`, `Repart`, ...) and sometimes flattens
//! them, and encodes numbers and booleans as strings. Every field of every
//! entity is resolved through [`pick`] with an ordered list of
//! [`FieldSource`]s, then coerced. Nothing here fails: missing or malformed
//! data resolves to the field default.

mod entities;

use jiff::civil::{Date, DateTime};
use serde_json::{Map, Value};

pub use entities::normalize_issue;

pub type RawRecord = Map<String, Value>;

/// Builds a canonical entity from one raw record. Pure and total.
pub trait Normalize: Sized {
    fn normalize(raw: &RawRecord) -> Self;
}

/// Normalizes a JSON payload expected to be an array of records.
///
/// Also accepts an envelope object carrying the array under one of `keys`
/// (`{"Data": [...]}`). Anything else resolves to an empty list.
pub fn normalize_list<T: Normalize>(payload: &Value, keys: &[&str]) -> Vec<T> {
    normalize_list_with(payload, keys, T::normalize)
}

/// [`normalize_list`] with an explicit per-record normalizer, for records
/// whose shape depends on the endpoint (issue lists).
pub fn normalize_list_with<T>(
    payload: &Value,
    keys: &[&str],
    normalize: impl Fn(&RawRecord) -> T,
) -> Vec<T> {
    let items = match payload {
        Value::Array(items) => Some(items),
        Value::Object(object) => keys
            .iter()
            .find_map(|key| lookup(object, key))
            .and_then(Value::as_array),
        _ => None,
    };

    items
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_object)
                .map(normalize)
                .collect()
        })
        .unwrap_or_default()
}

/// Normalizes a JSON payload expected to be a single record.
pub fn normalize_one<T: Normalize>(payload: &Value) -> T {
    match payload {
        Value::Object(object) => T::normalize(object),
        _ => T::normalize(&RawRecord::new()),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    Top,
    Nested(&'static str),
}

/// One place a canonical field may live, with its PascalCase key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSource {
    pub location: Location,
    pub key: &'static str,
}

pub const fn top(key: &'static str) -> FieldSource {
    FieldSource {
        location: Location::Top,
        key,
    }
}

pub const fn nested(object: &'static str, key: &'static str) -> FieldSource {
    FieldSource {
        location: Location::Nested(object),
        key,
    }
}

/// First present, non-null value along `sources`.
///
/// Within each location the PascalCase key is tried before its camelCase
/// variant.
pub fn pick<'a>(raw: &'a RawRecord, sources: &[FieldSource]) -> Option<&'a Value> {
    sources.iter().find_map(|source| {
        let object = match source.location {
            Location::Top => raw,
            Location::Nested(name) => lookup(raw, name)?.as_object()?,
        };
        lookup(object, source.key)
    })
}

fn lookup<'a>(object: &'a RawRecord, pascal: &str) -> Option<&'a Value> {
    let found = object.get(pascal).filter(|value| !value.is_null());
    if found.is_some() {
        return found;
    }
    let camel = camel_case(pascal);
    if camel == pascal {
        return None;
    }
    object.get(&camel).filter(|value| !value.is_null())
}

/// `NbFuites` -> `nbFuites`, `IDImmeuble` -> `idImmeuble`, `EC` -> `ec`.
pub fn camel_case(pascal: &str) -> String {
    let chars: Vec<char> = pascal.chars().collect();
    let upper_run = chars.iter().take_while(|c| c.is_uppercase()).count();

    let lowered = match upper_run {
        0 => 0,
        n if n == chars.len() => n,
        1 => 1,
        // the last capital of a run followed by lowercase starts the next word
        n if chars[n].is_lowercase() => n - 1,
        n => n,
    };

    chars
        .iter()
        .enumerate()
        .flat_map(|(i, c)| {
            if i < lowered {
                c.to_lowercase().collect::<Vec<_>>()
            } else {
                vec![*c]
            }
        })
        .collect()
}

/// Numeric coercion. Unparseable, non-finite and non-numeric values are `0`.
pub fn coerce_number(value: &Value) -> f64 {
    let number = match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => parse_number(s).unwrap_or(0.0),
        _ => 0.0,
    };
    if number.is_finite() { number } else { 0.0 }
}

fn parse_number(text: &str) -> Option<f64> {
    let compact: String = text
        .trim()
        .chars()
        .filter(|c| !matches!(c, ' ' | '\u{a0}' | '\u{202f}' | '\''))
        .collect();

    let decimal = match (compact.rfind(','), compact.rfind('.')) {
        (Some(comma), Some(dot)) if comma > dot => Some(','),
        (Some(_), Some(_)) => Some('.'),
        (Some(_), None) => Some(','),
        (None, _) => None,
    };

    let cleaned: String = match decimal {
        Some(',') => compact
            .chars()
            .filter(|c| *c != '.')
            .map(|c| if c == ',' { '.' } else { c })
            .collect(),
        Some(_) => compact.chars().filter(|c| *c != ',').collect(),
        None => compact,
    };

    cleaned.parse::<f64>().ok()
}

/// Count coercion: truncated, never negative, saturating at `u32::MAX`.
pub fn coerce_count(value: &Value) -> u32 {
    let number = coerce_number(value);
    if number <= 0.0 {
        0
    } else if number >= u32::MAX as f64 {
        u32::MAX
    } else {
        number as u32
    }
}

/// Boolean coercion. `None` is "unknown", which is not `false`.
pub fn coerce_flag(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|f| f != 0.0),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "oui" | "yes" => Some(true),
            "false" | "0" | "non" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

pub fn coerce_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => match (n.as_i64(), n.as_u64()) {
            (Some(i), _) => i.to_string(),
            (None, Some(u)) => u.to_string(),
            _ => n.as_f64().map(|f| f.to_string()).unwrap_or_default(),
        },
        _ => String::new(),
    }
}

pub fn coerce_datetime(value: &Value) -> Option<DateTime> {
    let text = value.as_str()?.trim();
    if text.is_empty() {
        return None;
    }
    if let Ok(datetime) = text.parse::<DateTime>() {
        return Some(datetime);
    }
    if let Ok(timestamp) = text.parse::<jiff::Timestamp>() {
        return Some(timestamp.to_zoned(jiff::tz::TimeZone::UTC).datetime());
    }
    coerce_date(value).map(|date| date.to_datetime(jiff::civil::Time::midnight()))
}

pub fn coerce_date(value: &Value) -> Option<Date> {
    let text = value.as_str()?.trim();
    if text.is_empty() {
        return None;
    }
    if let Ok(date) = text.parse::<Date>() {
        return Some(date);
    }
    if let Ok(date) = Date::strptime("%d/%m/%Y", text) {
        return Some(date);
    }
    if let Ok(datetime) = text.parse::<DateTime>() {
        return Some(datetime.date());
    }
    text.parse::<jiff::Timestamp>()
        .ok()
        .map(|ts| ts.to_zoned(jiff::tz::TimeZone::UTC).date())
}

/// Typed accessors over one raw record.
#[derive(Clone, Copy)]
pub struct Fields<'a> {
    raw: &'a RawRecord,
}

impl<'a> Fields<'a> {
    pub fn new(raw: &'a RawRecord) -> Self {
        Self { raw }
    }

    pub fn raw(&self) -> &'a RawRecord {
        self.raw
    }

    pub fn value(&self, sources: &[FieldSource]) -> Option<&'a Value> {
        pick(self.raw, sources)
    }

    pub fn text(&self, sources: &[FieldSource]) -> String {
        self.value(sources).map(coerce_text).unwrap_or_default()
    }

    /// Like [`Fields::text`] but empty strings count as absent.
    pub fn optional_text(&self, sources: &[FieldSource]) -> Option<String> {
        Some(self.text(sources)).filter(|text| !text.is_empty())
    }

    pub fn number(&self, sources: &[FieldSource]) -> f64 {
        self.value(sources).map(coerce_number).unwrap_or(0.0)
    }

    pub fn count(&self, sources: &[FieldSource]) -> u32 {
        self.value(sources).map(coerce_count).unwrap_or(0)
    }

    pub fn flag(&self, sources: &[FieldSource]) -> Option<bool> {
        self.value(sources).and_then(coerce_flag)
    }

    pub fn date(&self, sources: &[FieldSource]) -> Option<Date> {
        self.value(sources).and_then(coerce_date)
    }

    pub fn datetime(&self, sources: &[FieldSource]) -> Option<DateTime> {
        self.value(sources).and_then(coerce_datetime)
    }

    /// The first source holding an array. Missing or wrong-typed is empty.
    pub fn list(&self, sources: &[FieldSource]) -> &'a [Value] {
        sources
            .iter()
            .find_map(|source| pick(self.raw, std::slice::from_ref(source))?.as_array())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Object elements of [`Fields::list`], normalized.
    pub fn records<T: Normalize>(&self, sources: &[FieldSource]) -> Vec<T> {
        self.list(sources)
            .iter()
            .filter_map(Value::as_object)
            .map(T::normalize)
            .collect()
    }

    /// A nested object, or the record itself when it is flattened.
    pub fn object_or_self(&self, name: &'static str) -> &'a RawRecord {
        lookup(self.raw, name)
            .and_then(Value::as_object)
            .unwrap_or(self.raw)
    }
}
