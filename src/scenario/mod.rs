//! Scenario records and the CSV store behind them
//!
//! A scenario is one row of a scenario table: an ordered set of named string
//! fields. Fields whose name contains [`PLACEHOLDER_MARKER`] are placeholders;
//! they travel with the record but never name a directory or show up in a
//! report.

mod store;

pub use store::{ScenarioRows, ScenarioStore};

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

/// Marks a field name as a placeholder
pub const PLACEHOLDER_MARKER: char = '?';

/// True when the field takes part in naming and reporting
pub fn is_concrete_field(name: &str) -> bool {
    !name.contains(PLACEHOLDER_MARKER)
}

/// One scenario row, in column order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScenarioRecord {
    fields: Vec<(String, String)>,
}

impl ScenarioRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pair a header with one row of values
    pub fn from_row<H, V>(headers: &[H], values: &[V]) -> Self
    where
        H: AsRef<str>,
        V: AsRef<str>,
    {
        headers
            .iter()
            .zip(values)
            .map(|(h, v)| (h.as_ref().to_string(), v.as_ref().to_string()))
            .collect()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Set a field, keeping its position if it already exists
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.fields.iter_mut().find(|(k, _)| k == name) {
            Some((_, v)) => *v = value,
            None => self.fields.push((name.to_string(), value)),
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Projection onto the concrete fields
    pub fn concrete(&self) -> ScenarioRecord {
        self.fields
            .iter()
            .filter(|(k, _)| is_concrete_field(k))
            .cloned()
            .collect()
    }

    /// `k:v, k:v` over the concrete fields, used as the menu title
    pub fn title(&self) -> String {
        self.iter()
            .filter(|(k, _)| is_concrete_field(k))
            .map(|(k, v)| format!("{k}:{v}"))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Directory-name fragment: `key-value` pairs of concrete fields joined by `__`
    pub fn directory_fragment(&self) -> String {
        self.iter()
            .filter(|(k, _)| is_concrete_field(k))
            .map(|(k, v)| format!("{}-{}", normalize_item(k), normalize_item(v)))
            .collect::<Vec<_>>()
            .join("__")
    }
}

impl FromIterator<(String, String)> for ScenarioRecord {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        let mut record = ScenarioRecord::new();
        for (k, v) in iter {
            record.set(&k, v);
        }
        record
    }
}

impl fmt::Display for ScenarioRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pairs: Vec<String> = self.iter().map(|(k, v)| format!("{k}={v}")).collect();
        write!(f, "{{{}}}", pairs.join(", "))
    }
}

static NON_ALNUM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\p{Alphabetic}\p{Nd}]+").expect("Invalid normalization pattern"));

/// Lowercase and collapse every run of non-alphanumeric characters to `_`
pub fn normalize_item(item: &str) -> String {
    NON_ALNUM.replace_all(item, "_").to_lowercase()
}
