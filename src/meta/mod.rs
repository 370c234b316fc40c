//! Typed metadata tables.
//!
//! Every page and every directory record carries a [`MetaTable`]. Values come
//! from declaration files, front matter, and features; pages may point at
//! each other through [`Value::Page`], which holds a key, never the page.
//!
//! # Lookup
//!
//! ```text
//! page.meta ──miss──▶ dir record ──miss──▶ parent record ──▶ … ──▶ root
//!     │                    │                     │
//!     └── hit              └── hit               └── hit     (first wins)
//! ```
//!
//! Climbing is implemented by `PageGraph::lookup`; keys registered as
//! page-local in [`Fields`] never climb.

mod fields;
pub mod front_matter;

pub use fields::{Field, Fields};

use crate::graph::PageKey;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{cmp::Ordering, collections::BTreeMap};

// ============================================================================
// Value
// ============================================================================

/// A single metadata value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Date(DateTime<Utc>),
    List(Vec<Value>),
    Table(MetaTable),
    /// Weak reference to another page.
    Page(PageKey),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Date(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_table(&self) -> Option<&MetaTable> {
        match self {
            Self::Table(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_page(&self) -> Option<&PageKey> {
        match self {
            Self::Page(key) => Some(key),
            _ => None,
        }
    }

    /// Values read as strings: a single string, or every string of a list.
    ///
    /// Used for keys like `tags` that accept `tags: a` as well as `tags: [a, b]`.
    pub fn string_items(&self) -> Vec<&str> {
        match self {
            Self::String(s) => vec![s.as_str()],
            Self::List(items) => items.iter().filter_map(Value::as_str).collect(),
            _ => Vec::new(),
        }
    }

    /// Ordering used when sorting pages by an arbitrary field.
    ///
    /// Values of the same type compare naturally; mixed types fall back to a
    /// fixed type rank so the result is still total.
    pub fn sort_cmp(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Self::Bool(a), Self::Bool(b)) => a.cmp(b),
            (Self::Int(a), Self::Int(b)) => a.cmp(b),
            (Self::Float(a), Self::Float(b)) => a.total_cmp(b),
            (Self::Int(a), Self::Float(b)) => (*a as f64).total_cmp(b),
            (Self::Float(a), Self::Int(b)) => a.total_cmp(&(*b as f64)),
            (Self::String(a), Self::String(b)) => a.cmp(b),
            (Self::Date(a), Self::Date(b)) => a.cmp(b),
            (Self::Page(a), Self::Page(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Null => 0,
            Self::Bool(_) => 1,
            Self::Int(_) | Self::Float(_) => 2,
            Self::Date(_) => 3,
            Self::String(_) => 4,
            Self::Page(_) => 5,
            Self::List(_) => 6,
            Self::Table(_) => 7,
        }
    }

    /// Plain JSON view: dates as RFC 3339, page references as their key.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;
        match self {
            Self::Null => Json::Null,
            Self::Bool(b) => Json::Bool(*b),
            Self::Int(i) => Json::from(*i),
            Self::Float(f) => Json::from(*f),
            Self::String(s) => Json::String(s.clone()),
            Self::Date(d) => Json::String(d.to_rfc3339()),
            Self::List(items) => Json::Array(items.iter().map(Value::to_json).collect()),
            Self::Table(t) => t.to_json(),
            Self::Page(key) => Json::String(key.to_string()),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(d: DateTime<Utc>) -> Self {
        Self::Date(d)
    }
}

impl From<PageKey> for Value {
    fn from(key: PageKey) -> Self {
        Self::Page(key)
    }
}

impl From<MetaTable> for Value {
    fn from(table: MetaTable) -> Self {
        Self::Table(table)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::List(items)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        use serde_json::Value as Json;
        match json {
            Json::Null => Self::Null,
            Json::Bool(b) => Self::Bool(b),
            Json::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => Self::Float(n.as_f64().unwrap_or_default()),
            },
            Json::String(s) => Self::String(s),
            Json::Array(items) => Self::List(items.into_iter().map(Value::from).collect()),
            Json::Object(map) => Self::Table(MetaTable(
                map.into_iter().map(|(k, v)| (k, Value::from(v))).collect(),
            )),
        }
    }
}

impl From<toml::Value> for Value {
    fn from(value: toml::Value) -> Self {
        match value {
            toml::Value::String(s) => Self::String(s),
            toml::Value::Integer(i) => Self::Int(i),
            toml::Value::Float(f) => Self::Float(f),
            toml::Value::Boolean(b) => Self::Bool(b),
            toml::Value::Datetime(dt) => {
                let text = dt.to_string();
                parse_date(&text).map_or(Self::String(text), Self::Date)
            }
            toml::Value::Array(items) => Self::List(items.into_iter().map(Value::from).collect()),
            toml::Value::Table(map) => Self::Table(MetaTable(
                map.into_iter().map(|(k, v)| (k, Value::from(v))).collect(),
            )),
        }
    }
}

// ============================================================================
// MetaTable
// ============================================================================

/// Ordered key → value attribute table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetaTable(BTreeMap<String, Value>);

impl MetaTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.0.get_mut(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Value::as_bool)
    }

    pub fn get_date(&self, key: &str) -> Option<DateTime<Utc>> {
        self.get(key).and_then(Value::as_date)
    }

    pub fn get_list(&self, key: &str) -> Option<&[Value]> {
        self.get(key).and_then(Value::as_list)
    }

    pub fn get_table(&self, key: &str) -> Option<&MetaTable> {
        self.get(key).and_then(Value::as_table)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    /// Insert only if the key is absent. Returns whether a value was inserted.
    pub fn set_default(&mut self, key: impl Into<String>, value: impl Into<Value>) -> bool {
        let key = key.into();
        if self.0.contains_key(&key) {
            return false;
        }
        self.0.insert(key, value.into());
        true
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    /// Copy every entry of `other` over this table, replacing existing keys.
    pub fn merge_from(&mut self, other: &MetaTable) {
        for (k, v) in &other.0 {
            self.0.insert(k.clone(), v.clone());
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Turn string values of the given keys into dates.
    ///
    /// Returns the keys whose values could not be parsed; those are removed.
    pub fn coerce_dates(&mut self, keys: &[&str]) -> Vec<String> {
        let mut invalid = Vec::new();
        for key in keys {
            let Some(Value::String(text)) = self.0.get(*key) else {
                continue;
            };
            match parse_date(text) {
                Some(date) => {
                    self.0.insert((*key).to_owned(), Value::Date(date));
                }
                None => {
                    invalid.push(format!("{key}: cannot parse date `{text}`"));
                    self.0.remove(*key);
                }
            }
        }
        invalid
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.0
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        )
    }
}

impl FromIterator<(String, Value)> for MetaTable {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for MetaTable {
    type Item = (String, Value);
    type IntoIter = std::collections::btree_map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

// ============================================================================
// Dates
// ============================================================================

/// Parse the date formats accepted in metadata. Naive values are UTC.
///
/// | Input | Meaning |
/// |-------|---------|
/// | `2021-02-01` | midnight UTC |
/// | `2021-02-01 10:30` | UTC |
/// | `2021-02-01 10:30:15` / `2021-02-01T10:30:15` | UTC |
/// | `2021-02-01T10:30:15+02:00` | RFC 3339, converted to UTC |
pub fn parse_date(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_parse_date_formats() {
        let d = parse_date("2021-02-01").unwrap();
        assert_eq!((d.year(), d.month(), d.day(), d.hour()), (2021, 2, 1, 0));

        let d = parse_date("2021-02-01 10:30").unwrap();
        assert_eq!((d.hour(), d.minute()), (10, 30));

        let d = parse_date("2021-02-01T10:30:15+02:00").unwrap();
        assert_eq!(d.hour(), 8);

        assert!(parse_date("yesterday").is_none());
        assert!(parse_date("2021-13-01").is_none());
    }

    #[test]
    fn test_set_default_keeps_existing() {
        let mut meta = MetaTable::new();
        meta.set("title", "A");
        assert!(!meta.set_default("title", "B"));
        assert!(meta.set_default("author", "C"));
        assert_eq!(meta.get_str("title"), Some("A"));
        assert_eq!(meta.get_str("author"), Some("C"));
    }

    #[test]
    fn test_merge_from_overrides() {
        let mut base = MetaTable::new();
        base.set("a", 1_i64);
        base.set("b", 2_i64);
        let mut over = MetaTable::new();
        over.set("b", 3_i64);
        base.merge_from(&over);
        assert_eq!(base.get("a"), Some(&Value::Int(1)));
        assert_eq!(base.get("b"), Some(&Value::Int(3)));
    }

    #[test]
    fn test_coerce_dates_reports_invalid() {
        let mut meta = MetaTable::new();
        meta.set("date", "2021-03-01");
        meta.set("updated", "soon");
        let invalid = meta.coerce_dates(&["date", "updated", "missing"]);
        assert!(meta.get_date("date").is_some());
        assert!(!meta.contains("updated"));
        assert_eq!(invalid.len(), 1);
        assert!(invalid[0].contains("soon"));
    }

    #[test]
    fn test_from_json_and_toml() {
        let json: serde_json::Value = serde_json::json!({"n": 1, "f": 1.5, "tags": ["a", "b"]});
        let Value::Table(table) = Value::from(json) else {
            panic!("expected table");
        };
        assert_eq!(table.get("n"), Some(&Value::Int(1)));
        assert_eq!(table.get("f"), Some(&Value::Float(1.5)));
        assert_eq!(table.get("tags").unwrap().string_items(), vec!["a", "b"]);

        let toml: toml::Value = toml::from_str("date = 2021-02-01\n").unwrap();
        let Value::Table(table) = Value::from(toml) else {
            panic!("expected table");
        };
        assert!(table.get_date("date").is_some());
    }

    #[test]
    fn test_sort_cmp_mixed_types_is_total() {
        let date = Value::Date(parse_date("2021-01-01").unwrap());
        assert_eq!(Value::Int(1).sort_cmp(&Value::Float(2.0)), Ordering::Less);
        assert_eq!(date.sort_cmp(&Value::from("x")), Ordering::Less);
        assert_eq!(Value::from("b").sort_cmp(&Value::from("a")), Ordering::Greater);
    }

    #[test]
    fn test_serde_round_trip_keeps_types() {
        let mut meta = MetaTable::new();
        meta.set("date", parse_date("2021-01-01").unwrap());
        meta.set("link", PageKey::new("blog/a.md"));
        meta.set("name", "blog/a.md");

        let json = serde_json::to_string(&meta).unwrap();
        let back: MetaTable = serde_json::from_str(&json).unwrap();
        assert_eq!(back, meta);
        assert!(back.get("link").unwrap().as_page().is_some());
        assert!(back.get_str("name").is_some());
    }
}
