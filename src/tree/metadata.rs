//! Ordered key-value annotations merged down the group tree.
//!
//! Metadata is stored in a persistent [`im::OrdMap`], so the top-down merge that every
//! nested group and example performs shares structure with its parent instead of copying.
//! Iteration order is key order, which keeps rendering deterministic.

use im::OrdMap;

use crate::diagnostics::Location;
use crate::value::Value;

pub const DESCRIPTION: &str = "description";
pub const FULL_NAME: &str = "full_name";
pub const DEFINITION_LOCATION: &str = "definition_location";
pub const EXAMPLE_GROUP: &str = "example_group";
pub const DESCRIBES: &str = "describes";

pub const CALLER: &str = "caller";
pub const FILE_PATH: &str = "file_path";
pub const LINE_NUMBER: &str = "line_number";

/// Group or example metadata.
///
/// Keys are unique and iterate in key order, not in the order they were declared. Merges
/// and rendering are therefore independent of how a group spelled its entries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata {
    entries: OrdMap<String, Value>,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.entries.insert(key.into(), value.into())
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.entries.iter()
    }

    /// True when every entry of `other` is present here with an equal value.
    pub fn includes(&self, other: &Metadata) -> bool {
        other
            .entries
            .iter()
            .all(|(key, value)| self.entries.get(key) == Some(value))
    }

    /// Shallow-merges `own` over `self`: keys present in `own` win.
    pub fn merged_with(&self, own: &Metadata) -> Metadata {
        Metadata {
            entries: own.entries.clone().union(self.entries.clone()),
        }
    }

    /// The nested record describing the owning group, if present.
    pub fn example_group(&self) -> Option<&OrdMap<String, Value>> {
        self.get(EXAMPLE_GROUP).and_then(Value::as_map)
    }

    pub fn description(&self) -> &str {
        self.get(DESCRIPTION).and_then(Value::as_str).unwrap_or("")
    }

    pub fn full_name(&self) -> &str {
        self.get(FULL_NAME).and_then(Value::as_str).unwrap_or("")
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.entries)
    }

    /// Writes the keys every group and example carries about itself.
    pub(crate) fn stamp(&mut self, description: &str, full_name: &str, location: Location) {
        self.insert(DESCRIPTION, description);
        self.insert(FULL_NAME, full_name);
        self.insert(DEFINITION_LOCATION, location.to_string());
    }

    /// Builds the `example_group` record for a group defined at `location`.
    pub(crate) fn group_record(location: Location) -> Value {
        let mut record = OrdMap::new();
        record.insert(
            CALLER.to_string(),
            Value::List(vec![Value::from(location.to_string())]),
        );
        record.insert(FILE_PATH.to_string(), Value::from(location.file));
        record.insert(LINE_NUMBER.to_string(), Value::from(location.line));
        Value::Map(record)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Metadata {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Metadata {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}
