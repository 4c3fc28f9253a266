use crate::types::field::Field;
use indexmap::map::{IntoIter, Iter};
use indexmap::IndexMap;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// An ordered sequence of records, in the order a source produced them.
pub type Table = Vec<Record>;

/// One row of schema-less data: field names mapped to values, in insertion order.
///
/// Overwriting a field keeps its original position.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: IndexMap<String, Field>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, handy for literal records.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Field>) -> Self {
        self.set(name, value);
        self
    }

    /// Sets a field, returning the value it replaced, if any.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Field>) -> Option<Field> {
        self.fields.insert(name.into(), value.into())
    }

    pub fn get(&self, name: &str) -> Option<&Field> {
        self.fields.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn iter(&self) -> Iter<String, Field> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Entries sorted by name, for order-insensitive comparison.
    fn sorted(&self) -> Vec<(&String, &Field)> {
        let mut entries = self.iter().collect::<Vec<_>>();
        entries.sort_by(|(a, _), (b, _)| a.cmp(b));
        entries
    }
}

// Equality ignores field order, so hashing and ordering do too.
impl Hash for Record {
    fn hash<H: Hasher>(&self, state: &mut H) {
        let combined = self
            .iter()
            .map(|entry| {
                let mut hasher = DefaultHasher::new();
                entry.hash(&mut hasher);
                hasher.finish()
            })
            .fold(0u64, u64::wrapping_add);
        self.len().hash(state);
        combined.hash(state);
    }
}

impl Ord for Record {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sorted().cmp(&other.sorted())
    }
}

impl PartialOrd for Record {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<K: Into<String>, V: Into<Field>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        }
    }
}

impl<K: Into<String>, V: Into<Field>, const N: usize> From<[(K, V); N]> for Record {
    fn from(fields: [(K, V); N]) -> Self {
        fields.into_iter().collect()
    }
}

impl IntoIterator for Record {
    type Item = (String, Field);
    type IntoIter = IntoIter<String, Field>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

impl<'a> IntoIterator for &'a Record {
    type Item = (&'a String, &'a Field);
    type IntoIter = Iter<'a, String, Field>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}

impl std::fmt::Display for Record {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{{{}}}",
            self.iter()
                .map(|(name, value)| format!("{name}: {value}"))
                .join(", ")
        )
    }
}

/// What a data source hands back: a single matched record (e.g. a lookup by
/// key) or a collection (e.g. a scan).
#[derive(Clone, Debug, PartialEq)]
pub enum SourceResult {
    Single(Record),
    Many(Table),
}

impl From<Record> for SourceResult {
    fn from(record: Record) -> Self {
        SourceResult::Single(record)
    }
}

impl From<Table> for SourceResult {
    fn from(table: Table) -> Self {
        SourceResult::Many(table)
    }
}
