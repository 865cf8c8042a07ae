//! FormState — the accumulated answer store, keyed by field id.
//!
//! Single source of truth for predicate evaluation. Every mutation bumps a
//! fingerprint so downstream caches (progress, visibility) can detect change
//! without diffing values.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

/// A scalar answer value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Number(f64),
    Flag(bool),
}

impl FieldValue {
    /// The value rendered as prompt-template text.
    pub fn as_display(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Number(n) => n.to_string(),
            Self::Flag(b) => b.to_string(),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<f64> for FieldValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        Self::Flag(b)
    }
}

/// Mutable key/value answer store for one wizard session.
///
/// Created empty at session start, written only through [`commit`](Self::commit)
/// (or cleared when a branch is abandoned on backward navigation).
#[derive(Debug, Clone, Default)]
pub struct FormState {
    values: HashMap<String, FieldValue>,
    fingerprint: u64,
}

impl FormState {
    /// Create an empty form state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Write a field value. Overwrites any previous value for the field.
    pub fn commit(&mut self, field: impl Into<String>, value: impl Into<FieldValue>) {
        let field = field.into();
        let value = value.into();
        tracing::debug!(field = %field, "Form field committed");
        self.values.insert(field, value);
        self.fingerprint += 1;
    }

    /// Get a field value.
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.values.get(field)
    }

    /// Whether the field has been set to anything.
    pub fn contains(&self, field: &str) -> bool {
        self.values.contains_key(field)
    }

    /// Remove a single field, returning its previous value.
    pub fn clear(&mut self, field: &str) -> Option<FieldValue> {
        let removed = self.values.remove(field);
        if removed.is_some() {
            tracing::debug!(field = %field, "Form field cleared");
            self.fingerprint += 1;
        }
        removed
    }

    /// Remove several fields at once (branch invalidation).
    pub fn clear_many<'a>(&mut self, fields: impl IntoIterator<Item = &'a str>) {
        for field in fields {
            self.clear(field);
        }
    }

    /// Drop every answer. Used by session reset.
    pub fn clear_all(&mut self) {
        if !self.values.is_empty() {
            self.values.clear();
            self.fingerprint += 1;
        }
    }

    /// Monotonic change counter; equal fingerprints imply equal contents.
    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }

    /// Ordered snapshot of all answers, for serialization into payloads and
    /// navigation snapshots.
    pub fn snapshot(&self) -> BTreeMap<String, FieldValue> {
        self.values
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Number of answered fields.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether no fields have been answered.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
