//! Step dependency predicates.
//!
//! Two forms cover the whole wizard: `KeyPresent` gates the shared
//! post-branch step (true once the field holds anything), `KeyEquals` gates
//! branch-specific steps. Evaluation is pure and total; a missing key is
//! simply false.

use serde::{Deserialize, Serialize};

use crate::form::{FieldValue, FormState};

/// Visibility condition attached to a step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Dependency {
    /// Step is always visible.
    #[default]
    None,
    /// Visible once the field has been set to anything.
    KeyPresent { key: String },
    /// Visible while the field equals the given value.
    KeyEquals { key: String, value: FieldValue },
}

impl Dependency {
    /// Evaluate against the current answers. Never panics.
    pub fn is_satisfied(&self, form: &FormState) -> bool {
        match self {
            Self::None => true,
            Self::KeyPresent { key } => form.contains(key),
            Self::KeyEquals { key, value } => form.get(key) == Some(value),
        }
    }

    /// The field this dependency reads, if any.
    pub fn key(&self) -> Option<&str> {
        match self {
            Self::None => None,
            Self::KeyPresent { key } | Self::KeyEquals { key, .. } => Some(key),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_is_always_satisfied() {
        let form = FormState::new();
        assert!(Dependency::None.is_satisfied(&form));
    }

    #[test]
    fn key_present_needs_any_value() {
        let dep = Dependency::KeyPresent {
            key: "category".into(),
        };
        let mut form = FormState::new();
        assert!(!dep.is_satisfied(&form));

        form.commit("category", "Roof");
        assert!(dep.is_satisfied(&form));

        // Any value counts, including falsy ones.
        form.commit("category", false);
        assert!(dep.is_satisfied(&form));
    }

    #[test]
    fn key_equals_matches_exact_value() {
        let dep = Dependency::KeyEquals {
            key: "category".into(),
            value: FieldValue::Text("Roof".into()),
        };
        let mut form = FormState::new();
        assert!(!dep.is_satisfied(&form), "missing key is false, not a panic");

        form.commit("category", "Solar");
        assert!(!dep.is_satisfied(&form));

        form.commit("category", "Roof");
        assert!(dep.is_satisfied(&form));
    }

    #[test]
    fn serde_tagged_shape() {
        let dep = Dependency::KeyEquals {
            key: "category".into(),
            value: FieldValue::Text("Roof".into()),
        };
        let json = serde_json::to_string(&dep).unwrap();
        assert_eq!(
            json,
            r#"{"kind":"key_equals","key":"category","value":"Roof"}"#
        );
        let parsed: Dependency = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, dep);
    }
}
