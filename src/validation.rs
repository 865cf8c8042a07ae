//! Field-format validation for text steps.
//!
//! Pure checks; a failed check blocks forward navigation and surfaces as an
//! inline field error. The ZIP check only answers "is this shaped like a
//! ZIP" — whether it is a real, serviced ZIP is the ZIP-database
//! collaborator's business.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Format expected of a text field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldFormat {
    /// 5-digit US ZIP code.
    PostalCode,
    Email,
    /// US phone number, separators optional.
    Phone,
}

/// Compiled format checkers.
pub struct FieldValidator {
    zip: Regex,
    email: Regex,
    phone: Regex,
}

impl FieldValidator {
    pub fn new() -> Self {
        // Static patterns; compilation cannot fail at runtime.
        Self {
            zip: Regex::new(r"^\d{5}$").expect("static ZIP pattern"),
            email: Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("static email pattern"),
            phone: Regex::new(r"^\+?1?[\s.-]?\(?\d{3}\)?[\s.-]?\d{3}[\s.-]?\d{4}$")
                .expect("static phone pattern"),
        }
    }

    /// Check a value against the expected format.
    pub fn validate(
        &self,
        format: FieldFormat,
        field: &str,
        value: &str,
    ) -> Result<(), ValidationError> {
        let value = value.trim();
        if value.is_empty() {
            return Err(ValidationError::MissingField {
                field: field.to_string(),
            });
        }
        let (regex, reason) = match format {
            FieldFormat::PostalCode => (&self.zip, "expected a 5-digit ZIP code"),
            FieldFormat::Email => (&self.email, "expected an email address"),
            FieldFormat::Phone => (&self.phone, "expected a phone number"),
        };
        if regex.is_match(value) {
            Ok(())
        } else {
            Err(ValidationError::InvalidFormat {
                field: field.to_string(),
                reason: reason.to_string(),
            })
        }
    }
}

impl Default for FieldValidator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zip_accepts_five_digits() {
        let v = FieldValidator::new();
        assert!(v.validate(FieldFormat::PostalCode, "zip", "30301").is_ok());
        assert!(v.validate(FieldFormat::PostalCode, "zip", " 30301 ").is_ok());
    }

    #[test]
    fn zip_rejects_malformed() {
        let v = FieldValidator::new();
        for bad in ["3030", "303011", "3O3O1", "30-301", "abcde"] {
            assert!(
                v.validate(FieldFormat::PostalCode, "zip", bad).is_err(),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn empty_value_is_missing_field() {
        let v = FieldValidator::new();
        let err = v.validate(FieldFormat::PostalCode, "zip", "  ").unwrap_err();
        assert!(matches!(err, ValidationError::MissingField { field } if field == "zip"));
    }

    #[test]
    fn email_and_phone_formats() {
        let v = FieldValidator::new();
        assert!(v.validate(FieldFormat::Email, "email", "jo@example.com").is_ok());
        assert!(v.validate(FieldFormat::Email, "email", "not-an-email").is_err());
        assert!(v.validate(FieldFormat::Phone, "phone", "(404) 555-0123").is_ok());
        assert!(v.validate(FieldFormat::Phone, "phone", "404-555").is_err());
    }
}
