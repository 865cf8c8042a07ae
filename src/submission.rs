//! Submission payload — what the wizard hands to the lead backend.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::form::{FieldValue, FormState};
use crate::scheduling::{Appointment, SelectionSet};

/// Serialized form of a finished wizard run.
///
/// Carries every committed answer, the full appointment list, and the first
/// pick flattened to top-level `company`/`date`/`time` for consumers that
/// expect a single-appointment shape.
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionPayload {
    pub fields: BTreeMap<String, FieldValue>,
    pub appointments: Vec<Appointment>,
    pub company: String,
    pub date: NaiveDate,
    pub time: String,
}

impl SubmissionPayload {
    /// Build the payload. Returns `None` while no appointment is held —
    /// submission is gated on a non-empty selection.
    pub fn build(form: &FormState, selection: &SelectionSet) -> Option<Self> {
        let primary = selection.primary()?;
        Some(Self {
            fields: form.snapshot(),
            appointments: selection.iter().cloned().collect(),
            company: primary.company_id.clone(),
            date: primary.date,
            time: primary.time.clone(),
        })
    }
}
