//! Scheduling domain types.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::config::DayDisablePolicy;

/// A bookable company. Opaque to the core beyond identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Company {
    pub id: String,
    pub name: String,
}

impl Company {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// One bookable time slot of a day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slot {
    /// Raw time label, e.g. "10:00".
    pub time: String,
    /// Human-formatted label, e.g. "10:00 AM".
    #[serde(default)]
    pub formatted: Option<String>,
    pub available: bool,
}

impl Slot {
    pub fn new(time: impl Into<String>, available: bool) -> Self {
        Self {
            time: time.into(),
            formatted: None,
            available,
        }
    }
}

/// Per-date slot availability for one company, as delivered by the
/// availability backend. The date itself is the map key in the wire shape,
/// so it does not repeat here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityDay {
    pub day_number: u32,
    pub day_name: String,
    pub slots: Vec<Slot>,
}

impl AvailabilityDay {
    pub fn new(day_number: u32, day_name: impl Into<String>, slots: Vec<Slot>) -> Self {
        Self {
            day_number,
            day_name: day_name.into(),
            slots,
        }
    }

    pub fn available_count(&self) -> usize {
        self.slots.iter().filter(|s| s.available).count()
    }

    pub fn unavailable_count(&self) -> usize {
        self.slots.iter().filter(|s| !s.available).count()
    }

    /// Derive the day's display status. Not stored; always computed from
    /// the slot list and the policy thresholds.
    pub fn status(&self, policy: &DayDisablePolicy) -> DayStatus {
        let available = self.available_count();
        if available == 0 {
            return DayStatus::FullyBooked;
        }
        let unavailable = self.unavailable_count();
        if unavailable >= policy.heavy_unavailable_min && available < policy.open_available_min {
            return DayStatus::HeavilyBooked;
        }
        DayStatus::Open
    }

    /// Find a slot by its raw time label.
    pub fn slot(&self, time: &str) -> Option<&Slot> {
        self.slots.iter().find(|s| s.time == time)
    }
}

/// Derived day display status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DayStatus {
    /// Selectable.
    Open,
    /// Technically bookable but steered away from; rendered disabled.
    HeavilyBooked,
    /// No slots left; rendered disabled.
    FullyBooked,
}

impl DayStatus {
    /// Whether the date is rendered disabled.
    pub fn is_disabled(&self) -> bool {
        !matches!(self, Self::Open)
    }
}

/// A tentative reservation. Immutable value; replaced, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    #[serde(rename = "company")]
    pub company_id: String,
    pub date: NaiveDate,
    pub time: String,
}

impl Appointment {
    pub fn new(company_id: impl Into<String>, date: NaiveDate, time: impl Into<String>) -> Self {
        Self {
            company_id: company_id.into(),
            date,
            time: time.into(),
        }
    }
}

/// The bounded set of in-progress appointment picks.
///
/// Invariants: at most one appointment per company, insertion order
/// preserved, size capped by the caller-supplied limit. All mutation goes
/// through methods that uphold them.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct SelectionSet {
    appointments: Vec<Appointment>,
}

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.appointments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.appointments.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Appointment> {
        self.appointments.iter()
    }

    pub fn as_slice(&self) -> &[Appointment] {
        &self.appointments
    }

    /// The appointment held for a company, if any.
    pub fn for_company(&self, company_id: &str) -> Option<&Appointment> {
        self.appointments
            .iter()
            .find(|a| a.company_id == company_id)
    }

    pub fn contains_company(&self, company_id: &str) -> bool {
        self.for_company(company_id).is_some()
    }

    /// The flattened "primary" appointment (first pick), for consumers
    /// expecting a single-appointment shape.
    pub fn primary(&self) -> Option<&Appointment> {
        self.appointments.first()
    }

    /// Insert an appointment, replacing any existing one for the same
    /// company. Returns the replaced appointment. `cap` bounds the number
    /// of distinct companies; exceeding it leaves the set unchanged.
    pub fn insert(
        &mut self,
        appointment: Appointment,
        cap: usize,
    ) -> Result<Option<Appointment>, crate::error::SchedulingError> {
        if let Some(pos) = self
            .appointments
            .iter()
            .position(|a| a.company_id == appointment.company_id)
        {
            let replaced = std::mem::replace(&mut self.appointments[pos], appointment);
            return Ok(Some(replaced));
        }
        if self.appointments.len() >= cap {
            return Err(crate::error::SchedulingError::CapacityExceeded { cap });
        }
        self.appointments.push(appointment);
        Ok(None)
    }

    /// Remove a company's appointment.
    pub fn remove(&mut self, company_id: &str) -> Option<Appointment> {
        let pos = self
            .appointments
            .iter()
            .position(|a| a.company_id == company_id)?;
        Some(self.appointments.remove(pos))
    }

    pub fn clear(&mut self) {
        self.appointments.clear();
    }
}

impl<'a> IntoIterator for &'a SelectionSet {
    type Item = &'a Appointment;
    type IntoIter = std::slice::Iter<'a, Appointment>;

    fn into_iter(self) -> Self::IntoIter {
        self.appointments.iter()
    }
}
