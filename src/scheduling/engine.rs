//! SchedulingEngine — the bounded, per-company-unique appointment picker.
//!
//! Single-writer by construction (the session owns it); operations are
//! self-consistent under immediate duplicate invocation, so rapid double
//! clicks collapse into a select/deselect toggle instead of accumulating.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;

use crate::config::DayDisablePolicy;
use crate::error::SchedulingError;
use crate::scheduling::types::{Appointment, AvailabilityDay, DayStatus, SelectionSet};

/// What a select call did to the set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionOutcome {
    /// A new appointment was added.
    Selected(Appointment),
    /// The company's previous appointment was swapped out atomically.
    Replaced {
        previous: Appointment,
        current: Appointment,
    },
    /// The exact slot was already held; the click toggled it off.
    Deselected(Appointment),
}

/// Per-company calendar display state.
#[derive(Debug, Clone, Default)]
pub struct CalendarState {
    /// Loaded availability, keyed by date.
    pub days: BTreeMap<NaiveDate, AvailabilityDay>,
    /// The single highlighted date; selecting a slot on another date moves
    /// the highlight there.
    pub selected_date: Option<NaiveDate>,
    /// Error panel text when the provider failed for this company.
    pub error: Option<String>,
}

/// Manages the SelectionSet against loaded availability data.
#[derive(Debug)]
pub struct SchedulingEngine {
    selection: SelectionSet,
    calendars: HashMap<String, CalendarState>,
    policy: DayDisablePolicy,
    company_cap: usize,
}

impl SchedulingEngine {
    pub fn new(policy: DayDisablePolicy, company_cap: usize) -> Self {
        Self {
            selection: SelectionSet::new(),
            calendars: HashMap::new(),
            policy,
            company_cap,
        }
    }

    /// Install availability days for a company, clearing any error panel.
    /// Existing entries for the same dates are overwritten.
    pub fn load_days(&mut self, company_id: &str, days: BTreeMap<NaiveDate, AvailabilityDay>) {
        let calendar = self.calendars.entry(company_id.to_string()).or_default();
        calendar.error = None;
        let count = days.len();
        calendar.days.extend(days);
        tracing::debug!(company = %company_id, days = count, "Availability loaded");
    }

    /// Mark a company's calendar as failed. Loaded days are kept; the
    /// selection set is never touched by provider failures.
    pub fn set_error(&mut self, company_id: &str, message: impl Into<String>) {
        let calendar = self.calendars.entry(company_id.to_string()).or_default();
        calendar.error = Some(message.into());
    }

    /// Calendar display state for a company.
    pub fn calendar(&self, company_id: &str) -> Option<&CalendarState> {
        self.calendars.get(company_id)
    }

    /// Derived display status of a date, if loaded.
    pub fn day_status(&self, company_id: &str, date: NaiveDate) -> Option<DayStatus> {
        self.calendars
            .get(company_id)?
            .days
            .get(&date)
            .map(|d| d.status(&self.policy))
    }

    /// Select a slot for a company.
    ///
    /// The slot must be loaded and available. A company holding another
    /// appointment has it replaced atomically; re-selecting the held slot
    /// toggles it off; a fourth distinct company is rejected with a
    /// capacity error and the set left unchanged.
    pub fn select_slot(
        &mut self,
        company_id: &str,
        date: NaiveDate,
        time: &str,
    ) -> Result<SelectionOutcome, SchedulingError> {
        let day = self
            .calendars
            .get(company_id)
            .and_then(|c| c.days.get(&date))
            .ok_or_else(|| SchedulingError::NoAvailability {
                company: company_id.to_string(),
                date,
            })?;

        let slot = day.slot(time).filter(|s| s.available).ok_or_else(|| {
            SchedulingError::SlotUnavailable {
                company: company_id.to_string(),
                date,
                time: time.to_string(),
            }
        })?;

        let appointment = Appointment::new(company_id, date, slot.time.clone());

        // Toggle: clicking the held slot again returns to the pre-click state.
        if self.selection.for_company(company_id) == Some(&appointment) {
            let removed = self
                .selection
                .remove(company_id)
                .unwrap_or_else(|| appointment.clone());
            if let Some(calendar) = self.calendars.get_mut(company_id) {
                calendar.selected_date = None;
            }
            tracing::info!(company = %company_id, %date, time = %time, "Slot deselected (toggle)");
            return Ok(SelectionOutcome::Deselected(removed));
        }

        let replaced = self.selection.insert(appointment.clone(), self.company_cap)?;

        // Mark this date selected and unmark every other date for the company.
        if let Some(calendar) = self.calendars.get_mut(company_id) {
            calendar.selected_date = Some(date);
        }

        match replaced {
            Some(previous) => {
                tracing::info!(
                    company = %company_id,
                    from = %previous.date,
                    to = %date,
                    "Appointment replaced"
                );
                Ok(SelectionOutcome::Replaced {
                    previous,
                    current: appointment,
                })
            }
            None => {
                tracing::info!(company = %company_id, %date, time = %time, "Appointment selected");
                Ok(SelectionOutcome::Selected(appointment))
            }
        }
    }

    /// Remove an appointment only if the exact slot is the one held.
    pub fn deselect_slot(&mut self, company_id: &str, date: NaiveDate, time: &str) -> bool {
        let held = match self.selection.for_company(company_id) {
            Some(a) if a.date == date && a.time == time => true,
            _ => false,
        };
        if !held {
            return false;
        }
        self.selection.remove(company_id);
        if let Some(calendar) = self.calendars.get_mut(company_id) {
            calendar.selected_date = None;
        }
        tracing::info!(company = %company_id, %date, time = %time, "Slot deselected");
        true
    }

    /// The current picks.
    pub fn selection(&self) -> &SelectionSet {
        &self.selection
    }

    /// Discard all picks and display state. Loaded availability survives.
    pub fn clear_selection(&mut self) {
        self.selection.clear();
        for calendar in self.calendars.values_mut() {
            calendar.selected_date = None;
        }
    }

    /// Full reset for a new session.
    pub fn reset(&mut self) {
        self.selection.clear();
        self.calendars.clear();
    }
}
