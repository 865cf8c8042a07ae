//! Configuration types.

use std::time::Duration;

/// Policy for deriving a calendar day's disabled state from its slots.
///
/// A day is disabled when no slots are available, or when it is "heavily
/// booked": at least `heavy_unavailable_min` slots taken while fewer than
/// `open_available_min` remain open. The thresholds are product tuning
/// knobs, not domain rules.
#[derive(Debug, Clone, Copy)]
pub struct DayDisablePolicy {
    /// Minimum unavailable slots before a day counts as heavily booked.
    pub heavy_unavailable_min: usize,
    /// A heavily booked day stays open if at least this many slots remain.
    pub open_available_min: usize,
}

impl Default for DayDisablePolicy {
    fn default() -> Self {
        Self {
            heavy_unavailable_min: 5,
            open_available_min: 2,
        }
    }
}

/// Wizard session configuration.
#[derive(Debug, Clone)]
pub struct WizardConfig {
    /// Maximum number of distinct companies that can hold an appointment.
    pub company_cap: usize,
    /// Day-disable derivation thresholds.
    pub day_disable: DayDisablePolicy,
    /// Deadline for a single availability fetch before it is reported failed.
    pub availability_timeout: Duration,
    /// Quiet window before a debounced field validation fires.
    pub debounce_window: Duration,
    /// Capacity of the session event broadcast channel.
    pub event_capacity: usize,
}

impl Default for WizardConfig {
    fn default() -> Self {
        Self {
            company_cap: 3,
            day_disable: DayDisablePolicy::default(),
            availability_timeout: Duration::from_secs(10),
            debounce_window: Duration::from_millis(300),
            event_capacity: 256,
        }
    }
}
