//! Multi-company appointment scheduling.

pub mod engine;
pub mod types;

pub use engine::{CalendarState, SchedulingEngine, SelectionOutcome};
pub use types::{Appointment, AvailabilityDay, Company, DayStatus, SelectionSet, Slot};
