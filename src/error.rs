//! Error types for bookflow.

use std::time::Duration;

use chrono::NaiveDate;

/// Top-level error type for the wizard core.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Step graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("Navigation error: {0}")]
    Navigation(#[from] NavigationError),

    #[error("Scheduling error: {0}")]
    Scheduling(#[from] SchedulingError),

    #[error("Availability error: {0}")]
    Availability(#[from] AvailabilityError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

/// Step-graph construction and loading errors.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("Step graph has no steps")]
    Empty,

    #[error("Duplicate step id: {id}")]
    DuplicateStepId { id: String },

    #[error("Step graph must end with a summary step")]
    MissingSummary,

    #[error("Summary step {id} must be the last step")]
    SummaryNotLast { id: String },

    #[error("Summary step {id} must not carry a dependency")]
    SummaryHasDependency { id: String },

    #[error("Failed to parse step graph: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Navigation errors. All recoverable; none abort the session.
#[derive(Debug, thiserror::Error)]
pub enum NavigationError {
    #[error("Unknown step id: {id}")]
    UnknownStep { id: String },

    #[error("Step {id} is not visible under the current answers")]
    StepNotVisible { id: String },

    #[error("Cannot open the summary without at least one appointment")]
    EmptySelection { redirect_to: String },

    #[error("Field {field} has a pending validation error; fix it to continue")]
    ValidationPending { field: String },
}

/// Scheduling errors. User-visible, never silent.
#[derive(Debug, thiserror::Error)]
pub enum SchedulingError {
    #[error("No availability loaded for company {company} on {date}")]
    NoAvailability { company: String, date: NaiveDate },

    #[error("Slot {time} on {date} is not available for company {company}")]
    SlotUnavailable {
        company: String,
        date: NaiveDate,
        time: String,
    },

    #[error("At most {cap} companies can be booked at once")]
    CapacityExceeded { cap: usize },
}

/// Availability provider errors.
#[derive(Debug, thiserror::Error)]
pub enum AvailabilityError {
    #[error("Availability request failed: {reason}")]
    RequestFailed { reason: String },

    #[error("Availability request timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    #[error("Invalid availability response: {reason}")]
    InvalidResponse { reason: String },
}

/// Field-format validation errors. Inline, block forward navigation.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Field {field} is required")]
    MissingField { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidFormat { field: String, reason: String },
}

/// Result type alias for the wizard core.
pub type Result<T> = std::result::Result<T, Error>;
