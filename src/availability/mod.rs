//! Availability data — the external per-company, per-date slot feed.

pub mod cache;
pub mod http;
pub mod memory;

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::AvailabilityError;
use crate::scheduling::AvailabilityDay;

pub use cache::{AvailabilityCache, AvailabilityUpdate, FetchTicket};
pub use http::HttpAvailabilityProvider;
pub use memory::InMemoryAvailability;

/// Wire shape of an availability response:
/// `{ companyId: { "2025-03-10": { dayNumber, dayName, slots: [...] } } }`.
///
/// A company or date missing from the map means no availability for it —
/// absence is never defaulted to available.
pub type AvailabilityResponse = HashMap<String, BTreeMap<NaiveDate, AvailabilityDay>>;

/// Supplies per-company, per-date slot availability. Implementations are
/// asynchronous and may be slow or fail; callers own timeouts and staleness.
#[async_trait]
pub trait AvailabilityProvider: Send + Sync {
    /// Fetch availability for the given companies over a date range
    /// (inclusive).
    async fn fetch(
        &self,
        company_ids: &[String],
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<AvailabilityResponse, AvailabilityError>;
}
