//! Availability request lifecycle: timeouts and stale-response discard.
//!
//! Every fetch is stamped with a ticket capturing the current per-company
//! epoch. Beginning a new fetch for a company bumps its epoch, which
//! supersedes any in-flight request: when the older response finally lands,
//! [`AvailabilityCache::apply`] sees the stale epoch and drops it instead of
//! overwriting current display state. Superseding cancels interest in the
//! result, not the network call itself. A timed-out fetch becomes an
//! explicit per-company error; there is no automatic retry.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;

use crate::availability::{AvailabilityProvider, AvailabilityResponse};
use crate::error::AvailabilityError;
use crate::scheduling::SchedulingEngine;

/// Identifies one fetch and the epoch it was issued under.
#[derive(Debug, Clone)]
pub struct FetchTicket {
    epoch: u64,
    company_ids: Vec<String>,
}

impl FetchTicket {
    pub fn company_ids(&self) -> &[String] {
        &self.company_ids
    }
}

/// What applying a completed fetch did for one company.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AvailabilityUpdate {
    /// Days installed into the calendar.
    Loaded { company: String, days: usize },
    /// Provider failed or timed out; error panel set.
    Failed { company: String, message: String },
    /// A newer request superseded this one; response dropped silently.
    Stale { company: String },
}

/// Tracks request epochs and applies completed fetches to the engine.
pub struct AvailabilityCache {
    provider: Arc<dyn AvailabilityProvider>,
    timeout: Duration,
    epochs: HashMap<String, u64>,
    counter: u64,
}

impl AvailabilityCache {
    pub fn new(provider: Arc<dyn AvailabilityProvider>, timeout: Duration) -> Self {
        Self {
            provider,
            timeout,
            epochs: HashMap::new(),
            counter: 0,
        }
    }

    /// Stamp a new fetch for these companies, superseding any in-flight
    /// request that covers them.
    pub fn begin(&mut self, company_ids: &[String]) -> FetchTicket {
        self.counter += 1;
        for id in company_ids {
            self.epochs.insert(id.clone(), self.counter);
        }
        FetchTicket {
            epoch: self.counter,
            company_ids: company_ids.to_vec(),
        }
    }

    /// Run the provider fetch under the configured timeout.
    pub async fn fetch(
        &self,
        ticket: &FetchTicket,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<AvailabilityResponse, AvailabilityError> {
        match tokio::time::timeout(
            self.timeout,
            self.provider.fetch(&ticket.company_ids, from, to),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(AvailabilityError::Timeout {
                timeout: self.timeout,
            }),
        }
    }

    /// Install a completed fetch into the engine, company by company.
    ///
    /// Companies whose epoch moved on since the ticket was issued are
    /// dropped silently (not an error). A missing company in a successful
    /// response means no availability for the range; a failed response sets
    /// the company's error panel and never touches the selection set.
    pub fn apply(
        &self,
        ticket: &FetchTicket,
        result: Result<AvailabilityResponse, AvailabilityError>,
        engine: &mut SchedulingEngine,
    ) -> Vec<AvailabilityUpdate> {
        let mut updates = Vec::with_capacity(ticket.company_ids.len());

        for company in &ticket.company_ids {
            if self.epochs.get(company).copied() != Some(ticket.epoch) {
                tracing::debug!(company = %company, "Discarding stale availability response");
                updates.push(AvailabilityUpdate::Stale {
                    company: company.clone(),
                });
                continue;
            }
            match &result {
                Ok(response) => {
                    let days = response.get(company).cloned().unwrap_or_default();
                    let count = days.len();
                    engine.load_days(company, days);
                    updates.push(AvailabilityUpdate::Loaded {
                        company: company.clone(),
                        days: count,
                    });
                }
                Err(e) => {
                    let message = e.to_string();
                    tracing::warn!(company = %company, error = %message, "Availability fetch failed");
                    engine.set_error(company, &message);
                    updates.push(AvailabilityUpdate::Failed {
                        company: company.clone(),
                        message,
                    });
                }
            }
        }
        updates
    }

    /// Convenience path: begin, fetch, apply in one call.
    pub async fn load(
        &mut self,
        company_ids: &[String],
        from: NaiveDate,
        to: NaiveDate,
        engine: &mut SchedulingEngine,
    ) -> Vec<AvailabilityUpdate> {
        let ticket = self.begin(company_ids);
        let result = self.fetch(&ticket, from, to).await;
        self.apply(&ticket, result, engine)
    }
}
