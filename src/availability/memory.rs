//! In-memory availability provider, for the demo front end and tests.

use std::collections::{BTreeMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::availability::{AvailabilityProvider, AvailabilityResponse};
use crate::error::AvailabilityError;
use crate::scheduling::AvailabilityDay;

/// Fixture-backed provider.
#[derive(Debug, Default)]
pub struct InMemoryAvailability {
    data: AvailabilityResponse,
    fail_companies: HashSet<String>,
    delay: Option<Duration>,
}

impl InMemoryAvailability {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a company's day map.
    pub fn with_company(
        mut self,
        company_id: impl Into<String>,
        days: BTreeMap<NaiveDate, AvailabilityDay>,
    ) -> Self {
        self.data.insert(company_id.into(), days);
        self
    }

    /// Make fetches that include this company fail.
    pub fn failing_for(mut self, company_id: impl Into<String>) -> Self {
        self.fail_companies.insert(company_id.into());
        self
    }

    /// Sleep before answering, to exercise timeouts.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl AvailabilityProvider for InMemoryAvailability {
    async fn fetch(
        &self,
        company_ids: &[String],
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<AvailabilityResponse, AvailabilityError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(failing) = company_ids.iter().find(|id| self.fail_companies.contains(*id)) {
            return Err(AvailabilityError::RequestFailed {
                reason: format!("no response from booking backend for {failing}"),
            });
        }

        let mut response = AvailabilityResponse::new();
        for id in company_ids {
            if let Some(days) = self.data.get(id) {
                let in_range: BTreeMap<NaiveDate, AvailabilityDay> = days
                    .range(from..=to)
                    .map(|(d, day)| (*d, day.clone()))
                    .collect();
                response.insert(id.clone(), in_range);
            }
            // Unknown companies are simply absent: no availability.
        }
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduling::Slot;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn provider() -> InMemoryAvailability {
        let mut days = BTreeMap::new();
        for d in ["2025-03-09", "2025-03-10", "2025-03-11"] {
            days.insert(
                date(d),
                AvailabilityDay::new(10, "Monday", vec![Slot::new("10:00", true)]),
            );
        }
        InMemoryAvailability::new().with_company("acme", days)
    }

    #[tokio::test]
    async fn filters_by_date_range() {
        let response = provider()
            .fetch(&["acme".into()], date("2025-03-10"), date("2025-03-11"))
            .await
            .unwrap();
        assert_eq!(response["acme"].len(), 2);
        assert!(!response["acme"].contains_key(&date("2025-03-09")));
    }

    #[tokio::test]
    async fn unknown_company_is_absent_not_available() {
        let response = provider()
            .fetch(&["ghost".into()], date("2025-03-10"), date("2025-03-11"))
            .await
            .unwrap();
        assert!(!response.contains_key("ghost"));
    }

    #[tokio::test]
    async fn failing_company_errors() {
        let provider = provider().failing_for("acme");
        let err = provider
            .fetch(&["acme".into()], date("2025-03-10"), date("2025-03-11"))
            .await
            .unwrap_err();
        assert!(matches!(err, AvailabilityError::RequestFailed { .. }));
    }
}
