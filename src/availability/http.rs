//! HTTP availability provider — JSON client for the booking backend.

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::availability::{AvailabilityProvider, AvailabilityResponse};
use crate::error::AvailabilityError;

/// Fetches availability from the booking backend over HTTP.
pub struct HttpAvailabilityProvider {
    base_url: String,
    client: reqwest::Client,
}

impl HttpAvailabilityProvider {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::new(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/availability", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl AvailabilityProvider for HttpAvailabilityProvider {
    async fn fetch(
        &self,
        company_ids: &[String],
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<AvailabilityResponse, AvailabilityError> {
        let response = self
            .client
            .get(self.endpoint())
            .query(&[
                ("companies", company_ids.join(",")),
                ("from", from.to_string()),
                ("to", to.to_string()),
            ])
            .send()
            .await
            .map_err(|e| AvailabilityError::RequestFailed {
                reason: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(AvailabilityError::RequestFailed {
                reason: format!("backend returned {}", response.status()),
            });
        }

        response
            .json::<AvailabilityResponse>()
            .await
            .map_err(|e| AvailabilityError::InvalidResponse {
                reason: e.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_normalizes_trailing_slash() {
        let provider = HttpAvailabilityProvider::new("https://booking.example.com/api/");
        assert_eq!(
            provider.endpoint(),
            "https://booking.example.com/api/availability"
        );
    }

    #[test]
    fn wire_shape_parses() {
        let json = r#"{
            "acme": {
                "2025-03-10": {
                    "dayNumber": 10,
                    "dayName": "Monday",
                    "slots": [
                        { "time": "10:00", "formatted": "10:00 AM", "available": true },
                        { "time": "14:00", "available": false }
                    ]
                }
            }
        }"#;
        let parsed: AvailabilityResponse = serde_json::from_str(json).unwrap();
        let day = &parsed["acme"][&"2025-03-10".parse::<NaiveDate>().unwrap()];
        assert_eq!(day.day_number, 10);
        assert_eq!(day.day_name, "Monday");
        assert_eq!(day.slots.len(), 2);
        assert!(day.slots[0].available);
        assert_eq!(day.slots[0].formatted.as_deref(), Some("10:00 AM"));
        assert!(!day.slots[1].available);
    }
}
