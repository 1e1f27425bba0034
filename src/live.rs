//! HTTP adapter for live attraction status.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::model::{AttractionId, LiveStatus, VenueId};
use crate::traits::LiveStatusProvider;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveFeedConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for LiveFeedConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LiveFeedClient {
    config: LiveFeedConfig,
    client: reqwest::blocking::Client,
}

impl LiveFeedClient {
    pub fn new(config: LiveFeedConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { config, client })
    }

    fn url_for(&self, venue_id: &VenueId) -> String {
        format!(
            "{}/venues/{}/live",
            self.config.base_url.trim_end_matches('/'),
            venue_id
        )
    }
}

impl LiveStatusProvider for LiveFeedClient {
    /// Any transport or decode failure yields an empty map: no live data.
    fn live_status(&self, venue_id: &VenueId) -> HashMap<AttractionId, LiveStatus> {
        let response = self
            .client
            .get(self.url_for(venue_id))
            .send()
            .and_then(|resp| resp.error_for_status())
            .and_then(|resp| resp.json::<LiveFeedResponse>());

        match response {
            Ok(body) => body.into_statuses(),
            Err(err) => {
                tracing::warn!(venue_id = %venue_id, error = %err, "Live feed unavailable");
                HashMap::new()
            }
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct LiveFeedResponse {
    #[serde(default)]
    attractions: Vec<LiveFeedEntry>,
}

#[derive(Debug, Deserialize)]
struct LiveFeedEntry {
    id: AttractionId,
    is_open: bool,
    /// Some feeds send null for closed rides.
    #[serde(default)]
    wait_minutes: Option<u32>,
}

impl LiveFeedResponse {
    pub(crate) fn into_statuses(self) -> HashMap<AttractionId, LiveStatus> {
        self.attractions
            .into_iter()
            .map(|entry| (entry.id, LiveStatus::new(entry.is_open, entry.wait_minutes.unwrap_or(0))))
            .collect()
    }
}
