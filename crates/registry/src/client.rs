//! Registry client: paginated study search over HTTP.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Deserialize;
use tracing::{debug, info, warn};
use trialscout_config::AppConfig;
use trialscout_core::error::RegistryError;
use trialscout_core::event::{DomainEvent, EventBus};
use trialscout_core::StudyRecord;

use crate::params::{OVERALL_STATUS, PAGE_TOKEN, SearchParams};

pub const DEFAULT_BASE_URL: &str = "https://clinicaltrials.gov/api/v2/studies";
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

pub struct RegistryClient {
    base_url: String,
    client: reqwest::Client,
    default_statuses: Vec<String>,
    events: Option<Arc<EventBus>>,
}

/// One page of the registry's study search response.
#[derive(Debug, Deserialize)]
struct StudyPage {
    #[serde(default)]
    studies: Vec<serde_json::Value>,
    #[serde(default, rename = "nextPageToken")]
    next_page_token: Option<String>,
}

impl RegistryClient {
    /// A client for `base_url` whose requests give up after `timeout`.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, RegistryError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RegistryError::Network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
            default_statuses: Vec::new(),
            events: None,
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, RegistryError> {
        Ok(Self::new(
            config.registry.base_url.clone(),
            Duration::from_secs(config.request_timeout_secs),
        )?
        .with_default_statuses(config.registry.default_statuses.clone()))
    }

    /// Statuses applied when the parameters carry no `filter.overallStatus`.
    pub fn with_default_statuses(mut self, statuses: Vec<String>) -> Self {
        self.default_statuses = statuses;
        self
    }

    pub fn with_event_bus(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch every study matching `params`, following `nextPageToken` until
    /// the registry stops returning one.
    pub async fn fetch_studies(&self, params: &SearchParams) -> Result<Vec<StudyRecord>, RegistryError> {
        let pairs = self.query_pairs(params);
        let mut studies = Vec::new();
        let mut seen_tokens = HashSet::new();
        let mut token: Option<String> = None;
        let mut pages = 0usize;

        loop {
            let page = self.fetch_page(&pairs, token.as_deref()).await?;
            pages += 1;
            debug!(page = pages, studies = page.studies.len(), "Fetched registry page");
            studies.extend(page.studies.into_iter().map(StudyRecord::new));

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(next) => {
                    if !seen_tokens.insert(next.clone()) {
                        warn!(token = %next, "Registry repeated a page token");
                        return Err(RegistryError::PaginationLoop(next));
                    }
                    token = Some(next);
                }
                None => break,
            }
        }

        info!(
            studies = studies.len(),
            pages,
            condition = params.condition().unwrap_or_default(),
            "Fetched studies from registry"
        );
        if let Some(events) = &self.events {
            events.publish(DomainEvent::StudiesFetched {
                count: studies.len(),
                pages,
                timestamp: Utc::now(),
            });
        }

        Ok(studies)
    }

    fn query_pairs(&self, params: &SearchParams) -> Vec<(String, String)> {
        let mut pairs = params.to_query_pairs();
        if !params.contains(OVERALL_STATUS) && !self.default_statuses.is_empty() {
            pairs.push((OVERALL_STATUS.to_string(), self.default_statuses.join("|")));
        }
        pairs
    }

    async fn fetch_page(
        &self,
        pairs: &[(String, String)],
        token: Option<&str>,
    ) -> Result<StudyPage, RegistryError> {
        let mut request = self.client.get(&self.base_url).query(pairs);
        if let Some(token) = token {
            request = request.query(&[(PAGE_TOKEN, token)]);
        }

        let response = request.send().await.map_err(map_transport_error)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), body = %body, "Registry returned error");
            return Err(RegistryError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await.map_err(map_transport_error)?;
        serde_json::from_str(&body).map_err(|e| RegistryError::InvalidResponse(e.to_string()))
    }
}

fn map_transport_error(e: reqwest::Error) -> RegistryError {
    if e.is_timeout() {
        RegistryError::Timeout(e.to_string())
    } else {
        RegistryError::Network(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ParamValue;

    fn client() -> RegistryClient {
        RegistryClient::new("https://registry.test/api/v2/studies/", Duration::from_secs(5))
            .unwrap()
            .with_default_statuses(vec!["RECRUITING".into(), "AVAILABLE".into()])
    }

    #[test]
    fn trailing_slash_trimmed() {
        assert_eq!(client().base_url(), "https://registry.test/api/v2/studies");
    }

    #[test]
    fn default_statuses_fill_a_missing_filter() {
        let pairs = client().query_pairs(&SearchParams::for_condition("asthma"));
        assert!(pairs.contains(&("filter.overallStatus".into(), "RECRUITING|AVAILABLE".into())));
    }

    #[test]
    fn explicit_statuses_win() {
        let mut params = SearchParams::for_condition("asthma");
        params
            .set(OVERALL_STATUS, ParamValue::List(vec!["COMPLETED".into()]))
            .unwrap();
        let pairs = client().query_pairs(&params);
        let statuses: Vec<_> = pairs.iter().filter(|(k, _)| k == OVERALL_STATUS).collect();
        assert_eq!(statuses.len(), 1);
        assert_eq!(statuses[0].1, "COMPLETED");
    }

    #[test]
    fn page_shape_tolerates_missing_fields() {
        let page: StudyPage = serde_json::from_str("{}").unwrap();
        assert!(page.studies.is_empty());
        assert!(page.next_page_token.is_none());
    }
}
