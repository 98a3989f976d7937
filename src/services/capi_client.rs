//! HTTP client for the provider's Conversions API events endpoint.

use reqwest::Client;
use tracing::{debug, warn};

use crate::config::ProviderConfig;
use crate::models::CapiPayload;

#[derive(Debug, Clone)]
pub struct CapiClient {
    http: Client,
    base_url: String,
}

impl CapiClient {
    /// `base_url` is the version-prefixed API root, e.g.
    /// `https://graph.facebook.com/v18.0`. Injectable so tests can point the
    /// relay at a local mock.
    pub fn new(base_url: String) -> anyhow::Result<Self> {
        // No client-side timeout: the hosting platform's request deadline is
        // the only cutoff, matching the single-attempt semantics of the
        // relay.
        let http = Client::builder().build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn events_url(&self, provider: &ProviderConfig) -> String {
        format!(
            "{}/{}/events?access_token={}",
            self.base_url, provider.pixel_id, provider.access_token
        )
    }

    /// Posts the single-event batch and returns the provider's HTTP status.
    /// The response body is only ever logged; nothing downstream branches on
    /// it.
    pub async fn send_events(
        &self,
        provider: &ProviderConfig,
        payload: &CapiPayload,
    ) -> Result<u16, reqwest::Error> {
        let response = self
            .http
            .post(self.events_url(provider))
            .json(payload)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if status.is_success() {
            debug!(status = status.as_u16(), %body, "provider accepted events batch");
        } else {
            warn!(status = status.as_u16(), %body, "provider rejected events batch");
        }
        Ok(status.as_u16())
    }
}
