//! Heartbeat pings to an external healthcheck endpoint

use std::time::Duration;

use url::Url;

/// Sends a GET to the configured URL after each completed device check
pub struct HealthcheckPinger {
    client: reqwest::Client,
    url: Url,
}

impl HealthcheckPinger {
    pub fn new(url: Url) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self { client, url })
    }

    /// Send the heartbeat. Failures are logged and never propagated.
    pub async fn ping(&self) -> bool {
        match self.client.get(self.url.clone()).send().await {
            Ok(response) if response.status().is_success() => {
                tracing::debug!("[Healthcheck] Pinged {}", self.url);
                true
            }
            Ok(response) => {
                tracing::warn!("[Healthcheck] {} returned status: {}", self.url, response.status());
                false
            }
            Err(e) => {
                tracing::warn!("[Healthcheck] Failed to ping {}: {}", self.url, e);
                false
            }
        }
    }
}
