//! Out-of-band customer resolution against the provider API.
//!
//! A failed charge often carries only an opaque customer reference. When a
//! provider API key is configured, the handler resolves it to a name and
//! email for the alert. Resolution is strictly best-effort: any failure
//! (HTTP error, timeout, unexpected body) logs a warning and returns `None`,
//! and the formatter substitutes defaults. A lookup failure must never fail
//! the notification pipeline.

use std::time::Duration;

use serde::Deserialize;

use crate::config::ProviderConfig;
use crate::errors::Error;

const LOOKUP_TIMEOUT: Duration = Duration::from_secs(10);

/// Customer details resolved from the provider.
#[derive(Debug, Clone, Deserialize)]
pub struct CustomerInfo {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

pub struct CustomerClient {
    http: reqwest::Client,
    api_base: String,
    api_key: String,
}

impl CustomerClient {
    pub fn new(config: &ProviderConfig) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .timeout(LOOKUP_TIMEOUT)
            .build()
            .map_err(|e| Error::Internal {
                operation: format!("create provider HTTP client: {e}"),
            })?;

        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    /// Resolve a customer reference, or `None` on any failure.
    pub async fn lookup(&self, customer_id: &str) -> Option<CustomerInfo> {
        let url = format!("{}/v1/customers/{customer_id}", self.api_base);

        let response = match self.http.get(&url).bearer_auth(&self.api_key).send().await {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(customer_id, error = %e, "Customer lookup request failed");
                return None;
            }
        };

        if !response.status().is_success() {
            tracing::warn!(
                customer_id,
                status = response.status().as_u16(),
                "Customer lookup returned non-success status"
            );
            return None;
        }

        match response.json::<CustomerInfo>().await {
            Ok(info) => {
                tracing::debug!(customer_id, "Resolved customer");
                Some(info)
            }
            Err(e) => {
                tracing::warn!(customer_id, error = %e, "Customer lookup returned unexpected body");
                None
            }
        }
    }
}
