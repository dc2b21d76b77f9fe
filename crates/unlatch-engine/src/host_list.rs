//! Externally fetched exclusion lists.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{info, warn};

use crate::error::{EngineError, EngineResult};
use crate::exclusion::ExclusionFilter;

/// A source of newline-delimited host patterns.
#[async_trait]
pub trait HostListSource: Send + Sync {
    /// Fetch the raw pattern lines.
    async fn fetch(&self) -> EngineResult<Vec<String>>;

    /// Human-readable origin for logs.
    fn describe(&self) -> String;
}

/// Host list served over HTTP(S).
pub struct HttpHostList {
    client: Client,
    url: String,
}

impl HttpHostList {
    pub fn new(url: impl Into<String>, timeout: Duration) -> EngineResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("unlatch/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| EngineError::HostList(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl HostListSource for HttpHostList {
    async fn fetch(&self) -> EngineResult<Vec<String>> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| EngineError::HostList(format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(EngineError::HostList(format!(
                "{} returned {}",
                self.url, status
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| EngineError::HostList(format!("Failed to read body: {}", e)))?;
        Ok(parse_host_list(&body))
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}

/// Split a list body into pattern lines; blank lines and `#` comments are ignored.
pub fn parse_host_list(body: &str) -> Vec<String> {
    body.lines()
        .map(|line| line.split('#').next().unwrap_or("").trim())
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Build the exclusion filter from static patterns plus an optional remote list.
///
/// A failing remote source leaves only the static patterns in place.
pub async fn load_exclusions(
    static_patterns: &[String],
    source: Option<&dyn HostListSource>,
) -> ExclusionFilter {
    let mut filter = ExclusionFilter::from_patterns(static_patterns);

    if let Some(source) = source {
        match source.fetch().await {
            Ok(lines) => {
                info!(
                    "Loaded {} exclusion patterns from {}",
                    lines.len(),
                    source.describe()
                );
                filter.extend(lines);
            }
            Err(e) => warn!(
                "Exclusion list {} unavailable, continuing without it: {}",
                source.describe(),
                e
            ),
        }
    }

    filter
}
