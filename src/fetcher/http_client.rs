use crate::config::FeedConfig;
use anyhow::{Context, Result};
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use tracing::{debug, warn};
use url::Url;

use super::FetchError;

/// Thin reqwest wrapper: one bounded-timeout GET per call, no retries.
pub struct HttpClient {
    inner: reqwest::Client,
    credentials: Option<(String, Option<String>)>,
}

impl HttpClient {
    pub fn new(config: &FeedConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let inner = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout())
            .default_headers(headers)
            .gzip(true)
            .build()
            .context("Failed to build HTTP client")?;

        let credentials = config
            .username
            .as_ref()
            .filter(|u| !u.is_empty())
            .map(|u| (u.clone(), config.password.clone()));

        Ok(Self { inner, credentials })
    }

    /// GET a URL and return the body bytes.
    ///
    /// Transport failures (connect, timeout, truncated body) → `Unreachable`;
    /// non-2xx → `UpstreamStatus`.
    pub async fn get_bytes(&self, url: &Url) -> Result<Vec<u8>, FetchError> {
        debug!("GET {}", url);

        let mut req = self.inner.get(url.as_str());
        if let Some((user, pass)) = &self.credentials {
            req = req.basic_auth(user, pass.as_ref());
        }

        let resp = req.send().await.map_err(|e| {
            warn!("Request to {} failed: {}", url, e);
            FetchError::Unreachable
        })?;

        let status = resp.status();
        if !status.is_success() {
            warn!("Upstream returned {} for {}", status, url);
            return Err(FetchError::UpstreamStatus(status.as_u16()));
        }

        let body = resp.bytes().await.map_err(|e| {
            warn!("Reading body from {} failed: {}", url, e);
            FetchError::Unreachable
        })?;

        Ok(body.to_vec())
    }
}
