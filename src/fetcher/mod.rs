#[cfg(test)]
pub mod fake;
pub mod http_client;

use crate::config::FeedConfig;
use crate::models::{ListingsEnvelope, RawListing, SectionKind};
use anyhow::{Result, bail};
use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use self::http_client::HttpClient;

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("upstream returned HTTP {0}")]
    UpstreamStatus(u16),
    #[error("upstream response is not a listings envelope")]
    MalformedResponse,
    #[error("upstream unreachable")]
    Unreachable,
}

// ── Source trait ──────────────────────────────────────────────────────────────

/// Swappable listings provider.
#[async_trait]
pub trait ListingSource: Send + Sync {
    async fn fetch(&self, kind: SectionKind, limit: u32) -> Result<Vec<RawListing>, FetchError>;
}

// ── HTTP proxy source ─────────────────────────────────────────────────────────

/// Talks to the listings proxy endpoint
/// (`GET <endpoint>?status=..&limit=..&offset=..`).
pub struct HttpListingSource {
    client: HttpClient,
    endpoint: Url,
    offset: u32,
}

impl HttpListingSource {
    pub fn new(config: &FeedConfig) -> Result<Self> {
        if !config.enabled {
            bail!("Listings feed is disabled (set feed.enabled = true)");
        }
        Ok(Self {
            client: HttpClient::new(config)?,
            endpoint: config.endpoint_url()?,
            offset: config.offset,
        })
    }

    fn listings_url(&self, kind: SectionKind, limit: u32) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("status", kind.as_query())
            .append_pair("limit", &limit.to_string())
            .append_pair("offset", &self.offset.to_string());
        url
    }
}

#[async_trait]
impl ListingSource for HttpListingSource {
    async fn fetch(&self, kind: SectionKind, limit: u32) -> Result<Vec<RawListing>, FetchError> {
        let url = self.listings_url(kind, limit);
        let body = self.client.get_bytes(&url).await?;
        let listings = parse_envelope(&body)?;
        info!("{:?}: {} raw listings", kind, listings.len());
        Ok(listings)
    }
}

/// Validate the proxy envelope and unwrap its listings.
pub fn parse_envelope(body: &[u8]) -> Result<Vec<RawListing>, FetchError> {
    let envelope: ListingsEnvelope = serde_json::from_slice(body).map_err(|e| {
        debug!("Envelope rejected: {}", e);
        FetchError::MalformedResponse
    })?;

    if !envelope.success {
        warn!("Envelope reports success=false");
        return Err(FetchError::MalformedResponse);
    }

    if envelope.count != envelope.listings.len() as u64 {
        warn!(
            "Envelope count {} disagrees with {} listings",
            envelope.count,
            envelope.listings.len()
        );
    }

    Ok(envelope
        .listings
        .into_iter()
        .map(RawListing::from_json)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio_test::assert_ok;

    /// Serve a single canned HTTP response on a throwaway port and hand back
    /// the request line the client sent.
    async fn serve_once(status: &'static str, body: String) -> (Url, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 8192];
            let n = sock.read(&mut buf).await.unwrap();
            let request = String::from_utf8_lossy(&buf[..n]).to_string();
            let resp = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            sock.write_all(resp.as_bytes()).await.unwrap();
            sock.shutdown().await.ok();
            request
        });
        let url = Url::parse(&format!("http://{}/listings", addr)).unwrap();
        (url, handle)
    }

    fn feed_config(endpoint: &Url) -> FeedConfig {
        FeedConfig {
            enabled: true,
            endpoint: endpoint.to_string(),
            timeout_secs: 1,
            offset: 5,
            ..FeedConfig::default()
        }
    }

    #[test]
    fn test_parse_envelope_ok() {
        let body = json!({
            "success": true,
            "listings": [{"id": "A1", "status": "Active"}, "garbage"],
            "count": 2
        });
        let listings = assert_ok!(parse_envelope(body.to_string().as_bytes()));
        assert_eq!(listings.len(), 2);
        assert_eq!(listings[0].id, Some(json!("A1")));
        assert_eq!(listings[1], RawListing::default());
    }

    #[test]
    fn test_parse_envelope_rejects_shape_mismatch() {
        let cases = [
            json!({"listings": [], "count": 0}),
            json!({"success": "yes", "listings": [], "count": 0}),
            json!({"success": true, "listings": {"id": 1}, "count": 1}),
            json!({"success": true, "listings": [], "count": -1}),
            json!({"success": false, "listings": [], "count": 0}),
            json!([1, 2, 3]),
        ];
        for case in cases {
            assert_eq!(
                parse_envelope(case.to_string().as_bytes()),
                Err(FetchError::MalformedResponse),
                "{}",
                case
            );
        }
        assert_eq!(parse_envelope(b"<html>"), Err(FetchError::MalformedResponse));
    }

    #[test]
    fn test_parse_envelope_tolerates_count_mismatch() {
        let body = json!({"success": true, "listings": [{}], "count": 7});
        assert_eq!(assert_ok!(parse_envelope(body.to_string().as_bytes())).len(), 1);
    }

    #[test]
    fn test_disabled_feed_rejected() {
        let cfg = FeedConfig::default();
        assert!(HttpListingSource::new(&cfg).is_err());
    }

    #[tokio::test]
    async fn test_fetch_success_sends_query() {
        let body = json!({"success": true, "listings": [{"id": "S1", "status": "Sold"}], "count": 1});
        let (url, server) = serve_once("200 OK", body.to_string()).await;
        let mut cfg = feed_config(&url);
        cfg.username = Some("agent".into());
        cfg.password = Some("secret".into());
        let source = HttpListingSource::new(&cfg).unwrap();

        let listings = assert_ok!(source.fetch(SectionKind::Sold, 6).await);
        assert_eq!(listings.len(), 1);

        let request = server.await.unwrap();
        let request_line = request.lines().next().unwrap();
        assert!(request_line.starts_with("GET /listings?status=Sold&limit=6&offset=5 "));
        assert!(request.to_ascii_lowercase().contains("authorization: basic "));
    }

    #[tokio::test]
    async fn test_fetch_non_2xx_is_upstream_status() {
        let (url, _server) = serve_once("503 Service Unavailable", "{}".into()).await;
        let source = HttpListingSource::new(&feed_config(&url)).unwrap();
        assert_eq!(
            source.fetch(SectionKind::Active, 10).await,
            Err(FetchError::UpstreamStatus(503))
        );
    }

    #[tokio::test]
    async fn test_fetch_bad_body_is_malformed() {
        let (url, _server) = serve_once("200 OK", "{\"listings\": 12}".into()).await;
        let source = HttpListingSource::new(&feed_config(&url)).unwrap();
        assert_eq!(
            source.fetch(SectionKind::Active, 10).await,
            Err(FetchError::MalformedResponse)
        );
    }

    #[tokio::test]
    async fn test_fetch_closed_port_is_unreachable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let url = Url::parse(&format!("http://{}/listings", addr)).unwrap();
        let source = HttpListingSource::new(&feed_config(&url)).unwrap();
        assert_eq!(
            source.fetch(SectionKind::Active, 10).await,
            Err(FetchError::Unreachable)
        );
    }

    #[tokio::test]
    async fn test_fetch_hung_upstream_times_out_as_unreachable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let _hang = tokio::spawn(async move {
            let (_sock, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
        });
        let url = Url::parse(&format!("http://{}/listings", addr)).unwrap();
        let source = HttpListingSource::new(&feed_config(&url)).unwrap();
        assert_eq!(
            source.fetch(SectionKind::Sold, 6).await,
            Err(FetchError::Unreachable)
        );
    }
}
