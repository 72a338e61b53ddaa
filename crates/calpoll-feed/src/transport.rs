//! The transport seam between the scheduler and the network.
//!
//! [`Transport`] performs one GET and reports what came back; it never
//! interprets status codes. [`HttpTransport`] is the reqwest-backed
//! implementation used outside tests.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use reqwest::Client;
use tracing::{debug, trace};
use url::Url;

use crate::auth::authorization_header;
use crate::config::FeedConfig;
use crate::error::{FeedError, FeedResult};

/// A boxed future for async trait methods.
///
/// Boxing keeps [`Transport`] object-safe so sessions can hold an
/// `Arc<dyn Transport>`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The `User-Agent` sent with every feed request.
pub fn user_agent() -> String {
    format!("calpoll/{}", env!("CARGO_PKG_VERSION"))
}

/// A single GET request for a feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub url: Url,
    pub headers: Vec<(String, String)>,
    /// Skip certificate validation.
    pub accept_invalid_certs: bool,
}

impl FetchRequest {
    /// Builds the request for a feed: user agent, credentials and TLS mode.
    pub fn for_feed(config: &FeedConfig) -> Self {
        let mut headers = vec![("User-Agent".to_string(), user_agent())];
        if let Some(value) = authorization_header(&config.credential) {
            headers.push(("Authorization".to_string(), value));
        }

        Self {
            url: config.url.clone(),
            headers,
            accept_invalid_certs: config.accept_insecure_transport,
        }
    }

    /// Returns the first header with the given name (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

/// What the server answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: u16,
    pub status_text: String,
    pub headers: Vec<(String, String)>,
    /// The payload. Only read for successful responses.
    pub body: String,
}

impl FetchResponse {
    /// Creates a 200 response with the given body.
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            status_text: "OK".to_string(),
            headers: Vec::new(),
            body: body.into(),
        }
    }

    /// Creates an empty response with the given status.
    pub fn with_status(status: u16, status_text: impl Into<String>) -> Self {
        Self {
            status,
            status_text: status_text.into(),
            headers: Vec::new(),
            body: String::new(),
        }
    }

    /// Builder method to add a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Returns true for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Returns the first header with the given name (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// Performs feed requests.
///
/// Implementations resolve to `Err` only when no response was obtained
/// (connection, TLS, timeout). Every HTTP status is an `Ok` response.
pub trait Transport: Send + Sync {
    fn fetch<'a>(&'a self, request: &'a FetchRequest) -> BoxFuture<'a, FeedResult<FetchResponse>>;
}

/// reqwest-backed transport.
///
/// Holds one client per TLS mode so connections are pooled across fetches.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    strict: Client,
    insecure: Client,
}

impl HttpTransport {
    /// Default request timeout in seconds.
    pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

    /// Creates a transport with the default timeout.
    pub fn new() -> FeedResult<Self> {
        Self::with_timeout(Duration::from_secs(Self::DEFAULT_TIMEOUT_SECS))
    }

    /// Creates a transport with a custom request timeout.
    pub fn with_timeout(timeout: Duration) -> FeedResult<Self> {
        Ok(Self {
            strict: build_client(timeout, false)?,
            insecure: build_client(timeout, true)?,
        })
    }

    fn client(&self, accept_invalid_certs: bool) -> &Client {
        if accept_invalid_certs {
            &self.insecure
        } else {
            &self.strict
        }
    }
}

fn build_client(timeout: Duration, accept_invalid_certs: bool) -> FeedResult<Client> {
    Client::builder()
        .danger_accept_invalid_certs(accept_invalid_certs)
        .timeout(timeout)
        .build()
        .map_err(|e| FeedError::transport(format!("failed to create HTTP client: {}", e)).with_source(e))
}

impl Transport for HttpTransport {
    fn fetch<'a>(&'a self, request: &'a FetchRequest) -> BoxFuture<'a, FeedResult<FetchResponse>> {
        Box::pin(async move {
            debug!(url = %request.url, insecure = request.accept_invalid_certs, "GET feed");

            let mut builder = self
                .client(request.accept_invalid_certs)
                .get(request.url.as_str());
            for (name, value) in &request.headers {
                builder = builder.header(name.as_str(), value.as_str());
            }

            let response = builder.send().await.map_err(|e| {
                FeedError::transport(format!("request failed: {}", e))
                    .with_url(request.url.as_str())
                    .with_source(e)
            })?;

            let status = response.status();
            let headers = response
                .headers()
                .iter()
                .filter_map(|(name, value)| {
                    value
                        .to_str()
                        .ok()
                        .map(|v| (name.as_str().to_string(), v.to_string()))
                })
                .collect();
            trace!(status = status.as_u16(), "feed responded");

            let body = if status.is_success() {
                response.text().await.map_err(|e| {
                    FeedError::transport(format!("failed to read response body: {}", e))
                        .with_url(request.url.as_str())
                        .with_source(e)
                })?
            } else {
                String::new()
            };

            Ok(FetchResponse {
                status: status.as_u16(),
                status_text: status.canonical_reason().unwrap_or_default().to_string(),
                headers,
                body,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Credential;

    #[test]
    fn request_for_feed_carries_credentials() {
        let config = FeedConfig::new("https://example.com/cal.ics")
            .unwrap()
            .with_credential(Credential::Bearer {
                token: "abc".to_string(),
            })
            .with_insecure_transport(true);

        let request = FetchRequest::for_feed(&config);

        assert_eq!(request.header("authorization"), Some("Bearer abc"));
        assert!(request.header("user-agent").unwrap().starts_with("calpoll/"));
        assert!(request.accept_invalid_certs);
    }

    #[test]
    fn request_without_credentials_has_no_authorization() {
        let config = FeedConfig::new("https://example.com/cal.ics").unwrap();
        let request = FetchRequest::for_feed(&config);
        assert!(request.header("Authorization").is_none());
        assert!(!request.accept_invalid_certs);
    }

    #[test]
    fn response_headers_are_case_insensitive() {
        let response =
            FetchResponse::with_status(429, "Too Many Requests").with_header("Retry-After", "120");
        assert_eq!(response.header("retry-after"), Some("120"));
        assert!(!response.is_success());
        assert!(FetchResponse::ok("BEGIN:VCALENDAR").is_success());
    }

    #[test]
    fn http_transport_builds() {
        assert!(HttpTransport::new().is_ok());
    }
}
