//! Remote elevation service client.
//!
//! Lookups are fire-and-forget: the coordinator hands a [`QueryRequest`] to an
//! [`ElevationService`], which issues it without blocking and without
//! reporting back. Response handling is intentionally absent; the only
//! observable outcome of a confirmed lookup is its timeout guard.

use std::fmt;
use std::fmt::Write as _;
use std::time::Duration;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::runtime::Handle;
use tokio_util::task::TaskTracker;

use crate::dataset::DatasetId;
use crate::point::Point;

/// Default public API root.
pub const DEFAULT_BASE_URL: &str = "https://api.opentopodata.org/v1";

/// Default transport timeout for the HTTP client.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors from talking to the remote service.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The HTTP client could not be constructed.
    #[error("Failed to create HTTP client: {0}")]
    ClientBuild(String),

    /// The request could not be sent or the body could not be read.
    #[error("Request to {url} failed: {reason}")]
    Http { url: String, reason: String },

    /// The server answered with a non-success HTTP status.
    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    /// The response body was not the expected JSON.
    #[error("Failed to decode response from {url}: {reason}")]
    Decode { url: String, reason: String },

    /// The server reported a non-OK status in its JSON body.
    #[error("Server at {url} reported status {status}")]
    ServerStatus { url: String, status: String },
}

/// Whether a lookup is speculative or user-initiated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryMode {
    /// Cache-warming lookup; never rendered.
    Prefetch,
    /// Lookup triggered by form submission.
    Confirmed,
}

impl QueryMode {
    /// Short name for logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryMode::Prefetch => "prefetch",
            QueryMode::Confirmed => "confirmed",
        }
    }
}

impl fmt::Display for QueryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Endpoint settings for the remote service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    /// API root, e.g. `https://api.opentopodata.org/v1`.
    pub base_url: String,

    /// Whether requests carry the `demo` marker.
    pub demo: bool,

    /// Transport-level timeout for each HTTP request.
    pub http_timeout: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            demo: true,
            http_timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }
}

impl ServiceConfig {
    /// Create a config for the given API root.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Enable or disable the `demo` marker.
    pub fn with_demo(mut self, demo: bool) -> Self {
        self.demo = demo;
        self
    }

    /// Set the transport timeout.
    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    /// API root without a trailing slash.
    pub fn api_root(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    /// Server root: the API root with a trailing `/v1` segment removed.
    ///
    /// The catalog and health endpoints live here.
    pub fn server_root(&self) -> &str {
        let api = self.api_root();
        api.strip_suffix("/v1").unwrap_or(api)
    }
}

/// One lookup for one dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRequest {
    pub point: Point,
    pub dataset: DatasetId,
    pub mode: QueryMode,
}

impl QueryRequest {
    pub fn new(point: Point, dataset: DatasetId, mode: QueryMode) -> Self {
        Self {
            point,
            dataset,
            mode,
        }
    }

    /// Request URL: `{root}/{dataset}?[prefetch&][demo&]locations={lat},{lon}`.
    pub fn url(&self, config: &ServiceConfig) -> String {
        let mut url = format!("{}/{}?", config.api_root(), encode_component(self.dataset.as_str()));
        if self.mode == QueryMode::Prefetch {
            url.push_str("prefetch&");
        }
        if config.demo {
            url.push_str("demo&");
        }
        url.push_str("locations=");
        url.push_str(&encode_component(&self.point.token()));
        url
    }
}

/// Percent-encode everything except unreserved characters and `,`.
fn encode_component(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for byte in text.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' | b',' => {
                out.push(byte as char)
            }
            _ => {
                let _ = write!(out, "%{:02X}", byte);
            }
        }
    }
    out
}

/// Issues lookups against the remote service.
///
/// `dispatch` must return promptly; any I/O happens in the background and
/// its outcome is not reported to the caller.
pub trait ElevationService: Send + Sync {
    fn dispatch(&self, request: &QueryRequest);
}

/// HTTP implementation backed by `reqwest`, running requests on a Tokio
/// runtime.
#[derive(Debug, Clone)]
pub struct HttpElevationService {
    client: reqwest::Client,
    config: ServiceConfig,
    runtime: Handle,
    in_flight: TaskTracker,
}

impl HttpElevationService {
    /// Create a client that spawns requests onto `runtime`.
    pub fn new(config: ServiceConfig, runtime: Handle) -> Result<Self, ServiceError> {
        let client = build_client(&config)?;
        Ok(Self {
            client,
            config,
            runtime,
            in_flight: TaskTracker::new(),
        })
    }

    /// Number of lookups still in flight.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Wait until every lookup issued so far has finished.
    ///
    /// Lookups are never awaited by the coordinator; this exists so a
    /// short-lived process does not exit before its requests are sent.
    pub async fn wait_idle(&self) {
        self.in_flight.close();
        self.in_flight.wait().await;
        self.in_flight.reopen();
    }

    /// Endpoint settings.
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Underlying HTTP client, shared with the catalog calls.
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }
}

/// Build a `reqwest` client honouring the configured transport timeout.
pub fn build_client(config: &ServiceConfig) -> Result<reqwest::Client, ServiceError> {
    reqwest::Client::builder()
        .timeout(config.http_timeout)
        .user_agent(concat!("pointquery/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| ServiceError::ClientBuild(e.to_string()))
}

impl ElevationService for HttpElevationService {
    fn dispatch(&self, request: &QueryRequest) {
        let url = request.url(&self.config);
        let mode = request.mode;
        let dataset = request.dataset.clone();
        let client = self.client.clone();

        tracing::debug!(dataset = %dataset, mode = %mode, url = %url, "Dispatching lookup");

        self.runtime.spawn(self.in_flight.track_future(async move {
            match client.get(&url).send().await {
                Ok(response) => {
                    tracing::debug!(
                        dataset = %dataset,
                        mode = %mode,
                        status = response.status().as_u16(),
                        "Lookup answered"
                    );
                }
                Err(e) => {
                    tracing::debug!(dataset = %dataset, mode = %mode, error = %e, "Lookup failed");
                }
            }
        }));
    }
}

/// Service that records requests instead of sending them.
///
/// Used for dry runs and in tests.
#[derive(Debug, Default)]
pub struct RecordingService {
    config: ServiceConfig,
    requests: Mutex<Vec<QueryRequest>>,
}

impl RecordingService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record against a specific endpoint so [`urls`](Self::urls) matches
    /// what would have been sent.
    pub fn with_config(config: ServiceConfig) -> Self {
        Self {
            config,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Every request dispatched so far, in order.
    pub fn requests(&self) -> Vec<QueryRequest> {
        self.requests.lock().clone()
    }

    /// URLs of every request dispatched so far.
    pub fn urls(&self) -> Vec<String> {
        self.requests
            .lock()
            .iter()
            .map(|request| request.url(&self.config))
            .collect()
    }

    /// Number of requests dispatched in `mode`.
    pub fn count(&self, mode: QueryMode) -> usize {
        self.requests
            .lock()
            .iter()
            .filter(|request| request.mode == mode)
            .count()
    }

    /// Forget recorded requests.
    pub fn clear(&self) {
        self.requests.lock().clear();
    }
}

impl ElevationService for RecordingService {
    fn dispatch(&self, request: &QueryRequest) {
        tracing::info!(url = %request.url(&self.config), mode = %request.mode, "Recorded lookup");
        self.requests.lock().push(request.clone());
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::point::validate;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::mpsc;

    /// Local HTTP server answering every request with one canned response.
    ///
    /// Records the request line of each request it serves.
    pub(crate) struct StubServer {
        pub base_url: String,
        request_lines: mpsc::UnboundedReceiver<String>,
    }

    impl StubServer {
        pub async fn start(status: u16, body: &'static str) -> Self {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            let (tx, request_lines) = mpsc::unbounded_channel();

            tokio::spawn(async move {
                while let Ok((mut socket, _)) = listener.accept().await {
                    let mut request = Vec::new();
                    let mut chunk = [0u8; 1024];
                    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                        match socket.read(&mut chunk).await {
                            Ok(0) | Err(_) => break,
                            Ok(n) => request.extend_from_slice(&chunk[..n]),
                        }
                    }

                    let text = String::from_utf8_lossy(&request);
                    let line = text.lines().next().unwrap_or_default().to_string();
                    let _ = tx.send(line);

                    let response = format!(
                        "HTTP/1.1 {} Stub\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                        status,
                        body.len(),
                        body
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                }
            });

            Self {
                base_url: format!("http://{}/v1", addr),
                request_lines,
            }
        }

        pub fn config(&self) -> ServiceConfig {
            ServiceConfig::new(self.base_url.clone())
                .with_http_timeout(Duration::from_secs(5))
        }

        /// Request line of the next request served, e.g. `GET /health HTTP/1.1`.
        pub async fn next_request_line(&mut self) -> String {
            self.request_lines.recv().await.unwrap()
        }
    }

    fn request(mode: QueryMode) -> QueryRequest {
        QueryRequest::new(
            validate("12.5", "-8.3").unwrap(),
            DatasetId::from("srtm30m"),
            mode,
        )
    }

    #[test]
    fn test_confirmed_url() {
        let config = ServiceConfig::default();
        assert_eq!(
            request(QueryMode::Confirmed).url(&config),
            "https://api.opentopodata.org/v1/srtm30m?demo&locations=12.5,-8.3"
        );
    }

    #[test]
    fn test_prefetch_url_carries_marker() {
        let config = ServiceConfig::default();
        assert_eq!(
            request(QueryMode::Prefetch).url(&config),
            "https://api.opentopodata.org/v1/srtm30m?prefetch&demo&locations=12.5,-8.3"
        );
    }

    #[test]
    fn test_url_without_demo_and_trailing_slash() {
        let config = ServiceConfig::new("http://localhost:5000/v1/").with_demo(false);
        assert_eq!(
            request(QueryMode::Confirmed).url(&config),
            "http://localhost:5000/v1/srtm30m?locations=12.5,-8.3"
        );
    }

    #[test]
    fn test_plus_sign_is_encoded() {
        let config = ServiceConfig::new("http://localhost/v1").with_demo(false);
        let request = QueryRequest::new(
            validate("+1", "2").unwrap(),
            DatasetId::from("a b"),
            QueryMode::Confirmed,
        );
        assert_eq!(request.url(&config), "http://localhost/v1/a%20b?locations=%2B1,2");
    }

    #[test]
    fn test_server_root() {
        assert_eq!(ServiceConfig::default().server_root(), "https://api.opentopodata.org");
        assert_eq!(ServiceConfig::new("http://host/api/").server_root(), "http://host/api");
    }

    #[test]
    fn test_recording_service() {
        let service = RecordingService::new();
        service.dispatch(&request(QueryMode::Prefetch));
        service.dispatch(&request(QueryMode::Confirmed));

        assert_eq!(service.count(QueryMode::Prefetch), 1);
        assert_eq!(service.count(QueryMode::Confirmed), 1);
        assert_eq!(service.urls().len(), 2);
        assert!(service.urls()[0].contains("?prefetch&demo&"));

        service.clear();
        assert!(service.requests().is_empty());
    }

    #[tokio::test]
    async fn test_http_dispatch_sends_request() {
        let mut server = StubServer::start(200, r#"{"status": "OK", "results": []}"#).await;
        let service = HttpElevationService::new(server.config(), Handle::current()).unwrap();

        service.dispatch(&request(QueryMode::Prefetch));
        service.wait_idle().await;

        assert_eq!(
            server.next_request_line().await,
            "GET /v1/srtm30m?prefetch&demo&locations=12.5,-8.3 HTTP/1.1"
        );
        assert_eq!(service.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_http_dispatch_failure_is_swallowed() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let config = ServiceConfig::new(format!("http://{}/v1", addr));
        let service = HttpElevationService::new(config, Handle::current()).unwrap();

        service.dispatch(&request(QueryMode::Confirmed));
        service.wait_idle().await;
        assert_eq!(service.in_flight(), 0);
    }

    #[test]
    fn test_mode_display() {
        assert_eq!(QueryMode::Prefetch.to_string(), "prefetch");
        assert_eq!(QueryMode::Confirmed.to_string(), "confirmed");
    }
}
