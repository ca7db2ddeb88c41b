//! Dataset catalog and health endpoints.
//!
//! The service publishes the datasets it serves at `{server}/datasets` and a
//! liveness probe at `{server}/health`. Both answer with a small JSON body
//! carrying a `status` field of `"OK"` or `"SERVER_ERROR"`.

use serde::Deserialize;

use crate::dataset::DatasetId;
use crate::service::{ServiceConfig, ServiceError};

/// One dataset advertised by the server.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CatalogEntry {
    /// Dataset name, usable as a [`DatasetId`].
    pub name: String,

    /// Member datasets when this entry is a multi-dataset.
    #[serde(default)]
    pub child_datasets: Vec<String>,
}

impl CatalogEntry {
    pub fn id(&self) -> DatasetId {
        DatasetId::new(self.name.clone())
    }

    /// Whether the entry aggregates other datasets.
    pub fn is_multi(&self) -> bool {
        !self.child_datasets.is_empty()
    }
}

#[derive(Debug, Deserialize)]
struct CatalogResponse {
    status: String,
    #[serde(default)]
    results: Vec<CatalogEntry>,
}

#[derive(Debug, Deserialize)]
struct HealthResponse {
    status: String,
}

/// Result of a health probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    Ok,
    ServerError,
}

const STATUS_OK: &str = "OK";

/// Fetch the list of datasets served at the configured endpoint.
pub async fn fetch_catalog(
    client: &reqwest::Client,
    config: &ServiceConfig,
) -> Result<Vec<CatalogEntry>, ServiceError> {
    let url = format!("{}/datasets", config.server_root());
    let (status, body) = get_body(client, &url).await?;

    let response = parse_catalog(&url, &body).map_err(|e| match status {
        Some(code) => ServiceError::Status { url: url.clone(), status: code },
        None => e,
    })?;

    tracing::info!(url = %url, datasets = response.len(), "Fetched dataset catalog");
    Ok(response)
}

/// Probe the server's health endpoint.
///
/// A reachable server reporting `SERVER_ERROR` is a successful probe with a
/// [`HealthStatus::ServerError`] result.
pub async fn check_health(
    client: &reqwest::Client,
    config: &ServiceConfig,
) -> Result<HealthStatus, ServiceError> {
    let url = format!("{}/health", config.server_root());
    let (status, body) = get_body(client, &url).await?;

    match serde_json::from_slice::<HealthResponse>(&body) {
        Ok(health) if health.status == STATUS_OK => Ok(HealthStatus::Ok),
        Ok(health) => {
            tracing::warn!(url = %url, status = %health.status, "Server reported unhealthy");
            Ok(HealthStatus::ServerError)
        }
        Err(e) => Err(match status {
            Some(code) => ServiceError::Status { url, status: code },
            None => ServiceError::Decode {
                url,
                reason: e.to_string(),
            },
        }),
    }
}

/// GET `url`, returning the body and the HTTP status when it was not a
/// success.
async fn get_body(
    client: &reqwest::Client,
    url: &str,
) -> Result<(Option<u16>, Vec<u8>), ServiceError> {
    let response = client.get(url).send().await.map_err(|e| ServiceError::Http {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    let failed_status = if response.status().is_success() {
        None
    } else {
        Some(response.status().as_u16())
    };

    let body = response.bytes().await.map_err(|e| ServiceError::Http {
        url: url.to_string(),
        reason: format!("Failed to read response: {}", e),
    })?;

    Ok((failed_status, body.to_vec()))
}

/// Decode a `/datasets` body, sorted by name as the server does.
fn parse_catalog(url: &str, body: &[u8]) -> Result<Vec<CatalogEntry>, ServiceError> {
    let response: CatalogResponse =
        serde_json::from_slice(body).map_err(|e| ServiceError::Decode {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    if response.status != STATUS_OK {
        return Err(ServiceError::ServerStatus {
            url: url.to_string(),
            status: response.status,
        });
    }

    let mut entries = response.results;
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::build_client;
    use crate::service::tests::StubServer;

    const URL: &str = "http://localhost/datasets";

    #[test]
    fn test_parse_catalog() {
        let body = br#"{
            "status": "OK",
            "results": [
                {"name": "srtm30m", "child_datasets": []},
                {"name": "aster30m", "child_datasets": []},
                {"name": "eudem-srtm", "child_datasets": ["eudem25m", "srtm30m"]}
            ]
        }"#;

        let entries = parse_catalog(URL, body).unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["aster30m", "eudem-srtm", "srtm30m"]);
        assert!(entries[1].is_multi());
        assert!(!entries[0].is_multi());
        assert_eq!(entries[2].id(), DatasetId::from("srtm30m"));
    }

    #[test]
    fn test_parse_catalog_missing_children() {
        let body = br#"{"status": "OK", "results": [{"name": "etopo1"}]}"#;
        let entries = parse_catalog(URL, body).unwrap();
        assert!(entries[0].child_datasets.is_empty());
    }

    #[test]
    fn test_parse_catalog_server_error() {
        let body = br#"{"status": "SERVER_ERROR"}"#;
        let err = parse_catalog(URL, body).unwrap_err();
        assert!(matches!(err, ServiceError::ServerStatus { ref status, .. } if status == "SERVER_ERROR"));
    }

    #[test]
    fn test_parse_catalog_garbage() {
        let err = parse_catalog(URL, b"<html>").unwrap_err();
        assert!(matches!(err, ServiceError::Decode { .. }));
        assert!(err.to_string().contains(URL));
    }

    #[tokio::test]
    async fn test_fetch_catalog_over_http() {
        let mut server = StubServer::start(
            200,
            r#"{"status": "OK", "results": [{"name": "srtm30m"}, {"name": "aster30m"}]}"#,
        )
        .await;
        let config = server.config();
        let client = build_client(&config).unwrap();

        let entries = fetch_catalog(&client, &config).await.unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["aster30m", "srtm30m"]);
        assert_eq!(server.next_request_line().await, "GET /datasets HTTP/1.1");
    }

    #[tokio::test]
    async fn test_fetch_catalog_http_error_status() {
        let server = StubServer::start(503, "Service Unavailable").await;
        let config = server.config();
        let client = build_client(&config).unwrap();

        let err = fetch_catalog(&client, &config).await.unwrap_err();
        assert!(matches!(err, ServiceError::Status { status: 503, .. }));
    }

    #[tokio::test]
    async fn test_fetch_catalog_unreachable() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let config = ServiceConfig::new(format!("http://{}/v1", addr));
        let client = build_client(&config).unwrap();
        let err = fetch_catalog(&client, &config).await.unwrap_err();
        assert!(matches!(err, ServiceError::Http { .. }));
    }

    #[tokio::test]
    async fn test_check_health_ok() {
        let mut server = StubServer::start(200, r#"{"status": "OK"}"#).await;
        let config = server.config();
        let client = build_client(&config).unwrap();

        assert_eq!(check_health(&client, &config).await.unwrap(), HealthStatus::Ok);
        assert_eq!(server.next_request_line().await, "GET /health HTTP/1.1");
    }

    #[tokio::test]
    async fn test_check_health_server_error() {
        let server = StubServer::start(500, r#"{"status": "SERVER_ERROR"}"#).await;
        let config = server.config();
        let client = build_client(&config).unwrap();

        assert_eq!(
            check_health(&client, &config).await.unwrap(),
            HealthStatus::ServerError
        );
    }

    #[tokio::test]
    async fn test_check_health_undecodable_body() {
        let server = StubServer::start(200, "<html>ok</html>").await;
        let config = server.config();
        let client = build_client(&config).unwrap();

        let err = check_health(&client, &config).await.unwrap_err();
        assert!(matches!(err, ServiceError::Decode { .. }));

        let server = StubServer::start(502, "Bad Gateway").await;
        let config = server.config();
        let err = check_health(&client, &config).await.unwrap_err();
        assert!(matches!(err, ServiceError::Status { status: 502, .. }));
    }
}
