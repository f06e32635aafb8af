//! REST transport to the `irodori-api` façade.

use std::time::Duration;

use reqwest::{Method, StatusCode};
use serde::Deserialize;

use super::{RemoteAdapter, RemoteError, RemoteResult};
use crate::models::{EntityKind, Record, RecordId};
use crate::util::{compact_text, is_http_url, normalize_text_option};

impl From<reqwest::Error> for RemoteError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            Self::Protocol(error.to_string())
        } else {
            Self::Unreachable(error.to_string())
        }
    }
}

#[derive(Clone)]
pub struct RestRemote {
    base_url: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for RestRemote {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("RestRemote")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl RestRemote {
    pub fn new(base_url: impl Into<String>, call_timeout: Duration) -> RemoteResult<Self> {
        let base_url = normalize_base_url(base_url.into())?;
        let client = reqwest::Client::builder()
            .timeout(call_timeout)
            .connect_timeout(call_timeout)
            .build()?;
        Ok(Self { base_url, client })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn collection_url(&self, kind: EntityKind) -> String {
        format!("{}/api/{}", self.base_url, kind.collection())
    }

    fn record_url(&self, kind: EntityKind, id: &RecordId) -> String {
        format!(
            "{}/{}",
            self.collection_url(kind),
            urlencoding::encode(id.as_str())
        )
    }

    async fn send_record(
        &self,
        method: Method,
        url: &str,
        body: &serde_json::Value,
    ) -> RemoteResult<StatusCode> {
        let response = self
            .client
            .request(method, url)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(body)
            .send()
            .await?;
        let status = response.status();
        if status.is_success() || status == StatusCode::NOT_FOUND || status == StatusCode::CONFLICT {
            return Ok(status);
        }
        let body = response.text().await.unwrap_or_default();
        Err(status_error(status, &body))
    }
}

impl RemoteAdapter for RestRemote {
    async fn health_check(&self) -> bool {
        let url = format!("{}/api/health", self.base_url);
        match self.client.get(&url).send().await {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                tracing::warn!(status = response.status().as_u16(), "Health check failed");
                false
            }
            Err(error) => {
                tracing::debug!("Health check failed: {error}");
                false
            }
        }
    }

    async fn pull_all(&self, kind: EntityKind) -> RemoteResult<Vec<Record>> {
        let response = self
            .client
            .get(self.collection_url(kind))
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, &body));
        }

        let rows = response.json::<Vec<serde_json::Value>>().await?;
        rows.into_iter()
            .map(|row| {
                Record::from_payload(kind, row)
                    .map_err(|error| RemoteError::Protocol(format!("{kind} row: {error}")))
            })
            .collect()
    }

    /// `PUT` the row; a `404` means the remote has never seen it, so `POST`
    /// it instead. A `409` on that `POST` means someone created it in
    /// between, so the `PUT` is tried once more.
    async fn upsert(&self, record: &Record) -> RemoteResult<()> {
        let kind = record.kind();
        let body = record
            .to_payload()
            .map_err(|error| RemoteError::Protocol(error.to_string()))?;
        let record_url = self.record_url(kind, record.id());

        let status = self.send_record(Method::PUT, &record_url, &body).await?;
        if status != StatusCode::NOT_FOUND {
            return expect_written(status);
        }

        let status = self
            .send_record(Method::POST, &self.collection_url(kind), &body)
            .await?;
        if status != StatusCode::CONFLICT {
            return expect_written(status);
        }

        let status = self.send_record(Method::PUT, &record_url, &body).await?;
        expect_written(status)
    }

    async fn delete(&self, kind: EntityKind, id: &RecordId) -> RemoteResult<()> {
        let response = self.client.delete(self.record_url(kind, id)).send().await?;
        let status = response.status();
        if status.is_success() || status == StatusCode::NOT_FOUND {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(status_error(status, &body))
    }
}

fn expect_written(status: StatusCode) -> RemoteResult<()> {
    if status.is_success() {
        Ok(())
    } else {
        Err(RemoteError::Rejected {
            status: status.as_u16(),
            message: status
                .canonical_reason()
                .unwrap_or("unexpected status")
                .to_string(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<String>,
    message: Option<String>,
}

fn parse_api_error(body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            return compact_text(&message);
        }
    }
    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        "empty response body".to_string()
    } else {
        trimmed
    }
}

fn status_error(status: StatusCode, body: &str) -> RemoteError {
    let message = parse_api_error(body);
    if status.is_server_error() {
        RemoteError::Server {
            status: status.as_u16(),
            message,
        }
    } else {
        RemoteError::Rejected {
            status: status.as_u16(),
            message,
        }
    }
}

fn normalize_base_url(raw: String) -> RemoteResult<String> {
    let url = normalize_text_option(Some(raw))
        .ok_or_else(|| RemoteError::Protocol("REST base URL must not be empty".to_string()))?;
    if is_http_url(&url) {
        Ok(url.trim_end_matches('/').to_string())
    } else {
        Err(RemoteError::Protocol(
            "REST base URL must include http:// or https://".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_base_url_rejects_invalid_values() {
        assert!(normalize_base_url("   ".to_string()).is_err());
        assert!(normalize_base_url("localhost:3456".to_string()).is_err());
        assert_eq!(
            normalize_base_url(" http://localhost:3456/ ".to_string()).unwrap(),
            "http://localhost:3456"
        );
    }

    #[test]
    fn record_url_percent_encodes_ids() {
        let remote = RestRemote::new("http://localhost:3456", Duration::from_secs(1)).unwrap();
        let id: RecordId = "a b/c".parse().unwrap();
        assert_eq!(
            remote.record_url(EntityKind::ProjectNote, &id),
            "http://localhost:3456/api/project-notes/a%20b%2Fc"
        );
    }

    #[test]
    fn status_errors_split_client_and_server_faults() {
        let rejected = status_error(StatusCode::BAD_REQUEST, r#"{"error":"title is required"}"#);
        assert!(matches!(
            rejected,
            RemoteError::Rejected { status: 400, ref message } if message == "title is required"
        ));

        let server = status_error(StatusCode::BAD_GATEWAY, "");
        assert!(matches!(server, RemoteError::Server { status: 502, .. }));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn health_check_is_false_when_nothing_listens() {
        // Port 9 (discard) is not served on loopback in test environments
        let remote = RestRemote::new("http://127.0.0.1:9", Duration::from_millis(500)).unwrap();
        assert!(!remote.health_check().await);
    }
}
