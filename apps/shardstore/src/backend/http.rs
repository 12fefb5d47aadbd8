//! HTTP document backend
//!
//! Talks to a document node (see `crate::server`):
//! - `GET  {url}/databases/{db}/docs?id={key}` → 200 document, 404 missing
//! - `POST {url}/databases/{db}/bulk_docs`     → JSON array of changes
//!
//! `{db}` is percent-encoded as a single path segment. A 404 only counts as
//! a missing document when the body is the node's `{"error": ...}` reply;
//! any other 404 (wrong base URL, not a document node) is an error.

use super::{DocumentBackend, RetryPolicy};
use crate::document::{Change, Document};
use crate::error::StoreError;
use crate::metrics::StoreMetrics;
use crate::server::ErrorResponse;
use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use std::time::{Duration, Instant};
use tracing::debug;

pub struct HttpBackend {
    client: Client,
    base_url: String,
    base: Url,
    retry: RetryPolicy,
    metrics: StoreMetrics,
}

impl HttpBackend {
    pub fn new(
        base_url: impl Into<String>,
        timeout: Duration,
        retry: RetryPolicy,
        metrics: StoreMetrics,
    ) -> Result<Self, StoreError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();

        let base = Url::parse(&base_url)
            .map_err(|e| StoreError::Config(format!("invalid backend url '{base_url}': {e}")))?;
        if base.cannot_be_a_base() {
            return Err(StoreError::Config(format!(
                "backend url '{base_url}' cannot carry a path"
            )));
        }

        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(2)))
            .build()
            .map_err(|source| StoreError::Backend {
                endpoint: base_url.clone(),
                source,
            })?;

        Ok(Self {
            client,
            base_url,
            base,
            retry,
            metrics,
        })
    }

    fn database_url(&self, database: &str, resource: &str) -> Url {
        let mut url = self.base.clone();
        // base was checked in new(), so it always has path segments
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(["databases", database, resource]);
        }
        url
    }

    fn docs_url(&self, database: &str) -> Url {
        self.database_url(database, "docs")
    }

    fn bulk_url(&self, database: &str) -> Url {
        self.database_url(database, "bulk_docs")
    }

    fn transport_error(&self, source: reqwest::Error) -> StoreError {
        StoreError::Backend {
            endpoint: self.base_url.clone(),
            source,
        }
    }

    async fn status_error(&self, response: reqwest::Response) -> StoreError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        StoreError::BackendStatus {
            endpoint: self.base_url.clone(),
            status,
            body,
        }
    }

    async fn get_once(&self, database: &str, key: &str) -> Result<Option<Document>, StoreError> {
        let response = self
            .client
            .get(self.docs_url(database))
            .query(&[("id", key)])
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        match response.status() {
            StatusCode::OK => {
                let document = response
                    .json::<Document>()
                    .await
                    .map_err(|e| self.transport_error(e))?;
                Ok(Some(document))
            }
            StatusCode::NOT_FOUND => {
                let body = response.text().await.map_err(|e| self.transport_error(e))?;
                if serde_json::from_str::<ErrorResponse>(&body).is_ok() {
                    Ok(None)
                } else {
                    Err(StoreError::BackendStatus {
                        endpoint: self.base_url.clone(),
                        status: StatusCode::NOT_FOUND.as_u16(),
                        body,
                    })
                }
            }
            _ => Err(self.status_error(response).await),
        }
    }

    async fn apply_once(&self, database: &str, changes: &[Change]) -> Result<(), StoreError> {
        let response = self
            .client
            .post(self.bulk_url(database))
            .json(changes)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(self.status_error(response).await)
        }
    }
}

#[async_trait]
impl DocumentBackend for HttpBackend {
    fn endpoint(&self) -> &str {
        &self.base_url
    }

    async fn get(&self, database: &str, key: &str) -> Result<Option<Document>, StoreError> {
        let start = Instant::now();
        let result = self
            .retry
            .run(&self.base_url, || self.get_once(database, key))
            .await;
        self.metrics
            .record_request(&self.base_url, "get", start.elapsed());

        debug!(endpoint = %self.base_url, database, key, found = matches!(result, Ok(Some(_))), "GET document");
        result
    }

    async fn apply(&self, database: &str, changes: &[Change]) -> Result<(), StoreError> {
        if changes.is_empty() {
            return Ok(());
        }

        let start = Instant::now();
        let result = self
            .retry
            .run(&self.base_url, || self.apply_once(database, changes))
            .await;
        self.metrics
            .record_request(&self.base_url, "bulk_docs", start.elapsed());

        debug!(endpoint = %self.base_url, database, changes = changes.len(), ok = result.is_ok(), "POST bulk_docs");
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend(url: &str) -> HttpBackend {
        HttpBackend::new(
            url,
            Duration::from_millis(200),
            RetryPolicy::none(),
            StoreMetrics::detached(),
        )
        .unwrap()
    }

    #[test]
    fn urls_are_built_from_trimmed_base() {
        let backend = backend("http://localhost:8092/");
        assert_eq!(backend.endpoint(), "http://localhost:8092");
        assert_eq!(
            backend.docs_url("tenant").as_str(),
            "http://localhost:8092/databases/tenant/docs"
        );
        assert_eq!(
            backend.bulk_url("tenant").as_str(),
            "http://localhost:8092/databases/tenant/bulk_docs"
        );
    }

    #[test]
    fn database_name_is_one_path_segment() {
        let backend = backend("http://localhost:8092");
        assert_eq!(
            backend.docs_url("a/b").as_str(),
            "http://localhost:8092/databases/a%2Fb/docs"
        );
        assert_eq!(
            backend.bulk_url("a b").as_str(),
            "http://localhost:8092/databases/a%20b/bulk_docs"
        );
    }

    #[test]
    fn base_path_is_kept() {
        let backend = backend("http://localhost:8092/store/");
        assert_eq!(
            backend.docs_url("tenant").as_str(),
            "http://localhost:8092/store/databases/tenant/docs"
        );
    }

    #[test]
    fn invalid_base_url_is_a_config_error() {
        let err = HttpBackend::new(
            "not a url",
            Duration::from_millis(200),
            RetryPolicy::none(),
            StoreMetrics::detached(),
        )
        .err()
        .unwrap();
        assert_eq!(err.error_type_label(), "config");
    }

    #[tokio::test]
    async fn empty_batch_skips_network() {
        // Nothing listens on port 9; an empty batch must not attempt a request
        let backend = backend("http://127.0.0.1:9");
        backend.apply("tenant", &[]).await.unwrap();
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_a_backend_error() {
        let backend = backend("http://127.0.0.1:9");
        let err = backend.get("tenant", "x").await.unwrap_err();
        assert_eq!(err.error_type_label(), "backend");
    }
}
