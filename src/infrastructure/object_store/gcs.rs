use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Url;
use serde::Deserialize;

use crate::domain::{DomainError, ObjectInfo, ObjectStore};
use crate::infrastructure::gcp::{bearer, TokenSource};

pub const GCS_BASE_URL: &str = "https://storage.googleapis.com";

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListObjectsResponse {
    #[serde(default)]
    items: Vec<GcsObject>,
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GcsObject {
    name: String,
    #[serde(default)]
    md5_hash: String,
    /// Encoded as a decimal string by the JSON API
    #[serde(default)]
    size: Option<String>,
}

/// Google Cloud Storage bucket access over the JSON API
#[derive(Debug, Clone)]
pub struct GcsObjectStore {
    http_client: reqwest::Client,
    tokens: Arc<dyn TokenSource>,
    base_url: String,
    bucket: String,
}

impl GcsObjectStore {
    pub fn new(
        http_client: reqwest::Client,
        tokens: Arc<dyn TokenSource>,
        bucket: impl Into<String>,
    ) -> Self {
        Self {
            http_client,
            tokens,
            base_url: GCS_BASE_URL.to_string(),
            bucket: bucket.into(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn url(&self, segments: &[&str]) -> Result<Url, DomainError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| DomainError::configuration(format!("Invalid GCS URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| DomainError::configuration("GCS URL cannot be a base"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, DomainError> {
        let response = request
            .header(reqwest::header::AUTHORIZATION, bearer(self.tokens.as_ref()).await?)
            .send()
            .await
            .map_err(|e| DomainError::object_store(format!("GCS request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(DomainError::object_store(format!(
                "GCS returned error status {} for bucket '{}'",
                response.status(),
                self.bucket
            )));
        }

        Ok(response)
    }
}

#[async_trait]
impl ObjectStore for GcsObjectStore {
    async fn list(&self, prefix: &str) -> Result<Vec<ObjectInfo>, DomainError> {
        let url = self.url(&["storage", "v1", "b", &self.bucket, "o"])?;
        let mut objects = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut query = vec![("prefix", prefix.to_string())];
            if let Some(token) = page_token.take() {
                query.push(("pageToken", token));
            }

            let page: ListObjectsResponse = self
                .send(self.http_client.get(url.clone()).query(&query))
                .await?
                .json()
                .await
                .map_err(|e| {
                    DomainError::object_store(format!("Failed to parse GCS listing: {}", e))
                })?;

            objects.extend(page.items.into_iter().map(|o| {
                let size = o.size.and_then(|s| s.parse().ok()).unwrap_or_default();
                ObjectInfo::new(o.name, o.md5_hash, size)
            }));

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        Ok(objects)
    }

    async fn get(&self, key: &str) -> Result<Bytes, DomainError> {
        let url = self.url(&["storage", "v1", "b", &self.bucket, "o", key])?;

        self.send(self.http_client.get(url).query(&[("alt", "media")]))
            .await?
            .bytes()
            .await
            .map_err(|e| DomainError::object_store(format!("Error reading '{}': {}", key, e)))
    }

    fn bucket(&self) -> &str {
        &self.bucket
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::gcp::StaticTokenSource;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn store(server: &MockServer) -> GcsObjectStore {
        GcsObjectStore::new(
            reqwest::Client::new(),
            Arc::new(StaticTokenSource::new("t0k3n")),
            "billing-bucket",
        )
        .with_base_url(server.uri())
    }

    #[tokio::test]
    async fn test_list_follows_pages() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/storage/v1/b/billing-bucket/o"))
            .and(query_param("prefix", "my-billing-2017-01-"))
            .and(query_param("pageToken", "p2"))
            .and(header("authorization", "Bearer t0k3n"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "items": [{"name": "my-billing-2017-01-02.json", "md5Hash": "h2", "size": "20"}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/storage/v1/b/billing-bucket/o"))
            .and(query_param("prefix", "my-billing-2017-01-"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "items": [{"name": "my-billing-2017-01-01.json", "md5Hash": "h1", "size": "10"}],
                "nextPageToken": "p2"
            })))
            .mount(&server)
            .await;

        let objects = store(&server).list("my-billing-2017-01-").await.unwrap();

        assert_eq!(
            objects,
            vec![
                ObjectInfo::new("my-billing-2017-01-01.json", "h1", 10),
                ObjectInfo::new("my-billing-2017-01-02.json", "h2", 20),
            ]
        );
    }

    #[tokio::test]
    async fn test_list_empty_bucket() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/storage/v1/b/billing-bucket/o"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "kind": "storage#objects"
            })))
            .mount(&server)
            .await;

        assert!(store(&server).list("x").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_get_downloads_media() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/storage/v1/b/billing-bucket/o/my-billing-2017-01-01.json"))
            .and(query_param("alt", "media"))
            .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
            .mount(&server)
            .await;

        let body = store(&server).get("my-billing-2017-01-01.json").await.unwrap();

        assert_eq!(body, Bytes::from_static(b"[]"));
    }

    #[tokio::test]
    async fn test_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let err = store(&server).list("x").await.unwrap_err();

        assert!(matches!(err, DomainError::ObjectStore { .. }));
    }
}
