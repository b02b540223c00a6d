//! OAuth access tokens for the Google Cloud REST APIs

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::Expiry;
use moka::future::Cache;
use serde::Deserialize;

use crate::domain::DomainError;

/// Metadata server endpoint on GCE/GKE
pub const METADATA_BASE_URL: &str = "http://metadata.google.internal";

const TOKEN_PATH: &str = "/computeMetadata/v1/instance/service-accounts/default/token";

/// Tokens are dropped from the cache this long before they expire
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// An access token and its lifetime
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub token: String,
    pub expires_in: Duration,
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("token", &"<redacted>")
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

/// Source of bearer tokens for outgoing requests
#[async_trait]
pub trait TokenSource: Send + Sync + fmt::Debug {
    async fn token(&self) -> Result<AccessToken, DomainError>;
}

/// A fixed, externally managed token
pub struct StaticTokenSource {
    token: String,
}

impl StaticTokenSource {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl fmt::Debug for StaticTokenSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StaticTokenSource")
    }
}

#[async_trait]
impl TokenSource for StaticTokenSource {
    async fn token(&self) -> Result<AccessToken, DomainError> {
        Ok(AccessToken {
            token: self.token.clone(),
            expires_in: Duration::from_secs(u32::MAX as u64),
        })
    }
}

#[derive(Deserialize)]
struct MetadataTokenResponse {
    access_token: String,
    expires_in: u64,
}

/// Default service account token from the instance metadata server
#[derive(Debug)]
pub struct MetadataTokenSource {
    http_client: reqwest::Client,
    base_url: String,
}

impl MetadataTokenSource {
    pub fn new(http_client: reqwest::Client) -> Self {
        Self::with_base_url(http_client, METADATA_BASE_URL)
    }

    pub fn with_base_url(http_client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http_client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl TokenSource for MetadataTokenSource {
    async fn token(&self) -> Result<AccessToken, DomainError> {
        let url = format!("{}{}", self.base_url, TOKEN_PATH);

        let response = self
            .http_client
            .get(&url)
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .map_err(|e| {
                DomainError::authentication(format!("Metadata server request failed: {}", e))
            })?;

        if !response.status().is_success() {
            return Err(DomainError::authentication(format!(
                "Metadata server returned error status: {}",
                response.status()
            )));
        }

        let body: MetadataTokenResponse = response.json().await.map_err(|e| {
            DomainError::authentication(format!("Failed to parse metadata token: {}", e))
        })?;

        Ok(AccessToken {
            token: body.access_token,
            expires_in: Duration::from_secs(body.expires_in),
        })
    }
}

struct TokenExpiry;

impl Expiry<(), AccessToken> for TokenExpiry {
    fn expire_after_create(&self, _key: &(), value: &AccessToken, _created_at: Instant) -> Option<Duration> {
        Some(value.expires_in.saturating_sub(EXPIRY_MARGIN))
    }
}

/// Token source wrapper that reuses a token until shortly before it expires
pub struct CachedTokenSource {
    inner: Arc<dyn TokenSource>,
    cache: Cache<(), AccessToken>,
}

impl CachedTokenSource {
    pub fn new(inner: Arc<dyn TokenSource>) -> Self {
        let cache = Cache::builder()
            .max_capacity(1)
            .expire_after(TokenExpiry)
            .build();

        Self { inner, cache }
    }

    pub fn invalidate(&self) {
        self.cache.invalidate_all();
    }
}

impl fmt::Debug for CachedTokenSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedTokenSource")
            .field("inner", &self.inner)
            .finish()
    }
}

#[async_trait]
impl TokenSource for CachedTokenSource {
    async fn token(&self) -> Result<AccessToken, DomainError> {
        if let Some(cached) = self.cache.get(&()).await {
            tracing::trace!("Cache hit for access token");
            return Ok(cached);
        }

        tracing::debug!("Cache miss, fetching access token");
        let token = self.inner.token().await?;
        self.cache.insert((), token.clone()).await;

        Ok(token)
    }
}

/// Build the token source for the configured access mode
pub fn token_source(http_client: reqwest::Client, static_token: Option<&str>) -> Arc<dyn TokenSource> {
    match static_token.filter(|t| !t.is_empty()) {
        Some(token) => Arc::new(StaticTokenSource::new(token)),
        None => Arc::new(CachedTokenSource::new(Arc::new(MetadataTokenSource::new(
            http_client,
        )))),
    }
}
