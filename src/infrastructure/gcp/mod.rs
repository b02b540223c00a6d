//! Google Cloud REST plumbing shared by the GCP collaborators

mod auth;

pub use auth::{
    token_source, AccessToken, CachedTokenSource, MetadataTokenSource, StaticTokenSource,
    TokenSource, METADATA_BASE_URL,
};

/// Bearer header value for a token source
pub(crate) async fn bearer(tokens: &dyn TokenSource) -> Result<String, crate::domain::DomainError> {
    Ok(format!("Bearer {}", tokens.token().await?.token))
}
