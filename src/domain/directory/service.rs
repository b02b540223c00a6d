use async_trait::async_trait;

use super::{AccountKind, DirectoryAccount, DirectoryNode};
use crate::domain::DomainError;

#[cfg(test)]
use mockall::automock;

/// Organization directory (AWS Organizations, GCP Resource Manager, ...)
#[cfg_attr(test, automock)]
#[async_trait]
pub trait DirectoryService: Send + Sync {
    /// List every account known to the directory, across all pages
    async fn list_accounts(&self) -> Result<Vec<DirectoryAccount>, DomainError>;

    /// Parent ids of an account or organizational unit
    async fn list_parents(&self, id: &str) -> Result<Vec<String>, DomainError>;

    /// Describe the organization root with the given id
    async fn describe_organization(&self, id: &str) -> Result<DirectoryNode, DomainError>;

    /// Describe an organizational unit / folder
    async fn describe_organizational_unit(&self, id: &str) -> Result<DirectoryNode, DomainError>;

    /// Classify a parent id by its shape, `None` if it is not a known node type
    fn classify(&self, id: &str) -> Option<AccountKind>;

    /// Get provider name for logging/debugging
    fn provider_name(&self) -> &'static str;
}

/// Resolves account ids to labeled metadata; never fails
#[cfg_attr(test, automock)]
#[async_trait]
pub trait AccountResolver: Send + Sync {
    async fn resolve(&self, account_id: &str) -> super::Account;
}
