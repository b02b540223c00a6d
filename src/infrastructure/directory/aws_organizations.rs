use async_trait::async_trait;
use aws_sdk_organizations::Client as OrganizationsClient;

use crate::domain::directory::{AccountKind, DirectoryAccount, DirectoryNode, DirectoryService};
use crate::domain::DomainError;

const ROOT_PREFIX: &str = "r-";
const UNIT_PREFIX: &str = "ou-";

/// AWS Organizations as account directory
#[derive(Debug, Clone)]
pub struct OrganizationsDirectory {
    client: OrganizationsClient,
}

impl OrganizationsDirectory {
    pub fn new(client: OrganizationsClient) -> Self {
        Self { client }
    }

    async fn tags(&self, account_id: &str) -> Result<Vec<(String, String)>, DomainError> {
        let mut tags = Vec::new();
        let mut pages = self
            .client
            .list_tags_for_resource()
            .resource_id(account_id)
            .into_paginator()
            .send();

        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| {
                DomainError::directory(format!("error listing tags for {}: {}", account_id, e))
            })?;
            tags.extend(
                page.tags()
                    .iter()
                    .map(|tag| (tag.key().to_string(), tag.value().to_string())),
            );
        }

        Ok(tags)
    }
}

/// Organization display name: the domain of the management account's e-mail
pub fn organization_name(master_account_email: &str) -> Option<&str> {
    master_account_email
        .split_once('@')
        .map(|(_, domain)| domain)
        .filter(|domain| !domain.is_empty())
}

pub fn classify_parent(id: &str) -> Option<AccountKind> {
    if id.starts_with(ROOT_PREFIX) {
        Some(AccountKind::Organization)
    } else if id.starts_with(UNIT_PREFIX) {
        Some(AccountKind::OrganizationalUnit)
    } else {
        None
    }
}

#[async_trait]
impl DirectoryService for OrganizationsDirectory {
    async fn list_accounts(&self) -> Result<Vec<DirectoryAccount>, DomainError> {
        let mut accounts = Vec::new();
        let mut pages = self.client.list_accounts().into_paginator().send();

        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| {
                DomainError::directory(format!("error listing accounts in organization: {}", e))
            })?;

            for listed in page.accounts() {
                let Some(id) = listed.id() else {
                    continue;
                };
                let mut account = DirectoryAccount::new(id, listed.name().unwrap_or(id));

                match self.tags(id).await {
                    Ok(tags) => account.tags.extend(tags),
                    Err(e) => tracing::warn!(account_id = id, error = %e, "ignoring account tags"),
                }

                accounts.push(account);
            }
        }

        Ok(accounts)
    }

    async fn list_parents(&self, id: &str) -> Result<Vec<String>, DomainError> {
        let output = self
            .client
            .list_parents()
            .child_id(id)
            .send()
            .await
            .map_err(|e| DomainError::directory(format!("error listing parents of {}: {}", id, e)))?;

        Ok(output
            .parents()
            .iter()
            .filter_map(|parent| parent.id().map(str::to_string))
            .collect())
    }

    async fn describe_organization(&self, id: &str) -> Result<DirectoryNode, DomainError> {
        let output = self
            .client
            .describe_organization()
            .send()
            .await
            .map_err(|e| DomainError::directory(format!("error describing organization: {}", e)))?;

        let name = output
            .organization()
            .and_then(|org| org.master_account_email())
            .and_then(organization_name)
            .ok_or_else(|| DomainError::directory("organization has no management account e-mail"))?;

        Ok(DirectoryNode::organization(id, name))
    }

    async fn describe_organizational_unit(&self, id: &str) -> Result<DirectoryNode, DomainError> {
        let output = self
            .client
            .describe_organizational_unit()
            .organizational_unit_id(id)
            .send()
            .await
            .map_err(|e| {
                DomainError::directory(format!("error describing organizational unit {}: {}", id, e))
            })?;

        let unit = output
            .organizational_unit()
            .ok_or_else(|| DomainError::directory(format!("organizational unit {} not found", id)))?;

        Ok(DirectoryNode::organizational_unit(
            unit.id().unwrap_or(id),
            unit.name().unwrap_or(id),
            None,
        ))
    }

    fn classify(&self, id: &str) -> Option<AccountKind> {
        classify_parent(id)
    }

    fn provider_name(&self) -> &'static str {
        "aws-organizations"
    }
}
