use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::domain::directory::{AccountKind, DirectoryAccount, DirectoryNode, DirectoryService};
use crate::domain::DomainError;
use crate::infrastructure::gcp::{bearer, TokenSource};

pub const RESOURCE_MANAGER_BASE_URL: &str = "https://cloudresourcemanager.googleapis.com";

const ORGANIZATIONS: &str = "organizations/";
const FOLDERS: &str = "folders/";

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListProjectsResponse {
    #[serde(default)]
    projects: Vec<Project>,
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Project {
    project_id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    labels: HashMap<String, String>,
    #[serde(default)]
    parent: Option<ResourceId>,
}

#[derive(Deserialize)]
struct ResourceId {
    #[serde(rename = "type")]
    kind: String,
    id: String,
}

impl ResourceId {
    /// `folder`/`organization` + id as a resource name
    fn resource_name(&self) -> String {
        format!("{}s/{}", self.kind, self.id)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Folder {
    name: String,
    display_name: String,
    #[serde(default)]
    parent: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Organization {
    name: String,
    display_name: String,
}

/// Cloud Resource Manager as project directory. Projects are keyed by
/// project id, which is what the billing export references.
#[derive(Debug, Clone)]
pub struct ResourceManagerDirectory {
    http_client: reqwest::Client,
    tokens: Arc<dyn TokenSource>,
    base_url: String,
}

impl ResourceManagerDirectory {
    pub fn new(http_client: reqwest::Client, tokens: Arc<dyn TokenSource>) -> Self {
        Self {
            http_client,
            tokens,
            base_url: RESOURCE_MANAGER_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, DomainError> {
        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), path);

        let response = self
            .http_client
            .get(&url)
            .query(query)
            .header(reqwest::header::AUTHORIZATION, bearer(self.tokens.as_ref()).await?)
            .send()
            .await
            .map_err(|e| DomainError::directory(format!("Resource Manager request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(DomainError::directory(format!(
                "Resource Manager returned error status {} for {}",
                response.status(),
                path
            )));
        }

        response.json().await.map_err(|e| {
            DomainError::directory(format!("Failed to parse Resource Manager response: {}", e))
        })
    }
}

#[async_trait]
impl DirectoryService for ResourceManagerDirectory {
    async fn list_accounts(&self) -> Result<Vec<DirectoryAccount>, DomainError> {
        let mut accounts = Vec::new();
        let mut page_token = String::new();

        loop {
            let mut query = vec![];
            if !page_token.is_empty() {
                query.push(("pageToken", page_token.as_str()));
            }
            let page: ListProjectsResponse = self.get_json("v1/projects", &query).await?;

            for project in page.projects {
                let name = project.name.unwrap_or_else(|| project.project_id.clone());
                let mut account = DirectoryAccount::new(project.project_id, name);
                account.tags = project.labels;
                account.parent = project.parent.map(|p| p.resource_name());
                accounts.push(account);
            }

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = token,
                _ => break,
            }
        }

        Ok(accounts)
    }

    /// Projects and folders carry their parent, so no lookup is needed
    async fn list_parents(&self, _id: &str) -> Result<Vec<String>, DomainError> {
        Ok(Vec::new())
    }

    async fn describe_organization(&self, id: &str) -> Result<DirectoryNode, DomainError> {
        let org: Organization = self.get_json(&format!("v1/{}", id), &[]).await?;
        Ok(DirectoryNode::organization(org.name, org.display_name))
    }

    async fn describe_organizational_unit(&self, id: &str) -> Result<DirectoryNode, DomainError> {
        let folder: Folder = self.get_json(&format!("v2/{}", id), &[]).await?;
        Ok(DirectoryNode::organizational_unit(
            folder.name,
            folder.display_name,
            folder.parent,
        ))
    }

    fn classify(&self, id: &str) -> Option<AccountKind> {
        if id.starts_with(ORGANIZATIONS) {
            Some(AccountKind::Organization)
        } else if id.starts_with(FOLDERS) {
            Some(AccountKind::OrganizationalUnit)
        } else {
            None
        }
    }

    fn provider_name(&self) -> &'static str {
        "gcp-resource-manager"
    }
}
