//! TTL-bounded cache of account metadata resolved from a directory service

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use data_encoding::BASE32;
use tokio::sync::Mutex;

use crate::domain::directory::{
    Account, AccountKind, AccountResolver, DirectoryAccount, DirectoryNode, DirectoryService,
};
use crate::domain::{Clock, DomainError};

/// Upper bound on hierarchy depth walked for one account
const MAX_PATH_DEPTH: usize = 16;

/// Wait after a failed refresh before the directory is asked again
const REFRESH_RETRY_BACKOFF: Duration = Duration::from_secs(60);

/// How the owner tag value is stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OwnerEncoding {
    #[default]
    Plain,
    /// RFC 4648 base32 with `_` in place of `=` padding, any case
    Base32,
}

/// Which account tags carry the display name and the owner
#[derive(Debug, Clone, Default)]
pub struct TagMapping {
    pub name_tag: Option<String>,
    pub owner_tag: Option<String>,
    pub owner_encoding: OwnerEncoding,
}

impl TagMapping {
    fn apply(&self, listed: &DirectoryAccount) -> Account {
        let name = self
            .name_tag
            .as_ref()
            .and_then(|tag| listed.tags.get(tag))
            .filter(|value| !value.is_empty())
            .cloned()
            .unwrap_or_else(|| listed.name.clone());

        let owner = self
            .owner_tag
            .as_ref()
            .and_then(|tag| listed.tags.get(tag).map(|value| (tag, value)))
            .and_then(|(tag, value)| match self.decode_owner(value) {
                Ok(owner) => Some(owner),
                Err(e) => {
                    tracing::warn!(
                        account_id = %listed.id,
                        tag = %tag,
                        value = %value,
                        error = %e,
                        "error decoding owner tag"
                    );
                    None
                }
            })
            .unwrap_or_default();

        Account::new(&listed.id, name).with_owner(owner)
    }

    fn decode_owner(&self, value: &str) -> Result<String, DomainError> {
        match self.owner_encoding {
            OwnerEncoding::Plain => Ok(value.to_string()),
            OwnerEncoding::Base32 => {
                let normalized = value.replace('_', "=").to_uppercase();
                let decoded = BASE32
                    .decode(normalized.as_bytes())
                    .map_err(|e| DomainError::parse(format!("invalid base32: {}", e)))?;
                String::from_utf8(decoded)
                    .map_err(|e| DomainError::parse(format!("owner is not UTF-8: {}", e)))
            }
        }
    }
}

/// Parse an `ID=name,ID=name` override list. Malformed pairs are skipped.
pub fn parse_account_map(input: &str) -> HashMap<String, String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .filter_map(|pair| match pair.split_once('=') {
            Some((id, name)) if !id.trim().is_empty() && !name.trim().is_empty() => {
                Some((id.trim().to_string(), name.trim().to_string()))
            }
            _ => {
                tracing::warn!(pair, "ignoring malformed account map entry");
                None
            }
        })
        .collect()
}

#[derive(Debug, Default)]
struct CachedDirectory {
    accounts: HashMap<String, Account>,
    refreshed_at: Option<DateTime<Utc>>,
    failed_at: Option<DateTime<Utc>>,
}

/// Account metadata cache refreshed from a [`DirectoryService`] at most once per TTL.
///
/// The whole mapping sits behind one async mutex: a resolve that finds the
/// mapping stale refreshes it while holding the lock, so concurrent resolves
/// wait for the fresh data instead of reading stale entries.
pub struct DirectoryCache {
    directory: Arc<dyn DirectoryService>,
    clock: Arc<dyn Clock>,
    ttl: chrono::Duration,
    retry_backoff: chrono::Duration,
    overrides: HashMap<String, String>,
    tags: TagMapping,
    state: Mutex<CachedDirectory>,
}

impl DirectoryCache {
    pub fn new(directory: Arc<dyn DirectoryService>, clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        let ttl = chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::hours(1));
        let retry_backoff = chrono::Duration::from_std(REFRESH_RETRY_BACKOFF)
            .unwrap_or_else(|_| chrono::Duration::minutes(1))
            .min(ttl);

        Self {
            directory,
            clock,
            ttl,
            retry_backoff,
            overrides: HashMap::new(),
            tags: TagMapping::default(),
            state: Mutex::new(CachedDirectory::default()),
        }
    }

    /// Names that take precedence over anything the directory reports
    pub fn with_overrides(mut self, overrides: HashMap<String, String>) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn with_tags(mut self, tags: TagMapping) -> Self {
        self.tags = tags;
        self
    }

    /// Number of accounts in the cached mapping
    pub async fn len(&self) -> usize {
        self.state.lock().await.accounts.len()
    }

    /// Stale past the TTL, unless a refresh failed less than the retry
    /// backoff ago
    fn needs_refresh(&self, state: &CachedDirectory, now: DateTime<Utc>) -> bool {
        let expired = match state.refreshed_at {
            None => true,
            Some(at) => now - at >= self.ttl,
        };
        let backing_off = state
            .failed_at
            .is_some_and(|at| now - at < self.retry_backoff);

        expired && !backing_off
    }

    async fn refresh(&self) -> Result<HashMap<String, Account>, DomainError> {
        tracing::debug!(provider = self.directory.provider_name(), "refreshing account directory");

        let listed = self.directory.list_accounts().await?;
        let mut ancestors: HashMap<String, DirectoryNode> = HashMap::new();
        let mut accounts = HashMap::with_capacity(listed.len());

        for entry in &listed {
            let mut account = self.tags.apply(entry);

            match self.ancestor_path(entry, &mut ancestors).await {
                Ok(path) => account.path = path,
                Err(e) => tracing::warn!(
                    account_id = %entry.id,
                    error = %e,
                    "error building account path"
                ),
            }

            tracing::debug!(
                account_id = %account.id,
                account_name = %account.name,
                owner = %account.owner,
                path = %account.path_label(),
                "account mapping from directory"
            );
            accounts.insert(account.id.clone(), account);
        }

        Ok(accounts)
    }

    /// Names of the account's ancestors, outermost first.
    ///
    /// Walks parent links until an organization node or a node without a
    /// parent is reached. Nodes are memoized in `ancestors` for the rest of
    /// the refresh. Revisiting a node or exceeding [`MAX_PATH_DEPTH`] is an
    /// error.
    async fn ancestor_path(
        &self,
        account: &DirectoryAccount,
        ancestors: &mut HashMap<String, DirectoryNode>,
    ) -> Result<Vec<String>, DomainError> {
        let mut path = Vec::new();
        let mut visited = HashSet::from([account.id.clone()]);

        let mut next = match &account.parent {
            Some(parent) => Some(parent.clone()),
            None => self.single_parent(&account.id).await?,
        };

        while let Some(parent_id) = next {
            if !visited.insert(parent_id.clone()) {
                return Err(DomainError::directory(format!(
                    "parent cycle detected at '{}'",
                    parent_id
                )));
            }
            if visited.len() > MAX_PATH_DEPTH {
                return Err(DomainError::directory(format!(
                    "hierarchy deeper than {} levels",
                    MAX_PATH_DEPTH
                )));
            }

            let node = match ancestors.get(&parent_id) {
                Some(node) => node.clone(),
                None => {
                    let node = self.describe(&parent_id).await?;
                    ancestors.insert(parent_id.clone(), node.clone());
                    node
                }
            };

            path.push(node.name.clone());

            next = match (node.kind, node.parent) {
                (AccountKind::Organization, _) => None,
                (_, Some(parent)) => Some(parent),
                (_, None) => self.single_parent(&node.id).await?,
            };
        }

        path.reverse();
        Ok(path)
    }

    async fn single_parent(&self, id: &str) -> Result<Option<String>, DomainError> {
        let mut parents = self.directory.list_parents(id).await?;
        match parents.len() {
            0 => Ok(None),
            1 => Ok(parents.pop()),
            n => Err(DomainError::directory(format!(
                "expected a single parent of '{}', found {}",
                id, n
            ))),
        }
    }

    async fn describe(&self, id: &str) -> Result<DirectoryNode, DomainError> {
        match self.directory.classify(id) {
            Some(AccountKind::Organization) => self.directory.describe_organization(id).await,
            Some(AccountKind::OrganizationalUnit) => {
                self.directory.describe_organizational_unit(id).await
            }
            _ => Err(DomainError::directory(format!("unknown parent id: {}", id))),
        }
    }
}

#[async_trait]
impl AccountResolver for DirectoryCache {
    async fn resolve(&self, account_id: &str) -> Account {
        let mut state = self.state.lock().await;

        let now = self.clock.now();
        if self.needs_refresh(&state, now) {
            match self.refresh().await {
                Ok(accounts) => {
                    state.accounts = accounts;
                    state.refreshed_at = Some(now);
                    state.failed_at = None;
                }
                Err(e) => {
                    tracing::warn!(
                        provider = self.directory.provider_name(),
                        error = %e,
                        "couldn't retrieve list of accounts"
                    );
                    state.failed_at = Some(now);
                }
            }
        }

        let known = state.accounts.get(account_id).cloned();
        match (known, self.overrides.get(account_id)) {
            (Some(mut account), Some(name)) => {
                account.name = name.clone();
                account
            }
            (None, Some(name)) => Account::new(account_id, name.clone()),
            (Some(account), None) => account,
            (None, None) => Account::unknown(account_id),
        }
    }
}
