//! Account metadata used to label cost counters

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Position of a node in the organization hierarchy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountKind {
    /// A billable account or project
    #[default]
    Project,
    /// An intermediate grouping node (AWS OU, GCP folder)
    OrganizationalUnit,
    /// The root of the hierarchy
    Organization,
}

/// Resolved metadata for an account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub name: String,
    pub owner: String,
    /// Ancestor display names, outermost first
    pub path: Vec<String>,
    pub kind: AccountKind,
}

impl Account {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            owner: String::new(),
            path: Vec::new(),
            kind: AccountKind::Project,
        }
    }

    /// Placeholder for an account nobody knows about
    pub fn unknown(id: impl Into<String>) -> Self {
        let id = id.into();
        let name = format!("unknown-{}", id);
        Self::new(id, name)
    }

    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = owner.into();
        self
    }

    pub fn with_path(mut self, path: Vec<String>) -> Self {
        self.path = path;
        self
    }

    /// Path joined with `/`, as exported in the `path` label
    pub fn path_label(&self) -> String {
        self.path.join("/")
    }
}

/// An account as listed by a directory service, before path resolution
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DirectoryAccount {
    pub id: String,
    pub name: String,
    pub tags: HashMap<String, String>,
    /// Parent node id when the listing already carries it
    pub parent: Option<String>,
}

impl DirectoryAccount {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }
}

/// A non-account node of the hierarchy (organizational unit or organization)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryNode {
    pub id: String,
    pub name: String,
    pub kind: AccountKind,
    pub parent: Option<String>,
}

impl DirectoryNode {
    pub fn organization(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: AccountKind::Organization,
            parent: None,
        }
    }

    pub fn organizational_unit(
        id: impl Into<String>,
        name: impl Into<String>,
        parent: Option<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: AccountKind::OrganizationalUnit,
            parent,
        }
    }
}
