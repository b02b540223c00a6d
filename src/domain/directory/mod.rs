//! Organization directory: account metadata and hierarchy

mod account;
mod service;

pub use account::{Account, AccountKind, DirectoryAccount, DirectoryNode};
pub use service::{AccountResolver, DirectoryService};

#[cfg(test)]
pub use service::{MockAccountResolver, MockDirectoryService};
