//! Account directories and the metadata cache in front of them

mod aws_organizations;
mod cache;
mod gcp_resource_manager;

pub use aws_organizations::OrganizationsDirectory;
pub use cache::{parse_account_map, DirectoryCache, OwnerEncoding, TagMapping};
pub use gcp_resource_manager::{ResourceManagerDirectory, RESOURCE_MANAGER_BASE_URL};
