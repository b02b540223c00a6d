//! Object store implementations

mod gcs;
mod s3;

pub use gcs::{GcsObjectStore, GCS_BASE_URL};
pub use s3::S3ObjectStore;
