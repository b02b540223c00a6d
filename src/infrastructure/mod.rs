//! Infrastructure layer - cloud clients, counters and process plumbing

pub mod billing;
pub mod directory;
pub mod gcp;
pub mod logging;
pub mod object_store;
pub mod observability;
