//! API layer - metrics exposition and health endpoints

pub mod health;
pub mod metrics;
pub mod router;
pub mod state;

pub use router::create_router;
pub use state::AppState;
