use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

use super::health;
use super::metrics;
use super::state::AppState;

/// Normalize the configured metrics path into a route
pub fn metrics_route(path: &str) -> String {
    let trimmed = path.trim();
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}

/// Create the exporter router
pub fn create_router(state: AppState) -> Router {
    let metrics_path = metrics_route(&state.metrics_path);

    let mut router = Router::new()
        .route(&metrics_path, get(metrics::metrics))
        .route("/health", get(health::health_check));

    if metrics_path != "/" {
        router = router.route("/", get(metrics::index));
    }

    router
        .with_state(AppState {
            metrics_path,
            ..state
        })
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::billing::{BillingCollector, CostRegistry};

    #[test]
    fn test_metrics_route() {
        assert_eq!(metrics_route("/metrics"), "/metrics");
        assert_eq!(metrics_route("costs"), "/costs");
        assert_eq!(metrics_route(" /metrics "), "/metrics");
    }

    #[test]
    fn test_router_accepts_root_metrics_path() {
        let state = AppState::new(
            BillingCollector::new(vec![], CostRegistry::new().unwrap()),
            None,
            "/",
        );

        let _router = create_router(state);
    }
}
