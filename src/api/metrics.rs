//! Metrics exposition and index page

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
};

use super::state::AppState;

/// Scrape every active source, then render the cost counters followed by the
/// exporter's own metrics
pub async fn metrics(State(state): State<AppState>) -> Response {
    let mut body = match state.collector.collect().await {
        Ok(body) => body,
        Err(e) => {
            tracing::error!(error = %e, "Failed to render cost counters");
            return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response();
        }
    };

    if let Some(metrics) = &state.metrics {
        body.push_str(&metrics.render());
    }

    (
        [(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)],
        body,
    )
        .into_response()
}

pub async fn index(State(state): State<AppState>) -> Html<String> {
    Html(format!(
        "<html>\n\
         <head><title>Cloud Billing Exporter</title></head>\n\
         <body>\n\
         <h1>Cloud Billing Exporter</h1>\n\
         <p><a href=\"{0}\">Metrics</a></p>\n\
         </body>\n\
         </html>\n",
        state.metrics_path
    ))
}
