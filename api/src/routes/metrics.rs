//! Pipeline metrics endpoint.
//!
//! Exposes the pipeline's counters (quarantined records, cast warnings,
//! per-rule-set application counts, emit successes and failures) as JSON
//! for external read-only consumers.

use crate::state::AppState;
use axum::{extract::State, routing::get, Json, Router};
use pipeline::metrics::MetricsSnapshot;

/// Creates the metrics routes with application state.
pub fn metrics_routes(state: AppState) -> Router {
    Router::new()
        .route("/metrics", get(read_metrics))
        .with_state(state)
}

/// Returns a snapshot of the pipeline counters.
async fn read_metrics(State(state): State<AppState>) -> Json<MetricsSnapshot> {
    Json(state.pipeline().metrics().snapshot())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_metrics_endpoint_starts_at_zero() {
        let app = metrics_routes(AppState::with_in_memory_sink());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/metrics")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let metrics: serde_json::Value = serde_json::from_slice(&body).unwrap();

        assert_eq!(metrics["records_ingested"], 0);
        assert_eq!(metrics["records_quarantined"], 0);
        assert_eq!(metrics["cast_warnings"], 0);
    }
}
