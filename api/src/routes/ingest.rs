//! Record ingestion endpoint.
//!
//! Accepts decoded wire batches from the upstream collector and runs them
//! through the normalization pipeline.
//!
//! # Endpoints
//!
//! - `POST /v1/records` - Ingest a JSON wire batch

use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    routing::post,
    Json, Router,
};
use pipeline::emit::BatchEmitFailure;
use pipeline::ingest::wire::WireBatch;
use serde::{Deserialize, Serialize};

/// Response for an ingest request.
#[derive(Debug, Serialize, Deserialize)]
pub struct IngestResponse {
    /// Terminal batch state (`emitted` or `partially_emitted`).
    pub state: String,
    /// Number of records the sink accepted.
    pub accepted: usize,
    /// Present when any record was quarantined or failed to emit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partial_success: Option<PartialSuccess>,
}

/// Partial success information.
#[derive(Debug, Serialize, Deserialize)]
pub struct PartialSuccess {
    /// Number of rejected records (quarantined plus emit failures).
    pub rejected_count: i64,
    /// Error message if any records were rejected.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Error response for the ingest endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct IngestError {
    /// Error code.
    pub code: u32,
    /// Error message.
    pub message: String,
}

/// Creates the ingest routes with application state.
pub fn ingest_routes(state: AppState) -> Router {
    Router::new()
        .route("/v1/records", post(ingest_records))
        .with_state(state)
}

/// Handler for record ingestion.
///
/// Stage 1-4 failures never fail the request: quarantined records and
/// per-record emit failures are reported in the partial-success body while
/// their siblings are processed. Only a terminal batch failure (retries
/// exhausted or deadline elapsed) produces an error status, so the caller
/// can requeue the batch.
async fn ingest_records(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<IngestResponse>), (StatusCode, Json<IngestError>)> {
    let batch: WireBatch = serde_json::from_slice(&body).map_err(|e| {
        tracing::error!(error = %e, "Failed to decode ingest request");
        (
            StatusCode::BAD_REQUEST,
            Json(IngestError {
                code: 400,
                message: format!("Failed to decode JSON: {e}"),
            }),
        )
    })?;

    let report = state
        .pipeline()
        .process_batch(&batch, state.sink())
        .await
        .map_err(|failure| {
            let status = match failure {
                BatchEmitFailure::Cancelled { .. } => StatusCode::GATEWAY_TIMEOUT,
                BatchEmitFailure::RetriesExhausted { .. } => StatusCode::SERVICE_UNAVAILABLE,
            };
            tracing::error!(error = %failure, "Batch failed terminally");
            (
                status,
                Json(IngestError {
                    code: status.as_u16().into(),
                    message: failure.to_string(),
                }),
            )
        })?;

    let rejected = report.quarantined.len() + report.emit_failures.len();
    let partial_success = if rejected > 0 {
        let mut reasons = Vec::new();
        if !report.quarantined.is_empty() {
            reasons.push(format!("{} records quarantined", report.quarantined.len()));
        }
        if !report.emit_failures.is_empty() {
            reasons.push(format!(
                "{} records failed to emit",
                report.emit_failures.len()
            ));
        }
        Some(PartialSuccess {
            rejected_count: rejected as i64,
            error_message: Some(reasons.join(", ")),
        })
    } else {
        None
    };

    Ok((
        StatusCode::OK,
        Json(IngestResponse {
            state: report.state.to_string(),
            accepted: report.emitted,
            partial_success,
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request};
    use http_body_util::BodyExt;
    use pipeline::config::{EmitConfig, PipelineConfig, RetryConfig};
    use pipeline::metrics::PipelineMetrics;
    use pipeline::sink::InMemorySink;
    use pipeline::Pipeline;
    use std::sync::Arc;
    use tower::ServiceExt;

    const CONTENT_TYPE_JSON: &str = "application/json";

    fn test_state_with_sink(sink: InMemorySink) -> AppState {
        let pipeline = Pipeline::new(PipelineConfig::default(), PipelineMetrics::new_shared())
            .expect("valid config");
        AppState::new(Arc::new(pipeline), Arc::new(sink))
    }

    async fn post_records(app: Router, body: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/v1/records")
                    .header(header::CONTENT_TYPE, CONTENT_TYPE_JSON)
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn test_ingest_empty_batch() {
        let app = ingest_routes(AppState::with_in_memory_sink());

        let (status, body) = post_records(app, r#"{"records": []}"#).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["state"], "emitted");
        assert_eq!(body["accepted"], 0);
    }

    #[tokio::test]
    async fn test_ingest_invalid_json() {
        let app = ingest_routes(AppState::with_in_memory_sink());

        let (status, body) = post_records(app, "{ invalid json }").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], 400);
    }

    #[tokio::test]
    async fn test_ingest_normalizes_and_stores() {
        let sink = InMemorySink::new();
        let state = test_state_with_sink(sink);
        let app = ingest_routes(state.clone());

        let body = r#"{
            "records": [{
                "kind": "span",
                "service": "weather-agent",
                "status": {"code": "ok"},
                "attributes": [
                    {"key": "llm.model_name", "value": "claude-3"},
                    {"key": "llm.token_count.prompt", "value": 150}
                ]
            }]
        }"#;

        let (status, response) = post_records(app, body).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(response["accepted"], 1);
        assert!(response["partial_success"].is_null());
        assert_eq!(state.pipeline().metrics().snapshot().records_emitted, 1);
    }

    #[tokio::test]
    async fn test_ingest_partial_success_on_quarantine() {
        let app = ingest_routes(AppState::with_in_memory_sink());

        let body = r#"{
            "records": [
                {"kind": "span", "service": "agent",
                 "attributes": [{"key": "llm.model_name", "value": "claude-3"}]},
                {"kind": "bogus", "service": "agent"}
            ]
        }"#;

        let (status, response) = post_records(app, body).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(response["accepted"], 1);
        assert_eq!(response["partial_success"]["rejected_count"], 1);
    }

    #[tokio::test]
    async fn test_ingest_unavailable_sink() {
        let pipeline = Pipeline::new(
            PipelineConfig {
                retry: RetryConfig {
                    max_attempts: 2,
                    base_delay_ms: 1,
                    max_delay_ms: 2,
                },
                emit: EmitConfig {
                    batch_deadline_ms: 1_000,
                },
                ..PipelineConfig::default()
            },
            PipelineMetrics::new_shared(),
        )
        .expect("valid config");
        let state = AppState::new(
            Arc::new(pipeline),
            Arc::new(InMemorySink::new().with_send_faults(99)),
        );
        let app = ingest_routes(state);

        let body = r#"{
            "records": [{"kind": "span", "service": "agent",
                         "attributes": [{"key": "gen_ai.system", "value": "langchain"}]}]
        }"#;

        let (status, response) = post_records(app, body).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response["code"], 503);
    }
}
