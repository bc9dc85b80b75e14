//! Application state module.
//!
//! Defines the shared application state that is passed to route handlers.

use pipeline::config::PipelineConfig;
use pipeline::metrics::PipelineMetrics;
use pipeline::sink::{InMemorySink, Sink};
use pipeline::Pipeline;
use std::sync::Arc;

/// Application state shared across all request handlers.
///
/// Holds the normalization pipeline and the downstream sink client. Both are
/// shared by every concurrently-processed batch.
#[derive(Clone)]
pub struct AppState {
    /// The normalization pipeline.
    pipeline: Arc<Pipeline>,
    /// The downstream sink client.
    sink: Arc<dyn Sink>,
}

impl AppState {
    /// Creates a new application state with the given pipeline and sink.
    pub fn new(pipeline: Arc<Pipeline>, sink: Arc<dyn Sink>) -> Self {
        Self { pipeline, sink }
    }

    /// Creates a new application state with the default pipeline and an
    /// in-memory sink.
    ///
    /// This is useful for development and testing. Production deployments
    /// construct [`AppState::new`] with their own sink client.
    ///
    /// # Panics
    ///
    /// Panics if the built-in pipeline configuration is invalid, which would
    /// be a programming error.
    #[must_use]
    pub fn with_in_memory_sink() -> Self {
        let pipeline = Pipeline::new(PipelineConfig::default(), PipelineMetrics::new_shared())
            .expect("built-in pipeline configuration is valid");
        Self {
            pipeline: Arc::new(pipeline),
            sink: InMemorySink::new_shared(),
        }
    }

    /// Returns the pipeline.
    #[must_use]
    pub fn pipeline(&self) -> &Pipeline {
        self.pipeline.as_ref()
    }

    /// Returns the sink.
    #[must_use]
    pub fn sink(&self) -> &dyn Sink {
        self.sink.as_ref()
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::with_in_memory_sink()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipeline::ingest::wire::{WireBatch, WireRecord};

    #[tokio::test]
    async fn test_app_state_processes_batches() {
        let state = AppState::with_in_memory_sink();

        let batch = WireBatch::new(vec![
            WireRecord::span("agent").with_attribute("llm.model_name", "claude-3")
        ]);

        let report = state
            .pipeline()
            .process_batch(&batch, state.sink())
            .await
            .unwrap();

        assert_eq!(report.emitted, 1);
    }

    #[tokio::test]
    async fn test_app_state_is_clone() {
        let state = AppState::with_in_memory_sink();
        let state2 = state.clone();

        let batch = WireBatch::new(vec![
            WireRecord::span("agent").with_attribute("gen_ai.system", "langchain")
        ]);
        state
            .pipeline()
            .process_batch(&batch, state.sink())
            .await
            .unwrap();

        // Both handles share the same metrics.
        assert_eq!(state2.pipeline().metrics().snapshot().records_emitted, 1);
    }
}
