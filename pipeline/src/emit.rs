//! Batch emitter: the fan-in point of the pipeline.
//!
//! Each normalized record is encoded individually so that one bad record
//! cannot take its siblings down; the encoded documents then go to the sink
//! as a single batch send, retried with bounded exponential backoff. The
//! whole emission runs under a cancellable deadline — the backoff waits are
//! async timed waits, never thread-blocking sleeps, so a stuck sink ends in
//! a `Cancelled` failure instead of a stalled worker.

use crate::config::{EmitConfig, RetryConfig};
use crate::metrics::PipelineMetrics;
use crate::models::BatchState;
use crate::resolve::NormalizedRecord;
use crate::sink::{EmitError, Sink, SinkDocument, SinkError};
use std::time::Duration;
use thiserror::Error;

/// A record that failed to encode, with its original batch index.
#[derive(Debug, Clone)]
pub struct EmitFailure {
    /// Index of the record in its original batch.
    pub index: usize,
    /// Why encoding failed.
    pub error: EmitError,
}

/// Terminal failure of a whole batch.
#[derive(Debug, Error)]
pub enum BatchEmitFailure {
    /// Every configured send attempt failed.
    #[error("sink send failed after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        /// How many attempts were made.
        attempts: u32,
        /// The error from the final attempt.
        last_error: SinkError,
    },

    /// The batch deadline elapsed before the sink accepted the batch.
    #[error("batch emission cancelled after {elapsed_ms} ms deadline")]
    Cancelled {
        /// The deadline that was exceeded, in milliseconds.
        elapsed_ms: u64,
    },
}

/// Successful emission outcome.
#[derive(Debug)]
pub struct EmitReport {
    /// Terminal state: `Emitted` or `PartiallyEmitted`.
    pub state: BatchState,
    /// Number of records the sink accepted.
    pub emitted: usize,
    /// Records that failed to encode.
    pub failed: Vec<EmitFailure>,
}

/// Emits normalized batches to a sink.
#[derive(Debug, Clone)]
pub struct BatchEmitter {
    retry: RetryConfig,
    emit: EmitConfig,
}

impl BatchEmitter {
    /// Creates an emitter with the given retry and emission settings.
    #[must_use]
    pub fn new(retry: RetryConfig, emit: EmitConfig) -> Self {
        Self { retry, emit }
    }

    /// Emits one batch.
    ///
    /// Per-record encode failures are collected and do not abort the batch;
    /// the remaining documents are sent together.
    ///
    /// # Errors
    ///
    /// Returns a [`BatchEmitFailure`] when every send attempt failed or the
    /// batch deadline elapsed. The caller decides whether to requeue or
    /// drop the batch.
    pub async fn emit(
        &self,
        records: &[NormalizedRecord],
        sink: &dyn Sink,
        metrics: &PipelineMetrics,
    ) -> Result<EmitReport, BatchEmitFailure> {
        let mut documents = Vec::with_capacity(records.len());
        let mut failed = Vec::new();

        for record in records {
            match sink.encode(record) {
                Ok(document) => documents.push(document),
                Err(error) => {
                    tracing::warn!(
                        index = record.index,
                        service = %record.record.service,
                        %error,
                        "Record failed to encode for the sink"
                    );
                    metrics.record_emit_failure();
                    failed.push(EmitFailure {
                        index: record.index,
                        error,
                    });
                }
            }
        }

        let emitted = documents.len();
        if emitted > 0 {
            let deadline = self.emit.batch_deadline();
            match tokio::time::timeout(deadline, self.send_with_retry(documents, sink)).await {
                Ok(Ok(())) => {}
                Ok(Err(failure)) => {
                    metrics.record_batch_failure();
                    tracing::error!(
                        error = %failure,
                        state = %BatchState::FailedFatal,
                        "Batch failed after retry exhaustion"
                    );
                    return Err(failure);
                }
                Err(_elapsed) => {
                    metrics.record_batch_failure();
                    tracing::error!(
                        deadline_ms = self.emit.batch_deadline_ms,
                        state = %BatchState::FailedFatal,
                        "Batch emission cancelled by deadline"
                    );
                    return Err(BatchEmitFailure::Cancelled {
                        elapsed_ms: self.emit.batch_deadline_ms,
                    });
                }
            }
        }

        metrics.record_emitted(emitted as u64);

        let state = if failed.is_empty() {
            BatchState::Emitted
        } else {
            BatchState::PartiallyEmitted
        };
        Ok(EmitReport {
            state,
            emitted,
            failed,
        })
    }

    /// Sends the documents, retrying with exponential backoff.
    async fn send_with_retry(
        &self,
        documents: Vec<SinkDocument>,
        sink: &dyn Sink,
    ) -> Result<(), BatchEmitFailure> {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            match sink.send(documents.clone()).await {
                Ok(()) => return Ok(()),
                Err(error) if attempt >= max_attempts => {
                    return Err(BatchEmitFailure::RetriesExhausted {
                        attempts: attempt,
                        last_error: error,
                    });
                }
                Err(error) => {
                    let delay = self.backoff_delay(attempt);
                    tracing::warn!(
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        state = %BatchState::FailedRetrying,
                        %error,
                        "Sink send failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// Delay before the retry following `attempt` (1-based).
    fn backoff_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let delay = self
            .retry
            .base_delay_ms
            .saturating_mul(1_u64 << exponent);
        Duration::from_millis(delay).min(self.retry.max_delay())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Record, RecordKind};
    use crate::sink::InMemorySink;

    fn normalized(index: usize) -> NormalizedRecord {
        NormalizedRecord {
            index,
            record: Record::new(RecordKind::Span, "agent")
                .with_attribute("gen_ai.request.model", "claude-3"),
            canonical_keys: vec![],
        }
    }

    fn fast_emitter(max_attempts: u32) -> BatchEmitter {
        BatchEmitter::new(
            RetryConfig {
                max_attempts,
                base_delay_ms: 1,
                max_delay_ms: 5,
            },
            EmitConfig {
                batch_deadline_ms: 1_000,
            },
        )
    }

    #[test]
    fn test_backoff_delay_doubles_and_caps() {
        let emitter = BatchEmitter::new(
            RetryConfig {
                max_attempts: 5,
                base_delay_ms: 200,
                max_delay_ms: 500,
            },
            EmitConfig::default(),
        );

        assert_eq!(emitter.backoff_delay(1), Duration::from_millis(200));
        assert_eq!(emitter.backoff_delay(2), Duration::from_millis(400));
        assert_eq!(emitter.backoff_delay(3), Duration::from_millis(500));
        assert_eq!(emitter.backoff_delay(10), Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_emit_all_records() {
        let sink = InMemorySink::new();
        let metrics = PipelineMetrics::new();
        let records = vec![normalized(0), normalized(1)];

        let report = fast_emitter(3)
            .emit(&records, &sink, &metrics)
            .await
            .unwrap();

        assert_eq!(report.state, BatchState::Emitted);
        assert_eq!(report.emitted, 2);
        assert!(report.failed.is_empty());
        assert_eq!(sink.document_count(), 2);
        assert_eq!(metrics.snapshot().records_emitted, 2);
    }

    #[tokio::test]
    async fn test_empty_batch_emits_nothing() {
        let sink = InMemorySink::new().with_send_faults(99);
        let metrics = PipelineMetrics::new();

        let report = fast_emitter(1).emit(&[], &sink, &metrics).await.unwrap();

        // No documents means no send; the faulty transport is never touched.
        assert_eq!(report.state, BatchState::Emitted);
        assert_eq!(report.emitted, 0);
    }

    #[tokio::test]
    async fn test_encode_failure_isolated() {
        let sink = InMemorySink::new().with_encode_fault_key("poison");
        let metrics = PipelineMetrics::new();

        let mut poisoned = normalized(1);
        poisoned.record = poisoned.record.with_attribute("poison", true);
        let records = vec![normalized(0), poisoned, normalized(2)];

        let report = fast_emitter(3)
            .emit(&records, &sink, &metrics)
            .await
            .unwrap();

        assert_eq!(report.state, BatchState::PartiallyEmitted);
        assert_eq!(report.emitted, 2);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].index, 1);
        assert_eq!(sink.document_count(), 2);
        assert_eq!(metrics.snapshot().emit_failures, 1);
    }

    #[tokio::test]
    async fn test_retry_then_success() {
        let sink = InMemorySink::new().with_send_faults(2);
        let metrics = PipelineMetrics::new();

        let report = fast_emitter(3)
            .emit(&[normalized(0)], &sink, &metrics)
            .await
            .unwrap();

        assert_eq!(report.state, BatchState::Emitted);
        assert_eq!(sink.document_count(), 1);
        assert_eq!(metrics.snapshot().batch_failures, 0);
    }

    #[tokio::test]
    async fn test_retries_exhausted() {
        let sink = InMemorySink::new().with_send_faults(5);
        let metrics = PipelineMetrics::new();

        let result = fast_emitter(3).emit(&[normalized(0)], &sink, &metrics).await;

        assert!(matches!(
            result,
            Err(BatchEmitFailure::RetriesExhausted { attempts: 3, .. })
        ));
        assert_eq!(sink.document_count(), 0);
        assert_eq!(metrics.snapshot().batch_failures, 1);
    }

    #[tokio::test]
    async fn test_deadline_cancels_stuck_sink() {
        let sink = InMemorySink::new().with_stalled_transport();
        let metrics = PipelineMetrics::new();
        let emitter = BatchEmitter::new(
            RetryConfig::default(),
            EmitConfig {
                batch_deadline_ms: 20,
            },
        );

        let result = emitter.emit(&[normalized(0)], &sink, &metrics).await;

        assert!(matches!(
            result,
            Err(BatchEmitFailure::Cancelled { elapsed_ms: 20 })
        ));
        assert_eq!(metrics.snapshot().batch_failures, 1);
    }
}
