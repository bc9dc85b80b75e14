//! The pipeline orchestrator.
//!
//! Wires the five stages together for one batch: decode (with quarantine),
//! classify, apply rules, resolve conflicts, emit. Stages 1-4 are pure
//! per-record work with no shared mutable state beyond the injected metrics
//! collector, so batches can safely be processed concurrently and records
//! within a batch are independent of each other until the emit fan-in.

use crate::classify;
use crate::config::{ConfigError, PipelineConfig};
use crate::emit::{BatchEmitFailure, BatchEmitter, EmitFailure};
use crate::engine;
use crate::ingest::wire::WireBatch;
use crate::ingest::{self, Quarantine};
use crate::metrics::PipelineMetrics;
use crate::models::BatchState;
use crate::resolve::{self, NormalizedRecord};
use crate::rules::RuleSet;
use crate::sink::Sink;
use std::sync::Arc;

/// Result of running stages 1-4 over a batch.
#[derive(Debug)]
pub struct NormalizedBatch {
    /// Records that survived decoding and were normalized.
    pub records: Vec<NormalizedRecord>,
    /// Records quarantined during decoding.
    pub quarantined: Vec<Quarantine>,
    /// Soft cast failures, tagged with the record's batch index.
    pub warnings: Vec<(usize, engine::CastWarning)>,
}

/// Final per-batch report after emission.
#[derive(Debug)]
pub struct BatchReport {
    /// Terminal state of the batch.
    pub state: BatchState,
    /// Number of records received on the wire.
    pub received: usize,
    /// Number of records normalized.
    pub normalized: usize,
    /// Number of records the sink accepted.
    pub emitted: usize,
    /// Records quarantined during decoding.
    pub quarantined: Vec<Quarantine>,
    /// Records that failed to emit.
    pub emit_failures: Vec<EmitFailure>,
}

/// The attribute-normalization pipeline.
///
/// Construct once at startup; the configuration is immutable afterwards.
/// One instance is shared by all batches.
pub struct Pipeline {
    rulesets: Vec<RuleSet>,
    emitter: BatchEmitter,
    metrics: Arc<PipelineMetrics>,
}

impl Pipeline {
    /// Creates a pipeline from a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the configuration is invalid.
    pub fn new(
        config: PipelineConfig,
        metrics: Arc<PipelineMetrics>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let mut rulesets = config.rulesets;
        rulesets.sort_by_key(|set| set.priority);

        Ok(Self {
            rulesets,
            emitter: BatchEmitter::new(config.retry, config.emit),
            metrics,
        })
    }

    /// Returns the metrics collector.
    #[must_use]
    pub fn metrics(&self) -> &Arc<PipelineMetrics> {
        &self.metrics
    }

    /// Returns the configured rule sets in priority order.
    #[must_use]
    pub fn rulesets(&self) -> &[RuleSet] {
        &self.rulesets
    }

    /// Runs stages 1-4: decode, classify, apply rules, resolve.
    ///
    /// Never fails as a whole; malformed records are quarantined and
    /// everything else is normalized.
    #[must_use]
    pub fn normalize_batch(&self, batch: &WireBatch) -> NormalizedBatch {
        tracing::debug!(
            records = batch.len(),
            state = %BatchState::Received,
            "Batch received"
        );

        let (decoded, quarantined) = ingest::decode_batch(batch);
        self.metrics.record_ingested(decoded.len() as u64);
        for _ in &quarantined {
            self.metrics.record_quarantined();
        }

        tracing::debug!(
            decoded = decoded.len(),
            quarantined = quarantined.len(),
            state = %BatchState::Classified,
            "Batch classified"
        );

        let mut records = Vec::with_capacity(decoded.len());
        let mut warnings = Vec::new();

        for (index, record) in decoded {
            let matched = classify::matching_rulesets(&record, &self.rulesets);
            for set in &matched {
                self.metrics.record_ruleset_applied(&set.name);
            }

            let pass = engine::apply(&record, &matched);
            for warning in pass.warnings {
                tracing::warn!(
                    index,
                    service = %record.service,
                    %warning,
                    "Numeric cast failed, field skipped"
                );
                self.metrics.record_cast_warning();
                warnings.push((index, warning));
            }

            let layer = resolve::resolve(pass.writes);
            records.push(resolve::merge(index, record, layer));
        }

        self.metrics.record_normalized(records.len() as u64);
        tracing::debug!(
            normalized = records.len(),
            state = %BatchState::Normalized,
            "Batch normalized"
        );

        NormalizedBatch {
            records,
            quarantined,
            warnings,
        }
    }

    /// Runs the full pipeline for one batch: stages 1-4, then emission.
    ///
    /// # Errors
    ///
    /// Returns a [`BatchEmitFailure`] when the batch failed terminally
    /// (retries exhausted or deadline elapsed); the caller decides whether
    /// to requeue or drop the batch.
    pub async fn process_batch(
        &self,
        batch: &WireBatch,
        sink: &dyn Sink,
    ) -> Result<BatchReport, BatchEmitFailure> {
        let received = batch.len();
        let normalized = self.normalize_batch(batch);

        tracing::debug!(
            records = normalized.records.len(),
            state = %BatchState::Emitting,
            "Batch emitting"
        );

        let report = self
            .emitter
            .emit(&normalized.records, sink, &self.metrics)
            .await?;

        tracing::info!(
            received,
            normalized = normalized.records.len(),
            emitted = report.emitted,
            quarantined = normalized.quarantined.len(),
            state = %report.state,
            "Batch complete"
        );

        Ok(BatchReport {
            state: report.state,
            received,
            normalized: normalized.records.len(),
            emitted: report.emitted,
            quarantined: normalized.quarantined,
            emit_failures: report.failed,
        })
    }
}
