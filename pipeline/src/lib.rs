//! Spanform Core Library
//!
//! This crate contains the attribute-normalization pipeline at the heart of
//! Spanform: it takes decoded batches of GenAI telemetry records whose
//! attributes follow vendor-specific conventions (OpenInference, OpenLLMetry,
//! Langfuse, Braintrust) and merges them into the canonical `gen_ai.*`
//! GenAI Semantic Conventions namespace before forwarding to a sink.
//!
//! # Modules
//!
//! - [`models`] - Record and batch data models
//! - [`ingest`] - Wire-format decoding and per-record quarantine
//! - [`classify`] - Namespace classification against rule-set triggers
//! - [`rules`] - Mapping rules, rule sets, and the built-in vendor sets
//! - [`engine`] - Rule application producing staged attribute writes
//! - [`resolve`] - Deterministic conflict resolution and additive merge
//! - [`sink`] - Downstream sink abstraction
//! - [`emit`] - Batch emission with retry, backoff, and a deadline
//! - [`metrics`] - Injected pipeline counters
//! - [`config`] - Pipeline configuration
//!
//! # Example
//!
//! ```
//! use pipeline::config::PipelineConfig;
//! use pipeline::ingest::wire::{WireBatch, WireRecord};
//! use pipeline::metrics::PipelineMetrics;
//! use pipeline::Pipeline;
//!
//! let pipeline = Pipeline::new(PipelineConfig::default(), PipelineMetrics::new_shared())
//!     .expect("default configuration is valid");
//!
//! let batch = WireBatch::new(vec![WireRecord::span("weather-agent")
//!     .with_attribute("llm.model_name", "claude-3")]);
//!
//! let normalized = pipeline.normalize_batch(&batch);
//! assert_eq!(normalized.records.len(), 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod classify;
pub mod config;
pub mod emit;
pub mod engine;
pub mod ingest;
pub mod metrics;
pub mod models;
pub mod resolve;
pub mod rules;
pub mod sink;

mod orchestrator;

pub use orchestrator::{BatchReport, NormalizedBatch, Pipeline};

/// Re-export common dependencies for convenience.
pub use chrono;
pub use serde_json;
