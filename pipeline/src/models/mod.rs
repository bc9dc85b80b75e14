//! Data models for the Spanform normalization pipeline.
//!
//! This module contains the core record and batch structures that flow
//! through the pipeline stages.

pub mod batch;
pub mod record;

pub use batch::BatchState;
pub use record::{Record, RecordKind, RecordStatus, RecordValidationError, StatusCode};
