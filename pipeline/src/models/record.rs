//! Telemetry record data model.
//!
//! A [`Record`] is one observability unit (a span, metric point, or log line)
//! carrying a flat attribute bag. Attribute keys are case-sensitive dotted
//! strings; values are restricted to strings, numbers, booleans, and string
//! arrays. A `BTreeMap` keeps attribute iteration deterministic.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use validator::Validate;

/// Kind of telemetry record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    /// A span from a distributed trace.
    #[default]
    Span,
    /// A metric data point.
    Metric,
    /// A log line.
    Log,
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Span => write!(f, "span"),
            Self::Metric => write!(f, "metric"),
            Self::Log => write!(f, "log"),
        }
    }
}

/// Status code carried by a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StatusCode {
    /// The operation completed without error.
    Ok,
    /// The operation failed.
    Error,
    /// No status was reported.
    #[default]
    Unset,
}

impl std::fmt::Display for StatusCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ok => write!(f, "ok"),
            Self::Error => write!(f, "error"),
            Self::Unset => write!(f, "unset"),
        }
    }
}

/// Record status: a code plus an optional message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct RecordStatus {
    /// The status code.
    #[serde(default)]
    pub code: StatusCode,
    /// Optional human-readable message (typically set for errors).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl RecordStatus {
    /// Creates an `Ok` status.
    #[must_use]
    pub fn ok() -> Self {
        Self {
            code: StatusCode::Ok,
            message: None,
        }
    }

    /// Creates an `Error` status with a message.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            code: StatusCode::Error,
            message: Some(message.into()),
        }
    }

    /// Creates an `Unset` status.
    #[must_use]
    pub fn unset() -> Self {
        Self::default()
    }
}

/// One observability unit flowing through the pipeline.
///
/// # Example
///
/// ```
/// use pipeline::models::{Record, RecordKind, RecordStatus};
///
/// let record = Record::new(RecordKind::Span, "weather-agent")
///     .with_status(RecordStatus::ok())
///     .with_attribute("gen_ai.request.model", "claude-3")
///     .with_attribute("gen_ai.usage.input_tokens", 150);
///
/// assert!(record.validate_record().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Record {
    /// The kind of record.
    pub kind: RecordKind,

    /// Timestamp of the record.
    pub timestamp: DateTime<Utc>,

    /// The service that produced this record.
    #[validate(length(min = 1, message = "Service name cannot be empty"))]
    pub service: String,

    /// The record status.
    #[serde(default)]
    pub status: RecordStatus,

    /// The attribute bag. Sorted by key for deterministic iteration.
    #[serde(default)]
    pub attributes: BTreeMap<String, serde_json::Value>,
}

/// Errors that can occur during record validation.
#[derive(Debug, Error)]
pub enum RecordValidationError {
    /// The service name is empty.
    #[error("Service name cannot be empty")]
    EmptyService,

    /// An attribute key is empty.
    #[error("Attribute keys cannot be empty")]
    EmptyAttributeKey,

    /// An attribute value has a shape the pipeline does not support.
    #[error("Unsupported value for attribute {0}: expected string, number, boolean, or string array")]
    UnsupportedValue(String),

    /// Validation failed with details.
    #[error("Validation failed: {0}")]
    ValidationError(#[from] validator::ValidationErrors),
}

/// Returns true if the value shape is allowed in an attribute bag.
#[must_use]
pub fn is_supported_value(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::String(_)
        | serde_json::Value::Number(_)
        | serde_json::Value::Bool(_) => true,
        serde_json::Value::Array(items) => items.iter().all(serde_json::Value::is_string),
        serde_json::Value::Null | serde_json::Value::Object(_) => false,
    }
}

impl Record {
    /// Creates a new record with the current time as its timestamp.
    #[must_use]
    pub fn new(kind: RecordKind, service: impl Into<String>) -> Self {
        Self {
            kind,
            timestamp: Utc::now(),
            service: service.into(),
            status: RecordStatus::default(),
            attributes: BTreeMap::new(),
        }
    }

    /// Sets the timestamp.
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Sets the status.
    #[must_use]
    pub fn with_status(mut self, status: RecordStatus) -> Self {
        self.status = status;
        self
    }

    /// Adds an attribute to the record.
    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        self.attributes.insert(
            key.into(),
            serde_json::to_value(value).unwrap_or(serde_json::Value::Null),
        );
        self
    }

    /// Returns the value of an attribute, if present.
    #[must_use]
    pub fn attribute(&self, key: &str) -> Option<&serde_json::Value> {
        self.attributes.get(key)
    }

    /// Returns true if the record carries the given attribute key.
    #[must_use]
    pub fn has_attribute(&self, key: &str) -> bool {
        self.attributes.contains_key(key)
    }

    /// Returns true if the record reported an error status.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.status.code == StatusCode::Error
    }

    /// Validates the record.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The service name is empty
    /// - An attribute key is empty
    /// - An attribute value is not a string, number, boolean, or string array
    pub fn validate_record(&self) -> Result<(), RecordValidationError> {
        if self.service.is_empty() {
            return Err(RecordValidationError::EmptyService);
        }
        for (key, value) in &self.attributes {
            if key.is_empty() {
                return Err(RecordValidationError::EmptyAttributeKey);
            }
            if !is_supported_value(value) {
                return Err(RecordValidationError::UnsupportedValue(key.clone()));
            }
        }
        self.validate()?;
        Ok(())
    }
}
