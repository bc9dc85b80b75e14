//! Ingest adapter: wire records in, in-memory [`Record`]s out.
//!
//! Decoding fails per record, never per batch: a malformed record is
//! quarantined (returned with its index and error) and the rest of the batch
//! continues through the pipeline.

pub mod wire;

use crate::models::record::is_supported_value;
use crate::models::{Record, RecordKind, RecordStatus, StatusCode};
use chrono::Utc;
use std::collections::BTreeMap;
use thiserror::Error;

use self::wire::{WireBatch, WireRecord};

/// Errors that can occur while decoding a single wire record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The record kind string is not `span`, `metric`, or `log`.
    #[error("unknown record kind: {0}")]
    UnknownKind(String),

    /// The status code string is not `ok`, `error`, or `unset`.
    #[error("unknown status code: {0}")]
    UnknownStatus(String),

    /// The service name is missing or empty.
    #[error("service name is missing or empty")]
    MissingService,

    /// An attribute key is empty.
    #[error("attribute key is empty")]
    EmptyAttributeKey,

    /// The same key appears twice with incompatible values.
    #[error("duplicate attribute key {0} with conflicting values")]
    ConflictingDuplicate(String),

    /// An attribute value has an unsupported shape.
    #[error("unsupported value for attribute {0}")]
    UnsupportedValue(String),

    /// A `bytes_base64` value could not be decoded to a UTF-8 string.
    #[error("invalid bytes value for attribute {key}: {reason}")]
    InvalidBytes {
        /// The offending attribute key.
        key: String,
        /// Why decoding failed.
        reason: String,
    },
}

/// A record excluded from the pipeline, with its original batch index.
#[derive(Debug, Clone)]
pub struct Quarantine {
    /// Index of the record in the incoming batch.
    pub index: usize,
    /// Why the record was quarantined.
    pub error: DecodeError,
}

/// Decodes a wire batch into records, quarantining malformed entries.
///
/// Returns the surviving records paired with their original batch index, and
/// the quarantined entries. Never fails as a whole.
#[must_use]
pub fn decode_batch(batch: &WireBatch) -> (Vec<(usize, Record)>, Vec<Quarantine>) {
    let mut records = Vec::with_capacity(batch.records.len());
    let mut quarantined = Vec::new();

    for (index, wire) in batch.records.iter().enumerate() {
        match decode_record(wire) {
            Ok(record) => records.push((index, record)),
            Err(error) => {
                tracing::warn!(index, %error, "Quarantined malformed record");
                quarantined.push(Quarantine { index, error });
            }
        }
    }

    (records, quarantined)
}

/// Decodes one wire record.
///
/// # Errors
///
/// Returns a [`DecodeError`] describing the first malformation found.
pub fn decode_record(wire: &WireRecord) -> Result<Record, DecodeError> {
    let kind = decode_kind(&wire.kind)?;

    let service = wire
        .service
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or(DecodeError::MissingService)?
        .to_string();

    let status = match &wire.status {
        Some(status) => RecordStatus {
            code: decode_status_code(&status.code)?,
            message: status.message.clone(),
        },
        None => RecordStatus::unset(),
    };

    let mut attributes = BTreeMap::new();
    for kv in &wire.attributes {
        if kv.key.is_empty() {
            return Err(DecodeError::EmptyAttributeKey);
        }

        let value = decode_value(&kv.key, &kv.value)?;

        if let Some(existing) = attributes.get(&kv.key) {
            // Exact duplicates collapse; anything else is a malformed bag.
            if existing != &value {
                return Err(DecodeError::ConflictingDuplicate(kv.key.clone()));
            }
        } else {
            attributes.insert(kv.key.clone(), value);
        }
    }

    Ok(Record {
        kind,
        timestamp: wire.timestamp.unwrap_or_else(Utc::now),
        service,
        status,
        attributes,
    })
}

fn decode_kind(kind: &str) -> Result<RecordKind, DecodeError> {
    match kind {
        "span" => Ok(RecordKind::Span),
        "metric" => Ok(RecordKind::Metric),
        "log" => Ok(RecordKind::Log),
        other => Err(DecodeError::UnknownKind(other.to_string())),
    }
}

fn decode_status_code(code: &str) -> Result<StatusCode, DecodeError> {
    match code {
        "ok" => Ok(StatusCode::Ok),
        "error" => Ok(StatusCode::Error),
        "unset" => Ok(StatusCode::Unset),
        other => Err(DecodeError::UnknownStatus(other.to_string())),
    }
}

/// Decodes one wire value into an attribute value.
fn decode_value(key: &str, value: &serde_json::Value) -> Result<serde_json::Value, DecodeError> {
    if let serde_json::Value::Object(map) = value {
        // The only object shape allowed on the wire is a base64 bytes value.
        if map.len() == 1 {
            if let Some(serde_json::Value::String(encoded)) = map.get("bytes_base64") {
                return decode_bytes(key, encoded);
            }
        }
        return Err(DecodeError::UnsupportedValue(key.to_string()));
    }

    if is_supported_value(value) {
        Ok(value.clone())
    } else {
        Err(DecodeError::UnsupportedValue(key.to_string()))
    }
}

fn decode_bytes(key: &str, encoded: &str) -> Result<serde_json::Value, DecodeError> {
    use base64::Engine;

    let bytes = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .map_err(|e| DecodeError::InvalidBytes {
            key: key.to_string(),
            reason: format!("invalid base64: {e}"),
        })?;

    let text = String::from_utf8(bytes).map_err(|e| DecodeError::InvalidBytes {
        key: key.to_string(),
        reason: format!("not valid UTF-8: {e}"),
    })?;

    Ok(serde_json::Value::String(text))
}
