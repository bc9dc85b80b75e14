//! Wire-format batch types.
//!
//! This is the shape batches arrive in after the external collector has
//! already decoded the transport protocol: plain JSON with attributes as a
//! key/value *list*, so duplicate keys are representable (and must be
//! reconciled during decoding). Byte values arrive base64-encoded, the same
//! way OTLP JSON carries them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A batch of wire records as handed over by the collector.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WireBatch {
    /// The records in this batch.
    #[serde(default)]
    pub records: Vec<WireRecord>,
}

impl WireBatch {
    /// Creates a batch from a list of wire records.
    #[must_use]
    pub fn new(records: Vec<WireRecord>) -> Self {
        Self { records }
    }

    /// Returns the number of records in the batch.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if the batch contains no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// One record as it appears on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireRecord {
    /// Record kind: `span`, `metric`, or `log`.
    pub kind: String,

    /// Timestamp; records without one are stamped at decode time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,

    /// The producing service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,

    /// Record status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<WireStatus>,

    /// Attributes as a key/value list; duplicates are allowed on the wire.
    #[serde(default)]
    pub attributes: Vec<WireKeyValue>,
}

impl WireRecord {
    /// Creates a span wire record for the given service.
    #[must_use]
    pub fn span(service: impl Into<String>) -> Self {
        Self::with_kind("span", service)
    }

    /// Creates a wire record with an explicit kind string.
    #[must_use]
    pub fn with_kind(kind: impl Into<String>, service: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            timestamp: None,
            service: Some(service.into()),
            status: None,
            attributes: Vec::new(),
        }
    }

    /// Sets the timestamp.
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Sets the status.
    #[must_use]
    pub fn with_status(mut self, code: impl Into<String>, message: Option<String>) -> Self {
        self.status = Some(WireStatus {
            code: code.into(),
            message,
        });
        self
    }

    /// Appends an attribute to the key/value list.
    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        self.attributes.push(WireKeyValue {
            key: key.into(),
            value: serde_json::to_value(value).unwrap_or(serde_json::Value::Null),
        });
        self
    }
}

/// Status as carried on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireStatus {
    /// Status code string: `ok`, `error`, or `unset`.
    pub code: String,
    /// Optional status message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// One attribute entry on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireKeyValue {
    /// Attribute key.
    pub key: String,
    /// Attribute value. Scalars and string arrays pass through; an object of
    /// the form `{"bytes_base64": "..."}` is decoded into a UTF-8 string.
    pub value: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wire_batch_roundtrip() {
        let batch = WireBatch::new(vec![WireRecord::span("weather-agent")
            .with_attribute("llm.model_name", "claude-3")
            .with_status("ok", None)]);

        let json = serde_json::to_string(&batch).unwrap();
        let parsed: WireBatch = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed.records[0].kind, "span");
        assert_eq!(parsed.records[0].attributes[0].key, "llm.model_name");
    }

    #[test]
    fn test_wire_record_defaults() {
        let parsed: WireRecord =
            serde_json::from_value(json!({"kind": "log", "service": "agent"})).unwrap();

        assert!(parsed.timestamp.is_none());
        assert!(parsed.status.is_none());
        assert!(parsed.attributes.is_empty());
    }

    #[test]
    fn test_empty_batch_parses() {
        let parsed: WireBatch = serde_json::from_str("{}").unwrap();
        assert!(parsed.is_empty());
    }
}
