//! Downstream sink abstraction.
//!
//! The sink owns the wire form the destination expects (bulk index request,
//! remote write, ...); the pipeline only asks it to encode each normalized
//! record and to send one batch of encoded documents. [`InMemorySink`] is
//! the implementation used for development and testing, with optional fault
//! injection to exercise the emitter's failure paths.

use crate::resolve::NormalizedRecord;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, RwLock};
use thiserror::Error;

/// A record failed to encode for the sink. Recoverable per record; siblings
/// in the batch continue.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to encode record for the sink: {0}")]
pub struct EmitError(pub String);

/// The sink transport rejected a batch send. Retried by the emitter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("sink unavailable: {0}")]
pub struct SinkError(pub String);

/// One encoded record, tagged with its original batch index.
#[derive(Debug, Clone, PartialEq)]
pub struct SinkDocument {
    /// Index of the source record in its batch.
    pub index: usize,
    /// The encoded document body.
    pub body: serde_json::Value,
}

/// Trait for downstream sink clients.
///
/// Implementations must be thread-safe (`Send + Sync`); one sink is shared
/// by all concurrently-processed batches.
#[async_trait]
pub trait Sink: Send + Sync {
    /// Encodes one normalized record into the sink's document form.
    ///
    /// # Errors
    ///
    /// Returns an [`EmitError`] if this record cannot be represented; the
    /// failure is isolated to the record.
    fn encode(&self, record: &NormalizedRecord) -> Result<SinkDocument, EmitError>;

    /// Sends one batch of encoded documents.
    ///
    /// # Errors
    ///
    /// Returns a [`SinkError`] on transport failure; the emitter retries.
    async fn send(&self, documents: Vec<SinkDocument>) -> Result<(), SinkError>;
}

/// In-memory sink for development and testing.
#[derive(Debug, Default)]
pub struct InMemorySink {
    documents: RwLock<Vec<SinkDocument>>,
    /// Number of send attempts to fail before accepting (fault injection).
    send_faults: AtomicU32,
    /// When set, never complete a send (simulates a stuck transport).
    stalled: AtomicBool,
    /// When set, encoding fails for records carrying this attribute key.
    encode_fault_key: Option<String>,
}

impl InMemorySink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty sink wrapped in an `Arc`.
    #[must_use]
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Fails the first `attempts` sends with a transport error.
    #[must_use]
    pub fn with_send_faults(self, attempts: u32) -> Self {
        self.send_faults.store(attempts, Ordering::SeqCst);
        self
    }

    /// Makes every send hang until cancelled.
    #[must_use]
    pub fn with_stalled_transport(self) -> Self {
        self.stalled.store(true, Ordering::SeqCst);
        self
    }

    /// Fails encoding for records that carry the given attribute key.
    #[must_use]
    pub fn with_encode_fault_key(mut self, key: impl Into<String>) -> Self {
        self.encode_fault_key = Some(key.into());
        self
    }

    /// Returns a copy of everything stored so far.
    #[must_use]
    pub fn documents(&self) -> Vec<SinkDocument> {
        self.documents.read().map(|d| d.clone()).unwrap_or_default()
    }

    /// Returns the number of stored documents.
    #[must_use]
    pub fn document_count(&self) -> usize {
        self.documents.read().map(|d| d.len()).unwrap_or(0)
    }
}

#[async_trait]
impl Sink for InMemorySink {
    fn encode(&self, record: &NormalizedRecord) -> Result<SinkDocument, EmitError> {
        if let Some(key) = &self.encode_fault_key {
            if record.record.has_attribute(key) {
                return Err(EmitError(format!(
                    "injected encode fault for attribute {key}"
                )));
            }
        }

        let body = serde_json::to_value(&record.record).map_err(|e| EmitError(e.to_string()))?;
        Ok(SinkDocument {
            index: record.index,
            body,
        })
    }

    async fn send(&self, documents: Vec<SinkDocument>) -> Result<(), SinkError> {
        if self.stalled.load(Ordering::SeqCst) {
            // Waits forever; the emitter's deadline cancels us.
            std::future::pending::<()>().await;
        }

        let remaining = self.send_faults.load(Ordering::SeqCst);
        if remaining > 0 {
            self.send_faults.store(remaining - 1, Ordering::SeqCst);
            return Err(SinkError("injected transport fault".to_string()));
        }

        let mut stored = self
            .documents
            .write()
            .map_err(|_| SinkError("sink lock poisoned".to_string()))?;
        stored.extend(documents);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Record, RecordKind};
    use crate::resolve::NormalizedRecord;

    fn normalized(index: usize) -> NormalizedRecord {
        NormalizedRecord {
            index,
            record: Record::new(RecordKind::Span, "agent")
                .with_attribute("gen_ai.request.model", "claude-3"),
            canonical_keys: vec!["gen_ai.request.model".to_string()],
        }
    }

    #[tokio::test]
    async fn test_encode_and_send() {
        let sink = InMemorySink::new();

        let doc = sink.encode(&normalized(3)).unwrap();
        assert_eq!(doc.index, 3);

        sink.send(vec![doc]).await.unwrap();
        assert_eq!(sink.document_count(), 1);
    }

    #[tokio::test]
    async fn test_send_fault_injection() {
        let sink = InMemorySink::new().with_send_faults(2);
        let doc = sink.encode(&normalized(0)).unwrap();

        assert!(sink.send(vec![doc.clone()]).await.is_err());
        assert!(sink.send(vec![doc.clone()]).await.is_err());
        assert!(sink.send(vec![doc]).await.is_ok());
        assert_eq!(sink.document_count(), 1);
    }

    #[test]
    fn test_encode_fault_injection() {
        let sink = InMemorySink::new().with_encode_fault_key("gen_ai.request.model");
        assert!(sink.encode(&normalized(0)).is_err());

        let sink = InMemorySink::new().with_encode_fault_key("other.key");
        assert!(sink.encode(&normalized(0)).is_ok());
    }
}
