//! Conflict resolver: staged writes in, canonical layer out.
//!
//! Multiple rules may target the same canonical key. Resolution is
//! deterministic and independent of evaluation order beyond the configured
//! priorities: the write from the lowest-numbered (highest-precedence) rule
//! set wins, and ties within one set resolve last-write-wins in declaration
//! order. The resulting canonical layer is unioned onto the original record
//! additively: no original attribute is ever removed, and the union is
//! right-biased toward the canonical layer only for keys it explicitly set.

use crate::engine::PendingWrite;
use crate::models::Record;
use serde::Serialize;
use std::collections::BTreeMap;

/// The merged set of canonical writes for one record.
#[derive(Debug, Default)]
pub struct CanonicalLayer {
    entries: BTreeMap<String, PendingWrite>,
}

impl CanonicalLayer {
    /// Stages a write, keeping whichever write wins the precedence rules.
    pub fn stage(&mut self, write: PendingWrite) {
        match self.entries.get(&write.target_key) {
            Some(existing) if !wins_over(&write, existing) => {}
            _ => {
                self.entries.insert(write.target_key.clone(), write);
            }
        }
    }

    /// Returns the currently-winning value for a key, if any.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.entries.get(key).map(|w| &w.value)
    }

    /// Returns the number of keys the layer has set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no writes survived.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Consumes the layer into its key/value pairs.
    #[must_use]
    pub fn into_attributes(self) -> BTreeMap<String, serde_json::Value> {
        self.entries
            .into_iter()
            .map(|(key, write)| (key, write.value))
            .collect()
    }
}

/// Returns true if `candidate` should replace `incumbent` for the same key.
fn wins_over(candidate: &PendingWrite, incumbent: &PendingWrite) -> bool {
    if candidate.priority != incumbent.priority {
        // Lower priority number = higher precedence; never overwrite a value
        // set by a higher-precedence set.
        return candidate.priority < incumbent.priority;
    }
    // Same set: last write in declaration order wins.
    candidate.rule_index >= incumbent.rule_index
}

/// Resolves a full pass worth of staged writes into a canonical layer.
#[must_use]
pub fn resolve(writes: Vec<PendingWrite>) -> CanonicalLayer {
    let mut layer = CanonicalLayer::default();
    for write in writes {
        layer.stage(write);
    }
    layer
}

/// A record with its canonical layer merged in, ready for emission.
#[derive(Debug, Clone, Serialize)]
pub struct NormalizedRecord {
    /// Index of the record in its original batch, for failure correlation.
    pub index: usize,
    /// The record with canonical attributes unioned in.
    pub record: Record,
    /// The canonical keys the resolver actually set.
    pub canonical_keys: Vec<String>,
}

/// Merges the canonical layer onto the record.
///
/// Original attributes are kept; keys the layer set are written over the
/// record's values (right-biased union limited to those keys).
#[must_use]
pub fn merge(index: usize, mut record: Record, layer: CanonicalLayer) -> NormalizedRecord {
    let canonical = layer.into_attributes();
    let canonical_keys: Vec<String> = canonical.keys().cloned().collect();
    for (key, value) in canonical {
        record.attributes.insert(key, value);
    }
    NormalizedRecord {
        index,
        record,
        canonical_keys,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RecordKind;
    use serde_json::json;

    fn write(target: &str, value: serde_json::Value, priority: u32, rule_index: usize) -> PendingWrite {
        PendingWrite {
            target_key: target.to_string(),
            value,
            priority,
            ruleset: format!("set-{priority}"),
            rule_index,
        }
    }

    #[test]
    fn test_lower_priority_number_wins() {
        let layer = resolve(vec![
            write("gen_ai.request.model", json!("claude-3"), 20, 0),
            write("gen_ai.request.model", json!("gpt-4"), 0, 0),
        ]);

        assert_eq!(layer.get("gen_ai.request.model"), Some(&json!("gpt-4")));
    }

    #[test]
    fn test_higher_priority_never_overwritten() {
        // Same writes, opposite arrival order: result must be identical.
        let layer = resolve(vec![
            write("gen_ai.request.model", json!("gpt-4"), 0, 0),
            write("gen_ai.request.model", json!("claude-3"), 20, 0),
        ]);

        assert_eq!(layer.get("gen_ai.request.model"), Some(&json!("gpt-4")));
    }

    #[test]
    fn test_same_set_last_write_wins() {
        let layer = resolve(vec![
            write("target", json!("first"), 10, 0),
            write("target", json!("second"), 10, 3),
        ]);

        assert_eq!(layer.get("target"), Some(&json!("second")));
    }

    #[test]
    fn test_distinct_targets_all_survive() {
        let layer = resolve(vec![
            write("a", json!(1), 10, 0),
            write("b", json!(2), 20, 0),
        ]);

        assert_eq!(layer.len(), 2);
    }

    #[test]
    fn test_merge_is_additive() {
        let record = Record::new(RecordKind::Span, "agent")
            .with_attribute("llm.model_name", "claude-3");

        let layer = resolve(vec![write(
            "gen_ai.request.model",
            json!("claude-3"),
            20,
            0,
        )]);

        let normalized = merge(7, record.clone(), layer);

        assert_eq!(normalized.index, 7);
        assert_eq!(
            normalized.record.attribute("gen_ai.request.model"),
            Some(&json!("claude-3"))
        );
        // Original vendor attribute retained.
        assert_eq!(
            normalized.record.attribute("llm.model_name"),
            Some(&json!("claude-3"))
        );
        assert_eq!(normalized.canonical_keys, vec!["gen_ai.request.model"]);

        // Every original attribute key is still present.
        for key in record.attributes.keys() {
            assert!(normalized.record.has_attribute(key));
        }
    }

    #[test]
    fn test_merge_with_empty_layer_changes_nothing() {
        let record = Record::new(RecordKind::Log, "agent").with_attribute("message", "hi");
        let normalized = merge(0, record.clone(), CanonicalLayer::default());

        assert_eq!(normalized.record, record);
        assert!(normalized.canonical_keys.is_empty());
    }
}
