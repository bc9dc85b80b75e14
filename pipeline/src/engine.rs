//! Rule engine: applies matched rule sets to a record and stages writes.
//!
//! The engine never mutates the record. It walks every rule of every matched
//! set (sets in priority order, rules in declaration order) and stages each
//! firing rule as a [`PendingWrite`] tagged with its origin, leaving the
//! final merge decision to the conflict resolver. Conditions are evaluated
//! against the record's attributes overlaid with the currently-winning
//! staged writes, so a rule sees the cumulative effect of the pass so far.

use crate::models::Record;
use crate::resolve::CanonicalLayer;
use crate::rules::{Condition, RuleSet};

/// One staged attribute write, tagged with where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingWrite {
    /// Canonical key to write.
    pub target_key: String,
    /// The transformed value.
    pub value: serde_json::Value,
    /// Priority of the originating rule set (lower wins).
    pub priority: u32,
    /// Name of the originating rule set.
    pub ruleset: String,
    /// Index of the rule within its set (later wins on priority ties).
    pub rule_index: usize,
}

/// A numeric cast that failed softly; the rule was skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CastWarning {
    /// Name of the rule set the failing rule belongs to.
    pub ruleset: String,
    /// Source key of the failing rule.
    pub source_key: String,
    /// Target key that was left unset by this rule.
    pub target_key: String,
    /// Display form of the value that could not be cast.
    pub value: String,
}

impl std::fmt::Display for CastWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "cannot cast {} ({} -> {}, rule set {})",
            self.value, self.source_key, self.target_key, self.ruleset
        )
    }
}

/// Output of one engine pass over a record.
#[derive(Debug, Default)]
pub struct EnginePass {
    /// Every staged write, in evaluation order.
    pub writes: Vec<PendingWrite>,
    /// Soft cast failures encountered during the pass.
    pub warnings: Vec<CastWarning>,
}

/// Applies every rule of the matched sets to the record.
///
/// `rulesets` is expected in priority order (the classifier's output order).
/// Rules whose source key is absent are silent no-ops; failed numeric casts
/// are recorded as warnings and skipped.
#[must_use]
pub fn apply(record: &Record, rulesets: &[&RuleSet]) -> EnginePass {
    let mut pass = EnginePass::default();
    // Winner view of the staged writes, used only for condition and source
    // lookups during this pass.
    let mut staged = CanonicalLayer::default();

    for set in rulesets {
        for (rule_index, rule) in set.rules.iter().enumerate() {
            // Current state = original attributes overlaid with staged winners.
            let source_value = staged
                .get(&rule.source_key)
                .or_else(|| record.attribute(&rule.source_key));

            let Some(source_value) = source_value else {
                continue;
            };

            if !condition_met(&rule.condition, record, &staged, rule, source_value) {
                continue;
            }

            match rule.transform.apply(source_value) {
                Ok(value) => {
                    let write = PendingWrite {
                        target_key: rule.target_key.clone(),
                        value,
                        priority: set.priority,
                        ruleset: set.name.clone(),
                        rule_index,
                    };
                    staged.stage(write.clone());
                    pass.writes.push(write);
                }
                Err(err) => {
                    pass.warnings.push(CastWarning {
                        ruleset: set.name.clone(),
                        source_key: rule.source_key.clone(),
                        target_key: rule.target_key.clone(),
                        value: err.value,
                    });
                }
            }
        }
    }

    pass
}

fn condition_met(
    condition: &Condition,
    record: &Record,
    staged: &CanonicalLayer,
    rule: &crate::rules::MappingRule,
    source_value: &serde_json::Value,
) -> bool {
    match condition {
        Condition::Always => true,
        Condition::TargetAbsent => {
            !record.has_attribute(&rule.target_key) && staged.get(&rule.target_key).is_none()
        }
        Condition::SourceEquals { value } => source_value == value,
    }
}
