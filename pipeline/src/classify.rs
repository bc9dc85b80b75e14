//! Namespace classifier.
//!
//! Inspects a record's attribute keys and returns the rule sets whose
//! trigger prefixes are present. Classification is a pure lookup with no
//! side effects; the result is ordered by configured priority, not by
//! discovery order, so downstream stages never depend on attribute
//! iteration order.

use crate::models::Record;
use crate::rules::RuleSet;

/// Returns the rule sets triggered by the record's attributes, ordered by
/// priority (lowest number first).
///
/// A record may match zero, one, or several sets; mixed instrumentation
/// (canonical fields next to vendor fields) is expected and supported.
#[must_use]
pub fn matching_rulesets<'a>(record: &Record, rulesets: &'a [RuleSet]) -> Vec<&'a RuleSet> {
    let mut matched: Vec<&RuleSet> = rulesets
        .iter()
        .filter(|set| set.matches(record.attributes.keys().map(String::as_str)))
        .collect();
    matched.sort_by_key(|set| set.priority);
    matched
}
