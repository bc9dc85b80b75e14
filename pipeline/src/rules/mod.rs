//! Mapping rules and rule sets.
//!
//! A [`MappingRule`] is pure data: a source key, a target key, an optional
//! condition, and a value transform. Rules are grouped into named
//! [`RuleSet`]s, one per source instrumentation convention, each with a
//! numeric priority (lower number = higher precedence) and a list of
//! attribute-key prefixes that trigger it. Because rules are plain serde
//! values, deployments can swap in their own sets from configuration without
//! recompiling.

pub mod builtin;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Canonical GenAI Semantic Conventions attribute keys used as normalization
/// targets.
pub mod keys {
    /// Operation name (`chat`, `execute_tool`, ...).
    pub const OPERATION_NAME: &str = "gen_ai.operation.name";
    /// Model requested by the client.
    pub const REQUEST_MODEL: &str = "gen_ai.request.model";
    /// Model reported in the response.
    pub const RESPONSE_MODEL: &str = "gen_ai.response.model";
    /// Provider name (`anthropic`, `aws.bedrock`, ...).
    pub const PROVIDER_NAME: &str = "gen_ai.provider.name";
    /// Instrumented system (`langchain`, ...).
    pub const SYSTEM: &str = "gen_ai.system";
    /// Input token count.
    pub const INPUT_TOKENS: &str = "gen_ai.usage.input_tokens";
    /// Output token count.
    pub const OUTPUT_TOKENS: &str = "gen_ai.usage.output_tokens";
    /// Total token count.
    pub const TOTAL_TOKENS: &str = "gen_ai.usage.total_tokens";
    /// Input messages, as a string array.
    pub const INPUT_MESSAGES: &str = "gen_ai.input.messages";
    /// Output messages, as a string array.
    pub const OUTPUT_MESSAGES: &str = "gen_ai.output.messages";
    /// Tool name for tool-execution records.
    pub const TOOL_NAME: &str = "gen_ai.tool.name";
    /// Conversation/session identifier.
    pub const CONVERSATION_ID: &str = "gen_ai.conversation.id";
    /// Agent name.
    pub const AGENT_NAME: &str = "gen_ai.agent.name";
}

/// Predicate evaluated against the record's current attribute state.
///
/// Conditions see the cumulative effect of rules already applied in the same
/// pass, which is what makes `target_absent` usable for only-if-absent
/// mappings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Condition {
    /// Apply unconditionally.
    #[default]
    Always,
    /// Apply only while the target key has not been set.
    TargetAbsent,
    /// Apply only when the source key currently equals the given value.
    SourceEquals {
        /// The value the source must equal.
        value: serde_json::Value,
    },
}

/// Value transform applied when a rule fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Transform {
    /// Copy the value unchanged.
    #[default]
    Identity,
    /// Coerce the value to a JSON number; fails softly on unparseable input.
    NumericCast,
    /// Wrap a scalar into a single-element string array; string arrays pass
    /// through unchanged.
    StringArrayWrap,
}

/// A value could not be cast to a number.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot cast {value} to a number")]
pub struct CastError {
    /// Display form of the offending value.
    pub value: String,
}

impl Transform {
    /// Applies the transform to a value.
    ///
    /// # Errors
    ///
    /// Returns a [`CastError`] when a numeric cast sees input that is not a
    /// number and cannot be parsed as one.
    pub fn apply(self, value: &serde_json::Value) -> Result<serde_json::Value, CastError> {
        match self {
            Self::Identity => Ok(value.clone()),
            Self::NumericCast => numeric_cast(value),
            Self::StringArrayWrap => Ok(string_array_wrap(value)),
        }
    }
}

fn numeric_cast(value: &serde_json::Value) -> Result<serde_json::Value, CastError> {
    match value {
        serde_json::Value::Number(_) => Ok(value.clone()),
        serde_json::Value::String(s) => {
            if let Ok(i) = s.trim().parse::<i64>() {
                return Ok(serde_json::Value::Number(i.into()));
            }
            s.trim()
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(serde_json::Value::Number)
                .ok_or_else(|| CastError { value: s.clone() })
        }
        other => Err(CastError {
            value: other.to_string(),
        }),
    }
}

fn string_array_wrap(value: &serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Array(_) => value.clone(),
        serde_json::Value::String(s) => serde_json::Value::Array(vec![s.clone().into()]),
        other => serde_json::Value::Array(vec![other.to_string().into()]),
    }
}

/// One field-mapping rule: rename/copy/derive a canonical attribute from a
/// vendor attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingRule {
    /// Key the value is read from. A missing source key makes the rule a
    /// no-op, never an error.
    pub source_key: String,

    /// Canonical key the value is written to.
    pub target_key: String,

    /// Predicate gating the rule.
    #[serde(default)]
    pub condition: Condition,

    /// Value transform.
    #[serde(default)]
    pub transform: Transform,
}

impl MappingRule {
    /// Creates an unconditional identity mapping.
    #[must_use]
    pub fn new(source_key: impl Into<String>, target_key: impl Into<String>) -> Self {
        Self {
            source_key: source_key.into(),
            target_key: target_key.into(),
            condition: Condition::Always,
            transform: Transform::Identity,
        }
    }

    /// Sets the condition.
    #[must_use]
    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.condition = condition;
        self
    }

    /// Sets the transform.
    #[must_use]
    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }
}

/// A named, ordered collection of mapping rules for one source convention.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSet {
    /// Rule-set name, unique within a configuration.
    pub name: String,

    /// Priority: lower numbers take precedence during conflict resolution.
    pub priority: u32,

    /// Attribute-key prefixes whose presence activates this set.
    pub triggers: Vec<String>,

    /// The mapping rules, applied in declaration order.
    pub rules: Vec<MappingRule>,
}

impl RuleSet {
    /// Creates an empty rule set.
    #[must_use]
    pub fn new(name: impl Into<String>, priority: u32) -> Self {
        Self {
            name: name.into(),
            priority,
            triggers: Vec::new(),
            rules: Vec::new(),
        }
    }

    /// Adds a trigger prefix.
    #[must_use]
    pub fn with_trigger(mut self, prefix: impl Into<String>) -> Self {
        self.triggers.push(prefix.into());
        self
    }

    /// Appends a rule.
    #[must_use]
    pub fn with_rule(mut self, rule: MappingRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Returns true if any attribute key starts with any of this set's
    /// trigger prefixes.
    #[must_use]
    pub fn matches<'a, I>(&self, mut attribute_keys: I) -> bool
    where
        I: Iterator<Item = &'a str>,
    {
        attribute_keys.any(|key| self.triggers.iter().any(|prefix| key.starts_with(prefix)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_identity_transform() {
        assert_eq!(
            Transform::Identity.apply(&json!("claude-3")).unwrap(),
            json!("claude-3")
        );
    }

    #[test]
    fn test_numeric_cast_passthrough() {
        assert_eq!(Transform::NumericCast.apply(&json!(150)).unwrap(), json!(150));
        assert_eq!(
            Transform::NumericCast.apply(&json!(0.25)).unwrap(),
            json!(0.25)
        );
    }

    #[test]
    fn test_numeric_cast_from_string() {
        assert_eq!(
            Transform::NumericCast.apply(&json!("150")).unwrap(),
            json!(150)
        );
        assert_eq!(
            Transform::NumericCast.apply(&json!(" 2.5 ")).unwrap(),
            json!(2.5)
        );
    }

    #[test]
    fn test_numeric_cast_failure() {
        let err = Transform::NumericCast
            .apply(&json!("not-a-number"))
            .unwrap_err();
        assert_eq!(err.value, "not-a-number");

        assert!(Transform::NumericCast.apply(&json!(true)).is_err());
        assert!(Transform::NumericCast.apply(&json!(["1"])).is_err());
    }

    #[test]
    fn test_string_array_wrap() {
        assert_eq!(
            Transform::StringArrayWrap.apply(&json!("hello")).unwrap(),
            json!(["hello"])
        );
        assert_eq!(
            Transform::StringArrayWrap.apply(&json!(["a", "b"])).unwrap(),
            json!(["a", "b"])
        );
        assert_eq!(
            Transform::StringArrayWrap.apply(&json!(42)).unwrap(),
            json!(["42"])
        );
    }

    #[test]
    fn test_ruleset_trigger_matching() {
        let set = RuleSet::new("openinference", 20)
            .with_trigger("llm.")
            .with_trigger("input.value");

        assert!(set.matches(["llm.model_name"].into_iter()));
        assert!(set.matches(["input.value"].into_iter()));
        assert!(!set.matches(["gen_ai.request.model"].into_iter()));
        assert!(!set.matches(std::iter::empty::<&str>()));
    }

    #[test]
    fn test_rule_serde_defaults() {
        let rule: MappingRule = serde_json::from_value(json!({
            "source_key": "llm.model_name",
            "target_key": "gen_ai.request.model"
        }))
        .unwrap();

        assert_eq!(rule.condition, Condition::Always);
        assert_eq!(rule.transform, Transform::Identity);
    }

    #[test]
    fn test_rule_serde_tagged_forms() {
        let rule: MappingRule = serde_json::from_value(json!({
            "source_key": "llm.token_count.prompt",
            "target_key": "gen_ai.usage.input_tokens",
            "condition": {"type": "target_absent"},
            "transform": {"type": "numeric_cast"}
        }))
        .unwrap();

        assert_eq!(rule.condition, Condition::TargetAbsent);
        assert_eq!(rule.transform, Transform::NumericCast);
    }

    #[test]
    fn test_ruleset_roundtrip() {
        let set = builtin::braintrust();
        let json = serde_json::to_string(&set).unwrap();
        let parsed: RuleSet = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, set);
    }
}
