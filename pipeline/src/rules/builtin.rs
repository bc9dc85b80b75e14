//! Built-in rule sets for the instrumentation conventions Spanform
//! recognizes out of the box.
//!
//! Priorities: the canonical set sits at 0 so that a canonical attribute
//! already present on a record always outranks any vendor rewrite of the
//! same key. Vendor sets follow in decreasing trust order. All mappings are
//! value-preserving; vendor attributes are never deleted.

use super::{keys, Condition, MappingRule, RuleSet, Transform};

/// Name of the canonical self-mapping rule set.
pub const CANONICAL: &str = "gen-ai-canonical";
/// Name of the OpenLLMetry rule set.
pub const OPENLLMETRY: &str = "openllmetry";
/// Name of the OpenInference / Arize Phoenix rule set.
pub const OPENINFERENCE: &str = "openinference";
/// Name of the Langfuse rule set.
pub const LANGFUSE: &str = "langfuse";
/// Name of the Braintrust rule set.
pub const BRAINTRUST: &str = "braintrust";

/// All built-in rule sets in priority order.
#[must_use]
pub fn builtin_rulesets() -> Vec<RuleSet> {
    vec![
        canonical(),
        openllmetry(),
        openinference(),
        langfuse(),
        braintrust(),
    ]
}

/// Canonical `gen_ai.*` self-mappings (priority 0).
///
/// Each rule maps a canonical key onto itself. When the key is present its
/// staged write wins conflict resolution against every vendor set; when it
/// is absent the rule is a no-op. This is what makes normalization
/// idempotent and keeps manual canonical instrumentation authoritative.
#[must_use]
pub fn canonical() -> RuleSet {
    let protected = [
        keys::OPERATION_NAME,
        keys::REQUEST_MODEL,
        keys::RESPONSE_MODEL,
        keys::PROVIDER_NAME,
        keys::SYSTEM,
        keys::INPUT_TOKENS,
        keys::OUTPUT_TOKENS,
        keys::TOTAL_TOKENS,
        keys::INPUT_MESSAGES,
        keys::OUTPUT_MESSAGES,
        keys::TOOL_NAME,
        keys::CONVERSATION_ID,
        keys::AGENT_NAME,
    ];

    let mut set = RuleSet::new(CANONICAL, 0).with_trigger("gen_ai.");
    for key in protected {
        set = set.with_rule(MappingRule::new(key, key));
    }
    set
}

/// OpenLLMetry mappings (priority 10): legacy `gen_ai.usage.prompt_tokens` /
/// `completion_tokens` names and `llm.request.type`.
#[must_use]
pub fn openllmetry() -> RuleSet {
    RuleSet::new(OPENLLMETRY, 10)
        .with_trigger("gen_ai.usage.prompt_tokens")
        .with_trigger("gen_ai.usage.completion_tokens")
        .with_trigger("llm.request.type")
        .with_trigger("llm.usage.")
        .with_trigger("traceloop.")
        .with_rule(
            MappingRule::new("gen_ai.usage.prompt_tokens", keys::INPUT_TOKENS)
                .with_transform(Transform::NumericCast),
        )
        .with_rule(
            MappingRule::new("gen_ai.usage.completion_tokens", keys::OUTPUT_TOKENS)
                .with_transform(Transform::NumericCast),
        )
        .with_rule(
            MappingRule::new("llm.usage.total_tokens", keys::TOTAL_TOKENS)
                .with_transform(Transform::NumericCast),
        )
        .with_rule(MappingRule::new("llm.request.type", keys::OPERATION_NAME))
        .with_rule(
            MappingRule::new("traceloop.entity.name", keys::AGENT_NAME)
                .with_condition(Condition::TargetAbsent),
        )
}

/// OpenInference / Arize Phoenix mappings (priority 20): `llm.*` attribute
/// names and the `input.value` / `output.value` payload keys.
#[must_use]
pub fn openinference() -> RuleSet {
    RuleSet::new(OPENINFERENCE, 20)
        .with_trigger("llm.")
        .with_trigger("openinference.")
        .with_trigger("input.value")
        .with_trigger("output.value")
        .with_trigger("phoenix.")
        .with_rule(MappingRule::new("llm.model_name", keys::REQUEST_MODEL))
        .with_rule(MappingRule::new("llm.provider", keys::PROVIDER_NAME))
        .with_rule(MappingRule::new("llm.system", keys::SYSTEM))
        .with_rule(
            MappingRule::new("llm.token_count.prompt", keys::INPUT_TOKENS)
                .with_transform(Transform::NumericCast),
        )
        .with_rule(
            MappingRule::new("llm.token_count.completion", keys::OUTPUT_TOKENS)
                .with_transform(Transform::NumericCast),
        )
        .with_rule(
            MappingRule::new("llm.token_count.total", keys::TOTAL_TOKENS)
                .with_transform(Transform::NumericCast),
        )
        .with_rule(
            MappingRule::new("input.value", keys::INPUT_MESSAGES)
                .with_transform(Transform::StringArrayWrap),
        )
        .with_rule(
            MappingRule::new("output.value", keys::OUTPUT_MESSAGES)
                .with_transform(Transform::StringArrayWrap),
        )
        .with_rule(
            MappingRule::new("tool.name", keys::TOOL_NAME)
                .with_condition(Condition::TargetAbsent),
        )
}

/// Langfuse mappings (priority 30): `langfuse.observation.*` payloads and
/// session identity.
#[must_use]
pub fn langfuse() -> RuleSet {
    RuleSet::new(LANGFUSE, 30)
        .with_trigger("langfuse.")
        .with_rule(MappingRule::new(
            "langfuse.observation.model_name",
            keys::REQUEST_MODEL,
        ))
        .with_rule(
            MappingRule::new("langfuse.observation.usage_details.input", keys::INPUT_TOKENS)
                .with_transform(Transform::NumericCast),
        )
        .with_rule(
            MappingRule::new(
                "langfuse.observation.usage_details.output",
                keys::OUTPUT_TOKENS,
            )
            .with_transform(Transform::NumericCast),
        )
        .with_rule(
            MappingRule::new("langfuse.observation.input", keys::INPUT_MESSAGES)
                .with_transform(Transform::StringArrayWrap),
        )
        .with_rule(
            MappingRule::new("langfuse.observation.output", keys::OUTPUT_MESSAGES)
                .with_transform(Transform::StringArrayWrap),
        )
        .with_rule(MappingRule::new("langfuse.session.id", keys::CONVERSATION_ID))
}

/// Braintrust mappings (priority 40): `braintrust.input` / `output` payloads
/// and `braintrust.metrics.*` token counts. Score attributes
/// (`braintrust.scores.*`) are intentionally left untouched.
#[must_use]
pub fn braintrust() -> RuleSet {
    RuleSet::new(BRAINTRUST, 40)
        .with_trigger("braintrust.")
        .with_rule(
            MappingRule::new("braintrust.input", keys::INPUT_MESSAGES)
                .with_transform(Transform::StringArrayWrap),
        )
        .with_rule(
            MappingRule::new("braintrust.output", keys::OUTPUT_MESSAGES)
                .with_transform(Transform::StringArrayWrap),
        )
        .with_rule(
            MappingRule::new("braintrust.metrics.prompt_tokens", keys::INPUT_TOKENS)
                .with_transform(Transform::NumericCast),
        )
        .with_rule(
            MappingRule::new("braintrust.metrics.completion_tokens", keys::OUTPUT_TOKENS)
                .with_transform(Transform::NumericCast),
        )
        .with_rule(
            MappingRule::new("braintrust.metrics.tokens", keys::TOTAL_TOKENS)
                .with_transform(Transform::NumericCast),
        )
}
