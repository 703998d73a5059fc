//! Static model registry.
//!
//! Capability lookup is a pure function of the model id. Unknown ids resolve
//! to "no capabilities" and zero pricing rather than an error.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelCapabilities {
    pub reasoning: bool,
    pub web_search: bool,
    pub json_mode: bool
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelDescriptor {
    pub id: &'static str,
    pub capabilities: ModelCapabilities,
    /// USD per million prompt tokens
    pub prompt_price: f64,
    /// USD per million completion tokens
    pub completion_price: f64
}

const fn model(
    id: &'static str,
    reasoning: bool,
    web_search: bool,
    json_mode: bool,
    prompt_price: f64,
    completion_price: f64
) -> ModelDescriptor {
    ModelDescriptor {
        id,
        capabilities: ModelCapabilities {
            reasoning,
            web_search,
            json_mode
        },
        prompt_price,
        completion_price
    }
}

static MODELS: &[ModelDescriptor] = &[
    model("anthropic/claude-sonnet-4", true, false, false, 3.0, 15.0),
    model("anthropic/claude-3.5-haiku", false, false, false, 0.8, 4.0),
    model("openai/gpt-4o", false, false, true, 2.5, 10.0),
    model("openai/gpt-4o-mini", false, false, true, 0.15, 0.6),
    model("openai/o3-mini", true, false, true, 1.1, 4.4),
    model("google/gemini-2.0-flash-001", false, false, true, 0.1, 0.4),
    model("google/gemini-2.5-pro", true, false, true, 1.25, 10.0),
    model("perplexity/sonar", false, true, false, 1.0, 1.0),
    model("perplexity/sonar-pro", false, true, false, 3.0, 15.0),
    model("perplexity/sonar-reasoning-pro", true, true, false, 2.0, 8.0),
    model("perplexity/sonar-deep-research", true, true, false, 2.0, 8.0),
    model("openai/text-embedding-3-small", false, false, false, 0.02, 0.0),
    model("openai/text-embedding-3-large", false, false, false, 0.13, 0.0)
];

pub fn lookup(id: &str) -> Option<&'static ModelDescriptor> {
    MODELS.iter().find(|m| m.id == id)
}

pub fn all() -> &'static [ModelDescriptor] {
    MODELS
}

pub fn capabilities(id: &str) -> ModelCapabilities {
    lookup(id).map(|m| m.capabilities).unwrap_or_default()
}

pub fn supports_reasoning(id: &str) -> bool {
    capabilities(id).reasoning
}

pub fn has_web_search(id: &str) -> bool {
    capabilities(id).web_search
}

pub fn supports_json_mode(id: &str) -> bool {
    capabilities(id).json_mode
}

/// Registry-priced cost, used when the provider does not report one.
pub fn estimate_cost(id: &str, prompt_tokens: u64, completion_tokens: u64) -> f64 {
    lookup(id)
        .map(|m| {
            (prompt_tokens as f64 * m.prompt_price + completion_tokens as f64 * m.completion_price)
                / 1_000_000.0
        })
        .unwrap_or(0.0)
}
