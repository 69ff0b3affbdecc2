//! Per-call cost from token usage and the pricing table.
//!
//! Never fails and never yields NaN: missing pricing, garbage rates and
//! garbage token counts all collapse to zero.

use crate::llm::TokenUsage;

use super::pricing::PricingTable;

/// Cost reported when no price can be computed.
pub const ZERO_COST: &str = "0.00";

/// Cost of one call, formatted with 6 decimals, or [`ZERO_COST`] when the
/// model has no usable pricing entry.
pub fn compute_cost(model_id: &str, usage: &TokenUsage, pricing: &PricingTable) -> String {
    let Some(entry) = pricing.get(model_id) else {
        return ZERO_COST.to_string();
    };
    if !valid_rate(entry.prompt) || !valid_rate(entry.completion) {
        return ZERO_COST.to_string();
    }

    let prompt_tokens = normalize_tokens(usage.prompt_tokens);
    let completion_tokens = normalize_tokens(usage.completion_tokens);

    let cost = prompt_tokens / 1000.0 * entry.prompt + completion_tokens / 1000.0 * entry.completion;
    if !cost.is_finite() || cost < 0.0 {
        return ZERO_COST.to_string();
    }
    format!("{cost:.6}")
}

/// Parse a cost string produced by [`compute_cost`]; anything unparseable,
/// negative or non-finite reads as zero.
pub fn parse_cost(cost: &str) -> f64 {
    match cost.trim().parse::<f64>() {
        Ok(v) if v.is_finite() && v > 0.0 => v,
        _ => 0.0,
    }
}

fn valid_rate(rate: f64) -> bool {
    rate.is_finite() && rate >= 0.0
}

fn normalize_tokens(n: Option<f64>) -> f64 {
    match n {
        Some(v) if v.is_finite() && v > 0.0 => v,
        _ => 0.0,
    }
}
