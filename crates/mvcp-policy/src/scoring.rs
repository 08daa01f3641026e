use mvcp_domain::{BeaconMetadata, PolicyRules, PolicyScoring};

/// Normalization constants the scoring formula is defined against. Defaults
/// only — a deployment-specific policy can still exclude a dimension
/// entirely by setting its weight to zero.
const LATENCY_NORMALIZATION_MS: f64 = 200.0;
const PRICE_NORMALIZATION_PER_GB: f64 = 1.0;
const QUEUE_NORMALIZATION_DEPTH: f64 = 100.0;

/// A bound of `0` disables that constraint rather than rejecting everything.
pub fn meets_constraints(rules: &PolicyRules, meta: &BeaconMetadata) -> bool {
    if rules.max_latency_ms > 0.0 && meta.latency_ms > rules.max_latency_ms {
        return false;
    }
    if rules.max_price_per_gb > 0.0 && meta.price_per_gb > rules.max_price_per_gb {
        return false;
    }
    if rules.min_reputation_score > 0.0 && meta.reputation() < rules.min_reputation_score {
        return false;
    }
    if rules.max_queue_depth > 0.0 && meta.queue_depth > rules.max_queue_depth {
        return false;
    }
    if rules.max_packet_loss > 0.0 && meta.packet_loss > rules.max_packet_loss {
        return false;
    }
    if rules.max_jitter_ms > 0.0 && meta.jitter_ms > rules.max_jitter_ms {
        return false;
    }
    if !rules.required_capabilities.is_empty()
        && !rules.required_capabilities.iter().all(|cap| meta.node_capabilities.contains(cap))
    {
        return false;
    }
    true
}

/// Each sub-score is clamped to `[0,1]` before being weighted and summed.
pub fn calculate_score(scoring: &PolicyScoring, meta: &BeaconMetadata) -> f64 {
    let latency_sub = (1.0 - meta.latency_ms / LATENCY_NORMALIZATION_MS).clamp(0.0, 1.0);
    let price_sub = (1.0 - meta.price_per_gb / PRICE_NORMALIZATION_PER_GB).clamp(0.0, 1.0);
    let reputation_sub = meta.reputation().clamp(0.0, 1.0);
    let queue_sub = (1.0 - meta.queue_depth / QUEUE_NORMALIZATION_DEPTH).clamp(0.0, 1.0);

    scoring.latency_weight * latency_sub
        + scoring.price_weight * price_sub
        + scoring.reputation_weight * reputation_sub
        + scoring.queue_weight * queue_sub
}
