use crate::error::ContractViolation;
use serde::{Deserialize, Serialize};

/// A validated description-turn decision.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PerformanceDecision {
    pub description: String,
    pub tendency: String,
    pub self_prediction: bool,
    #[serde(default)]
    pub keyword_prediction: String,
    pub perform_reason: String,
}

/// A validated vote-turn decision.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VoteDecision {
    pub voted_player: String,
    pub vote_reason: String,
}

/// Extracts the outermost `{...}` span of a raw reply: everything from the
/// first `{` through the last `}`. Models wrap their JSON in prose and code
/// fences, so anything outside the span is ignored.
pub fn extract_json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&raw[start..=end])
}

fn decode<T: for<'de> Deserialize<'de>>(raw: &str) -> Result<T, ContractViolation> {
    let span = extract_json_object(raw).ok_or_else(|| {
        ContractViolation::MalformedShape("reply contains no JSON object".to_string())
    })?;
    serde_json::from_str::<T>(span).map_err(|e| ContractViolation::MalformedShape(e.to_string()))
}

/// Validates a raw reply against the description-turn contract.
pub fn parse_performance(raw: &str) -> Result<PerformanceDecision, ContractViolation> {
    decode(raw)
}

/// Validates a raw reply against the vote-turn contract.
///
/// Beyond the JSON shape, `voted_player` must be one of the currently living
/// names the caller supplies: voting for an eliminated or nonexistent player
/// is an [`ContractViolation::InvalidTarget`], not a malformed reply.
pub fn parse_vote(raw: &str, living_players: &[String]) -> Result<VoteDecision, ContractViolation> {
    let decision: VoteDecision = decode(raw)?;
    if !living_players.contains(&decision.voted_player) {
        return Err(ContractViolation::InvalidTarget(format!(
            "{} is not a living player",
            decision.voted_player
        )));
    }
    Ok(decision)
}
