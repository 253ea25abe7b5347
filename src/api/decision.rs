//! Decision and outcome types.

use crate::policy::DecisionType;
use crate::signal::{Signal, SignalConfidence};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// Reason attached to a decision when no policy blocked anything.
pub const NO_VIOLATIONS_REASON: &str = "No policy violations detected";

/// The verdict for one signal.
///
/// Field names and action values are a stable contract for callers that log
/// or display decisions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    /// The verdict
    pub action: DecisionType,
    /// Fields that triggered some policy, sorted and deduplicated
    #[serde(default)]
    pub blocked_fields: Vec<String>,
    /// Sorted, deduplicated policy reasons joined with "; "
    pub reason: String,
    /// Safe aggregate templates, offered for record-level requests only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_alternatives: Option<Vec<String>>,
    /// IDs of policies that contributed blocked fields, in table order
    #[serde(default)]
    pub matched_policies: Vec<String>,
}

impl Decision {
    /// Create an allow decision.
    pub fn allow() -> Self {
        Self {
            action: DecisionType::Allow,
            blocked_fields: Vec::new(),
            reason: NO_VIOLATIONS_REASON.to_string(),
            suggested_alternatives: None,
            matched_policies: Vec::new(),
        }
    }

    /// Set the suggested alternatives.
    pub fn with_alternatives(mut self, alternatives: Vec<String>) -> Self {
        self.suggested_alternatives = Some(alternatives);
        self
    }

    /// Whether the request may proceed, possibly rewritten.
    pub fn is_allowed(&self) -> bool {
        self.action.is_allowed()
    }

    /// Whether a field was blocked.
    pub fn blocks(&self, field: &str) -> bool {
        self.blocked_fields.iter().any(|f| f == field)
    }
}

impl Default for Decision {
    fn default() -> Self {
        Self::allow()
    }
}

/// Everything the guardrail produced for one request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardrailOutcome {
    /// Unique request identifier
    pub request_id: Uuid,
    /// When the request was evaluated
    pub evaluated_at: DateTime<Utc>,
    /// The text as received
    pub original_prompt: String,
    /// The signal the decision was made on
    pub signal: Signal,
    /// Classifier confidences, for observability only
    pub confidences: SignalConfidence,
    /// The verdict
    pub decision: Decision,
    /// Text to forward downstream; absent when the request is denied
    pub final_prompt: Option<String>,
    /// Time taken for evaluation in milliseconds
    pub evaluation_time_ms: f64,
}

impl GuardrailOutcome {
    /// Create an outcome stamped with a fresh request ID and the current time.
    pub fn new(
        original_prompt: impl Into<String>,
        signal: Signal,
        confidences: SignalConfidence,
        decision: Decision,
        final_prompt: Option<String>,
    ) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            evaluated_at: Utc::now(),
            original_prompt: original_prompt.into(),
            signal,
            confidences,
            decision,
            final_prompt,
            evaluation_time_ms: 0.0,
        }
    }

    /// Set the evaluation time.
    pub fn with_evaluation_time(mut self, duration: Duration) -> Self {
        self.evaluation_time_ms = duration.as_secs_f64() * 1000.0;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::Granularity;

    #[test]
    fn test_allow_decision() {
        let decision = Decision::allow();
        assert!(decision.is_allowed());
        assert_eq!(decision.action, DecisionType::Allow);
        assert!(decision.blocked_fields.is_empty());
        assert_eq!(decision.reason, "No policy violations detected");
    }

    #[test]
    fn test_decision_serialization() {
        let decision = Decision {
            action: DecisionType::Rewrite,
            blocked_fields: vec!["address".to_string(), "phone".to_string()],
            reason: "Doctor contact details must not be exposed".to_string(),
            suggested_alternatives: None,
            matched_policies: vec!["no_doctor_contact".to_string()],
        };

        let json = serde_json::to_value(&decision).unwrap();
        assert_eq!(json["action"], "rewrite");
        assert_eq!(json["blocked_fields"][1], "phone");
        assert!(json.get("suggested_alternatives").is_none());
        assert!(decision.blocks("address"));
        assert!(!decision.blocks("EFN"));
    }

    #[test]
    fn test_outcome_timing() {
        let outcome = GuardrailOutcome::new(
            "How many doctors are there?",
            Signal::builder().granularity(Granularity::Aggregate).build(),
            SignalConfidence {
                intent: 0.9,
                domain: 0.9,
                granularity: 0.9,
                predicted_granularity: Granularity::Aggregate,
                granularity_override: None,
            },
            Decision::allow(),
            Some("How many doctors are there?".to_string()),
        )
        .with_evaluation_time(Duration::from_micros(1500));

        assert_eq!(outcome.evaluation_time_ms, 1.5);
        assert_eq!(outcome.request_id.get_version_num(), 4);
    }
}
