//! The normalized view of one request.
//!
//! Upstream classifiers and the extractor produce uncertain, heterogeneous
//! outputs. [`SignalFusion`] folds them into a single [`Signal`], which is the
//! only input the decision engine looks at.

mod fusion;
mod scope;

pub use fusion::{
    GranularityGuard, GuardOutcome, OverrideCause, SignalFusion,
    DEFAULT_GRANULARITY_CONFIDENCE_THRESHOLD,
};
pub use scope::{detect_requested_scope, RequestedScope, FULL_SCOPE_PHRASES};

use crate::policy::Granularity;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A label with its confidence, as returned by any classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Predicted label
    pub label: String,
    /// Confidence in [0, 1]
    pub confidence: f64,
}

impl Prediction {
    /// Create a new prediction.
    pub fn new(label: impl Into<String>, confidence: f64) -> Self {
        Self {
            label: label.into(),
            confidence,
        }
    }

    /// Reject predictions that cannot be trusted as a signal.
    pub fn validate(&self, stage: &str) -> crate::Result<()> {
        if self.label.trim().is_empty() {
            return Err(crate::Error::signal(stage, "classifier returned an empty label"));
        }
        if !self.confidence.is_finite() || !(0.0..=1.0).contains(&self.confidence) {
            return Err(crate::Error::signal(
                stage,
                format!("confidence {} is outside [0, 1]", self.confidence),
            ));
        }
        Ok(())
    }
}

/// The normalized signal the decision engine evaluates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    /// Predicted intent label (read, write, other, ...)
    pub intent: String,
    /// Predicted domain label (healthcare, hr, ...)
    pub domain: String,
    /// Entity kinds mentioned, in first-mention order
    #[serde(default)]
    pub entities: Vec<String>,
    /// Fields the request names explicitly
    #[serde(default)]
    pub mentioned_fields: BTreeSet<String>,
    /// Fields inferred from scope phrases, never overlapping `mentioned_fields`
    #[serde(default)]
    pub implied_fields: BTreeSet<String>,
    /// Whether the request asks for everything about an entity
    #[serde(default)]
    pub requested_scope: RequestedScope,
    /// Granularity after the conservative override
    pub granularity: Granularity,
}

impl Signal {
    /// Create a signal builder.
    pub fn builder() -> SignalBuilder {
        SignalBuilder::new()
    }

    /// Restore the construction invariants on a signal received from outside:
    /// entities are deduplicated and implied fields exclude mentioned ones.
    pub fn normalized(mut self) -> Self {
        let mut seen = BTreeSet::new();
        self.entities.retain(|e| seen.insert(e.clone()));
        let mentioned = &self.mentioned_fields;
        self.implied_fields.retain(|f| !mentioned.contains(f));
        self
    }

    /// Whether the entity kind was recognized in the request.
    pub fn mentions_entity(&self, entity: &str) -> bool {
        self.entities.iter().any(|e| e == entity)
    }

    /// Fields matched against policies.
    ///
    /// A full-scope request is assumed to want every sensitive field.
    pub fn requested_fields(&self, sensitive_fields: &BTreeSet<String>) -> BTreeSet<String> {
        match self.requested_scope {
            RequestedScope::Full => sensitive_fields.clone(),
            RequestedScope::Partial => self
                .mentioned_fields
                .union(&self.implied_fields)
                .cloned()
                .collect(),
        }
    }
}

/// Builder for signals.
#[derive(Debug, Clone)]
pub struct SignalBuilder {
    signal: Signal,
}

impl SignalBuilder {
    /// Start from a conservative empty signal: record-level, partial scope.
    pub fn new() -> Self {
        Self {
            signal: Signal {
                intent: "other".to_string(),
                domain: String::new(),
                entities: Vec::new(),
                mentioned_fields: BTreeSet::new(),
                implied_fields: BTreeSet::new(),
                requested_scope: RequestedScope::Partial,
                granularity: Granularity::RecordLevel,
            },
        }
    }

    /// Set the intent label.
    pub fn intent(mut self, intent: impl Into<String>) -> Self {
        self.signal.intent = intent.into();
        self
    }

    /// Set the domain label.
    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.signal.domain = domain.into();
        self
    }

    /// Add a recognized entity.
    pub fn entity(mut self, entity: impl Into<String>) -> Self {
        self.signal.entities.push(entity.into());
        self
    }

    /// Add explicitly mentioned fields.
    pub fn mentioned(mut self, fields: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.signal
            .mentioned_fields
            .extend(fields.into_iter().map(Into::into));
        self
    }

    /// Add implied fields.
    pub fn implied(mut self, fields: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.signal
            .implied_fields
            .extend(fields.into_iter().map(Into::into));
        self
    }

    /// Set the requested scope.
    pub fn scope(mut self, scope: RequestedScope) -> Self {
        self.signal.requested_scope = scope;
        self
    }

    /// Set the granularity.
    pub fn granularity(mut self, granularity: Granularity) -> Self {
        self.signal.granularity = granularity;
        self
    }

    /// Build the signal.
    pub fn build(self) -> Signal {
        self.signal.normalized()
    }
}

impl Default for SignalBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Classifier confidences carried alongside a signal for observability.
///
/// None of these values take part in policy matching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalConfidence {
    /// Intent classifier confidence
    pub intent: f64,
    /// Domain classifier confidence
    pub domain: f64,
    /// Granularity classifier confidence
    pub granularity: f64,
    /// Granularity label as predicted, before the override
    pub predicted_granularity: Granularity,
    /// Why the predicted granularity was replaced, if it was
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub granularity_override: Option<OverrideCause>,
}

/// A signal together with the confidences it was built from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusedSignal {
    /// The signal handed to the decision engine
    pub signal: Signal,
    /// Confidences passed through for observability
    pub confidence: SignalConfidence,
}
