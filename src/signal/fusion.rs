//! Signal fusion and the granularity guard.

use super::{FusedSignal, Prediction, RequestedScope, Signal, SignalConfidence};
use crate::error::ErrorContext;
use crate::extract::{Extraction, FieldExtractor};
use crate::policy::Granularity;
use crate::predictor::Predictors;
use crate::Result;

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Granularity predictions below this confidence are not trusted.
pub const DEFAULT_GRANULARITY_CONFIDENCE_THRESHOLD: f64 = 0.75;

/// Why a predicted granularity was replaced by `record_level`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverrideCause {
    /// The classifier was not confident enough
    LowConfidence,
    /// The request asks for everything about an entity
    FullScope,
}

impl OverrideCause {
    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            OverrideCause::LowConfidence => "low_confidence",
            OverrideCause::FullScope => "full_scope",
        }
    }
}

/// Result of applying the granularity guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuardOutcome {
    /// Granularity the engine will see
    pub granularity: Granularity,
    /// Set when the predicted label was replaced
    pub cause: Option<OverrideCause>,
}

/// Forces `record_level` whenever the granularity prediction is unreliable
/// or the request is scope-broadened.
///
/// The guard only ever degrades toward `record_level`; it never turns a
/// record-level prediction into an aggregate one.
#[derive(Debug, Clone, Copy)]
pub struct GranularityGuard {
    threshold: f64,
}

impl GranularityGuard {
    /// Create a guard with the given confidence threshold.
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    /// The confidence threshold.
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Decide the effective granularity.
    pub fn apply(
        &self,
        predicted: Granularity,
        confidence: f64,
        scope: RequestedScope,
    ) -> GuardOutcome {
        // NaN compares false, so it lands in the low-confidence branch.
        let cause = if !(confidence >= self.threshold) {
            Some(OverrideCause::LowConfidence)
        } else if scope == RequestedScope::Full {
            Some(OverrideCause::FullScope)
        } else {
            None
        };

        match cause {
            Some(cause) if predicted != Granularity::RecordLevel => GuardOutcome {
                granularity: Granularity::RecordLevel,
                cause: Some(cause),
            },
            _ => GuardOutcome {
                granularity: predicted,
                cause: None,
            },
        }
    }
}

impl Default for GranularityGuard {
    fn default() -> Self {
        Self::new(DEFAULT_GRANULARITY_CONFIDENCE_THRESHOLD)
    }
}

/// Builds a [`Signal`] from the classifiers and the extractor.
pub struct SignalFusion {
    predictors: Predictors,
    extractor: Arc<dyn FieldExtractor>,
    guard: GranularityGuard,
}

impl SignalFusion {
    /// Create a fusion stage over injected signal sources.
    pub fn new(
        predictors: Predictors,
        extractor: Arc<dyn FieldExtractor>,
        guard: GranularityGuard,
    ) -> Self {
        Self {
            predictors,
            extractor,
            guard,
        }
    }

    /// The guard in use.
    pub fn guard(&self) -> &GranularityGuard {
        &self.guard
    }

    /// The extractor in use.
    pub fn extractor(&self) -> &dyn FieldExtractor {
        self.extractor.as_ref()
    }

    /// Query every signal source and fuse the results.
    ///
    /// Any source failing fails the whole signal; nothing is defaulted.
    pub async fn fuse(&self, text: &str) -> Result<FusedSignal> {
        let (intent, domain, granularity) = futures::try_join!(
            async { self.predictors.intent.predict(text).await.with_stage("intent") },
            async { self.predictors.domain.predict(text).await.with_stage("domain") },
            async {
                self.predictors
                    .granularity
                    .predict(text)
                    .await
                    .with_stage("granularity")
            },
        )?;

        let extraction = self.extractor.extract(text).with_stage("extraction")?;

        self.assemble(intent, domain, granularity, extraction)
    }

    /// Fuse already-obtained predictions and extraction into a signal.
    pub fn assemble(
        &self,
        intent: Prediction,
        domain: Prediction,
        granularity: Prediction,
        extraction: Extraction,
    ) -> Result<FusedSignal> {
        intent.validate("intent")?;
        domain.validate("domain")?;
        granularity.validate("granularity")?;

        let predicted: Granularity = granularity.label.parse().with_stage("granularity")?;
        let outcome = self
            .guard
            .apply(predicted, granularity.confidence, extraction.requested_scope);

        if let Some(cause) = outcome.cause {
            debug!(
                predicted = %predicted,
                confidence = granularity.confidence,
                cause = cause.as_str(),
                "Granularity forced to record_level"
            );
        }

        let signal = Signal {
            intent: intent.label.trim().to_string(),
            domain: domain.label.trim().to_string(),
            entities: extraction.entities,
            mentioned_fields: extraction.mentioned_fields,
            implied_fields: extraction.implied_fields,
            requested_scope: extraction.requested_scope,
            granularity: outcome.granularity,
        }
        .normalized();

        Ok(FusedSignal {
            signal,
            confidence: SignalConfidence {
                intent: intent.confidence,
                domain: domain.confidence,
                granularity: granularity.confidence,
                predicted_granularity: predicted,
                granularity_override: outcome.cause,
            },
        })
    }
}
