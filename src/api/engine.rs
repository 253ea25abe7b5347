//! Guardrail implementation.

use super::{Decision, GuardrailOutcome};
use crate::cache::{CacheStats, DecisionCache};
use crate::config::Config;
use crate::core::{rewrite_prompt, Evaluator};
use crate::extract::{FieldExtractor, Lexicon, LexiconExtractor};
use crate::policy::{DecisionType, PolicyTable};
use crate::predictor::Predictors;
use crate::signal::{GranularityGuard, Signal, SignalFusion};
use crate::telemetry::{Telemetry, TelemetryMetrics};
use crate::Result;

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// The guardrail: signal fusion, policy decision and prompt rewriting.
///
/// The policy table is loaded once and never mutated, so a `Guardrail` can be
/// shared across concurrent requests behind an `Arc`.
pub struct Guardrail {
    /// Validated policy table
    table: Arc<PolicyTable>,
    /// Signal construction
    fusion: SignalFusion,
    /// Policy evaluator
    evaluator: Evaluator,
    /// Decision cache
    cache: Option<DecisionCache>,
    /// Telemetry instance
    telemetry: Option<Telemetry>,
    /// Configuration
    config: Config,
}

impl Guardrail {
    /// Create a guardrail builder.
    pub fn builder() -> GuardrailBuilder {
        GuardrailBuilder::new()
    }

    /// Evaluate a natural-language request.
    ///
    /// This is the main entry point. It will:
    /// 1. Query the classifiers and the extractor and fuse their output
    /// 2. Decide on the fused signal, consulting the cache first
    /// 3. Rewrite the request when the verdict is `rewrite`
    ///
    /// Signal failures are returned as errors and must be treated as a deny.
    pub async fn evaluate(&self, text: &str) -> Result<GuardrailOutcome> {
        let start = Instant::now();

        let fused = match self.fusion.fuse(text).await {
            Ok(fused) => fused,
            Err(err) => {
                if err.fails_closed() {
                    if let Some(ref telemetry) = self.telemetry {
                        telemetry.record_signal_failure(err.category());
                    }
                }
                warn!(error = %err, "Signal construction failed, request fails closed");
                return Err(err);
            }
        };

        if let (Some(cause), Some(telemetry)) =
            (fused.confidence.granularity_override, self.telemetry.as_ref())
        {
            telemetry.record_override(cause);
        }

        let decision = self.decide(&fused.signal);
        let final_prompt = match decision.action {
            DecisionType::Allow => Some(text.to_string()),
            DecisionType::Rewrite => {
                Some(rewrite_prompt(text, &decision, self.fusion.extractor()))
            }
            DecisionType::Deny => None,
        };

        let outcome = GuardrailOutcome::new(
            text,
            fused.signal,
            fused.confidence,
            decision,
            final_prompt,
        )
        .with_evaluation_time(start.elapsed());

        if let Some(ref telemetry) = self.telemetry {
            telemetry.record_decision(outcome.decision.action, outcome.evaluation_time_ms);
        }

        info!(
            request_id = %outcome.request_id,
            action = %outcome.decision.action,
            blocked_fields = ?outcome.decision.blocked_fields,
            evaluation_time_ms = outcome.evaluation_time_ms,
            "Request evaluated"
        );

        Ok(outcome)
    }

    /// Decide on an already-fused signal.
    pub fn decide(&self, signal: &Signal) -> Decision {
        if let Some(ref cache) = self.cache {
            let cached = cache.get(signal);
            if let Some(ref telemetry) = self.telemetry {
                telemetry.record_cache(cached.is_some());
            }
            if let Some(decision) = cached {
                debug!("Decision served from cache");
                return decision;
            }
        }

        let decision = self.evaluator.evaluate(signal, &self.table);

        if let Some(ref cache) = self.cache {
            cache.put(signal, &decision);
        }

        decision
    }

    /// The policy table in use.
    pub fn table(&self) -> &PolicyTable {
        &self.table
    }

    /// The configuration the guardrail was built with.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The telemetry instance, if enabled.
    pub fn telemetry(&self) -> Option<&Telemetry> {
        self.telemetry.as_ref()
    }

    /// Clear the decision cache.
    pub fn clear_cache(&self) {
        if let Some(ref cache) = self.cache {
            cache.clear();
        }
    }

    /// Get cache statistics.
    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.cache.as_ref().map(|c| c.stats())
    }

    /// Get guardrail metrics.
    pub fn metrics(&self) -> GuardrailMetrics {
        GuardrailMetrics {
            policy_count: self.table.len(),
            policy_fingerprint: self.table.fingerprint().to_string(),
            granularity_confidence_threshold: self.fusion.guard().threshold(),
            cache_enabled: self.cache.is_some(),
            cache_stats: self.cache_stats(),
            telemetry: self.telemetry.as_ref().map(|t| t.metrics()),
        }
    }
}

/// Builder for creating a Guardrail.
///
/// Anything not set explicitly is derived from the configuration: the policy
/// table and lexicon from `policy.*` (falling back to the compiled-in
/// reference data), predictors from `predictors.*`.
#[derive(Default)]
pub struct GuardrailBuilder {
    config: Option<Config>,
    table: Option<Arc<PolicyTable>>,
    extractor: Option<Arc<dyn FieldExtractor>>,
    predictors: Option<Predictors>,
    telemetry_enabled: Option<bool>,
    cache_enabled: Option<bool>,
    cache_size: Option<usize>,
}

impl GuardrailBuilder {
    /// Create a new guardrail builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the configuration.
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// Use an already loaded policy table.
    pub fn with_table(mut self, table: impl Into<Arc<PolicyTable>>) -> Self {
        self.table = Some(table.into());
        self
    }

    /// Use a custom extractor.
    pub fn with_extractor(mut self, extractor: Arc<dyn FieldExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    /// Use the given classifiers.
    pub fn with_predictors(mut self, predictors: Predictors) -> Self {
        self.predictors = Some(predictors);
        self
    }

    /// Enable or disable telemetry.
    pub fn with_telemetry_enabled(mut self, enabled: bool) -> Self {
        self.telemetry_enabled = Some(enabled);
        self
    }

    /// Enable or disable caching.
    pub fn with_cache_enabled(mut self, enabled: bool) -> Self {
        self.cache_enabled = Some(enabled);
        self
    }

    /// Set the cache size.
    pub fn with_cache_size(mut self, size: usize) -> Self {
        self.cache_size = Some(size);
        self
    }

    /// Build the guardrail.
    ///
    /// Fails on invalid configuration, an invalid policy table or lexicon, or
    /// missing predictor endpoints.
    pub fn build(self) -> Result<Guardrail> {
        let mut config = self.config.unwrap_or_default();

        // Apply builder overrides
        if let Some(enabled) = self.cache_enabled {
            config.cache.enabled = enabled;
        }
        if let Some(size) = self.cache_size {
            config.cache.max_entries = size;
        }
        if let Some(enabled) = self.telemetry_enabled {
            config.telemetry.enabled = enabled;
        }
        config.validate()?;

        let table = match self.table {
            Some(table) => table,
            None => Arc::new(match config.policy.policy_file {
                Some(ref path) => PolicyTable::from_file(path)?,
                None => PolicyTable::reference()?,
            }),
        };

        let extractor: Arc<dyn FieldExtractor> = match self.extractor {
            Some(extractor) => extractor,
            None => {
                let lexicon = match config.policy.lexicon_file {
                    Some(ref path) => Lexicon::from_file(path)?,
                    None => Lexicon::reference()?,
                };
                Arc::new(LexiconExtractor::new(lexicon)?)
            }
        };

        let predictors = match self.predictors {
            Some(predictors) => predictors,
            None => Predictors::from_config(&config.predictors)?,
        };

        let guard = GranularityGuard::new(config.guard.granularity_confidence_threshold);
        let cache = config
            .cache
            .enabled
            .then(|| DecisionCache::new(config.cache.max_entries, config.cache.ttl()));
        let telemetry = if config.telemetry.enabled {
            Some(Telemetry::new(&config.telemetry)?)
        } else {
            None
        };

        info!(
            policies = table.len(),
            fingerprint = %table.fingerprint(),
            predictors = ?predictors,
            threshold = guard.threshold(),
            cache = cache.is_some(),
            "Guardrail initialized"
        );

        Ok(Guardrail {
            table,
            fusion: SignalFusion::new(predictors, extractor, guard),
            evaluator: Evaluator::new(),
            cache,
            telemetry,
            config,
        })
    }
}

/// Guardrail metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardrailMetrics {
    /// Number of loaded policies
    pub policy_count: usize,
    /// Fingerprint of the loaded policy table
    pub policy_fingerprint: String,
    /// Granularity guard threshold
    pub granularity_confidence_threshold: f64,
    /// Whether caching is enabled
    pub cache_enabled: bool,
    /// Cache statistics (if caching is enabled)
    pub cache_stats: Option<CacheStats>,
    /// Telemetry snapshot (if telemetry is enabled)
    pub telemetry: Option<TelemetryMetrics>,
}
