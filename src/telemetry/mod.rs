//! Telemetry for the guardrail.
//!
//! Counters and the evaluation latency histogram live in a private
//! Prometheus registry so several guardrails can coexist in one process
//! (and in one test binary).

use crate::config::TelemetryConfig;
use crate::policy::DecisionType;
use crate::signal::OverrideCause;
use crate::Result;

use prometheus::{Encoder, Histogram, HistogramOpts, IntCounterVec, Opts, Registry, TextEncoder};
use serde::{Deserialize, Serialize};

const DECISION_ACTIONS: [DecisionType; 3] =
    [DecisionType::Allow, DecisionType::Deny, DecisionType::Rewrite];

/// Telemetry instance for recording guardrail metrics.
pub struct Telemetry {
    /// Configuration
    config: TelemetryConfig,
    registry: Registry,
    decisions: IntCounterVec,
    signal_failures: IntCounterVec,
    granularity_overrides: IntCounterVec,
    cache_lookups: IntCounterVec,
    evaluation_seconds: Histogram,
}

impl Telemetry {
    /// Create a new telemetry instance.
    pub fn new(config: &TelemetryConfig) -> Result<Self> {
        let registry = Registry::new();

        let decisions = IntCounterVec::new(
            Opts::new("guardrail_decisions_total", "Decisions by verdict"),
            &["action"],
        )
        .map_err(metrics_error)?;
        let signal_failures = IntCounterVec::new(
            Opts::new(
                "guardrail_signal_failures_total",
                "Requests that failed closed, by error category",
            ),
            &["category"],
        )
        .map_err(metrics_error)?;
        let granularity_overrides = IntCounterVec::new(
            Opts::new(
                "guardrail_granularity_overrides_total",
                "Granularity predictions forced to record_level",
            ),
            &["cause"],
        )
        .map_err(metrics_error)?;
        let cache_lookups = IntCounterVec::new(
            Opts::new("guardrail_cache_lookups_total", "Decision cache lookups"),
            &["result"],
        )
        .map_err(metrics_error)?;
        let evaluation_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "guardrail_evaluation_seconds",
                "End-to-end evaluation latency",
            )
            .buckets(vec![0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]),
        )
        .map_err(metrics_error)?;

        registry
            .register(Box::new(decisions.clone()))
            .map_err(metrics_error)?;
        registry
            .register(Box::new(signal_failures.clone()))
            .map_err(metrics_error)?;
        registry
            .register(Box::new(granularity_overrides.clone()))
            .map_err(metrics_error)?;
        registry
            .register(Box::new(cache_lookups.clone()))
            .map_err(metrics_error)?;
        registry
            .register(Box::new(evaluation_seconds.clone()))
            .map_err(metrics_error)?;

        Ok(Self {
            config: config.clone(),
            registry,
            decisions,
            signal_failures,
            granularity_overrides,
            cache_lookups,
            evaluation_seconds,
        })
    }

    /// Record a completed decision and its latency.
    pub fn record_decision(&self, action: DecisionType, duration_ms: f64) {
        if !self.config.enabled {
            return;
        }
        self.decisions.with_label_values(&[action.as_str()]).inc();
        self.evaluation_seconds.observe(duration_ms / 1000.0);
    }

    /// Record a request that failed closed.
    pub fn record_signal_failure(&self, category: &str) {
        if self.config.enabled {
            self.signal_failures.with_label_values(&[category]).inc();
        }
    }

    /// Record a forced granularity override.
    pub fn record_override(&self, cause: OverrideCause) {
        if self.config.enabled {
            self.granularity_overrides
                .with_label_values(&[cause.as_str()])
                .inc();
        }
    }

    /// Record a decision cache lookup.
    pub fn record_cache(&self, hit: bool) {
        if self.config.enabled {
            let result = if hit { "hit" } else { "miss" };
            self.cache_lookups.with_label_values(&[result]).inc();
        }
    }

    /// Get current metrics.
    pub fn metrics(&self) -> TelemetryMetrics {
        let decisions = |action: DecisionType| {
            self.decisions.with_label_values(&[action.as_str()]).get()
        };
        let total_evaluations = DECISION_ACTIONS.iter().map(|a| decisions(*a)).sum();

        let cache_hits = self.cache_lookups.with_label_values(&["hit"]).get();
        let cache_misses = self.cache_lookups.with_label_values(&["miss"]).get();
        let cache_total = cache_hits + cache_misses;
        let cache_hit_rate = if cache_total > 0 {
            (cache_hits as f64 / cache_total as f64) * 100.0
        } else {
            0.0
        };

        let samples = self.evaluation_seconds.get_sample_count();
        let avg_evaluation_time_ms = if samples > 0 {
            self.evaluation_seconds.get_sample_sum() / samples as f64 * 1000.0
        } else {
            0.0
        };

        let overrides = |cause: OverrideCause| {
            self.granularity_overrides
                .with_label_values(&[cause.as_str()])
                .get()
        };

        let signal_failures: u64 = self
            .registry
            .gather()
            .iter()
            .filter(|family| family.get_name() == "guardrail_signal_failures_total")
            .flat_map(|family| family.get_metric())
            .map(|metric| metric.get_counter().get_value() as u64)
            .sum();

        TelemetryMetrics {
            total_evaluations,
            decisions_allow: decisions(DecisionType::Allow),
            decisions_deny: decisions(DecisionType::Deny),
            decisions_rewrite: decisions(DecisionType::Rewrite),
            overrides_low_confidence: overrides(OverrideCause::LowConfidence),
            overrides_full_scope: overrides(OverrideCause::FullScope),
            cache_hits,
            cache_misses,
            cache_hit_rate,
            avg_evaluation_time_ms,
            signal_failures,
        }
    }

    /// Render every metric in the Prometheus text exposition format.
    pub fn render(&self) -> Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(metrics_error)?;
        String::from_utf8(buffer).map_err(|e| crate::Error::internal(e.to_string()))
    }

    /// Check if telemetry is enabled.
    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Get the service name.
    pub fn service_name(&self) -> &str {
        &self.config.service_name
    }
}

fn metrics_error(err: prometheus::Error) -> crate::Error {
    crate::Error::internal(format!("Metrics error: {}", err))
}

/// Snapshot of the collected metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryMetrics {
    /// Total number of decisions
    pub total_evaluations: u64,
    /// Number of allow decisions
    pub decisions_allow: u64,
    /// Number of deny decisions
    pub decisions_deny: u64,
    /// Number of rewrite decisions
    pub decisions_rewrite: u64,
    /// Granularity overrides caused by low confidence
    pub overrides_low_confidence: u64,
    /// Granularity overrides caused by full-scope requests
    pub overrides_full_scope: u64,
    /// Cache hits
    pub cache_hits: u64,
    /// Cache misses
    pub cache_misses: u64,
    /// Cache hit rate percentage
    pub cache_hit_rate: f64,
    /// Average evaluation time in milliseconds
    pub avg_evaluation_time_ms: f64,
    /// Requests that failed closed
    pub signal_failures: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn telemetry() -> Telemetry {
        Telemetry::new(&TelemetryConfig::default()).unwrap()
    }

    #[test]
    fn test_telemetry_creation() {
        let telemetry = telemetry();
        assert!(telemetry.is_enabled());
        assert_eq!(telemetry.service_name(), "prompt-guardrail");
    }

    #[test]
    fn test_record_decision() {
        let telemetry = telemetry();

        telemetry.record_decision(DecisionType::Allow, 5.0);
        telemetry.record_decision(DecisionType::Deny, 3.0);
        telemetry.record_decision(DecisionType::Allow, 1.0);
        telemetry.record_cache(true);
        telemetry.record_cache(false);
        telemetry.record_override(OverrideCause::FullScope);
        telemetry.record_signal_failure("timeout");
        telemetry.record_signal_failure("signal");

        let metrics = telemetry.metrics();
        assert_eq!(metrics.total_evaluations, 3);
        assert_eq!(metrics.decisions_allow, 2);
        assert_eq!(metrics.decisions_deny, 1);
        assert_eq!(metrics.decisions_rewrite, 0);
        assert_eq!(metrics.overrides_full_scope, 1);
        assert_eq!(metrics.cache_hit_rate, 50.0);
        assert_eq!(metrics.signal_failures, 2);
        assert!((metrics.avg_evaluation_time_ms - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_disabled_telemetry_records_nothing() {
        let config = TelemetryConfig {
            enabled: false,
            ..Default::default()
        };
        let telemetry = Telemetry::new(&config).unwrap();
        telemetry.record_decision(DecisionType::Deny, 1.0);
        assert_eq!(telemetry.metrics().total_evaluations, 0);
    }

    #[test]
    fn test_render() {
        let telemetry = telemetry();
        telemetry.record_decision(DecisionType::Rewrite, 2.0);

        let text = telemetry.render().unwrap();
        assert!(text.contains("guardrail_decisions_total{action=\"rewrite\"} 1"));
        assert!(text.contains("guardrail_evaluation_seconds_count 1"));
    }
}
