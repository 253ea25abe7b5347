//! Classifier handles.
//!
//! The intent, domain and granularity classifiers are external collaborators
//! that return a label with a confidence. They are created once at startup
//! and injected into [`SignalFusion`](crate::signal::SignalFusion), so tests
//! can swap in deterministic fakes.

mod http;

pub use http::HttpPredictor;

use crate::config::PredictorsConfig;
use crate::signal::Prediction;
use crate::Result;

use async_trait::async_trait;
use std::sync::Arc;

/// A text classifier returning one label with a confidence.
#[async_trait]
pub trait Predictor: Send + Sync {
    /// Name used in logs and error messages.
    fn name(&self) -> &str;

    /// Classify the request text.
    ///
    /// Implementations must fail instead of returning a default label.
    async fn predict(&self, text: &str) -> Result<Prediction>;
}

/// A predictor that always returns the same prediction.
#[derive(Debug, Clone)]
pub struct StaticPredictor {
    name: String,
    prediction: Prediction,
}

impl StaticPredictor {
    /// Create a predictor that answers every request with `label` at `confidence`.
    pub fn new(name: impl Into<String>, label: impl Into<String>, confidence: f64) -> Self {
        Self {
            name: name.into(),
            prediction: Prediction::new(label, confidence),
        }
    }
}

#[async_trait]
impl Predictor for StaticPredictor {
    fn name(&self) -> &str {
        &self.name
    }

    async fn predict(&self, _text: &str) -> Result<Prediction> {
        Ok(self.prediction.clone())
    }
}

/// The three classifiers the guardrail consults for every request.
#[derive(Clone)]
pub struct Predictors {
    /// Intent classifier
    pub intent: Arc<dyn Predictor>,
    /// Domain classifier
    pub domain: Arc<dyn Predictor>,
    /// Granularity classifier
    pub granularity: Arc<dyn Predictor>,
}

impl Predictors {
    /// Group three predictors.
    pub fn new(
        intent: Arc<dyn Predictor>,
        domain: Arc<dyn Predictor>,
        granularity: Arc<dyn Predictor>,
    ) -> Self {
        Self {
            intent,
            domain,
            granularity,
        }
    }

    /// Fixed predictions for every classifier.
    pub fn fixed(intent: Prediction, domain: Prediction, granularity: Prediction) -> Self {
        Self::new(
            Arc::new(StaticPredictor::new("intent", intent.label, intent.confidence)),
            Arc::new(StaticPredictor::new("domain", domain.label, domain.confidence)),
            Arc::new(StaticPredictor::new(
                "granularity",
                granularity.label,
                granularity.confidence,
            )),
        )
    }

    /// Connect to the model servers named in the configuration.
    pub fn from_config(config: &PredictorsConfig) -> Result<Self> {
        let endpoint = |url: &Option<String>, key: &str| {
            url.clone().ok_or_else(|| {
                crate::Error::config_key("Predictor endpoint is not configured", key)
            })
        };

        let intent = endpoint(&config.intent_url, "predictors.intent_url")?;
        let domain = endpoint(&config.domain_url, "predictors.domain_url")?;
        let granularity = endpoint(&config.granularity_url, "predictors.granularity_url")?;

        Ok(Self::new(
            Arc::new(HttpPredictor::new("intent", intent, config.timeout())?),
            Arc::new(HttpPredictor::new("domain", domain, config.timeout())?),
            Arc::new(HttpPredictor::new("granularity", granularity, config.timeout())?),
        ))
    }
}

impl std::fmt::Debug for Predictors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Predictors")
            .field("intent", &self.intent.name())
            .field("domain", &self.domain.name())
            .field("granularity", &self.granularity.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_predictor() {
        let predictor = StaticPredictor::new("intent", "read", 0.97);
        let prediction = predictor.predict("anything").await.unwrap();
        assert_eq!(prediction, Prediction::new("read", 0.97));
        assert_eq!(predictor.name(), "intent");
    }

    #[test]
    fn test_from_config_requires_endpoints() {
        let config = PredictorsConfig {
            intent_url: Some("http://localhost:9001".to_string()),
            ..Default::default()
        };
        let err = Predictors::from_config(&config).unwrap_err();
        assert!(
            matches!(err, crate::Error::Config { key: Some(ref k), .. } if k == "predictors.domain_url")
        );
    }

    #[test]
    fn test_from_config() {
        let config = PredictorsConfig {
            intent_url: Some("http://localhost:9001".to_string()),
            domain_url: Some("http://localhost:9002".to_string()),
            granularity_url: Some("http://localhost:9003".to_string()),
            timeout_ms: 250,
        };
        let predictors = Predictors::from_config(&config).unwrap();
        assert_eq!(predictors.granularity.name(), "granularity");
    }
}
