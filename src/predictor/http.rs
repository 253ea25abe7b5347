//! Predictor backed by a remote model server.

use super::Predictor;
use crate::signal::Prediction;
use crate::Result;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Request body sent to a model server.
#[derive(Debug, Serialize)]
struct PredictRequest<'a> {
    text: &'a str,
}

/// Response body from a model server.
///
/// Servers that name the label after their task (`{"intent": ...}`) are
/// accepted as well.
#[derive(Debug, Deserialize)]
struct PredictResponse {
    #[serde(alias = "intent", alias = "domain", alias = "granularity")]
    label: String,
    confidence: f64,
}

/// Client for a classifier served over HTTP.
///
/// `POST {base_url}/predict` with `{"text": ...}` must answer
/// `{"label": ..., "confidence": ...}`.
pub struct HttpPredictor {
    name: String,
    base_url: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl HttpPredictor {
    /// Create a new predictor client.
    pub fn new(name: impl Into<String>, base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let name = name.into();
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent("Prompt-Guardrail/1.0")
            .build()
            .map_err(|e| crate::Error::integration(&name, format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            name,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
            client,
        })
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Check if the model server is healthy.
    pub async fn health_check(&self) -> bool {
        let url = format!("{}/health", self.base_url);

        match self.client.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    fn transport_error(&self, err: reqwest::Error) -> crate::Error {
        if err.is_timeout() {
            crate::Error::timeout(
                format!("{} predictor did not answer", self.name),
                u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
            )
        } else {
            crate::Error::integration(&self.name, format!("Request failed: {}", err))
        }
    }
}

#[async_trait]
impl Predictor for HttpPredictor {
    fn name(&self) -> &str {
        &self.name
    }

    async fn predict(&self, text: &str) -> Result<Prediction> {
        let url = format!("{}/predict", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&PredictRequest { text })
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        if !response.status().is_success() {
            return Err(crate::Error::integration(
                &self.name,
                format!("HTTP error: {}", response.status()),
            ));
        }

        let body: PredictResponse = response.json().await.map_err(|e| {
            crate::Error::signal(&self.name, format!("Failed to parse response: {}", e))
        })?;

        let prediction = Prediction::new(body.label, body.confidence);
        prediction.validate(&self.name)?;
        Ok(prediction)
    }
}
