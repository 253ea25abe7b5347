//! # Prompt Guardrail
//!
//! Pre-execution guardrail for natural-language data-access requests. A
//! request is classified (intent, domain, granularity), its entities and
//! fields are extracted, and the fused signal is evaluated against an ordered
//! policy table. The verdict is `allow`, `deny` or `rewrite`; rewritten
//! requests are narrowed so they no longer ask for blocked fields.
//!
//! ## Features
//!
//! - **Signal Fusion**: Merge classifier and extractor output into one signal
//! - **Granularity Guard**: Never treat an uncertain or full-scope request as aggregate
//! - **Policy Decisions**: Explainable verdicts with blocked fields and reasons
//! - **Prompt Rewriting**: Deterministic narrowing of `rewrite` requests
//! - **Fail Closed**: Upstream failures surface as errors, never as default labels
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use prompt_guardrail::{DecisionType, Guardrail, Prediction, Predictors};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let guardrail = Guardrail::builder()
//!         .with_predictors(Predictors::fixed(
//!             Prediction::new("read", 0.97),
//!             Prediction::new("healthcare", 0.91),
//!             Prediction::new("record_level", 0.88),
//!         ))
//!         .build()?;
//!
//!     let outcome = guardrail.evaluate("Show me 3 doctors with all info").await?;
//!
//!     match outcome.decision.action {
//!         DecisionType::Allow => println!("Request allowed"),
//!         DecisionType::Rewrite => println!("Rewritten: {:?}", outcome.final_prompt),
//!         DecisionType::Deny => println!("Request denied: {}", outcome.decision.reason),
//!     }
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod api;
pub mod cache;
pub mod config;
pub mod core;
pub mod error;
pub mod extract;
pub mod policy;
pub mod predictor;
pub mod server;
pub mod signal;
pub mod telemetry;

// Re-export main types for convenience
pub use api::{Decision, Guardrail, GuardrailBuilder, GuardrailOutcome};
pub use config::Config;
pub use error::{Error, Result};
pub use extract::{Extraction, FieldExtractor, Lexicon, LexiconExtractor};
pub use policy::{
    DecisionType, Granularity, Policy, PolicyAction, PolicyDocument, PolicyTable,
};
pub use predictor::{HttpPredictor, Predictor, Predictors, StaticPredictor};
pub use signal::{FusedSignal, GranularityGuard, Prediction, RequestedScope, Signal};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
