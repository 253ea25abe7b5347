//! Public API for the guardrail.
//!
//! This module provides the main interface: the [`Guardrail`] facade, its
//! builder, and the decision and outcome types it returns.

mod decision;
mod engine;

pub use decision::{Decision, GuardrailOutcome, NO_VIOLATIONS_REASON};
pub use engine::{Guardrail, GuardrailBuilder, GuardrailMetrics};
