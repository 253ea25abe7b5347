//! Core decision logic.
//!
//! The [`Evaluator`] turns a signal and a policy table into a decision; the
//! rewriter derives sanitized text from a `rewrite` decision. Both are pure.

mod evaluator;
mod rewriter;

pub use evaluator::{Evaluator, REASON_SEPARATOR};
pub use rewriter::{field_phrase, humanize_fields, rewrite_prompt, FIELD_PHRASES};
