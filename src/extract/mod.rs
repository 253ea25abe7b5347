//! Entity and field extraction.
//!
//! Extraction is a replaceable signal source: the decision engine only sees
//! the [`Extraction`] an extractor returns, never how it was produced.

mod lexicon;

pub use lexicon::{Lexicon, LexiconExtractor};

use crate::signal::RequestedScope;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::ops::Range;

/// What an extractor found in a request.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Extraction {
    /// Entity kinds, in order of first mention
    pub entities: Vec<String>,
    /// Fields named explicitly
    pub mentioned_fields: BTreeSet<String>,
    /// Fields inferred from scope phrases, excluding mentioned ones
    pub implied_fields: BTreeSet<String>,
    /// Scope of the request
    pub requested_scope: RequestedScope,
}

/// Extracts entities, fields and scope from request text.
pub trait FieldExtractor: Send + Sync {
    /// Extract the request's targets.
    fn extract(&self, text: &str) -> Result<Extraction>;

    /// Byte ranges where any of `fields` is named in `text`, sorted and
    /// disjoint.
    fn field_mentions(&self, text: &str, fields: &[String]) -> Vec<Range<usize>>;
}
