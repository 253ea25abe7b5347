//! Request scope classification.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Phrases that broaden a request to every field of an entity.
pub const FULL_SCOPE_PHRASES: &[&str] = &[
    "all info",
    "all information",
    "full info",
    "full information",
    "everything",
    "entire profile",
    "complete record",
];

/// Whether a request asks for everything about an entity or named attributes only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestedScope {
    /// Every known sensitive field is assumed requested
    Full,
    /// Only mentioned and implied fields are requested
    #[default]
    Partial,
}

impl RequestedScope {
    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestedScope::Full => "full",
            RequestedScope::Partial => "partial",
        }
    }
}

impl fmt::Display for RequestedScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Classify the scope of a request by case-insensitive phrase search.
pub fn detect_requested_scope(text: &str) -> RequestedScope {
    let text = text.to_lowercase();
    if FULL_SCOPE_PHRASES.iter().any(|phrase| text.contains(phrase)) {
        RequestedScope::Full
    } else {
        RequestedScope::Partial
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_scope_phrases() {
        assert_eq!(
            detect_requested_scope("Show me 1 doctor with all information"),
            RequestedScope::Full
        );
        assert_eq!(
            detect_requested_scope("Give me the ENTIRE PROFILE of employee 42"),
            RequestedScope::Full
        );
        assert_eq!(
            detect_requested_scope("tell me everything about our users"),
            RequestedScope::Full
        );
    }

    #[test]
    fn test_partial_scope() {
        assert_eq!(
            detect_requested_scope("List doctors with their phone numbers"),
            RequestedScope::Partial
        );
        assert_eq!(detect_requested_scope(""), RequestedScope::Partial);
    }
}
