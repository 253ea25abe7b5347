//! Verdict types returned by the decision engine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The verdict of a guardrail decision.
///
/// The lowercase string forms are part of the stable response contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionType {
    /// Forward the request unchanged
    Allow,
    /// Refuse the request
    Deny,
    /// Forward a sanitized version of the request
    Rewrite,
}

impl DecisionType {
    /// Check if the request may reach the downstream data system in any form.
    pub fn is_allowed(&self) -> bool {
        matches!(self, DecisionType::Allow | DecisionType::Rewrite)
    }

    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionType::Allow => "allow",
            DecisionType::Deny => "deny",
            DecisionType::Rewrite => "rewrite",
        }
    }
}

impl Default for DecisionType {
    fn default() -> Self {
        DecisionType::Allow
    }
}

impl fmt::Display for DecisionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for DecisionType {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "allow" => Ok(DecisionType::Allow),
            "deny" => Ok(DecisionType::Deny),
            "rewrite" => Ok(DecisionType::Rewrite),
            _ => Err(crate::Error::parse(format!("Unknown decision type: {}", s))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decision_is_allowed() {
        assert!(DecisionType::Allow.is_allowed());
        assert!(DecisionType::Rewrite.is_allowed());
        assert!(!DecisionType::Deny.is_allowed());
    }

    #[test]
    fn test_decision_from_str() {
        assert_eq!("allow".parse::<DecisionType>().unwrap(), DecisionType::Allow);
        assert_eq!("REWRITE".parse::<DecisionType>().unwrap(), DecisionType::Rewrite);
        assert!("modify".parse::<DecisionType>().is_err());
    }

    #[test]
    fn test_decision_serialization() {
        let json = serde_json::to_string(&DecisionType::Rewrite).unwrap();
        assert_eq!(json, "\"rewrite\"");

        let parsed: DecisionType = serde_json::from_str("\"deny\"").unwrap();
        assert_eq!(parsed, DecisionType::Deny);
    }
}
