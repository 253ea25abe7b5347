//! Policy action definitions.

use super::DecisionType;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The verdict a policy contributes when it is triggered.
///
/// Only restrictive verdicts exist here: a policy can never vote `allow`,
/// allow is what remains when no policy blocks anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyAction {
    /// Refuse the whole request
    Deny,
    /// Forward the request with the blocked fields excluded
    Rewrite,
}

impl PolicyAction {
    /// The decision this action escalates to.
    pub fn decision(&self) -> DecisionType {
        match self {
            PolicyAction::Deny => DecisionType::Deny,
            PolicyAction::Rewrite => DecisionType::Rewrite,
        }
    }

    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyAction::Deny => "deny",
            PolicyAction::Rewrite => "rewrite",
        }
    }
}

impl fmt::Display for PolicyAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for PolicyAction {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "deny" => Ok(PolicyAction::Deny),
            "rewrite" => Ok(PolicyAction::Rewrite),
            _ => Err(crate::Error::parse(format!("Unknown policy action: {}", s))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_decision() {
        assert_eq!(PolicyAction::Deny.decision(), DecisionType::Deny);
        assert_eq!(PolicyAction::Rewrite.decision(), DecisionType::Rewrite);
    }

    #[test]
    fn test_allow_is_not_an_action() {
        assert!("allow".parse::<PolicyAction>().is_err());
        assert!(serde_json::from_str::<PolicyAction>("\"allow\"").is_err());
    }
}
