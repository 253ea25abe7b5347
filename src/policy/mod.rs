//! Policy data structures and representations.
//!
//! This module defines the access rules the decision engine evaluates, the
//! document format they are loaded from, and the immutable table that is
//! shared across requests.

mod action;
mod decision;
mod document;
mod granularity;

pub use action::PolicyAction;
pub use decision::DecisionType;
pub use document::{PolicyDocument, PolicyTable};
pub use granularity::Granularity;

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use validator::Validate;

/// Domain value that makes a policy active in every domain.
pub const WILDCARD_DOMAIN: &str = "*";

/// A single access rule.
///
/// A policy restricts `blocked_fields` of one entity kind. Domain and
/// granularity lists narrow where it applies; the `allowed_*` lists exempt a
/// request from the rule entirely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Policy {
    /// Stable identifier, unique within a table
    #[validate(length(min = 1, message = "Policy ID cannot be empty"))]
    pub id: String,
    /// The single entity kind this rule governs
    #[validate(length(min = 1, message = "applies_to_entity cannot be empty"))]
    pub applies_to_entity: String,
    /// Domains the rule is active in; `*` matches any domain
    #[serde(default = "default_domains")]
    #[validate(length(min = 1, message = "applies_to_domains cannot be empty"))]
    pub applies_to_domains: Vec<String>,
    /// Domains for which the caller is trusted and the rule is skipped
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_domains: Option<Vec<String>>,
    /// Sensitive fields this rule restricts
    #[validate(length(min = 1, message = "blocked_fields cannot be empty"))]
    pub blocked_fields: Vec<String>,
    /// Granularities the rule applies at; absent means every granularity
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, message = "blocked_granularity cannot be empty when set"))]
    pub blocked_granularity: Option<Vec<Granularity>>,
    /// Granularities exempted from the rule, checked before `blocked_granularity`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, message = "allowed_granularity cannot be empty when set"))]
    pub allowed_granularity: Option<Vec<Granularity>>,
    /// Verdict contributed when the rule is triggered
    pub action: PolicyAction,
    /// Human-readable justification, surfaced verbatim in decisions
    #[validate(length(min = 1, message = "reason cannot be empty"))]
    pub reason: String,
}

fn default_domains() -> Vec<String> {
    vec![WILDCARD_DOMAIN.to_string()]
}

impl Policy {
    /// Create a policy builder.
    pub fn builder(id: impl Into<String>) -> PolicyBuilder {
        PolicyBuilder::new(id)
    }

    /// Whether the rule is active in the given domain.
    pub fn applies_to_domain(&self, domain: &str) -> bool {
        self.applies_to_domains
            .iter()
            .any(|d| d == WILDCARD_DOMAIN || d == domain)
    }

    /// Whether the domain is trusted for this rule.
    pub fn exempts_domain(&self, domain: &str) -> bool {
        self.allowed_domains
            .as_ref()
            .is_some_and(|domains| domains.iter().any(|d| d == domain))
    }

    /// Whether the granularity is exempted from this rule.
    pub fn exempts_granularity(&self, granularity: Granularity) -> bool {
        self.allowed_granularity
            .as_ref()
            .is_some_and(|g| g.contains(&granularity))
    }

    /// Whether the rule applies at the given granularity.
    pub fn applies_at_granularity(&self, granularity: Granularity) -> bool {
        self.blocked_granularity
            .as_ref()
            .map_or(true, |g| g.contains(&granularity))
    }

    /// Blocked fields of this rule that appear in the requested set, in rule order.
    pub fn blocked_in<'a>(
        &'a self,
        requested: &'a BTreeSet<String>,
    ) -> impl Iterator<Item = &'a String> + 'a {
        self.blocked_fields.iter().filter(move |f| requested.contains(*f))
    }

    /// Check if the policy is valid.
    pub fn validate(&self) -> crate::Result<()> {
        Validate::validate(self).map_err(|errors| {
            let field = errors
                .field_errors()
                .keys()
                .min()
                .map(|k| k.to_string())
                .unwrap_or_default();
            crate::Error::validation_field(
                format!("Policy '{}' is invalid: {}", self.id, errors),
                field,
            )
        })?;

        if self.applies_to_entity.trim().is_empty() {
            return Err(crate::Error::validation_field(
                format!("Policy '{}' has a blank applies_to_entity", self.id),
                "applies_to_entity",
            ));
        }

        let blank = |values: &[String]| values.iter().any(|v| v.trim().is_empty());
        if blank(&self.applies_to_domains) {
            return Err(crate::Error::validation_field(
                format!("Policy '{}' lists a blank domain", self.id),
                "applies_to_domains",
            ));
        }
        if blank(&self.blocked_fields) {
            return Err(crate::Error::validation_field(
                format!("Policy '{}' lists a blank field", self.id),
                "blocked_fields",
            ));
        }
        if let Some(allowed) = &self.allowed_domains {
            if blank(allowed) {
                return Err(crate::Error::validation_field(
                    format!("Policy '{}' lists a blank allowed domain", self.id),
                    "allowed_domains",
                ));
            }
        }

        Ok(())
    }
}

/// Builder for creating policies.
#[derive(Debug)]
pub struct PolicyBuilder {
    id: String,
    entity: String,
    domains: Vec<String>,
    allowed_domains: Option<Vec<String>>,
    blocked_fields: Vec<String>,
    blocked_granularity: Option<Vec<Granularity>>,
    allowed_granularity: Option<Vec<Granularity>>,
    action: PolicyAction,
    reason: String,
}

impl PolicyBuilder {
    /// Create a new policy builder with the given ID.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            entity: String::new(),
            domains: Vec::new(),
            allowed_domains: None,
            blocked_fields: Vec::new(),
            blocked_granularity: None,
            allowed_granularity: None,
            action: PolicyAction::Deny,
            reason: String::new(),
        }
    }

    /// Set the governed entity.
    pub fn entity(mut self, entity: impl Into<String>) -> Self {
        self.entity = entity.into();
        self
    }

    /// Add a domain the rule is active in.
    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domains.push(domain.into());
        self
    }

    /// Add a trusted domain that exempts requests from the rule.
    pub fn allowed_domain(mut self, domain: impl Into<String>) -> Self {
        self.allowed_domains
            .get_or_insert_with(Vec::new)
            .push(domain.into());
        self
    }

    /// Add blocked fields.
    pub fn blocked_fields(mut self, fields: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.blocked_fields.extend(fields.into_iter().map(|f| f.into()));
        self
    }

    /// Restrict the rule to a granularity.
    pub fn blocked_granularity(mut self, granularity: Granularity) -> Self {
        self.blocked_granularity
            .get_or_insert_with(Vec::new)
            .push(granularity);
        self
    }

    /// Exempt a granularity from the rule.
    pub fn allowed_granularity(mut self, granularity: Granularity) -> Self {
        self.allowed_granularity
            .get_or_insert_with(Vec::new)
            .push(granularity);
        self
    }

    /// Set the action.
    pub fn action(mut self, action: PolicyAction) -> Self {
        self.action = action;
        self
    }

    /// Set the reason.
    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }

    /// Build the policy. Domains default to the wildcard.
    pub fn build(self) -> Policy {
        let applies_to_domains = if self.domains.is_empty() {
            default_domains()
        } else {
            self.domains
        };

        Policy {
            id: self.id,
            applies_to_entity: self.entity,
            applies_to_domains,
            allowed_domains: self.allowed_domains,
            blocked_fields: self.blocked_fields,
            blocked_granularity: self.blocked_granularity,
            allowed_granularity: self.allowed_granularity,
            action: self.action,
            reason: self.reason,
        }
    }
}
