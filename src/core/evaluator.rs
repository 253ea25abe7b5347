//! Policy evaluator implementation.

use crate::api::Decision;
use crate::policy::{DecisionType, Granularity, PolicyAction, PolicyTable};
use crate::signal::Signal;

use std::collections::BTreeSet;
use tracing::debug;

/// Separator between policy reasons in a decision.
pub const REASON_SEPARATOR: &str = "; ";

/// Evaluates signals against a policy table.
///
/// Evaluation is a pure function of the signal and the table: it has no
/// failure modes, and unknown entities or fields simply match nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct Evaluator;

impl Evaluator {
    /// Create a new evaluator.
    pub fn new() -> Self {
        Self
    }

    /// Evaluate every policy in table order and resolve the verdict.
    pub fn evaluate(&self, signal: &Signal, table: &PolicyTable) -> Decision {
        let requested = signal.requested_fields(table.sensitive_fields());

        let mut blocked_fields = BTreeSet::new();
        let mut reasons = BTreeSet::new();
        let mut matched_policies = Vec::new();

        for policy in table.policies() {
            if !signal.mentions_entity(&policy.applies_to_entity)
                || !policy.applies_to_domain(&signal.domain)
            {
                continue;
            }
            if policy.exempts_domain(&signal.domain)
                || policy.exempts_granularity(signal.granularity)
                || !policy.applies_at_granularity(signal.granularity)
            {
                continue;
            }

            let hits: Vec<&String> = policy.blocked_in(&requested).collect();
            if hits.is_empty() {
                continue;
            }

            debug!(policy = %policy.id, fields = ?hits, "Policy matched");
            blocked_fields.extend(hits.into_iter().cloned());
            reasons.insert(policy.reason.as_str());
            matched_policies.push(policy.id.clone());
        }

        let mut decision = if blocked_fields.is_empty() {
            Decision::allow()
        } else {
            Decision {
                action: self.resolve_action(signal, table, &requested),
                blocked_fields: blocked_fields.into_iter().collect(),
                reason: reasons.into_iter().collect::<Vec<_>>().join(REASON_SEPARATOR),
                suggested_alternatives: None,
                matched_policies,
            }
        };

        if signal.granularity == Granularity::RecordLevel {
            if let Some(entity) = signal.entities.first() {
                decision = decision.with_alternatives(table.safe_alternatives_for(entity).to_vec());
            }
        }

        debug_assert_eq!(
            decision.action == DecisionType::Allow,
            decision.blocked_fields.is_empty()
        );
        decision
    }

    /// Escalate to deny when any deny rule's entity and fields are hit.
    ///
    /// Domain and granularity exemptions are not consulted here: a deny rule
    /// that was exempted during accumulation still escalates the verdict.
    fn resolve_action(
        &self,
        signal: &Signal,
        table: &PolicyTable,
        requested: &BTreeSet<String>,
    ) -> DecisionType {
        let escalated = table.policies().iter().find(|policy| {
            policy.action == PolicyAction::Deny
                && signal.mentions_entity(&policy.applies_to_entity)
                && policy.blocked_in(requested).next().is_some()
        });

        match escalated {
            Some(policy) => {
                debug!(policy = %policy.id, "Verdict escalated to deny");
                policy.action.decision()
            }
            None => PolicyAction::Rewrite.decision(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::Policy;
    use crate::signal::RequestedScope;
    use proptest::prelude::*;

    fn reference() -> PolicyTable {
        PolicyTable::reference().unwrap()
    }

    fn decide(signal: &Signal) -> Decision {
        Evaluator::new().evaluate(signal, &reference())
    }

    #[test]
    fn test_doctor_identifier_and_contact_denied() {
        let signal = Signal::builder()
            .domain("healthcare")
            .entity("doctor")
            .mentioned(["EFN"])
            .implied(["address", "phone"])
            .granularity(Granularity::RecordLevel)
            .build();

        let decision = decide(&signal);
        assert_eq!(decision.action, DecisionType::Deny);
        assert_eq!(decision.blocked_fields, vec!["EFN", "address", "phone"]);
        assert_eq!(
            decision.reason,
            "Doctor contact details must not be exposed; \
             Internal and government identifiers are strictly confidential"
        );
        assert_eq!(
            decision.matched_policies,
            vec!["no_doctor_contact", "no_doctor_identifiers"]
        );
    }

    #[test]
    fn test_aggregate_salary_allowed() {
        let signal = Signal::builder()
            .domain("hr")
            .entity("employee")
            .mentioned(["salary"])
            .granularity(Granularity::Aggregate)
            .build();

        let decision = decide(&signal);
        assert_eq!(decision.action, DecisionType::Allow);
        assert!(decision.blocked_fields.is_empty());
        assert_eq!(decision.reason, "No policy violations detected");
        assert!(decision.suggested_alternatives.is_none());
    }

    #[test]
    fn test_record_level_salary_denied() {
        let signal = Signal::builder()
            .domain("hr")
            .entity("employee")
            .mentioned(["salary"])
            .granularity(Granularity::RecordLevel)
            .build();

        let decision = decide(&signal);
        assert_eq!(decision.action, DecisionType::Deny);
        assert_eq!(decision.blocked_fields, vec!["salary"]);
        assert_eq!(decision.reason, "Individual salaries must not be exposed");
    }

    #[test]
    fn test_trusted_domain_allows_user_email() {
        let signal = Signal::builder()
            .domain("hr")
            .entity("user")
            .mentioned(["email"])
            .granularity(Granularity::RecordLevel)
            .build();

        let decision = decide(&signal);
        assert_eq!(decision.action, DecisionType::Allow);
        assert!(decision.blocked_fields.is_empty());
        assert_eq!(decision.reason, crate::api::NO_VIOLATIONS_REASON);
    }

    #[test]
    fn test_full_scope_blocks_every_doctor_field() {
        let signal = Signal::builder()
            .domain("healthcare")
            .entity("doctor")
            .scope(RequestedScope::Full)
            .granularity(Granularity::RecordLevel)
            .build();

        let decision = decide(&signal);
        assert_eq!(decision.action, DecisionType::Deny);
        assert_eq!(
            decision.blocked_fields,
            vec!["EFN", "SSN", "address", "phone"]
        );
        assert_eq!(
            decision.suggested_alternatives,
            Some(vec![
                "Number of doctors per department".to_string(),
                "Number of doctors by specialty".to_string(),
                "Average years of experience by specialty".to_string(),
            ])
        );
    }

    #[test]
    fn test_contact_only_rewrites() {
        let signal = Signal::builder()
            .domain("healthcare")
            .entity("doctor")
            .implied(["address", "phone"])
            .granularity(Granularity::RecordLevel)
            .build();

        let decision = decide(&signal);
        assert_eq!(decision.action, DecisionType::Rewrite);
        assert_eq!(decision.blocked_fields, vec!["address", "phone"]);
    }

    #[test]
    fn test_domain_scoped_policy_inactive_elsewhere() {
        let signal = Signal::builder()
            .domain("finance")
            .entity("doctor")
            .mentioned(["phone"])
            .granularity(Granularity::RecordLevel)
            .build();

        assert_eq!(decide(&signal).action, DecisionType::Allow);
    }

    #[test]
    fn test_deny_escalation_ignores_exemptions() {
        let table = PolicyTable::from_policies(vec![
            Policy::builder("contact_rewrite")
                .entity("employee")
                .blocked_fields(["phone"])
                .action(PolicyAction::Rewrite)
                .reason("Contact details are removed")
                .build(),
            Policy::builder("contact_deny")
                .entity("employee")
                .allowed_domain("hr")
                .blocked_fields(["phone"])
                .action(PolicyAction::Deny)
                .reason("Contact details are confidential")
                .build(),
        ])
        .unwrap();

        let signal = Signal::builder()
            .domain("hr")
            .entity("employee")
            .mentioned(["phone"])
            .build();

        let decision = Evaluator::new().evaluate(&signal, &table);
        assert_eq!(decision.action, DecisionType::Deny);
        assert_eq!(decision.reason, "Contact details are removed");
        assert_eq!(decision.matched_policies, vec!["contact_rewrite"]);
    }

    #[test]
    fn test_unknown_entity_and_fields_are_allowed() {
        let signal = Signal::builder()
            .domain("healthcare")
            .entity("patient")
            .mentioned(["blood_type"])
            .build();

        let decision = decide(&signal);
        assert_eq!(decision.action, DecisionType::Allow);
        assert_eq!(decision.suggested_alternatives, Some(Vec::new()));
    }

    #[test]
    fn test_alternatives_use_first_entity() {
        let signal = Signal::builder()
            .domain("sales")
            .entity("customer")
            .entity("doctor")
            .mentioned(["email"])
            .granularity(Granularity::RecordLevel)
            .build();

        let decision = decide(&signal);
        let alternatives = decision.suggested_alternatives.unwrap();
        assert_eq!(alternatives[0], "Number of customers by segment");
    }

    fn arb_signal() -> impl Strategy<Value = Signal> {
        let entities = prop::sample::subsequence(vec!["doctor", "employee", "user", "customer", "patient"], 0..=3);
        let fields = || {
            prop::sample::subsequence(
                vec!["EFN", "SSN", "address", "email", "phone", "salary", "nickname"],
                0..=4,
            )
        };
        let domain = prop::sample::select(vec!["healthcare", "hr", "sales", "finance"]);
        (entities, fields(), fields(), domain, any::<bool>(), any::<bool>()).prop_map(
            |(entities, mentioned, implied, domain, full, aggregate)| {
                let mut builder = Signal::builder()
                    .domain(domain)
                    .mentioned(mentioned)
                    .implied(implied)
                    .scope(if full { RequestedScope::Full } else { RequestedScope::Partial })
                    .granularity(if aggregate {
                        Granularity::Aggregate
                    } else {
                        Granularity::RecordLevel
                    });
                for entity in entities {
                    builder = builder.entity(entity);
                }
                builder.build()
            },
        )
    }

    proptest! {
        #[test]
        fn prop_allow_iff_nothing_blocked(signal in arb_signal()) {
            let decision = decide(&signal);
            prop_assert_eq!(
                decision.action == DecisionType::Allow,
                decision.blocked_fields.is_empty()
            );
        }

        #[test]
        fn prop_decisions_are_deterministic(signal in arb_signal()) {
            let table = reference();
            let first = serde_json::to_vec(&Evaluator::new().evaluate(&signal, &table)).unwrap();
            let second = serde_json::to_vec(&Evaluator::new().evaluate(&signal.clone(), &table)).unwrap();
            prop_assert_eq!(first, second);
        }

        #[test]
        fn prop_blocked_fields_sorted_and_unique(signal in arb_signal()) {
            let decision = decide(&signal);
            let mut expected = decision.blocked_fields.clone();
            expected.sort();
            expected.dedup();
            prop_assert_eq!(decision.blocked_fields, expected);
        }

        #[test]
        fn prop_full_scope_is_monotone(signal in arb_signal()) {
            let table = reference();
            let evaluator = Evaluator::new();

            let mut partial = signal.clone();
            partial.requested_scope = RequestedScope::Partial;

            let mut full = signal;
            full.requested_scope = RequestedScope::Full;

            let narrow = evaluator.evaluate(&partial, &table);
            let wide = evaluator.evaluate(&full, &table);
            for field in &narrow.blocked_fields {
                prop_assert!(wide.blocks(field));
            }
            // A full-scope request is never answered more leniently.
            prop_assert!(
                !(narrow.action == DecisionType::Deny && wide.action != DecisionType::Deny)
            );
        }
    }
}
