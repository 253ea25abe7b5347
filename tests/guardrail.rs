//! End-to-end checks against model servers and policy files.

use prompt_guardrail::{Config, DecisionType, Error, Guardrail};

use serde_json::json;
use std::io::Write;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn model_server(label: &str, confidence: f64) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/predict"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"label": label, "confidence": confidence})),
        )
        .mount(&server)
        .await;
    server
}

fn config_for(intent: &MockServer, domain: &MockServer, granularity: &MockServer) -> Config {
    let mut config = Config::default();
    config.predictors.intent_url = Some(intent.uri());
    config.predictors.domain_url = Some(domain.uri());
    config.predictors.granularity_url = Some(granularity.uri());
    config.predictors.timeout_ms = 1_000;
    config
}

fn temp_yaml(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".yaml")
        .tempfile()
        .unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[tokio::test]
async fn aggregate_salary_request_is_allowed() {
    let intent = model_server("read", 0.97).await;
    let domain = model_server("hr", 0.93).await;
    let granularity = model_server("aggregate", 0.9).await;

    let guardrail = Guardrail::builder()
        .with_config(config_for(&intent, &domain, &granularity))
        .build()
        .unwrap();

    let prompt = "Average salary of employees";
    let outcome = guardrail.evaluate(prompt).await.unwrap();

    assert_eq!(outcome.decision.action, DecisionType::Allow);
    assert_eq!(outcome.final_prompt.as_deref(), Some(prompt));
    assert!(outcome.decision.suggested_alternatives.is_none());
    assert!(outcome.signal.mentioned_fields.contains("salary"));
    assert_eq!(outcome.confidences.domain, 0.93);
}

#[tokio::test]
async fn uncertain_aggregate_is_treated_as_record_level() {
    let intent = model_server("read", 0.97).await;
    let domain = model_server("hr", 0.93).await;
    let granularity = model_server("aggregate", 0.6).await;

    let guardrail = Guardrail::builder()
        .with_config(config_for(&intent, &domain, &granularity))
        .build()
        .unwrap();

    let outcome = guardrail
        .evaluate("Average salary of employees")
        .await
        .unwrap();

    assert_eq!(outcome.decision.action, DecisionType::Deny);
    assert_eq!(outcome.decision.blocked_fields, vec!["salary"]);
    assert_eq!(outcome.decision.reason, "Individual salaries must not be exposed");
    assert_eq!(
        outcome.decision.matched_policies,
        vec!["no_individual_salary"]
    );
    assert!(outcome.final_prompt.is_none());

    let alternatives = outcome.decision.suggested_alternatives.unwrap();
    assert!(alternatives.contains(&"Headcount by department".to_string()));
}

#[tokio::test]
async fn unreachable_classifier_fails_closed() {
    let intent = model_server("read", 0.97).await;
    let domain = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&domain)
        .await;
    let granularity = model_server("aggregate", 0.9).await;

    let guardrail = Guardrail::builder()
        .with_config(config_for(&intent, &domain, &granularity))
        .build()
        .unwrap();

    let err = guardrail
        .evaluate("Average salary of employees")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Integration { .. }));
    assert!(err.fails_closed());

    let metrics = guardrail.metrics();
    assert_eq!(metrics.telemetry.unwrap().signal_failures, 1);
}

#[tokio::test]
async fn custom_policy_and_lexicon_files() {
    let policies = temp_yaml(
        r#"
kind: PolicyTable
policies:
  - id: no_patient_diagnosis
    applies_to_entity: patient
    blocked_fields: [diagnosis]
    action: rewrite
    reason: Diagnoses stay in the clinical record
"#,
    );
    let lexicon = temp_yaml(
        r#"
entities:
  patient: [patient, patients]
fields:
  diagnosis: [diagnosis, diagnoses]
"#,
    );

    let intent = model_server("read", 0.97).await;
    let domain = model_server("healthcare", 0.9).await;
    let granularity = model_server("record_level", 0.9).await;

    let mut config = config_for(&intent, &domain, &granularity);
    config.policy.policy_file = Some(policies.path().to_path_buf());
    config.policy.lexicon_file = Some(lexicon.path().to_path_buf());

    let guardrail = Guardrail::builder().with_config(config).build().unwrap();
    assert_eq!(guardrail.table().len(), 1);

    let outcome = guardrail
        .evaluate("List patients with their diagnosis")
        .await
        .unwrap();

    assert_eq!(outcome.decision.action, DecisionType::Rewrite);
    assert_eq!(
        outcome.final_prompt.as_deref(),
        Some("List patients, excluding diagnosis.")
    );
    assert_eq!(outcome.decision.suggested_alternatives, Some(Vec::new()));
}

#[test]
fn invalid_policy_file_is_rejected() {
    let policies = temp_yaml(
        r#"
kind: PolicyTable
policies:
  - id: broken
    applies_to_entity: patient
    blocked_fields: []
    action: deny
    reason: Nothing blocked
"#,
    );

    let mut config = Config::default();
    config.policy.policy_file = Some(policies.path().to_path_buf());

    let err = Guardrail::builder()
        .with_config(config)
        .with_predictors(prompt_guardrail::Predictors::fixed(
            prompt_guardrail::Prediction::new("read", 0.9),
            prompt_guardrail::Prediction::new("healthcare", 0.9),
            prompt_guardrail::Prediction::new("record_level", 0.9),
        ))
        .build()
        .err()
        .unwrap();
    assert!(matches!(err, Error::Validation { .. }));
}
