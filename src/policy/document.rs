//! Policy document parsing and the immutable policy table.

use super::Policy;
use crate::error::ErrorContext;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::Path;

/// The reference table shipped with the crate.
const REFERENCE_POLICIES: &str = include_str!("../../resources/policies.yaml");

/// A policy document as stored in configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyDocument {
    /// API version of the policy document format
    #[serde(default = "default_api_version")]
    pub api_version: String,
    /// Kind of document
    #[serde(default = "default_kind")]
    pub kind: String,
    /// Fields treated as requested when a request asks for everything.
    /// Every policy's `blocked_fields` are added to this set on load.
    #[serde(default)]
    pub sensitive_fields: Vec<String>,
    /// Ordered access rules
    #[serde(default)]
    pub policies: Vec<Policy>,
    /// Pre-approved aggregate query templates per entity
    #[serde(default)]
    pub safe_alternatives: BTreeMap<String, Vec<String>>,
}

fn default_api_version() -> String {
    "guardrail.llm-dev-ops.io/v1".to_string()
}

fn default_kind() -> String {
    "PolicyTable".to_string()
}

impl PolicyDocument {
    /// Create a policy document with the given policies.
    pub fn with_policies(policies: Vec<Policy>) -> Self {
        Self {
            api_version: default_api_version(),
            kind: default_kind(),
            sensitive_fields: Vec::new(),
            policies,
            safe_alternatives: BTreeMap::new(),
        }
    }

    /// Parse a policy document from YAML.
    pub fn from_yaml(yaml: &str) -> crate::Result<Self> {
        serde_yaml::from_str(yaml).map_err(crate::Error::from)
    }

    /// Parse a policy document from JSON.
    pub fn from_json(json: &str) -> crate::Result<Self> {
        serde_json::from_str(json).map_err(crate::Error::from)
    }

    /// Load a policy document from a file.
    pub fn from_file(path: impl AsRef<Path>) -> crate::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;

        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        match extension.to_lowercase().as_str() {
            "yaml" | "yml" => Self::from_yaml(&content),
            "json" => Self::from_json(&content),
            _ => Self::from_yaml(&content).or_else(|_| Self::from_json(&content)),
        }
    }

    /// Convert the document to YAML.
    pub fn to_yaml(&self) -> crate::Result<String> {
        serde_yaml::to_string(self).map_err(crate::Error::from)
    }

    /// Convert the document to JSON.
    pub fn to_json(&self) -> crate::Result<String> {
        serde_json::to_string_pretty(self).map_err(crate::Error::from)
    }

    /// Validate every record in the document.
    pub fn validate(&self) -> crate::Result<()> {
        if self.kind != default_kind() {
            return Err(crate::Error::validation_field(
                format!("Unsupported document kind: {}", self.kind),
                "kind",
            ));
        }
        if self.policies.is_empty() {
            return Err(crate::Error::validation_field(
                "A policy table must declare at least one policy",
                "policies",
            ));
        }

        let mut seen = HashSet::new();
        for (i, policy) in self.policies.iter().enumerate() {
            policy
                .validate()
                .with_field(format!("policies[{}]", i))?;
            if !seen.insert(policy.id.as_str()) {
                return Err(crate::Error::validation_field(
                    format!("Duplicate policy ID: {}", policy.id),
                    format!("policies[{}].id", i),
                ));
            }
        }

        if self.sensitive_fields.iter().any(|f| f.trim().is_empty()) {
            return Err(crate::Error::validation_field(
                "Sensitive field names cannot be blank",
                "sensitive_fields",
            ));
        }

        for (entity, templates) in &self.safe_alternatives {
            if templates.iter().any(|t| t.trim().is_empty()) {
                return Err(crate::Error::validation_field(
                    format!("Blank safe alternative for entity '{}'", entity),
                    format!("safe_alternatives.{}", entity),
                ));
            }
        }

        Ok(())
    }
}

/// A validated, immutable, ordered policy table.
///
/// Built once at startup and shared read-only across requests.
#[derive(Debug, Clone)]
pub struct PolicyTable {
    policies: Vec<Policy>,
    sensitive_fields: BTreeSet<String>,
    safe_alternatives: BTreeMap<String, Vec<String>>,
    fingerprint: String,
}

impl PolicyTable {
    /// Validate a document and freeze it into a table.
    pub fn from_document(document: PolicyDocument) -> crate::Result<Self> {
        document.validate()?;

        let mut sensitive_fields: BTreeSet<String> =
            document.sensitive_fields.iter().cloned().collect();
        for policy in &document.policies {
            sensitive_fields.extend(policy.blocked_fields.iter().cloned());
        }

        let fingerprint = blake3::hash(&serde_json::to_vec(&document)?)
            .to_hex()
            .to_string();

        Ok(Self {
            policies: document.policies,
            sensitive_fields,
            safe_alternatives: document.safe_alternatives,
            fingerprint,
        })
    }

    /// Build a table from policies alone, without alternatives.
    pub fn from_policies(policies: Vec<Policy>) -> crate::Result<Self> {
        Self::from_document(PolicyDocument::with_policies(policies))
    }

    /// The reference table compiled into the crate.
    pub fn reference() -> crate::Result<Self> {
        Self::from_document(PolicyDocument::from_yaml(REFERENCE_POLICIES)?)
    }

    /// Load and validate a table from a YAML or JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> crate::Result<Self> {
        Self::from_document(PolicyDocument::from_file(path)?)
    }

    /// Policies in evaluation order.
    pub fn policies(&self) -> &[Policy] {
        &self.policies
    }

    /// Find a policy by ID.
    pub fn get_policy(&self, id: &str) -> Option<&Policy> {
        self.policies.iter().find(|p| p.id == id)
    }

    /// Every field treated as requested for a full-scope request.
    pub fn sensitive_fields(&self) -> &BTreeSet<String> {
        &self.sensitive_fields
    }

    /// Safe aggregate templates for an entity, empty when none are configured.
    pub fn safe_alternatives_for(&self, entity: &str) -> &[String] {
        self.safe_alternatives
            .get(entity)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Blake3 hex digest of the document the table was built from.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Number of policies.
    pub fn len(&self) -> usize {
        self.policies.len()
    }

    /// Whether the table holds no policies.
    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{Granularity, PolicyAction};
    use std::io::Write;

    fn sample_policy(id: &str) -> Policy {
        Policy::builder(id)
            .entity("employee")
            .blocked_fields(["salary"])
            .allowed_granularity(Granularity::Aggregate)
            .action(PolicyAction::Deny)
            .reason("Individual salaries must not be exposed")
            .build()
    }

    #[test]
    fn test_reference_table_loads() {
        let table = PolicyTable::reference().unwrap();
        assert!(!table.is_empty());
        assert!(table.get_policy("no_doctor_contact").is_some());
        for field in ["EFN", "SSN", "address", "email", "phone", "salary"] {
            assert!(table.sensitive_fields().contains(field), "missing {}", field);
        }
        assert!(!table.safe_alternatives_for("doctor").is_empty());
        assert!(table.safe_alternatives_for("spaceship").is_empty());
    }

    #[test]
    fn test_sensitive_fields_include_blocked_fields() {
        let mut document = PolicyDocument::with_policies(vec![sample_policy("salary")]);
        document.sensitive_fields = vec!["iban".to_string()];
        let table = PolicyTable::from_document(document).unwrap();
        let fields: Vec<_> = table.sensitive_fields().iter().cloned().collect();
        assert_eq!(fields, vec!["iban", "salary"]);
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let document =
            PolicyDocument::with_policies(vec![sample_policy("dup"), sample_policy("dup")]);
        let err = PolicyTable::from_document(document).unwrap_err();
        assert!(err.to_string().contains("Duplicate policy ID"));
    }

    #[test]
    fn test_empty_table_rejected() {
        assert!(PolicyTable::from_policies(Vec::new()).is_err());
    }

    #[test]
    fn test_invalid_policy_reports_position() {
        let mut broken = sample_policy("broken");
        broken.blocked_fields.clear();
        let err = PolicyTable::from_policies(vec![sample_policy("ok"), broken]).unwrap_err();
        assert!(matches!(err, crate::Error::Validation { field: Some(ref f), .. } if f == "policies[1]"));
    }

    #[test]
    fn test_invalid_granularity_rejected_at_load() {
        let yaml = r#"
policies:
  - id: p
    applies_to_entity: doctor
    blocked_fields: [phone]
    blocked_granularity: [per_row]
    action: rewrite
    reason: r
"#;
        assert!(PolicyDocument::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_empty_granularity_lists_rejected_at_load() {
        let yaml = r#"
policies:
  - id: no_doctor_phone
    applies_to_entity: doctor
    blocked_fields: [phone]
    blocked_granularity: []
    action: deny
    reason: Doctor phones are private
"#;
        let err = PolicyTable::from_document(PolicyDocument::from_yaml(yaml).unwrap()).unwrap_err();
        assert!(matches!(err, crate::Error::Validation { field: Some(ref f), .. } if f == "policies[0]"));
        assert!(err.to_string().contains("blocked_granularity"));

        let mut exempt_nothing = sample_policy("salary");
        exempt_nothing.allowed_granularity = Some(Vec::new());
        let err = PolicyTable::from_policies(vec![exempt_nothing]).unwrap_err();
        assert!(err.to_string().contains("allowed_granularity"));
    }

    #[test]
    fn test_fingerprint_is_stable() {
        let a = PolicyTable::from_policies(vec![sample_policy("a")]).unwrap();
        let b = PolicyTable::from_policies(vec![sample_policy("a")]).unwrap();
        let c = PolicyTable::from_policies(vec![sample_policy("c")]).unwrap();
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), c.fingerprint());
    }

    #[test]
    fn test_from_file_json_and_yaml() {
        let document = PolicyDocument::with_policies(vec![sample_policy("salary")]);

        let mut json = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        json.write_all(document.to_json().unwrap().as_bytes()).unwrap();
        let table = PolicyTable::from_file(json.path()).unwrap();
        assert_eq!(table.len(), 1);

        let mut yaml = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        yaml.write_all(document.to_yaml().unwrap().as_bytes()).unwrap();
        let table = PolicyTable::from_file(yaml.path()).unwrap();
        assert_eq!(table.policies()[0].id, "salary");
    }
}
