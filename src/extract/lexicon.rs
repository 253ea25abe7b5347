//! Lexicon-driven extraction.
//!
//! Each canonical entity or field maps to the phrases users write for it.
//! Phrases are matched case-insensitively on word boundaries, so "pay" does
//! not fire on "payroll" and "user" does not fire on "username".

use super::{Extraction, FieldExtractor};
use crate::error::ErrorContext;
use crate::signal::detect_requested_scope;
use crate::Result;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Range;
use std::path::Path;

/// The reference lexicon shipped with the crate.
const REFERENCE_LEXICON: &str = include_str!("../../resources/lexicon.yaml");

/// Trigger phrases for entities and fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Lexicon {
    /// Canonical entity -> phrases
    #[serde(default)]
    pub entities: BTreeMap<String, Vec<String>>,
    /// Canonical field -> phrases
    #[serde(default)]
    pub fields: BTreeMap<String, Vec<String>>,
    /// Entity -> fields implied when a request asks for "all info"
    #[serde(default)]
    pub implied_fields: BTreeMap<String, Vec<String>>,
    /// Phrases that activate `implied_fields`
    #[serde(default)]
    pub implied_triggers: Vec<String>,
}

impl Lexicon {
    /// The reference lexicon compiled into the crate.
    pub fn reference() -> Result<Self> {
        Self::from_yaml(REFERENCE_LEXICON)
    }

    /// Parse a lexicon from YAML.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(crate::Error::from)
    }

    /// Load a lexicon from a YAML or JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => serde_json::from_str(&content).map_err(crate::Error::from),
            _ => Self::from_yaml(&content),
        }
    }

    /// Check that every name has phrases and every implied field is known.
    pub fn validate(&self) -> Result<()> {
        for (section, terms) in [("entities", &self.entities), ("fields", &self.fields)] {
            for (name, phrases) in terms {
                if phrases.is_empty() || phrases.iter().any(|p| p.trim().is_empty()) {
                    return Err(crate::Error::validation_field(
                        format!("'{}' needs at least one non-blank phrase", name),
                        format!("{}.{}", section, name),
                    ));
                }
            }
        }

        for (entity, fields) in &self.implied_fields {
            if !self.entities.contains_key(entity) {
                return Err(crate::Error::validation_field(
                    format!("Implied fields declared for unknown entity '{}'", entity),
                    format!("implied_fields.{}", entity),
                ));
            }
            if let Some(unknown) = fields.iter().find(|f| !self.fields.contains_key(*f)) {
                return Err(crate::Error::validation_field(
                    format!("Unknown implied field '{}'", unknown),
                    format!("implied_fields.{}", entity),
                ));
            }
        }

        if self.implied_triggers.iter().any(|t| t.trim().is_empty()) {
            return Err(crate::Error::validation_field(
                "Implied triggers cannot be blank",
                "implied_triggers",
            ));
        }

        Ok(())
    }
}

/// A canonical name and its compiled phrase pattern.
#[derive(Debug)]
struct Matcher {
    canonical: String,
    pattern: Regex,
}

impl Matcher {
    fn new(canonical: &str, phrases: &[String]) -> Result<Self> {
        // Longest first, so "phone number" wins over "phone".
        let mut phrases: Vec<&str> = phrases.iter().map(|p| p.trim()).collect();
        phrases.sort_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));
        let alternation = phrases
            .iter()
            .map(|p| regex::escape(p))
            .collect::<Vec<_>>()
            .join("|");
        let pattern = Regex::new(&format!(r"(?i)\b(?:{})\b", alternation)).map_err(|e| {
            crate::Error::validation_field(format!("Invalid phrase pattern: {}", e), canonical)
        })?;

        Ok(Self {
            canonical: canonical.to_string(),
            pattern,
        })
    }

    /// Byte offset of the first match.
    fn first_match(&self, text: &str) -> Option<usize> {
        self.pattern.find(text).map(|m| m.start())
    }
}

/// Rule-based extractor backed by a [`Lexicon`].
#[derive(Debug)]
pub struct LexiconExtractor {
    entities: Vec<Matcher>,
    fields: Vec<Matcher>,
    implied_fields: BTreeMap<String, Vec<String>>,
    implied_triggers: Vec<String>,
}

impl LexiconExtractor {
    /// Validate a lexicon and compile its patterns.
    pub fn new(lexicon: Lexicon) -> Result<Self> {
        lexicon.validate()?;

        let compile = |terms: &BTreeMap<String, Vec<String>>, section: &str| {
            terms
                .iter()
                .map(|(name, phrases)| {
                    Matcher::new(name, phrases).with_field(format!("{}.{}", section, name))
                })
                .collect::<Result<Vec<_>>>()
        };

        Ok(Self {
            entities: compile(&lexicon.entities, "entities")?,
            fields: compile(&lexicon.fields, "fields")?,
            implied_fields: lexicon.implied_fields,
            implied_triggers: lexicon
                .implied_triggers
                .iter()
                .map(|t| t.trim().to_lowercase())
                .collect(),
        })
    }

    /// Extractor over the reference lexicon.
    pub fn reference() -> Result<Self> {
        Self::new(Lexicon::reference()?)
    }

    fn extract_entities(&self, text: &str) -> Vec<String> {
        let mut found: Vec<(usize, &str)> = self
            .entities
            .iter()
            .filter_map(|m| m.first_match(text).map(|pos| (pos, m.canonical.as_str())))
            .collect();
        found.sort();
        found.into_iter().map(|(_, name)| name.to_string()).collect()
    }

    fn extract_mentioned_fields(&self, text: &str) -> BTreeSet<String> {
        self.fields
            .iter()
            .filter(|m| m.pattern.is_match(text))
            .map(|m| m.canonical.clone())
            .collect()
    }

    fn extract_implied_fields(&self, text: &str, entities: &[String]) -> BTreeSet<String> {
        let lowered = text.to_lowercase();
        if !self.implied_triggers.iter().any(|t| lowered.contains(t.as_str())) {
            return BTreeSet::new();
        }

        entities
            .iter()
            .filter_map(|e| self.implied_fields.get(e))
            .flatten()
            .cloned()
            .collect()
    }
}

impl FieldExtractor for LexiconExtractor {
    fn extract(&self, text: &str) -> Result<Extraction> {
        let entities = self.extract_entities(text);
        let mentioned_fields = self.extract_mentioned_fields(text);
        let implied_fields = self
            .extract_implied_fields(text, &entities)
            .into_iter()
            .filter(|f| !mentioned_fields.contains(f))
            .collect();

        Ok(Extraction {
            entities,
            mentioned_fields,
            implied_fields,
            requested_scope: detect_requested_scope(text),
        })
    }

    fn field_mentions(&self, text: &str, fields: &[String]) -> Vec<Range<usize>> {
        let mut spans: Vec<Range<usize>> = self
            .fields
            .iter()
            .filter(|m| fields.contains(&m.canonical))
            .flat_map(|m| m.pattern.find_iter(text).map(|found| found.range()))
            .collect();
        spans.sort_by_key(|span| (span.start, span.end));

        let mut merged: Vec<Range<usize>> = Vec::with_capacity(spans.len());
        for span in spans {
            match merged.last_mut() {
                Some(last) if span.start < last.end => last.end = last.end.max(span.end),
                _ => merged.push(span),
            }
        }
        merged
    }
}
