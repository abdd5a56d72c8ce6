//! Keyword-to-concept extraction.
//!
//! Extraction is a data-driven table of `(pattern, label, confidence)` rules
//! scanned in order. A rule either matches the note somewhere or it does not;
//! repeated matches add nothing. Labels are unique in the output by concept
//! id, so `Docker` and `docker` count as one label and the first matching
//! rule wins.

use std::sync::LazyLock;

use regex::{Regex, RegexBuilder};

use crate::identity::EntityKey;

/// One row of the extraction table.
#[derive(Debug, Clone)]
pub struct ConceptRule {
  pattern:    Regex,
  label:      String,
  confidence: f64,
}

impl ConceptRule {
  /// Compile a case-insensitive rule.
  pub fn new(
    pattern: &str,
    label: impl Into<String>,
    confidence: f64,
  ) -> Result<Self, regex::Error> {
    Ok(Self {
      pattern:    RegexBuilder::new(pattern).case_insensitive(true).build()?,
      label:      label.into(),
      confidence: confidence.clamp(0.0, 1.0),
    })
  }

  pub fn label(&self) -> &str { &self.label }

  pub fn confidence(&self) -> f64 { self.confidence }

  pub fn matches(&self, text: &str) -> bool { self.pattern.is_match(text) }
}

/// A concept found in a note, with the rule's confidence.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedConcept {
  pub label:      String,
  pub confidence: f64,
}

const DEFAULT_RULES: &[(&str, &str, f64)] = &[
  (r"\b(?:docker\w*|containers?)\b", "docker", 0.9),
  (r"\b(?:apis?|endpoints?|rest)\b", "api", 0.8),
  (r"\b(?:deploy\w*|cloud)\b", "deployment", 0.8),
  (r"\b(?:databases?|db|firestore|sql\w*)\b", "database", 0.8),
  (r"\b(?:auth\w*|login)\b", "authentication", 0.7),
  (r"\b(?:javascript|js|python|code|coding)\b", "programming", 0.7),
];

static DEFAULT_EXTRACTOR: LazyLock<ConceptExtractor> = LazyLock::new(|| {
  let rules = DEFAULT_RULES
    .iter()
    .map(|(pattern, label, confidence)| {
      ConceptRule::new(pattern, *label, *confidence).expect("valid concept rule")
    })
    .collect();
  ConceptExtractor::new(rules)
});

#[derive(Debug, Clone)]
pub struct ConceptExtractor {
  rules: Vec<ConceptRule>,
}

impl ConceptExtractor {
  pub fn new(rules: Vec<ConceptRule>) -> Self { Self { rules } }

  /// The built-in technical vocabulary.
  pub fn builtin() -> Self { DEFAULT_EXTRACTOR.clone() }

  /// Add a rule after the existing ones.
  pub fn push(&mut self, rule: ConceptRule) { self.rules.push(rule); }

  pub fn rules(&self) -> &[ConceptRule] { &self.rules }

  pub fn extract(&self, text: &str) -> Vec<ExtractedConcept> {
    let mut found: Vec<ExtractedConcept> = Vec::new();
    let mut seen: Vec<String> = Vec::new();
    for rule in &self.rules {
      let id = EntityKey::Concept { name: &rule.label }.resolve();
      if seen.contains(&id) {
        continue;
      }
      if rule.matches(text) {
        seen.push(id);
        found.push(ExtractedConcept {
          label:      rule.label.clone(),
          confidence: rule.confidence,
        });
      }
    }
    found
  }
}

impl Default for ConceptExtractor {
  fn default() -> Self { Self::builtin() }
}

#[cfg(test)]
mod tests {
  use std::collections::BTreeMap;

  use super::*;

  fn as_map(found: Vec<ExtractedConcept>) -> BTreeMap<String, f64> {
    found.into_iter().map(|c| (c.label, c.confidence)).collect()
  }

  #[test]
  fn docker_deployment_note() {
    let got = as_map(ConceptExtractor::builtin().extract("Deploying with Docker containers"));
    let want = BTreeMap::from([("deployment".to_owned(), 0.8), ("docker".to_owned(), 0.9)]);
    assert_eq!(got, want);
  }

  #[test]
  fn matching_is_case_insensitive() {
    let got = as_map(ConceptExtractor::builtin().extract("PYTHON LOGIN FLOW"));
    assert_eq!(got.get("programming"), Some(&0.7));
    assert_eq!(got.get("authentication"), Some(&0.7));
  }

  #[test]
  fn repeated_matches_contribute_once() {
    let found = ConceptExtractor::builtin().extract("api api API endpoints rest");
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].label, "api");
    assert_eq!(found[0].confidence, 0.8);
  }

  #[test]
  fn words_inside_other_words_do_not_match() {
    assert!(ConceptExtractor::builtin().extract("the capital of rapid growth").is_empty());
  }

  #[test]
  fn duplicate_labels_keep_first_rule() {
    let extractor = ConceptExtractor::new(vec![
      ConceptRule::new(r"\brust\b", "systems", 0.9).unwrap(),
      ConceptRule::new(r"\bkernel\b", "systems", 0.4).unwrap(),
    ]);
    let found = extractor.extract("a rust kernel");
    assert_eq!(found, vec![ExtractedConcept { label: "systems".into(), confidence: 0.9 }]);
  }

  #[test]
  fn labels_differing_only_in_case_are_one_concept() {
    let mut extractor = ConceptExtractor::builtin();
    extractor.push(ConceptRule::new(r"\bcompose\b", "Docker", 0.5).unwrap());
    let found = extractor.extract("docker compose up");
    assert_eq!(found, vec![ExtractedConcept { label: "docker".into(), confidence: 0.9 }]);
  }

  #[test]
  fn custom_rules_are_additive() {
    let mut extractor = ConceptExtractor::builtin();
    extractor.push(ConceptRule::new(r"\bgraph\w*\b", "graphs", 0.6).unwrap());
    let got = as_map(extractor.extract("a graph database"));
    assert_eq!(got.get("graphs"), Some(&0.6));
    assert_eq!(got.get("database"), Some(&0.8));
  }
}
