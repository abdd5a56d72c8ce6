//! Incoming notes and the webpage context they were captured from.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::identity::EntityKey;

/// The page a note was captured on. Empty strings mean "absent".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebpageMetadata {
  pub title:   String,
  pub url:     String,
  pub domain:  String,
  pub summary: String,
}

impl WebpageMetadata {
  pub fn is_empty(&self) -> bool {
    self.title.is_empty()
      && self.url.is_empty()
      && self.domain.is_empty()
      && self.summary.is_empty()
  }

  pub fn url(&self) -> Option<&str> { non_empty(&self.url) }

  pub fn domain(&self) -> Option<&str> { non_empty(&self.domain) }
}

fn non_empty(s: &str) -> Option<&str> {
  let s = s.trim();
  (!s.is_empty()).then_some(s)
}

/// A note as handed to ingestion.
///
/// `categories` is whatever the categorization service produced; an empty
/// list is a normal input, not a failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NoteInput {
  #[serde(default)]
  pub content:    String,
  /// Capture time in milliseconds since the Unix epoch.
  pub timestamp:  Option<i64>,
  #[serde(default)]
  pub categories: Vec<String>,
  #[serde(default)]
  pub metadata:   WebpageMetadata,
  /// Capture statistics from the client (word count, content length, ...).
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub context:    Option<Value>,
}

impl NoteInput {
  pub fn new(content: impl Into<String>) -> Self {
    Self { content: content.into(), ..Self::default() }
  }

  pub fn at(mut self, timestamp: i64) -> Self {
    self.timestamp = Some(timestamp);
    self
  }

  pub fn tagged<I, T>(mut self, categories: I) -> Self
  where
    I: IntoIterator<Item = T>,
    T: Into<String>,
  {
    self.categories = categories.into_iter().map(Into::into).collect();
    self
  }

  pub fn from_page(mut self, metadata: WebpageMetadata) -> Self {
    self.metadata = metadata;
    self
  }

  /// Category labels with surrounding whitespace removed and blanks dropped.
  ///
  /// Labels resolving to the same category id collapse into the first one
  /// seen, so a note never tags one category twice.
  pub fn category_labels(&self) -> impl Iterator<Item = &str> {
    let mut seen: Vec<String> = Vec::new();
    let mut labels: Vec<&str> = Vec::new();
    for label in self.categories.iter().map(|c| c.trim()).filter(|c| !c.is_empty()) {
      let id = EntityKey::Category { name: label }.resolve();
      if !seen.contains(&id) {
        seen.push(id);
        labels.push(label);
      }
    }
    labels.into_iter()
  }
}

/// A note with its capture time settled and id resolved.
#[derive(Debug, Clone)]
pub struct ResolvedNote {
  pub id:        String,
  pub timestamp: i64,
  pub input:     NoteInput,
}
