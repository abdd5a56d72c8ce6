//! Entities — the typed nodes of the knowledge graph.
//!
//! Every entity carries a free-form `data` mapping whose shape depends on its
//! kind. The typed payload structs below build those mappings; readers go
//! through the accessors on [`Entity`] rather than poking at the map.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{Error, Result};

// ─── Kind ────────────────────────────────────────────────────────────────────

/// The kind of node an entity represents.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
  Note,
  UrlContext,
  Category,
  Concept,
  Domain,
}

impl EntityKind {
  pub const ALL: [EntityKind; 5] = [
    Self::Note,
    Self::UrlContext,
    Self::Category,
    Self::Concept,
    Self::Domain,
  ];

  /// The discriminant stored alongside the entity.
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Note => "note",
      Self::UrlContext => "url_context",
      Self::Category => "category",
      Self::Concept => "concept",
      Self::Domain => "domain",
    }
  }

  pub fn parse(s: &str) -> Result<Self> {
    Self::ALL
      .into_iter()
      .find(|k| k.as_str() == s)
      .ok_or_else(|| Error::Validation(format!("unknown entity type: {s:?}")))
  }

  /// The `data` field holding this kind's running counter, if it has one.
  pub fn counter_field(self) -> Option<&'static str> {
    match self {
      Self::Note => None,
      Self::Concept => Some("frequency"),
      Self::UrlContext | Self::Category | Self::Domain => Some("note_count"),
    }
  }
}

impl fmt::Display for EntityKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

// ─── Entity ──────────────────────────────────────────────────────────────────

/// A persisted node. `created` and `updated` are assigned by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
  pub id:           String,
  #[serde(rename = "type")]
  pub kind:         EntityKind,
  pub name:         String,
  pub data:         Map<String, Value>,
  pub observations: Vec<String>,
  pub created:      DateTime<Utc>,
  pub updated:      DateTime<Utc>,
}

impl Entity {
  /// The running counter (`note_count` or `frequency`); zero when absent.
  pub fn counter(&self) -> u64 {
    self
      .kind
      .counter_field()
      .and_then(|field| self.data.get(field))
      .and_then(Value::as_u64)
      .unwrap_or(0)
  }

  /// The note body, for `note` entities.
  pub fn content(&self) -> Option<&str> {
    self.data.get("content").and_then(Value::as_str)
  }

  pub fn timestamp(&self) -> Option<i64> {
    self.data.get("timestamp").and_then(Value::as_i64)
  }

  /// Case-insensitive substring match over the name and the joined
  /// observation log. `needle` must already be lowercase.
  pub fn matches(&self, needle: &str) -> bool {
    self.name.to_lowercase().contains(needle)
      || self.observations.join(" ").to_lowercase().contains(needle)
  }
}

// ─── NewEntity ───────────────────────────────────────────────────────────────

/// Input to the store's entity writes; timestamps are always store-assigned.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEntity {
  pub id:           String,
  pub kind:         EntityKind,
  pub name:         String,
  pub data:         Map<String, Value>,
  pub observations: Vec<String>,
}

impl NewEntity {
  pub fn new(
    id: impl Into<String>,
    kind: EntityKind,
    name: impl AsRef<str>,
    max_name_len: usize,
  ) -> Self {
    Self {
      id: id.into(),
      kind,
      name: truncate_name(name.as_ref(), max_name_len),
      data: Map::new(),
      observations: Vec::new(),
    }
  }

  pub fn with_data(mut self, data: impl EntityData) -> Self {
    self.data = data.into_map();
    self
  }

  pub fn observe(mut self, observation: impl Into<String>) -> Self {
    self.observations.push(observation.into());
    self
  }

  /// Overwrite the counter field for this kind; a no-op for notes.
  pub fn set_counter(&mut self, value: u64) {
    if let Some(field) = self.kind.counter_field() {
      self.data.insert(field.to_owned(), Value::from(value));
    }
  }

  pub fn counter(&self) -> u64 {
    self
      .kind
      .counter_field()
      .and_then(|field| self.data.get(field))
      .and_then(Value::as_u64)
      .unwrap_or(0)
  }
}

impl From<Entity> for NewEntity {
  fn from(e: Entity) -> Self {
    Self {
      id:           e.id,
      kind:         e.kind,
      name:         e.name,
      data:         e.data,
      observations: e.observations,
    }
  }
}

/// Cut `name` to at most `max` characters, marking the cut with `...`.
pub fn truncate_name(name: &str, max: usize) -> String {
  if name.chars().count() <= max {
    return name.to_owned();
  }
  let mut cut: String = name.chars().take(max).collect();
  cut.push_str("...");
  cut
}

// ─── Typed payloads ──────────────────────────────────────────────────────────

/// A typed `data` payload for one entity kind.
pub trait EntityData: Serialize {
  fn into_map(self) -> Map<String, Value>
  where
    Self: Sized,
  {
    match serde_json::to_value(&self) {
      Ok(Value::Object(map)) => map,
      _ => Map::new(),
    }
  }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NoteData {
  pub content:        String,
  pub timestamp:      i64,
  pub categories:     Vec<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub word_count:     Option<u64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub content_length: Option<u64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub metadata:       Option<Value>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub context:        Option<Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UrlContextData {
  pub url:        String,
  pub domain:     String,
  pub title:      String,
  pub summary:    String,
  pub note_count: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CategoryData {
  pub description: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub definition:  Option<String>,
  pub note_count:  u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConceptData {
  pub frequency: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DomainData {
  pub domain:     String,
  pub note_count: u64,
}

impl EntityData for NoteData {}
impl EntityData for UrlContextData {}
impl EntityData for CategoryData {}
impl EntityData for ConceptData {}
impl EntityData for DomainData {}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn counter_field_per_kind() {
    assert_eq!(EntityKind::Note.counter_field(), None);
    assert_eq!(EntityKind::Concept.counter_field(), Some("frequency"));
    assert_eq!(EntityKind::Category.counter_field(), Some("note_count"));
    assert_eq!(EntityKind::Domain.counter_field(), Some("note_count"));
  }

  #[test]
  fn kind_round_trips_through_str() {
    for kind in EntityKind::ALL {
      assert_eq!(EntityKind::parse(kind.as_str()).unwrap(), kind);
    }
    assert!(EntityKind::parse("person").is_err());
  }

  #[test]
  fn long_names_are_truncated() {
    let long = "x".repeat(80);
    let e = NewEntity::new("note-1", EntityKind::Note, &long, 50);
    assert_eq!(e.name.chars().count(), 53);
    assert!(e.name.ends_with("..."));

    let short = NewEntity::new("note-2", EntityKind::Note, "short", 50);
    assert_eq!(short.name, "short");
  }

  #[test]
  fn set_counter_writes_kind_field() {
    let mut e = NewEntity::new("concept-api", EntityKind::Concept, "api", 100)
      .with_data(ConceptData { frequency: 1 });
    e.set_counter(7);
    assert_eq!(e.data.get("frequency"), Some(&Value::from(7u64)));
    assert_eq!(e.counter(), 7);
  }
}
