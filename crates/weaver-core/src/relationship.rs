//! Relationships — typed, weighted, directed edges between entities.
//!
//! An edge id is derived from `(from_id, kind, to_id)`, so writing the same
//! logical edge twice overwrites it instead of adding a duplicate.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{Error, Result};

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationshipKind {
  CreatedFrom,
  TaggedAs,
  Contains,
  BelongsTo,
  FromDomain,
  TemporalNear,
}

impl RelationshipKind {
  pub const ALL: [RelationshipKind; 6] = [
    Self::CreatedFrom,
    Self::TaggedAs,
    Self::Contains,
    Self::BelongsTo,
    Self::FromDomain,
    Self::TemporalNear,
  ];

  pub fn as_str(self) -> &'static str {
    match self {
      Self::CreatedFrom => "CREATED_FROM",
      Self::TaggedAs => "TAGGED_AS",
      Self::Contains => "CONTAINS",
      Self::BelongsTo => "BELONGS_TO",
      Self::FromDomain => "FROM_DOMAIN",
      Self::TemporalNear => "TEMPORAL_NEAR",
    }
  }

  pub fn parse(s: &str) -> Result<Self> {
    Self::ALL
      .into_iter()
      .find(|k| k.as_str() == s)
      .ok_or_else(|| {
        Error::Validation(format!("unknown relationship type: {s:?}"))
      })
  }

  /// Edge kinds followed by related-notes traversal.
  pub fn is_traversable(self) -> bool {
    matches!(self, Self::TaggedAs | Self::Contains | Self::CreatedFrom)
  }
}

impl fmt::Display for RelationshipKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// The deterministic id of the edge `from_id --kind--> to_id`.
pub fn relationship_id(from_id: &str, kind: RelationshipKind, to_id: &str) -> String {
  format!("{from_id}-{kind}-{to_id}")
}

// ─── Relationship ────────────────────────────────────────────────────────────

/// A persisted edge. `created` is assigned by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
  pub id:       String,
  pub from_id:  String,
  pub to_id:    String,
  #[serde(rename = "type")]
  pub kind:     RelationshipKind,
  pub strength: f64,
  pub metadata: Map<String, Value>,
  pub created:  DateTime<Utc>,
}

// ─── NewRelationship ─────────────────────────────────────────────────────────

/// Input to [`crate::store::GraphStore::commit`].
#[derive(Debug, Clone, PartialEq)]
pub struct NewRelationship {
  pub id:       String,
  pub from_id:  String,
  pub to_id:    String,
  pub kind:     RelationshipKind,
  pub strength: f64,
  pub metadata: Map<String, Value>,
}

impl NewRelationship {
  /// Build an edge with its derived id. `strength` is clamped to `[0, 1]`.
  pub fn new(
    from_id: impl Into<String>,
    kind: RelationshipKind,
    to_id: impl Into<String>,
    strength: f64,
  ) -> Self {
    let from_id = from_id.into();
    let to_id = to_id.into();
    Self {
      id: relationship_id(&from_id, kind, &to_id),
      from_id,
      to_id,
      kind,
      strength: if strength.is_nan() { 0.0 } else { strength.clamp(0.0, 1.0) },
      metadata: Map::new(),
    }
  }

  pub fn with_meta(mut self, key: &str, value: impl Into<Value>) -> Self {
    self.metadata.insert(key.to_owned(), value.into());
    self
  }
}

impl From<Relationship> for NewRelationship {
  fn from(r: Relationship) -> Self {
    Self {
      id:       r.id,
      from_id:  r.from_id,
      to_id:    r.to_id,
      kind:     r.kind,
      strength: r.strength,
      metadata: r.metadata,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn id_is_derived_from_endpoints_and_kind() {
    let a = NewRelationship::new("note-1", RelationshipKind::TaggedAs, "category-rust", 1.0);
    let b = NewRelationship::new("note-1", RelationshipKind::TaggedAs, "category-rust", 0.5);
    assert_eq!(a.id, "note-1-TAGGED_AS-category-rust");
    assert_eq!(a.id, b.id);
  }

  #[test]
  fn strength_is_clamped() {
    let hi = NewRelationship::new("a", RelationshipKind::Contains, "b", 1.7);
    let lo = NewRelationship::new("a", RelationshipKind::Contains, "b", -0.2);
    assert_eq!(hi.strength, 1.0);
    assert_eq!(lo.strength, 0.0);
  }

  #[test]
  fn kind_serializes_screaming_snake() {
    let json = serde_json::to_string(&RelationshipKind::TemporalNear).unwrap();
    assert_eq!(json, "\"TEMPORAL_NEAR\"");
    assert_eq!(
      RelationshipKind::parse("FROM_DOMAIN").unwrap(),
      RelationshipKind::FromDomain
    );
  }
}
