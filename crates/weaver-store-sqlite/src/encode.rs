//! Encoding and decoding helpers between engine types and the plain-text
//! representations stored in SQLite columns.
//!
//! All timestamps are stored as RFC 3339 strings. Entity data, observation
//! logs and edge metadata are stored as compact JSON.

use chrono::{DateTime, Utc};
use weaver_core::{
  entity::{Entity, EntityKind, NewEntity},
  relationship::{NewRelationship, Relationship, RelationshipKind},
  store::{EnsureEntity, WriteOp},
};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Write rows ──────────────────────────────────────────────────────────────
//
// Owned, pre-serialized values that can move into a `Connection::call`
// closure.

pub struct EntityRow {
  pub id:           String,
  pub kind:         EntityKind,
  pub name:         String,
  pub data:         String,
  pub observations: String,
}

impl EntityRow {
  pub fn encode(entity: &NewEntity) -> Result<Self> {
    Ok(Self {
      id:           entity.id.clone(),
      kind:         entity.kind,
      name:         entity.name.clone(),
      data:         serde_json::to_string(&entity.data)?,
      observations: serde_json::to_string(&entity.observations)?,
    })
  }
}

pub struct EnsureRow {
  pub row:          EntityRow,
  /// JSON path of the counter field, e.g. `$.note_count`.
  pub counter_path: Option<String>,
  pub increment:    i64,
  pub observation:  Option<String>,
  /// JSON merge patch for existing data; `None` when there is nothing to
  /// merge.
  pub merge:        Option<String>,
}

impl EnsureRow {
  pub fn encode(ensure: &EnsureEntity) -> Result<Self> {
    Ok(Self {
      row:          EntityRow::encode(&ensure.entity)?,
      counter_path: ensure.entity.kind.counter_field().map(|f| format!("$.{f}")),
      increment:    i64::try_from(ensure.increment).unwrap_or(i64::MAX),
      observation:  ensure.observation.clone(),
      merge:        (!ensure.merge.is_empty())
        .then(|| serde_json::to_string(&ensure.merge))
        .transpose()?,
    })
  }
}

pub struct RelationshipRow {
  pub id:       String,
  pub from_id:  String,
  pub to_id:    String,
  pub kind:     &'static str,
  pub strength: f64,
  pub metadata: String,
}

impl RelationshipRow {
  pub fn encode(rel: &NewRelationship) -> Result<Self> {
    Ok(Self {
      id:       rel.id.clone(),
      from_id:  rel.from_id.clone(),
      to_id:    rel.to_id.clone(),
      kind:     rel.kind.as_str(),
      strength: rel.strength,
      metadata: serde_json::to_string(&rel.metadata)?,
    })
  }
}

pub enum EncodedOp {
  Put(EntityRow),
  Ensure(EnsureRow),
  Relate(RelationshipRow),
}

impl EncodedOp {
  pub fn encode(op: &WriteOp) -> Result<Self> {
    Ok(match op {
      WriteOp::PutEntity(e) => Self::Put(EntityRow::encode(e)?),
      WriteOp::EnsureEntity(e) => Self::Ensure(EnsureRow::encode(e)?),
      WriteOp::PutRelationship(r) => Self::Relate(RelationshipRow::encode(r)?),
    })
  }
}

// ─── Read rows ───────────────────────────────────────────────────────────────

pub const ENTITY_COLUMNS: &str =
  "entity_id, kind, name, data, observations, created_at, updated_at";

/// Raw strings read directly from an `entities` row.
pub struct RawEntity {
  pub id:           String,
  pub kind:         String,
  pub name:         String,
  pub data:         String,
  pub observations: String,
  pub created_at:   String,
  pub updated_at:   String,
}

impl RawEntity {
  /// Map a row selected with [`ENTITY_COLUMNS`].
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:           row.get(0)?,
      kind:         row.get(1)?,
      name:         row.get(2)?,
      data:         row.get(3)?,
      observations: row.get(4)?,
      created_at:   row.get(5)?,
      updated_at:   row.get(6)?,
    })
  }

  pub fn into_entity(self) -> Result<Entity> {
    Ok(Entity {
      id:           self.id,
      kind:         EntityKind::parse(&self.kind)?,
      name:         self.name,
      data:         serde_json::from_str(&self.data)?,
      observations: serde_json::from_str(&self.observations)?,
      created:      decode_dt(&self.created_at)?,
      updated:      decode_dt(&self.updated_at)?,
    })
  }
}

pub const RELATIONSHIP_COLUMNS: &str =
  "rel_id, from_id, to_id, kind, strength, metadata, created_at";

/// Raw values read directly from a `relationships` row.
pub struct RawRelationship {
  pub id:         String,
  pub from_id:    String,
  pub to_id:      String,
  pub kind:       String,
  pub strength:   f64,
  pub metadata:   String,
  pub created_at: String,
}

impl RawRelationship {
  /// Map a row selected with [`RELATIONSHIP_COLUMNS`].
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:         row.get(0)?,
      from_id:    row.get(1)?,
      to_id:      row.get(2)?,
      kind:       row.get(3)?,
      strength:   row.get(4)?,
      metadata:   row.get(5)?,
      created_at: row.get(6)?,
    })
  }

  pub fn into_relationship(self) -> Result<Relationship> {
    Ok(Relationship {
      id:       self.id,
      from_id:  self.from_id,
      to_id:    self.to_id,
      kind:     RelationshipKind::parse(&self.kind)?,
      strength: self.strength,
      metadata: serde_json::from_str(&self.metadata)?,
      created:  decode_dt(&self.created_at)?,
    })
  }
}
