//! Whole-graph snapshots.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  entity::{Entity, EntityKind, NewEntity},
  relationship::{NewRelationship, Relationship},
  store::WriteOp,
};

pub const SNAPSHOT_VERSION: &str = "1.0";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotMetadata {
  pub exported_at: DateTime<Utc>,
  pub version:     String,
}

/// Every entity, grouped by kind, and every relationship.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
  pub metadata:      SnapshotMetadata,
  pub entities:      BTreeMap<EntityKind, Vec<Entity>>,
  pub relationships: Vec<Relationship>,
}

impl GraphSnapshot {
  pub fn new(entities: Vec<Entity>, relationships: Vec<Relationship>) -> Self {
    let mut grouped: BTreeMap<EntityKind, Vec<Entity>> = BTreeMap::new();
    for entity in entities {
      grouped.entry(entity.kind).or_default().push(entity);
    }
    Self {
      metadata: SnapshotMetadata {
        exported_at: Utc::now(),
        version:     SNAPSHOT_VERSION.to_owned(),
      },
      entities: grouped,
      relationships,
    }
  }

  pub fn entity_count(&self) -> usize { self.entities.values().map(Vec::len).sum() }

  /// Put ops that recreate the snapshot: entities first, then edges.
  /// Stored timestamps are reassigned on write.
  pub fn into_ops(self) -> Vec<WriteOp> {
    let entities = self
      .entities
      .into_values()
      .flatten()
      .map(|e| WriteOp::PutEntity(NewEntity::from(e)));
    let relationships = self
      .relationships
      .into_iter()
      .map(|r| WriteOp::PutRelationship(NewRelationship::from(r)));
    entities.chain(relationships).collect()
  }
}
