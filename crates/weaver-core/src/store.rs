//! The `GraphStore` trait and supporting write/query types.
//!
//! The trait is implemented by storage backends (e.g. `weaver-store-sqlite`).
//! The engine modules depend on this abstraction, not on any concrete
//! backend. A backend must offer three primitives beyond plain reads: a
//! keyed upsert, an atomic create-or-increment, and a bounded atomic batch.

use std::{collections::BTreeMap, future::Future};

use serde_json::{Map, Value};

use crate::{
  entity::{Entity, EntityKind, NewEntity},
  relationship::{NewRelationship, Relationship, RelationshipKind},
};

// ─── Write types ─────────────────────────────────────────────────────────────

/// A conditional write: create `entity` if its id is absent, otherwise add
/// `increment` to the existing counter and refresh `updated`.
#[derive(Debug, Clone, PartialEq)]
pub struct EnsureEntity {
  pub entity:      NewEntity,
  pub increment:   u64,
  /// Appended to the existing observation log when the entity already exists.
  pub observation: Option<String>,
  /// Data fields overwritten on an existing entity. Must not name the
  /// counter field.
  pub merge:       Map<String, Value>,
}

impl EnsureEntity {
  pub fn new(entity: NewEntity) -> Self {
    Self { entity, increment: 1, observation: None, merge: Map::new() }
  }
}

/// Whether an ensure created the entity or bumped an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnsureOutcome {
  Created,
  Incremented,
}

/// One operation inside an atomic [`GraphStore::commit`] batch.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
  /// Unconditional overwrite of an entity.
  PutEntity(NewEntity),
  EnsureEntity(EnsureEntity),
  /// Unconditional overwrite of an edge, keyed by its derived id.
  PutRelationship(NewRelationship),
}

// ─── Query type ──────────────────────────────────────────────────────────────

/// Parameters for [`GraphStore::list_entities`].
#[derive(Debug, Clone, Default)]
pub struct EntityQuery {
  /// Restrict to these kinds; empty means all kinds.
  pub kinds: Vec<EntityKind>,
  pub limit: Option<usize>,
}

impl EntityQuery {
  pub fn of_kind(kind: EntityKind) -> Self {
    Self { kinds: vec![kind], limit: None }
  }
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a document store holding the entity and relationship
/// collections.
///
/// All methods return `Send` futures so a store can be shared across tasks
/// in a multi-threaded runtime. Backend errors convert into
/// [`crate::Error`] so the engine can keep the backend's classification
/// (batch overflow, conflict) and treat everything else as unavailability.
pub trait GraphStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + Into<crate::Error> + 'static;

  /// The largest number of [`WriteOp`]s accepted by a single
  /// [`commit`](Self::commit).
  fn max_batch_size(&self) -> usize;

  // ── Entities ──────────────────────────────────────────────────────────

  /// Write `entity` unconditionally, replacing any entity with the same id.
  fn put_entity(
    &self,
    entity: NewEntity,
  ) -> impl Future<Output = Result<Entity, Self::Error>> + Send + '_;

  /// Create-if-absent-else-increment as one atomic operation. Two
  /// concurrent calls for the same new id must yield one entity whose
  /// counter reflects both.
  fn ensure_entity(
    &self,
    ensure: EnsureEntity,
  ) -> impl Future<Output = Result<EnsureOutcome, Self::Error>> + Send + '_;

  /// Retrieve an entity by id. Returns `None` if not found.
  fn get_entity<'a>(
    &'a self,
    id: &'a str,
  ) -> impl Future<Output = Result<Option<Entity>, Self::Error>> + Send + 'a;

  /// List entities in insertion order, filtered by kind.
  fn list_entities<'a>(
    &'a self,
    query: &'a EntityQuery,
  ) -> impl Future<Output = Result<Vec<Entity>, Self::Error>> + Send + 'a;

  /// Number of stored entities of each kind. Kinds with no entities are
  /// omitted.
  fn count_entities(
    &self,
  ) -> impl Future<Output = Result<BTreeMap<EntityKind, usize>, Self::Error>> + Send + '_;

  // ── Batches ───────────────────────────────────────────────────────────

  /// Apply `ops` atomically: all or nothing. Batches larger than
  /// [`max_batch_size`](Self::max_batch_size) are rejected untouched.
  fn commit(
    &self,
    ops: Vec<WriteOp>,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  // ── Relationships ─────────────────────────────────────────────────────

  /// Outgoing edges of `from_id`, in insertion order.
  fn relationships_from<'a>(
    &'a self,
    from_id: &'a str,
    limit: Option<usize>,
  ) -> impl Future<Output = Result<Vec<Relationship>, Self::Error>> + Send + 'a;

  /// Incoming edges of `to_id` with the given kind, in insertion order.
  fn relationships_to<'a>(
    &'a self,
    to_id: &'a str,
    kind: RelationshipKind,
    limit: Option<usize>,
  ) -> impl Future<Output = Result<Vec<Relationship>, Self::Error>> + Send + 'a;

  fn list_relationships(
    &self,
  ) -> impl Future<Output = Result<Vec<Relationship>, Self::Error>> + Send + '_;

  // ── Maintenance ───────────────────────────────────────────────────────

  /// Remove every entity and relationship.
  fn clear(&self) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

/// Commit `ops` in consecutive batches no larger than the store's ceiling.
///
/// Each batch is atomic on its own; a failure stops at that batch and the
/// earlier batches stay committed. Put ops are keyed by deterministic ids,
/// so resubmitting them is safe; ensure ops increment again.
pub async fn commit_chunked<S: GraphStore>(store: &S, ops: Vec<WriteOp>) -> crate::Result<usize> {
  let max = store.max_batch_size().max(1);
  let total = ops.len();
  let mut written = 0;
  let mut ops = ops.into_iter().peekable();
  while ops.peek().is_some() {
    let batch: Vec<WriteOp> = ops.by_ref().take(max).collect();
    written += store.commit(batch).await.into_core()?;
    tracing::debug!(written, total, "committed batch");
  }
  Ok(written)
}

/// Convert a backend result into the engine's [`crate::Result`].
pub(crate) trait IntoCore<T> {
  fn into_core(self) -> crate::Result<T>;
}

impl<T, E: Into<crate::Error>> IntoCore<T> for Result<T, E> {
  fn into_core(self) -> crate::Result<T> { self.map_err(Into::into) }
}
