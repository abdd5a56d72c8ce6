//! [`SqliteStore`] — the SQLite implementation of [`GraphStore`].

use std::{collections::BTreeMap, path::Path};

use chrono::Utc;
use rusqlite::{OptionalExtension as _, TransactionBehavior};

use weaver_core::{
  entity::{Entity, EntityKind, NewEntity},
  relationship::{Relationship, RelationshipKind},
  store::{EnsureEntity, EnsureOutcome, EntityQuery, GraphStore, WriteOp},
};

use crate::{
  Error, Result,
  encode::{
    ENTITY_COLUMNS, EncodedOp, EnsureRow, EntityRow, RELATIONSHIP_COLUMNS, RawEntity,
    RawRelationship, RelationshipRow, encode_dt,
  },
  schema::SCHEMA,
};

/// Largest number of writes accepted by one [`SqliteStore::commit`].
pub const DEFAULT_MAX_BATCH_SIZE: usize = 500;

// ─── Statements ──────────────────────────────────────────────────────────────
//
// Plain functions over a connection so single writes and batch commits share
// them inside one transaction.

enum EnsureStep {
  Created,
  Incremented,
  /// The id is taken by an entity of this other kind.
  Mismatch(String),
}

fn upsert_entity(conn: &rusqlite::Connection, row: &EntityRow, now: &str) -> rusqlite::Result<()> {
  conn.execute(
    "INSERT INTO entities (entity_id, kind, name, data, observations, created_at, updated_at)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
     ON CONFLICT(entity_id) DO UPDATE SET
       kind         = excluded.kind,
       name         = excluded.name,
       data         = excluded.data,
       observations = excluded.observations,
       updated_at   = excluded.updated_at",
    rusqlite::params![row.id, row.kind.as_str(), row.name, row.data, row.observations, now],
  )?;
  Ok(())
}

fn apply_ensure(conn: &rusqlite::Connection, ensure: &EnsureRow, now: &str) -> rusqlite::Result<EnsureStep> {
  let row = &ensure.row;
  let existing: Option<String> = conn
    .query_row(
      "SELECT kind FROM entities WHERE entity_id = ?1",
      rusqlite::params![row.id],
      |r| r.get(0),
    )
    .optional()?;

  match existing {
    None => {
      conn.execute(
        "INSERT INTO entities (entity_id, kind, name, data, observations, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
        rusqlite::params![row.id, row.kind.as_str(), row.name, row.data, row.observations, now],
      )?;
      Ok(EnsureStep::Created)
    }
    Some(kind) if kind != row.kind.as_str() => Ok(EnsureStep::Mismatch(kind)),
    Some(_) => {
      if let Some(merge) = &ensure.merge {
        conn.execute(
          "UPDATE entities SET data = json_patch(data, ?2) WHERE entity_id = ?1",
          rusqlite::params![row.id, merge],
        )?;
      }
      conn.execute(
        "UPDATE entities SET
           data = CASE WHEN ?2 IS NULL THEN data
                  ELSE json_set(data, ?2, COALESCE(json_extract(data, ?2), 0) + ?3) END,
           observations = CASE WHEN ?4 IS NULL THEN observations
                  ELSE json_insert(observations, '$[#]', ?4) END,
           updated_at = ?5
         WHERE entity_id = ?1",
        rusqlite::params![row.id, ensure.counter_path, ensure.increment, ensure.observation, now],
      )?;
      Ok(EnsureStep::Incremented)
    }
  }
}

/// Edge ids are derived from their endpoints and kind, so a rewrite only
/// refreshes strength and metadata.
fn upsert_relationship(
  conn: &rusqlite::Connection,
  row: &RelationshipRow,
  now: &str,
) -> rusqlite::Result<()> {
  conn.execute(
    "INSERT INTO relationships (rel_id, from_id, to_id, kind, strength, metadata, created_at)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
     ON CONFLICT(rel_id) DO UPDATE SET
       strength = excluded.strength,
       metadata = excluded.metadata",
    rusqlite::params![row.id, row.from_id, row.to_id, row.kind, row.strength, row.metadata, now],
  )?;
  Ok(())
}

/// SQLite's `LIMIT -1` means unbounded.
fn sql_limit(limit: Option<usize>) -> i64 {
  limit.map_or(-1, |l| i64::try_from(l).unwrap_or(i64::MAX))
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A knowledge graph backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted. All calls
/// run on the connection's single background thread, one at a time.
#[derive(Clone)]
pub struct SqliteStore {
  conn:           tokio_rusqlite::Connection,
  max_batch_size: usize,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn, max_batch_size: DEFAULT_MAX_BATCH_SIZE };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn, max_batch_size: DEFAULT_MAX_BATCH_SIZE };
    store.init_schema().await?;
    Ok(store)
  }

  pub fn with_max_batch_size(mut self, max: usize) -> Self {
    self.max_batch_size = max.max(1);
    self
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn select_relationships(
    &self,
    filter: &'static str,
    params: Vec<String>,
    limit: Option<usize>,
  ) -> Result<Vec<Relationship>> {
    let limit = sql_limit(limit);
    let raws: Vec<RawRelationship> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {RELATIONSHIP_COLUMNS} FROM relationships {filter} ORDER BY seq LIMIT {limit}"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params.iter()), RawRelationship::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawRelationship::into_relationship).collect()
  }
}

// ─── GraphStore impl ─────────────────────────────────────────────────────────

impl GraphStore for SqliteStore {
  type Error = Error;

  fn max_batch_size(&self) -> usize { self.max_batch_size }

  // ── Entities ──────────────────────────────────────────────────────────────

  async fn put_entity(&self, entity: NewEntity) -> Result<Entity> {
    let row = EntityRow::encode(&entity)?;
    let now = encode_dt(Utc::now());

    let raw: RawEntity = self
      .conn
      .call(move |conn| {
        upsert_entity(conn, &row, &now)?;
        Ok(conn.query_row(
          &format!("SELECT {ENTITY_COLUMNS} FROM entities WHERE entity_id = ?1"),
          rusqlite::params![row.id],
          RawEntity::from_row,
        )?)
      })
      .await?;

    raw.into_entity()
  }

  async fn ensure_entity(&self, ensure: EnsureEntity) -> Result<EnsureOutcome> {
    let row = EnsureRow::encode(&ensure)?;
    let now = encode_dt(Utc::now());

    let step = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let step = apply_ensure(&tx, &row, &now)?;
        tx.commit()?;
        Ok(step)
      })
      .await?;

    match step {
      EnsureStep::Created => Ok(EnsureOutcome::Created),
      EnsureStep::Incremented => Ok(EnsureOutcome::Incremented),
      EnsureStep::Mismatch(existing) => Err(Error::KindMismatch {
        id: ensure.entity.id,
        existing,
        requested: ensure.entity.kind,
      }),
    }
  }

  async fn get_entity(&self, id: &str) -> Result<Option<Entity>> {
    let id = id.to_owned();

    let raw: Option<RawEntity> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {ENTITY_COLUMNS} FROM entities WHERE entity_id = ?1"),
              rusqlite::params![id],
              RawEntity::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawEntity::into_entity).transpose()
  }

  async fn list_entities(&self, query: &EntityQuery) -> Result<Vec<Entity>> {
    let kinds: Vec<&'static str> = query.kinds.iter().map(|k| k.as_str()).collect();
    let limit = sql_limit(query.limit);

    let raws: Vec<RawEntity> = self
      .conn
      .call(move |conn| {
        let filter = if kinds.is_empty() {
          String::new()
        } else {
          format!("WHERE kind IN ({})", vec!["?"; kinds.len()].join(", "))
        };
        let sql =
          format!("SELECT {ENTITY_COLUMNS} FROM entities {filter} ORDER BY seq LIMIT {limit}");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(kinds.iter()), RawEntity::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawEntity::into_entity).collect()
  }

  async fn count_entities(&self) -> Result<BTreeMap<EntityKind, usize>> {
    let rows: Vec<(String, i64)> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare("SELECT kind, COUNT(*) FROM entities GROUP BY kind")?;
        let rows = stmt
          .query_map([], |r| Ok((r.get(0)?, r.get(1)?)))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    rows
      .into_iter()
      .map(|(kind, count)| -> Result<(EntityKind, usize)> {
        Ok((EntityKind::parse(&kind)?, usize::try_from(count).unwrap_or(0)))
      })
      .collect()
  }

  // ── Batches ───────────────────────────────────────────────────────────────

  async fn commit(&self, ops: Vec<WriteOp>) -> Result<usize> {
    if ops.len() > self.max_batch_size {
      return Err(Error::BatchOverflow { len: ops.len(), max: self.max_batch_size });
    }
    let encoded = ops.iter().map(EncodedOp::encode).collect::<Result<Vec<_>>>()?;
    let count = encoded.len();
    let now = encode_dt(Utc::now());

    let mismatch = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        for op in &encoded {
          match op {
            EncodedOp::Put(row) => upsert_entity(&tx, row, &now)?,
            EncodedOp::Ensure(ensure) => {
              // Returning early drops `tx`, which rolls the batch back.
              if let EnsureStep::Mismatch(existing) = apply_ensure(&tx, ensure, &now)? {
                return Ok(Some((ensure.row.id.clone(), existing, ensure.row.kind)));
              }
            }
            EncodedOp::Relate(row) => upsert_relationship(&tx, row, &now)?,
          }
        }
        tx.commit()?;
        Ok(None)
      })
      .await?;

    match mismatch {
      Some((id, existing, requested)) => Err(Error::KindMismatch { id, existing, requested }),
      None => Ok(count),
    }
  }

  // ── Relationships ─────────────────────────────────────────────────────────

  async fn relationships_from(&self, from_id: &str, limit: Option<usize>) -> Result<Vec<Relationship>> {
    self
      .select_relationships("WHERE from_id = ?1", vec![from_id.to_owned()], limit)
      .await
  }

  async fn relationships_to(
    &self,
    to_id: &str,
    kind: RelationshipKind,
    limit: Option<usize>,
  ) -> Result<Vec<Relationship>> {
    self
      .select_relationships(
        "WHERE to_id = ?1 AND kind = ?2",
        vec![to_id.to_owned(), kind.as_str().to_owned()],
        limit,
      )
      .await
  }

  async fn list_relationships(&self) -> Result<Vec<Relationship>> {
    self.select_relationships("", Vec::new(), None).await
  }

  // ── Maintenance ───────────────────────────────────────────────────────────

  async fn clear(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch("DELETE FROM relationships; DELETE FROM entities;")?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}
