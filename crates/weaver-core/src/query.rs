//! [`GraphQuery`] — read-only discovery over the stored graph.
//!
//! These are best-effort features: a store failure is logged and turns into
//! an empty result instead of an error.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
  Result,
  config::GraphConfig,
  entity::{Entity, EntityKind},
  relationship::RelationshipKind,
  store::{EntityQuery, GraphStore, IntoCore},
};

// ─── Result types ────────────────────────────────────────────────────────────

/// A note reached through an entity it shares with the source note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelatedNote {
  pub id:                String,
  pub name:              String,
  pub content:           String,
  pub relationship_type: RelationshipKind,
  pub strength:          f64,
}

/// An entity ranked by its running counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedEntity {
  pub id:    String,
  pub name:  String,
  pub count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Overview {
  pub entity_counts:  BTreeMap<EntityKind, usize>,
  pub top_domains:    Vec<RankedEntity>,
  pub top_categories: Vec<RankedEntity>,
  pub top_concepts:   Vec<RankedEntity>,
}

// ─── Queries ─────────────────────────────────────────────────────────────────

pub struct GraphQuery<'a, S> {
  store:  &'a S,
  config: &'a GraphConfig,
}

impl<'a, S: GraphStore> GraphQuery<'a, S> {
  pub fn new(store: &'a S, config: &'a GraphConfig) -> Self { Self { store, config } }

  /// Notes sharing a category, concept or url context with `note_id`,
  /// strongest first.
  ///
  /// A note sharing several entities with the source appears once per
  /// shared entity; ties keep encounter order.
  pub async fn related_notes(&self, note_id: &str, limit: usize) -> Vec<RelatedNote> {
    self.fetch_related(note_id, limit).await.unwrap_or_else(|e| {
      tracing::error!(note_id, error = %e, "related-notes lookup failed");
      Vec::new()
    })
  }

  async fn fetch_related(&self, note_id: &str, limit: usize) -> Result<Vec<RelatedNote>> {
    let outgoing = self
      .store
      .relationships_from(note_id, Some(self.config.related_edge_scan))
      .await
      .into_core()?;

    // Targets grouped by edge kind, kinds in first-seen order.
    let mut groups: Vec<(RelationshipKind, Vec<String>)> = Vec::new();
    for edge in outgoing.into_iter().filter(|e| e.kind.is_traversable()) {
      match groups.iter_mut().find(|(kind, _)| *kind == edge.kind) {
        Some((_, targets)) => targets.push(edge.to_id),
        None => groups.push((edge.kind, vec![edge.to_id])),
      }
    }

    let mut related = Vec::new();
    for (kind, targets) in groups {
      for target in targets {
        let incoming = self
          .store
          .relationships_to(&target, kind, Some(self.config.related_fanout))
          .await
          .into_core()?;

        for edge in incoming {
          if edge.from_id == note_id || !edge.from_id.starts_with("note-") {
            continue;
          }
          let Some(note) = self.store.get_entity(&edge.from_id).await.into_core()?
          else {
            continue;
          };
          if note.kind != EntityKind::Note {
            continue;
          }
          related.push(RelatedNote {
            content:           note.content().unwrap_or_default().to_owned(),
            id:                note.id,
            name:              note.name,
            relationship_type: kind,
            strength:          edge.strength,
          });
        }
      }
    }

    related.sort_by(|a, b| b.strength.total_cmp(&a.strength));
    related.truncate(limit);
    Ok(related)
  }

  /// Entities whose name or observations contain `query`, ignoring case.
  ///
  /// Only the first `search_scan_cap` entities (after the kind filter) are
  /// examined.
  pub async fn search(&self, query: &str, kinds: &[EntityKind], limit: usize) -> Vec<Entity> {
    self.fetch_search(query, kinds, limit).await.unwrap_or_else(|e| {
      tracing::error!(query, error = %e, "entity search failed");
      Vec::new()
    })
  }

  async fn fetch_search(
    &self,
    query: &str,
    kinds: &[EntityKind],
    limit: usize,
  ) -> Result<Vec<Entity>> {
    let scan = EntityQuery {
      kinds: kinds.to_vec(),
      limit: Some(self.config.search_scan_cap),
    };
    let needle = query.to_lowercase();
    let candidates = self.store.list_entities(&scan).await.into_core()?;
    Ok(
      candidates
        .into_iter()
        .filter(|e| e.matches(&needle))
        .take(limit)
        .collect(),
    )
  }

  /// Entity counts per kind plus the busiest domains, categories and
  /// concepts.
  pub async fn overview(&self) -> Overview {
    self.fetch_overview().await.unwrap_or_else(|e| {
      tracing::error!(error = %e, "overview failed");
      Overview::default()
    })
  }

  async fn fetch_overview(&self) -> Result<Overview> {
    Ok(Overview {
      entity_counts:  self.store.count_entities().await.into_core()?,
      top_domains:    self.top(EntityKind::Domain).await?,
      top_categories: self.top(EntityKind::Category).await?,
      top_concepts:   self.top(EntityKind::Concept).await?,
    })
  }

  async fn top(&self, kind: EntityKind) -> Result<Vec<RankedEntity>> {
    let query = EntityQuery::of_kind(kind);
    let mut ranked: Vec<RankedEntity> = self
      .store
      .list_entities(&query)
      .await
      .into_core()?
      .into_iter()
      .map(|e| RankedEntity { count: e.counter(), id: e.id, name: e.name })
      .collect();
    ranked.sort_by(|a, b| b.count.cmp(&a.count));
    ranked.truncate(self.config.overview_top_n);
    Ok(ranked)
  }
}

#[cfg(test)]
mod tests {
  use std::collections::BTreeMap;

  use super::*;
  use crate::{
    entity::NewEntity,
    relationship::Relationship,
    store::{EnsureEntity, EnsureOutcome, WriteOp},
  };

  #[derive(Debug, thiserror::Error)]
  #[error("store offline")]
  struct Offline;

  impl From<Offline> for crate::Error {
    fn from(err: Offline) -> Self { crate::Error::store(err) }
  }

  /// A store whose every call fails.
  struct OfflineStore;

  impl GraphStore for OfflineStore {
    type Error = Offline;

    fn max_batch_size(&self) -> usize { 1 }

    async fn put_entity(&self, _entity: NewEntity) -> Result<Entity, Offline> { Err(Offline) }

    async fn ensure_entity(&self, _ensure: EnsureEntity) -> Result<EnsureOutcome, Offline> {
      Err(Offline)
    }

    async fn get_entity(&self, _id: &str) -> Result<Option<Entity>, Offline> { Err(Offline) }

    async fn list_entities(&self, _query: &EntityQuery) -> Result<Vec<Entity>, Offline> {
      Err(Offline)
    }

    async fn count_entities(&self) -> Result<BTreeMap<EntityKind, usize>, Offline> {
      Err(Offline)
    }

    async fn commit(&self, _ops: Vec<WriteOp>) -> Result<usize, Offline> { Err(Offline) }

    async fn relationships_from(
      &self,
      _from_id: &str,
      _limit: Option<usize>,
    ) -> Result<Vec<Relationship>, Offline> {
      Err(Offline)
    }

    async fn relationships_to(
      &self,
      _to_id: &str,
      _kind: RelationshipKind,
      _limit: Option<usize>,
    ) -> Result<Vec<Relationship>, Offline> {
      Err(Offline)
    }

    async fn list_relationships(&self) -> Result<Vec<Relationship>, Offline> { Err(Offline) }

    async fn clear(&self) -> Result<(), Offline> { Err(Offline) }
  }

  #[tokio::test]
  async fn reads_degrade_to_empty_when_the_store_fails() {
    let config = GraphConfig::default();
    let query = GraphQuery::new(&OfflineStore, &config);

    assert!(query.related_notes("note-1-abcdef12", 10).await.is_empty());
    assert!(query.search("docker", &[], 10).await.is_empty());
    assert_eq!(query.overview().await, Overview::default());
  }
}
