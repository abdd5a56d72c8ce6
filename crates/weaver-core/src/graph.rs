//! [`KnowledgeGraph`] — the engine's entry point.
//!
//! Wraps a shared [`GraphStore`] with the tunables and concept rules, and
//! exposes ingestion, bulk import, snapshots and the discovery queries.

use std::sync::Arc;

use chrono::Utc;

use crate::{
  Error, Result,
  concept::ConceptExtractor,
  config::GraphConfig,
  entities::{EntityStore, note_entity},
  entity::{Entity, EntityKind},
  export::GraphSnapshot,
  identity::EntityKey,
  import::{ImportBatch, ImportOptions, ImportReport, SkippedNote, StagingArena},
  note::{NoteInput, ResolvedNote},
  query::{GraphQuery, Overview, RelatedNote},
  store::{GraphStore, IntoCore, commit_chunked},
  synthesize::RelationshipSynthesizer,
  temporal::TemporalLinker,
};

pub struct KnowledgeGraph<S> {
  store:    Arc<S>,
  config:   GraphConfig,
  concepts: ConceptExtractor,
}

impl<S> Clone for KnowledgeGraph<S> {
  fn clone(&self) -> Self {
    Self {
      store:    Arc::clone(&self.store),
      config:   self.config.clone(),
      concepts: self.concepts.clone(),
    }
  }
}

impl<S: GraphStore> KnowledgeGraph<S> {
  pub fn new(store: Arc<S>) -> Self {
    Self {
      store,
      config: GraphConfig::default(),
      concepts: ConceptExtractor::builtin(),
    }
  }

  pub fn with_config(mut self, config: GraphConfig) -> Self {
    self.config = config;
    self
  }

  pub fn with_concepts(mut self, concepts: ConceptExtractor) -> Self {
    self.concepts = concepts;
    self
  }

  pub fn store(&self) -> &S { &self.store }

  pub fn config(&self) -> &GraphConfig { &self.config }

  fn query(&self) -> GraphQuery<'_, S> { GraphQuery::new(self.store.as_ref(), &self.config) }

  // ─── Ingestion ────────────────────────────────────────────────────────────

  /// Store a categorized note and link it into the graph. Returns the note id.
  ///
  /// The note is written before any context entity; if linking fails the
  /// note stays stored and the error is returned.
  pub async fn ingest_note(&self, input: NoteInput) -> Result<String> {
    if input.content.trim().is_empty() {
      return Err(Error::Validation("content must not be empty".to_owned()));
    }
    let timestamp = input.timestamp.unwrap_or_else(|| Utc::now().timestamp_millis());
    let id = EntityKey::Note { timestamp, content: &input.content }.resolve();
    let note = ResolvedNote { id, timestamp, input };

    let entities = EntityStore::new(self.store.as_ref(), &self.config);
    entities.create(note_entity(&note, &self.config)).await?;
    tracing::info!(note_id = %note.id, "stored note");

    RelationshipSynthesizer::new(self.store.as_ref(), &self.config, &self.concepts)
      .link_note(&note)
      .await?;
    Ok(note.id)
  }

  /// Stage a whole batch in memory, then flush it in store-sized batches.
  ///
  /// Blank and duplicate notes are skipped and listed in the report; they
  /// never abort the batch. A store failure during the flush does.
  pub async fn import(&self, batch: ImportBatch, options: ImportOptions) -> Result<ImportReport> {
    let mut arena = StagingArena::new(&self.config, &self.concepts);
    let mut report = ImportReport { total_notes: batch.notes.len(), ..ImportReport::default() };

    for def in &batch.categories {
      if arena.stage_category(def) {
        report.imported_categories += 1;
      }
    }
    for (index, note) in batch.notes.into_iter().enumerate() {
      match arena.stage_note(note) {
        Ok(_) => report.imported_notes += 1,
        Err(reason) => {
          tracing::warn!(index, %reason, "skipping note");
          report.skipped.push(SkippedNote { index, reason });
        }
      }
    }
    arena.link_temporal(&TemporalLinker::new(
      self.config.temporal_window_ms,
      self.config.temporal_min_strength,
    ));

    (report.entity_counts, report.relationship_counts) = arena.summary();
    report.entities_staged = arena.entity_count();
    report.relationships_staged = arena.relationship_count();

    if options.clear_existing {
      self.store.clear().await.into_core()?;
      tracing::info!("cleared existing graph");
    }
    commit_chunked(self.store.as_ref(), arena.into_ops()).await?;

    tracing::info!(
      notes = report.imported_notes,
      skipped = report.skipped.len(),
      entities = report.entities_staged,
      relationships = report.relationships_staged,
      "import complete"
    );
    Ok(report)
  }

  // ─── Snapshots ────────────────────────────────────────────────────────────

  pub async fn export(&self) -> Result<GraphSnapshot> {
    let entities = self.store.list_entities(&Default::default()).await.into_core()?;
    let relationships = self.store.list_relationships().await.into_core()?;
    Ok(GraphSnapshot::new(entities, relationships))
  }

  /// Write every entity and edge of `snapshot`, overwriting by id.
  pub async fn restore(&self, snapshot: GraphSnapshot, options: ImportOptions) -> Result<usize> {
    if options.clear_existing {
      self.store.clear().await.into_core()?;
    }
    let written = commit_chunked(self.store.as_ref(), snapshot.into_ops()).await?;
    tracing::info!(written, "restored snapshot");
    Ok(written)
  }

  // ─── Discovery ────────────────────────────────────────────────────────────

  pub async fn get_entity(&self, id: &str) -> Result<Entity> {
    self
      .store
      .get_entity(id)
      .await
      .into_core()?
      .ok_or_else(|| Error::NotFound(id.to_owned()))
  }

  /// See [`GraphQuery::related_notes`]; `None` uses the configured default.
  pub async fn related_notes(&self, note_id: &str, limit: Option<usize>) -> Vec<RelatedNote> {
    let limit = limit.unwrap_or(self.config.related_default_limit);
    self.query().related_notes(note_id, limit).await
  }

  /// See [`GraphQuery::search`]; `None` uses the configured default.
  pub async fn search(
    &self,
    query: &str,
    kinds: &[EntityKind],
    limit: Option<usize>,
  ) -> Vec<Entity> {
    let limit = limit.unwrap_or(self.config.search_default_limit);
    self.query().search(query, kinds, limit).await
  }

  pub async fn overview(&self) -> Overview { self.query().overview().await }
}
