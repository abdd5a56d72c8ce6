//! Bulk import.
//!
//! A batch is staged in memory first: a [`StagingArena`] maps entity ids to
//! staged entities and keeps an ordered edge list. Nothing touches the store
//! until [`StagingArena::into_ops`] hands the staged writes over to be
//! flushed in store-sized batches.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
  concept::ConceptExtractor,
  config::GraphConfig,
  entities::{category_entity, concept_entity, domain_entity, note_entity, url_context_entity},
  entity::{EntityKind, NewEntity},
  identity::EntityKey,
  note::{NoteInput, ResolvedNote},
  relationship::{NewRelationship, RelationshipKind},
  store::{EnsureEntity, WriteOp},
  temporal::{TemporalLinker, TimedNote},
};

// ─── Input / output ──────────────────────────────────────────────────────────

/// A category label with its human-written definition.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CategoryDefinition {
  pub category:   String,
  #[serde(default)]
  pub definition: String,
}

/// Notes and category definitions to import, already categorized.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportBatch {
  #[serde(default)]
  pub notes:      Vec<NoteInput>,
  #[serde(default)]
  pub categories: Vec<CategoryDefinition>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportOptions {
  /// Wipe both collections before writing (a full reload).
  pub clear_existing: bool,
}

/// A note left out of the import and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedNote {
  /// Position in [`ImportBatch::notes`].
  pub index:  usize,
  pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportReport {
  pub total_notes:           usize,
  pub imported_notes:        usize,
  pub imported_categories:   usize,
  pub skipped:               Vec<SkippedNote>,
  /// Distinct entities the batch wrote or ensured. Context entities that
  /// already existed in the graph are included; the store bumped them
  /// instead of creating them.
  pub entities_staged:       usize,
  /// Distinct edges the batch upserted, existing ones included.
  pub relationships_staged:  usize,
  pub entity_counts:         BTreeMap<EntityKind, usize>,
  pub relationship_counts:   BTreeMap<RelationshipKind, usize>,
}

// ─── Arena ───────────────────────────────────────────────────────────────────

#[derive(Debug)]
struct Staged {
  entity:     NewEntity,
  /// Notes referencing this entity within the batch.
  references: u64,
  /// Fields to overwrite if the entity already exists in the store.
  merge:      Map<String, Value>,
}

pub struct StagingArena<'a> {
  config:        &'a GraphConfig,
  concepts:      &'a ConceptExtractor,
  now:           DateTime<Utc>,
  entities:      Vec<Staged>,
  index:         HashMap<String, usize>,
  relationships: Vec<NewRelationship>,
  notes:         Vec<(String, i64)>,
}

impl<'a> StagingArena<'a> {
  pub fn new(config: &'a GraphConfig, concepts: &'a ConceptExtractor) -> Self {
    Self {
      config,
      concepts,
      now: Utc::now(),
      entities: Vec::new(),
      index: HashMap::new(),
      relationships: Vec::new(),
      notes: Vec::new(),
    }
  }

  pub fn entity_count(&self) -> usize { self.entities.len() }

  pub fn relationship_count(&self) -> usize { self.relationships.len() }

  /// Stage an entity under `key` if absent; returns its id.
  fn stage<F>(&mut self, key: EntityKey<'_>, build: F) -> String
  where
    F: FnOnce(String) -> NewEntity,
  {
    let id = key.resolve();
    if !self.index.contains_key(&id) {
      self.index.insert(id.clone(), self.entities.len());
      self.entities.push(Staged { entity: build(id.clone()), references: 0, merge: Map::new() });
    }
    id
  }

  fn reference(&mut self, id: &str) {
    if let Some(&i) = self.index.get(id) {
      self.entities[i].references += 1;
    }
  }

  /// Stage a category definition. Returns `false` if the label is blank or
  /// was already staged.
  ///
  /// A category already in the store keeps its counter and takes the new
  /// definition.
  pub fn stage_category(&mut self, def: &CategoryDefinition) -> bool {
    let name = def.category.trim();
    if name.is_empty() {
      return false;
    }
    let id = EntityKey::Category { name }.resolve();
    if self.index.contains_key(&id) {
      return false;
    }
    let definition = Some(def.definition.trim()).filter(|d| !d.is_empty());
    let (now, config) = (self.now, self.config);
    self.stage(EntityKey::Category { name }, |id| {
      category_entity(id, name, definition, 0, now, config)
    });
    if let Some(definition) = definition
      && let Some(&i) = self.index.get(&id)
    {
      self.entities[i].merge.insert("definition".to_owned(), Value::from(definition));
    }
    true
  }

  /// Stage one note, its context entities and its edges.
  pub fn stage_note(&mut self, input: NoteInput) -> Result<String, String> {
    if input.content.trim().is_empty() {
      return Err("missing content".to_owned());
    }
    let timestamp = input.timestamp.unwrap_or_else(|| self.now.timestamp_millis());
    let id = EntityKey::Note { timestamp, content: &input.content }.resolve();
    if self.index.contains_key(&id) {
      return Err(format!("duplicate of {id}"));
    }

    let note = ResolvedNote { id: id.clone(), timestamp, input };
    let entity = note_entity(&note, self.config);
    self.index.insert(id.clone(), self.entities.len());
    self.entities.push(Staged { entity, references: 0, merge: Map::new() });
    self.notes.push((id.clone(), timestamp));

    let (now, config) = (self.now, self.config);
    let input = &note.input;
    let page = &input.metadata;

    if let Some(url) = page.url() {
      let url_id = self.stage(EntityKey::UrlContext { url }, |id| {
        url_context_entity(id, page, url, 0, now, config)
      });
      self.reference(&url_id);
      self.relationships.push(
        NewRelationship::new(&id, RelationshipKind::CreatedFrom, &url_id, 1.0)
          .with_meta("url", url),
      );

      if let Some(domain) = page.domain() {
        let domain_id = self.stage(EntityKey::Domain { domain }, |id| {
          domain_entity(id, domain, 0, now, config)
        });
        self.reference(&domain_id);
        self.relationships.push(NewRelationship::new(
          &url_id,
          RelationshipKind::BelongsTo,
          &domain_id,
          1.0,
        ));
        self.relationships.push(NewRelationship::new(
          &id,
          RelationshipKind::FromDomain,
          &domain_id,
          0.8,
        ));
      }
    }

    for label in input.category_labels() {
      let category_id = self.stage(EntityKey::Category { name: label }, |id| {
        category_entity(id, label, None, 0, now, config)
      });
      self.reference(&category_id);
      self.relationships.push(
        NewRelationship::new(&id, RelationshipKind::TaggedAs, &category_id, 1.0)
          .with_meta("user_assigned", true),
      );
    }

    for concept in self.concepts.extract(&input.content) {
      let label = concept.label.as_str();
      let concept_id = self.stage(EntityKey::Concept { name: label }, |id| {
        concept_entity(id, label, 0, now, config)
      });
      self.reference(&concept_id);
      self.relationships.push(
        NewRelationship::new(&id, RelationshipKind::Contains, &concept_id, concept.confidence)
          .with_meta("ai_extracted", true),
      );
    }

    Ok(id)
  }

  /// Link every staged note to its temporal neighbours.
  pub fn link_temporal(&mut self, linker: &TemporalLinker) -> usize {
    let timed: Vec<TimedNote<'_>> = self
      .notes
      .iter()
      .map(|(id, timestamp)| TimedNote { id, timestamp: *timestamp })
      .collect();
    let edges = linker.link(&timed);
    let added = edges.len();
    self.relationships.extend(edges);
    added
  }

  /// Entity and relationship tallies by kind, as staged.
  pub fn summary(&self) -> (BTreeMap<EntityKind, usize>, BTreeMap<RelationshipKind, usize>) {
    let mut entities = BTreeMap::new();
    for staged in &self.entities {
      *entities.entry(staged.entity.kind).or_insert(0) += 1;
    }
    let mut relationships = BTreeMap::new();
    for edge in &self.relationships {
      *relationships.entry(edge.kind).or_insert(0) += 1;
    }
    (entities, relationships)
  }

  /// The staged writes: entities first, then edges in staging order.
  ///
  /// Notes are written outright. Context entities become ensures that add
  /// their in-batch reference count to whatever the store already holds.
  pub fn into_ops(self) -> Vec<WriteOp> {
    let mut ops = Vec::with_capacity(self.entities.len() + self.relationships.len());
    for Staged { mut entity, references, merge } in self.entities {
      if entity.kind == EntityKind::Note {
        ops.push(WriteOp::PutEntity(entity));
        continue;
      }
      let observation = (references > 0).then(|| format!("Applied to {references} notes"));
      entity.set_counter(references);
      if let Some(obs) = &observation {
        entity.observations.push(obs.clone());
      }
      ops.push(WriteOp::EnsureEntity(EnsureEntity {
        entity,
        increment: references,
        observation,
        merge,
      }));
    }
    ops.extend(self.relationships.into_iter().map(WriteOp::PutRelationship));
    ops
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::note::WebpageMetadata;

  fn page(url: &str, domain: &str) -> WebpageMetadata {
    WebpageMetadata {
      title:   "Page".into(),
      url:     url.into(),
      domain:  domain.into(),
      summary: String::new(),
    }
  }

  #[test]
  fn shared_context_is_staged_once_and_counted() {
    let config = GraphConfig::default();
    let concepts = ConceptExtractor::builtin();
    let mut arena = StagingArena::new(&config, &concepts);

    arena
      .stage_note(NoteInput::new("first").at(1).tagged(["Rust"]).from_page(page("https://a.dev/1", "a.dev")))
      .unwrap();
    arena
      .stage_note(NoteInput::new("second").at(2).tagged(["rust"]).from_page(page("https://a.dev/2", "a.dev")))
      .unwrap();

    let (entities, relationships) = arena.summary();
    assert_eq!(entities[&EntityKind::Note], 2);
    assert_eq!(entities[&EntityKind::Category], 1);
    assert_eq!(entities[&EntityKind::UrlContext], 2);
    assert_eq!(entities[&EntityKind::Domain], 1);
    assert_eq!(relationships[&RelationshipKind::BelongsTo], 2);
    assert_eq!(relationships[&RelationshipKind::FromDomain], 2);

    let ops = arena.into_ops();
    let category = ops
      .iter()
      .find_map(|op| match op {
        WriteOp::EnsureEntity(e) if e.entity.id == "category-rust" => Some(e),
        _ => None,
      })
      .unwrap();
    assert_eq!(category.increment, 2);
    assert_eq!(category.entity.counter(), 2);
    assert_eq!(category.observation.as_deref(), Some("Applied to 2 notes"));
  }

  #[test]
  fn blank_and_duplicate_notes_are_rejected() {
    let config = GraphConfig::default();
    let concepts = ConceptExtractor::builtin();
    let mut arena = StagingArena::new(&config, &concepts);

    assert!(arena.stage_note(NoteInput::new("   ").at(1)).is_err());
    arena.stage_note(NoteInput::new("same").at(5)).unwrap();
    let err = arena.stage_note(NoteInput::new("same").at(5)).unwrap_err();
    assert!(err.starts_with("duplicate of note-5-"));
    assert_eq!(arena.entity_count(), 1);
  }

  #[test]
  fn entities_precede_edges_in_ops() {
    let config = GraphConfig::default();
    let concepts = ConceptExtractor::builtin();
    let mut arena = StagingArena::new(&config, &concepts);
    arena.stage_note(NoteInput::new("python code").at(1)).unwrap();
    arena.stage_note(NoteInput::new("more python").at(2)).unwrap();
    assert_eq!(arena.link_temporal(&TemporalLinker::new(3_600_000, 0.3)), 1);

    let ops = arena.into_ops();
    let first_edge = ops
      .iter()
      .position(|op| matches!(op, WriteOp::PutRelationship(_)))
      .unwrap();
    assert!(ops[first_edge..].iter().all(|op| matches!(op, WriteOp::PutRelationship(_))));
  }

  #[test]
  fn definitions_stage_with_zero_count() {
    let config = GraphConfig::default();
    let concepts = ConceptExtractor::builtin();
    let mut arena = StagingArena::new(&config, &concepts);
    let def = CategoryDefinition { category: "Ideas".into(), definition: "Loose thoughts".into() };
    assert!(arena.stage_category(&def));
    assert!(!arena.stage_category(&def));

    let ops = arena.into_ops();
    let WriteOp::EnsureEntity(ensure) = &ops[0] else { panic!("expected ensure") };
    assert_eq!(ensure.increment, 0);
    assert_eq!(ensure.observation, None);
    assert_eq!(ensure.entity.data.get("definition"), Some(&serde_json::Value::from("Loose thoughts")));
    assert_eq!(ensure.merge.get("definition"), Some(&serde_json::Value::from("Loose thoughts")));
  }

  #[test]
  fn blank_definition_merges_nothing() {
    let config = GraphConfig::default();
    let concepts = ConceptExtractor::builtin();
    let mut arena = StagingArena::new(&config, &concepts);
    arena.stage_category(&CategoryDefinition { category: "Ideas".into(), definition: "  ".into() });

    let ops = arena.into_ops();
    let WriteOp::EnsureEntity(ensure) = &ops[0] else { panic!("expected ensure") };
    assert!(ensure.merge.is_empty());
  }

  #[test]
  fn repeated_labels_count_a_note_once() {
    let config = GraphConfig::default();
    let concepts = ConceptExtractor::builtin();
    let mut arena = StagingArena::new(&config, &concepts);
    arena.stage_note(NoteInput::new("docker notes").at(1).tagged(["Rust", "rust", "Rust"])).unwrap();

    let (_, relationships) = arena.summary();
    assert_eq!(relationships[&RelationshipKind::TaggedAs], 1);
    assert_eq!(relationships[&RelationshipKind::Contains], 1);

    let ops = arena.into_ops();
    let category = ops
      .iter()
      .find_map(|op| match op {
        WriteOp::EnsureEntity(e) if e.entity.id == "category-rust" => Some(e),
        _ => None,
      })
      .unwrap();
    assert_eq!(category.increment, 1);
    assert_eq!(category.observation.as_deref(), Some("Applied to 1 notes"));
  }
}
