//! [`EntityStore`] — idempotent creation of typed entities.
//!
//! Context entities (url contexts, categories, concepts, domains) are
//! *ensured*: one atomic create-or-increment against the store. Notes are
//! always freshly minted and written unconditionally.

use chrono::{DateTime, Utc};

use crate::{
  Result,
  config::GraphConfig,
  entity::{
    CategoryData, ConceptData, DomainData, EntityKind, NewEntity, NoteData,
    UrlContextData,
  },
  identity::EntityKey,
  note::{ResolvedNote, WebpageMetadata},
  store::{EnsureEntity, EnsureOutcome, GraphStore, IntoCore},
};

/// The result of [`EntityStore::ensure`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ensured {
  pub id:      String,
  pub created: bool,
}

pub struct EntityStore<'a, S> {
  store:  &'a S,
  config: &'a GraphConfig,
}

impl<'a, S: GraphStore> EntityStore<'a, S> {
  pub fn new(store: &'a S, config: &'a GraphConfig) -> Self { Self { store, config } }

  /// Resolve `key`, build the initial entity with `build`, and submit a
  /// single create-or-increment. `build` runs on every call because the
  /// store decides existence atomically.
  pub async fn ensure<F>(&self, key: EntityKey<'_>, build: F) -> Result<Ensured>
  where
    F: FnOnce(String) -> NewEntity,
  {
    let id = key.resolve();
    let entity = build(id.clone());
    let outcome = self
      .store
      .ensure_entity(EnsureEntity::new(entity))
      .await
      .into_core()?;

    let created = outcome == EnsureOutcome::Created;
    tracing::debug!(entity_id = %id, created, "ensured entity");
    Ok(Ensured { id, created })
  }

  /// Unconditional write; only used for notes.
  pub async fn create(&self, entity: NewEntity) -> Result<String> {
    let stored = self.store.put_entity(entity).await.into_core()?;
    Ok(stored.id)
  }

  // ── Kind-specific ensures ─────────────────────────────────────────────

  pub async fn ensure_url_context(&self, page: &WebpageMetadata, url: &str) -> Result<Ensured> {
    self
      .ensure(EntityKey::UrlContext { url }, |id| {
        url_context_entity(id, page, url, 1, Utc::now(), self.config)
      })
      .await
  }

  pub async fn ensure_domain(&self, domain: &str) -> Result<Ensured> {
    self
      .ensure(EntityKey::Domain { domain }, |id| {
        domain_entity(id, domain, 1, Utc::now(), self.config)
      })
      .await
  }

  pub async fn ensure_category(&self, name: &str) -> Result<Ensured> {
    self
      .ensure(EntityKey::Category { name }, |id| {
        category_entity(id, name, None, 1, Utc::now(), self.config)
      })
      .await
  }

  pub async fn ensure_concept(&self, name: &str) -> Result<Ensured> {
    self
      .ensure(EntityKey::Concept { name }, |id| {
        concept_entity(id, name, 1, Utc::now(), self.config)
      })
      .await
  }
}

// ─── Builders ────────────────────────────────────────────────────────────────
//
// Shared by the live path and the bulk staging arena so both seed the same
// data shape and observation log.

pub fn note_entity(note: &ResolvedNote, config: &GraphConfig) -> NewEntity {
  let input = &note.input;
  let categories: Vec<String> = input.category_labels().map(str::to_owned).collect();
  let created = DateTime::from_timestamp_millis(note.timestamp)
    .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
    .unwrap_or_else(|| note.timestamp.to_string());

  let context = input.context.as_ref();
  let stat = |field: &str| context.and_then(|c| c.get(field)).and_then(|v| v.as_u64());

  let mut entity = NewEntity::new(&note.id, EntityKind::Note, &input.content, config.note_title_len)
    .with_data(NoteData {
      content:        input.content.clone(),
      timestamp:      note.timestamp,
      categories:     categories.clone(),
      word_count:     stat("wordCount"),
      content_length: Some(
        stat("contentLength").unwrap_or(input.content.chars().count() as u64),
      ),
      metadata:       (!input.metadata.is_empty())
        .then(|| serde_json::to_value(&input.metadata).ok())
        .flatten(),
      context:        input.context.clone(),
    })
    .observe(format!("Created on {created}"))
    .observe(format!(
      "Content length: {} characters",
      input.content.chars().count()
    ))
    .observe(if categories.is_empty() {
      "No categories assigned".to_owned()
    } else {
      format!("Categories: {}", categories.join(", "))
    });

  let page = &input.metadata;
  if !page.is_empty() {
    entity = entity
      .observe(format!(
        "Created from webpage: {}",
        if page.title.is_empty() { "Unknown" } else { &page.title }
      ))
      .observe(format!("Source domain: {}", page.domain().unwrap_or("Unknown")));
  }
  entity
}

pub fn url_context_entity(
  id: String,
  page: &WebpageMetadata,
  url: &str,
  note_count: u64,
  now: DateTime<Utc>,
  config: &GraphConfig,
) -> NewEntity {
  let domain = page.domain().unwrap_or_default();
  let name = if page.title.trim().is_empty() { url } else { page.title.as_str() };
  NewEntity::new(id, EntityKind::UrlContext, name, config.entity_name_len)
    .with_data(UrlContextData {
      url: url.to_owned(),
      domain: domain.to_owned(),
      title: page.title.clone(),
      summary: page.summary.clone(),
      note_count,
    })
    .observe(format!("First visited: {}", now.to_rfc3339()))
    .observe(format!("Domain: {domain}"))
    .observe(format!("Title: {}", page.title))
}

pub fn domain_entity(
  id: String,
  domain: &str,
  note_count: u64,
  now: DateTime<Utc>,
  config: &GraphConfig,
) -> NewEntity {
  NewEntity::new(id, EntityKind::Domain, domain, config.entity_name_len)
    .with_data(DomainData { domain: domain.to_owned(), note_count })
    .observe(format!("First encountered: {}", now.to_rfc3339()))
    .observe("Website domain")
}

pub fn category_entity(
  id: String,
  name: &str,
  definition: Option<&str>,
  note_count: u64,
  now: DateTime<Utc>,
  config: &GraphConfig,
) -> NewEntity {
  let mut entity = NewEntity::new(id, EntityKind::Category, name, config.entity_name_len)
    .with_data(CategoryData {
      description: format!("User-defined category: {name}"),
      definition:  definition.map(str::to_owned),
      note_count,
    })
    .observe(format!("Created: {}", now.to_rfc3339()));
  if let Some(definition) = definition {
    entity = entity.observe(format!("Definition: {definition}"));
  }
  entity
}

pub fn concept_entity(
  id: String,
  name: &str,
  frequency: u64,
  now: DateTime<Utc>,
  config: &GraphConfig,
) -> NewEntity {
  NewEntity::new(id, EntityKind::Concept, name, config.entity_name_len)
    .with_data(ConceptData { frequency })
    .observe(format!("First extracted: {}", now.to_rfc3339()))
}

#[cfg(test)]
mod tests {
  use serde_json::Value;

  use super::*;
  use crate::note::NoteInput;

  fn resolved(input: NoteInput) -> ResolvedNote {
    let timestamp = input.timestamp.unwrap_or(0);
    let id = EntityKey::Note { timestamp, content: &input.content }.resolve();
    ResolvedNote { id, timestamp, input }
  }

  #[test]
  fn note_entity_seeds_observations() {
    let note = resolved(
      NoteInput::new("Reading about Rust ownership")
        .at(1_700_000_000_000)
        .tagged(["Rust", " ", "Languages"]),
    );
    let e = note_entity(&note, &GraphConfig::default());

    assert_eq!(e.kind, EntityKind::Note);
    assert_eq!(e.id, note.id);
    assert_eq!(e.data.get("categories"), Some(&serde_json::json!(["Rust", "Languages"])));
    assert!(e.observations[0].starts_with("Created on 2023-11-14"));
    assert_eq!(e.observations[1], "Content length: 28 characters");
    assert_eq!(e.observations[2], "Categories: Rust, Languages");
    assert_eq!(e.observations.len(), 3);
  }

  #[test]
  fn note_with_page_notes_its_source() {
    let note = resolved(NoteInput::new("x").at(1).from_page(WebpageMetadata {
      title: "Docs".into(),
      url: "https://docs.rs".into(),
      domain: "docs.rs".into(),
      summary: String::new(),
    }));
    let e = note_entity(&note, &GraphConfig::default());
    assert!(e.observations.contains(&"Created from webpage: Docs".to_owned()));
    assert!(e.observations.contains(&"Source domain: docs.rs".to_owned()));
    assert_eq!(e.observations[2], "No categories assigned");
  }

  #[test]
  fn context_builders_use_resolved_ids_and_counters() {
    let cfg = GraphConfig::default();
    let now = Utc::now();

    let c = category_entity(
      EntityKey::Category { name: "Machine Learning" }.resolve(),
      "Machine Learning",
      Some("ML topics"),
      0,
      now,
      &cfg,
    );
    assert_eq!(c.id, "category-machine-learning");
    assert_eq!(c.data.get("note_count"), Some(&Value::from(0u64)));
    assert_eq!(c.data.get("definition"), Some(&Value::from("ML topics")));

    let k = concept_entity(EntityKey::Concept { name: "docker" }.resolve(), "docker", 1, now, &cfg);
    assert_eq!(k.id, "concept-docker");
    assert_eq!(k.counter(), 1);

    let page = WebpageMetadata { url: "https://a.example/x".into(), ..Default::default() };
    let url = "https://a.example/x";
    let u = url_context_entity(EntityKey::UrlContext { url }.resolve(), &page, url, 1, now, &cfg);
    assert_eq!(u.name, "https://a.example/x");
    assert!(u.id.starts_with("url-"));
  }
}
