//! [`RelationshipSynthesizer`] — resolves a note's context into entities and
//! computes the edges that connect them.
//!
//! Order is fixed: url context (and its domain), then user categories, then
//! extracted concepts. Order decides which entity is created first, never
//! which edges exist.

use crate::{
  Result,
  concept::ConceptExtractor,
  config::GraphConfig,
  entities::EntityStore,
  note::ResolvedNote,
  relationship::{NewRelationship, RelationshipKind},
  store::{GraphStore, WriteOp, commit_chunked},
};

pub struct RelationshipSynthesizer<'a, S> {
  store:    &'a S,
  entities: EntityStore<'a, S>,
  concepts: &'a ConceptExtractor,
}

impl<'a, S: GraphStore> RelationshipSynthesizer<'a, S> {
  pub fn new(store: &'a S, config: &'a GraphConfig, concepts: &'a ConceptExtractor) -> Self {
    Self { store, entities: EntityStore::new(store, config), concepts }
  }

  /// Ensure every context entity of `note` and return its edges, unwritten.
  pub async fn synthesize(&self, note: &ResolvedNote) -> Result<Vec<NewRelationship>> {
    let mut edges = Vec::new();
    let input = &note.input;
    let page = &input.metadata;

    // 1. Webpage context.
    if let Some(url) = page.url() {
      let url_context = self.entities.ensure_url_context(page, url).await?;
      edges.push(
        NewRelationship::new(&note.id, RelationshipKind::CreatedFrom, &url_context.id, 1.0)
          .with_meta("url", url),
      );

      if url_context.created
        && let Some(domain) = page.domain()
      {
        let domain = self.entities.ensure_domain(domain).await?;
        edges.push(NewRelationship::new(
          &note.id,
          RelationshipKind::FromDomain,
          &domain.id,
          0.8,
        ));
      }
    }

    // 2. User-assigned categories.
    for label in input.category_labels() {
      let category = self.entities.ensure_category(label).await?;
      edges.push(
        NewRelationship::new(&note.id, RelationshipKind::TaggedAs, &category.id, 1.0)
          .with_meta("user_assigned", true),
      );
    }

    // 3. Extracted concepts.
    for concept in self.concepts.extract(&input.content) {
      let entity = self.entities.ensure_concept(&concept.label).await?;
      edges.push(
        NewRelationship::new(&note.id, RelationshipKind::Contains, &entity.id, concept.confidence)
          .with_meta("ai_extracted", true),
      );
    }

    Ok(edges)
  }

  /// Write `edges` in store-sized atomic batches.
  pub async fn write(&self, edges: Vec<NewRelationship>) -> Result<usize> {
    let ops = edges.into_iter().map(WriteOp::PutRelationship).collect();
    commit_chunked(self.store, ops).await
  }

  /// [`synthesize`](Self::synthesize) then [`write`](Self::write).
  pub async fn link_note(&self, note: &ResolvedNote) -> Result<Vec<NewRelationship>> {
    let edges = self.synthesize(note).await?;
    self.write(edges.clone()).await?;
    tracing::info!(note_id = %note.id, edges = edges.len(), "linked note");
    Ok(edges)
  }
}
