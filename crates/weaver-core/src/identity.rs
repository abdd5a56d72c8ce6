//! Deterministic entity ids derived from `(kind, natural key)`.
//!
//! Resolution is pure: the same key always yields the same id, across calls
//! and across processes. The only exception is [`EntityKey::Other`], the
//! escape hatch for kinds the graph does not model, which mints a random
//! suffix on every call.

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::entity::EntityKind;

/// Hex characters of the URL digest kept in `url_context` ids.
const URL_HASH_CHARS: usize = 12;
/// Hex characters of the content digest appended to note ids.
const NOTE_HASH_CHARS: usize = 8;

/// The natural key of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKey<'a> {
  /// Notes are keyed by capture time; the content digest keeps two notes
  /// captured in the same millisecond apart.
  Note { timestamp: i64, content: &'a str },
  UrlContext { url: &'a str },
  Category { name: &'a str },
  Concept { name: &'a str },
  Domain { domain: &'a str },
  /// An unmodelled kind. Not idempotent.
  Other { kind: &'a str },
}

impl EntityKey<'_> {
  /// The modelled kind for this key, if any.
  pub fn kind(&self) -> Option<EntityKind> {
    match self {
      Self::Note { .. } => Some(EntityKind::Note),
      Self::UrlContext { .. } => Some(EntityKind::UrlContext),
      Self::Category { .. } => Some(EntityKind::Category),
      Self::Concept { .. } => Some(EntityKind::Concept),
      Self::Domain { .. } => Some(EntityKind::Domain),
      Self::Other { .. } => None,
    }
  }

  pub fn resolve(&self) -> String {
    match self {
      Self::Note { timestamp, content } => {
        format!("note-{timestamp}-{}", digest(content, NOTE_HASH_CHARS))
      }
      Self::UrlContext { url } => format!("url-{}", digest(url, URL_HASH_CHARS)),
      Self::Category { name } => format!("category-{}", slug(name)),
      Self::Concept { name } => format!("concept-{}", slug(name)),
      Self::Domain { domain } => format!("domain-{}", domain.to_lowercase()),
      Self::Other { kind } => {
        let suffix = Uuid::new_v4().simple().to_string();
        format!("{kind}-{}", &suffix[..8])
      }
    }
  }
}

fn slug(name: &str) -> String { name.to_lowercase().replace(' ', "-") }

fn digest(input: &str, chars: usize) -> String {
  let hash = Sha256::digest(input.as_bytes());
  let mut hex = hex::encode(hash);
  hex.truncate(chars);
  hex
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn resolution_is_stable() {
    let keys = [
      EntityKey::Note { timestamp: 1_700_000_000_000, content: "hello" },
      EntityKey::UrlContext { url: "https://example.com/a" },
      EntityKey::Category { name: "Machine Learning" },
      EntityKey::Concept { name: "docker" },
      EntityKey::Domain { domain: "Example.COM" },
    ];
    for key in keys {
      assert_eq!(key.resolve(), key.resolve());
    }
  }

  #[test]
  fn category_and_concept_are_slugged() {
    assert_eq!(
      EntityKey::Category { name: "Machine Learning" }.resolve(),
      "category-machine-learning"
    );
    assert_eq!(EntityKey::Concept { name: "API" }.resolve(), "concept-api");
  }

  #[test]
  fn domain_is_lowercased() {
    assert_eq!(
      EntityKey::Domain { domain: "GitHub.com" }.resolve(),
      "domain-github.com"
    );
  }

  #[test]
  fn url_ids_are_fixed_width() {
    let a = EntityKey::UrlContext { url: "https://a.example" }.resolve();
    let b = EntityKey::UrlContext { url: "https://b.example" }.resolve();
    assert_eq!(a.len(), "url-".len() + URL_HASH_CHARS);
    assert!(a.starts_with("url-"));
    assert_ne!(a, b);
  }

  #[test]
  fn notes_sharing_a_timestamp_do_not_collide() {
    let a = EntityKey::Note { timestamp: 42, content: "first" }.resolve();
    let b = EntityKey::Note { timestamp: 42, content: "second" }.resolve();
    assert!(a.starts_with("note-42-"));
    assert_ne!(a, b);
  }

  #[test]
  fn other_kinds_are_not_idempotent() {
    let key = EntityKey::Other { kind: "person" };
    let a = key.resolve();
    let b = key.resolve();
    assert!(a.starts_with("person-"));
    assert_eq!(a.len(), "person-".len() + 8);
    assert_ne!(a, b);
    assert_eq!(key.kind(), None);
  }
}
