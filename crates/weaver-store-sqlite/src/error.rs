//! Error type for `weaver-store-sqlite`.

use thiserror::Error;
use weaver_core::entity::EntityKind;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] weaver_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// An ensure targeted an id already held by an entity of another kind.
  #[error("entity {id} is a {existing}, not a {requested}")]
  KindMismatch {
    id:        String,
    existing:  String,
    requested: EntityKind,
  },

  #[error("batch of {len} writes exceeds the ceiling of {max}")]
  BatchOverflow { len: usize, max: usize },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl From<Error> for weaver_core::Error {
  fn from(err: Error) -> Self {
    match err {
      Error::Core(e) => e,
      Error::KindMismatch { id, .. } => weaver_core::Error::Conflict(id),
      Error::BatchOverflow { len, max } => weaver_core::Error::BatchOverflow { len, max },
      other => weaver_core::Error::store(other),
    }
  }
}
