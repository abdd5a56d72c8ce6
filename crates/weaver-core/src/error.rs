//! Error types for `weaver-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("entity not found: {0}")]
  NotFound(String),

  /// A write would have produced a second entity for an existing key.
  /// Upsert semantics absorb this; it is only raised by strict backends.
  #[error("conflicting write for {0}")]
  Conflict(String),

  #[error("store unavailable: {0}")]
  StoreUnavailable(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("invalid note: {0}")]
  Validation(String),

  #[error("batch of {len} writes exceeds the store ceiling of {max}")]
  BatchOverflow { len: usize, max: usize },

  #[error("configuration error: {0}")]
  Config(#[from] config::ConfigError),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

impl Error {
  /// Wrap a backend error as [`Error::StoreUnavailable`].
  pub fn store<E>(err: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::StoreUnavailable(Box::new(err))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
