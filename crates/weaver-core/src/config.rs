//! Engine tunables.
//!
//! Loaded from an optional TOML file layered under `WEAVER_*` environment
//! variables; every field has a default, so an empty source is valid.

use std::path::Path;

use serde::Deserialize;

use crate::Result;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
  /// Maximum characters of note content used as the note's display name.
  pub note_title_len:          usize,
  /// Maximum characters of any other entity's display name.
  pub entity_name_len:         usize,
  /// Entities examined per search before giving up.
  pub search_scan_cap:         usize,
  pub search_default_limit:    usize,
  /// Outgoing edges of the source note considered by related-notes.
  pub related_edge_scan:       usize,
  /// Incoming edges followed per shared entity by related-notes.
  pub related_fanout:          usize,
  pub related_default_limit:   usize,
  pub overview_top_n:          usize,
  /// Notes closer than this (milliseconds) are linked `TEMPORAL_NEAR`.
  pub temporal_window_ms:      i64,
  pub temporal_min_strength:   f64,
}

impl Default for GraphConfig {
  fn default() -> Self {
    Self {
      note_title_len:        50,
      entity_name_len:       100,
      search_scan_cap:       100,
      search_default_limit:  20,
      related_edge_scan:     20,
      related_fanout:        5,
      related_default_limit: 10,
      overview_top_n:        5,
      temporal_window_ms:    3_600_000,
      temporal_min_strength: 0.3,
    }
  }
}

impl GraphConfig {
  /// Read `path` (if it exists) and `WEAVER_*` overrides, e.g.
  /// `WEAVER_SEARCH_SCAN_CAP=500`.
  pub fn load(path: Option<&Path>) -> Result<Self> {
    let mut builder = config::Config::builder();
    if let Some(path) = path {
      builder = builder.add_source(config::File::from(path).required(false));
    }
    let settings = builder
      .add_source(config::Environment::with_prefix("WEAVER"))
      .build()?;
    Ok(settings.try_deserialize()?)
  }
}
