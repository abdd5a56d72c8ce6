//! [`TemporalLinker`] — links notes captured close together in time.

use crate::relationship::{NewRelationship, RelationshipKind};

/// A note reduced to what temporal linking needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimedNote<'a> {
  pub id:        &'a str,
  pub timestamp: i64,
}

#[derive(Debug, Clone, Copy)]
pub struct TemporalLinker {
  window_ms:    i64,
  min_strength: f64,
}

impl TemporalLinker {
  pub fn new(window_ms: i64, min_strength: f64) -> Self {
    Self { window_ms: window_ms.max(1), min_strength }
  }

  /// Edge strength for two notes `delta_ms` apart, or `None` outside the
  /// window. Closer notes link more strongly, never below the floor.
  pub fn strength(&self, delta_ms: i64) -> Option<f64> {
    (delta_ms < self.window_ms)
      .then(|| (1.0 - delta_ms as f64 / self.window_ms as f64).max(self.min_strength))
  }

  /// `TEMPORAL_NEAR` edges from each note to every later note inside the
  /// window. Edges point forward in time.
  pub fn link(&self, notes: &[TimedNote<'_>]) -> Vec<NewRelationship> {
    let mut sorted = notes.to_vec();
    sorted.sort_by_key(|n| n.timestamp);

    let mut edges = Vec::new();
    for (i, earlier) in sorted.iter().enumerate() {
      for later in &sorted[i + 1..] {
        let delta = later.timestamp.saturating_sub(earlier.timestamp);
        // Sorted input: every later note is at least this far away.
        let Some(strength) = self.strength(delta) else { break };
        edges.push(
          NewRelationship::new(earlier.id, RelationshipKind::TemporalNear, later.id, strength)
            .with_meta("time_diff_ms", delta),
        );
      }
    }
    edges
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const HOUR_MS: i64 = 3_600_000;

  fn linker() -> TemporalLinker { TemporalLinker::new(HOUR_MS, 0.3) }

  #[test]
  fn ten_minutes_apart_links_at_five_sixths() {
    let edges = linker().link(&[
      TimedNote { id: "note-b", timestamp: 600_000 },
      TimedNote { id: "note-a", timestamp: 0 },
    ]);
    assert_eq!(edges.len(), 1);
    let edge = &edges[0];
    assert_eq!(edge.from_id, "note-a");
    assert_eq!(edge.to_id, "note-b");
    assert!((edge.strength - (1.0 - 600_000.0 / 3_600_000.0)).abs() < 1e-9);
    assert_eq!(edge.metadata.get("time_diff_ms"), Some(&serde_json::Value::from(600_000i64)));
  }

  #[test]
  fn two_hours_apart_is_not_linked() {
    let edges = linker().link(&[
      TimedNote { id: "a", timestamp: 0 },
      TimedNote { id: "b", timestamp: 2 * HOUR_MS },
    ]);
    assert!(edges.is_empty());
  }

  #[test]
  fn strength_has_a_floor() {
    let s = linker().strength(HOUR_MS - 1).unwrap();
    assert_eq!(s, 0.3);
    assert_eq!(linker().strength(HOUR_MS), None);
  }

  #[test]
  fn extreme_timestamps_are_not_linked() {
    let edges = linker().link(&[
      TimedNote { id: "first", timestamp: i64::MIN },
      TimedNote { id: "last", timestamp: i64::MAX },
      TimedNote { id: "epoch", timestamp: 0 },
    ]);
    assert!(edges.is_empty());
  }

  #[test]
  fn scan_stops_at_window_edge_per_note() {
    let edges = linker().link(&[
      TimedNote { id: "a", timestamp: 0 },
      TimedNote { id: "b", timestamp: 30 * 60_000 },
      TimedNote { id: "c", timestamp: 80 * 60_000 },
    ]);
    let pairs: Vec<(&str, &str)> =
      edges.iter().map(|e| (e.from_id.as_str(), e.to_id.as_str())).collect();
    assert_eq!(pairs, vec![("a", "b"), ("b", "c")]);
  }
}
