/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Bounded undo/redo history over graph snapshots.
//!
//! The log is a single linear list, newest first (index 0 = most recent).
//! There is no redo tree: recording a new entry while the cursor sits on an
//! older one discards everything newer than the cursor (branch truncation).
//! Drag-move updates collapse into the current slot instead of creating new
//! entries, so undo granularity stays at the level of deliberate edits.
//!
//! The engine is pure in-memory state; persistence and rendering live in
//! `store` and `adapter`.

use log::error;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::graph::GraphSnapshot;

/// Upper bound on entries shown in the history panel. Entries recorded with
/// `Visibility::Hidden` do not count toward the bound and are never evicted
/// by it; they disappear only through branch truncation or delete-after.
pub const MAX_VISIBLE_HISTORY: usize = 5;

fn default_show() -> bool {
    true
}

/// One recorded state of the graph, owned exclusively by the log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub timestamp: String,
    /// Human-readable description of the edit that produced this state.
    pub action: String,
    pub data: GraphSnapshot,
    #[serde(rename = "showInHistoryPanel", default = "default_show")]
    pub show_in_panel: bool,
    #[serde(rename = "isCurrent", default)]
    pub is_current: bool,
}

/// How a recorded entry participates in the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    /// Normal entry, listed in the history panel, counts toward the bound.
    Panel,
    /// Normal entry that the panel does not list and the bound ignores.
    Hidden,
    /// Overwrite the current slot in place instead of creating an entry.
    /// Used for drag-position updates, which would otherwise record one
    /// undo step per pixel.
    PositionOnly,
}

#[derive(Debug, PartialEq, Eq)]
pub enum HistoryError {
    /// Index outside the log.
    OutOfRange(usize),
    /// The target snapshot had no valid nodes and no valid edges after
    /// filtering; restoring it would wipe the live graph.
    EmptyRollbackTarget(usize),
}

impl std::fmt::Display for HistoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HistoryError::OutOfRange(index) => {
                write!(f, "history index {index} out of range")
            },
            HistoryError::EmptyRollbackTarget(index) => {
                write!(f, "history entry {index} has no restorable data")
            },
        }
    }
}

/// Wall-clock time of day, `HH:MM:SS` UTC. Cosmetic only, never parsed back.
fn timestamp_now() -> String {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let of_day = secs % 86_400;
    format!(
        "{:02}:{:02}:{:02}",
        of_day / 3600,
        (of_day % 3600) / 60,
        of_day % 60
    )
}

/// The undo/redo log. Newest entry at index 0; `current_index` is the cursor
/// the live graph reflects. Exactly one entry is marked current after every
/// mutation (none while the log is empty).
#[derive(Debug, Default)]
pub struct HistoryEngine {
    entries: Vec<HistoryEntry>,
    current_index: usize,
}

impl HistoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn current(&self) -> Option<&HistoryEntry> {
        self.entries.get(self.current_index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn visible_len(&self) -> usize {
        self.entries.iter().filter(|e| e.show_in_panel).count()
    }

    /// Record a snapshot under the given action description.
    ///
    /// Position-only updates overwrite the current slot (or create the
    /// initial entry on an empty log — dropping the first state entirely is
    /// worse than promoting it). Everything else truncates the discarded
    /// future, prepends at index 0, and evicts the oldest panel entry once
    /// the visible bound is exceeded.
    pub fn record(&mut self, action: &str, visibility: Visibility, snapshot: GraphSnapshot) {
        if visibility == Visibility::PositionOnly {
            if let Some(entry) = self.entries.get_mut(self.current_index) {
                entry.data = snapshot;
                entry.timestamp = timestamp_now();
                return;
            }
        }

        // Recording from a rolled-back cursor discards the redo-able future:
        // everything newer than the current entry.
        if self.current_index != 0 && self.current_index < self.entries.len() {
            self.entries.drain(..self.current_index);
        }

        self.entries.insert(
            0,
            HistoryEntry {
                timestamp: timestamp_now(),
                action: action.to_string(),
                data: snapshot,
                show_in_panel: visibility != Visibility::Hidden,
                is_current: false,
            },
        );

        self.evict_over_visible_bound();
        self.current_index = 0;
        self.mark_current();
    }

    /// Move the cursor to `index` and return the sanitized snapshot the live
    /// graph should load. Never deletes entries; the discarded future is only
    /// dropped by the next `record`.
    pub fn rollback(&mut self, index: usize) -> Result<GraphSnapshot, HistoryError> {
        let entry = self
            .entries
            .get(index)
            .ok_or(HistoryError::OutOfRange(index))?;

        let clean = entry.data.sanitized();
        if clean.is_empty() {
            // Corrupted persisted state (e.g. a partially-written store).
            // Leave the log, cursor, and live graph untouched.
            error!("rollback to history entry {index} aborted: no restorable data");
            return Err(HistoryError::EmptyRollbackTarget(index));
        }

        self.current_index = index;
        self.mark_current();
        Ok(clean)
    }

    /// Drop every entry older than `index`, keeping `[0..=index]`. The oldest
    /// entry is never deletable through this path: when `index` is the last
    /// position the call is a no-op. Returns whether the log changed (the
    /// caller clears selection when it did).
    pub fn delete_after(&mut self, index: usize) -> bool {
        if self.entries.is_empty() || index + 1 >= self.entries.len() {
            return false;
        }

        self.entries.truncate(index + 1);
        self.evict_over_visible_bound();

        if self.current_index >= self.entries.len() {
            self.current_index = self.entries.len() - 1;
        }
        self.mark_current();
        true
    }

    /// Replace the log wholesale from persisted state. The cursor is clamped
    /// into range; an out-of-range stored index degrades to the newest entry.
    pub fn replace(&mut self, entries: Vec<HistoryEntry>, current_index: usize) {
        self.entries = entries;
        self.current_index = if self.entries.is_empty() {
            0
        } else {
            current_index.min(self.entries.len() - 1)
        };
        self.mark_current();
    }

    /// Evict oldest panel entries while more than `MAX_VISIBLE_HISTORY` are
    /// visible. Scans from the tail; hidden entries are skipped over.
    fn evict_over_visible_bound(&mut self) {
        while self.visible_len() > MAX_VISIBLE_HISTORY {
            let Some(oldest_visible) = self.entries.iter().rposition(|e| e.show_in_panel) else {
                break;
            };
            self.entries.remove(oldest_visible);
        }
    }

    fn mark_current(&mut self) {
        for (i, entry) in self.entries.iter_mut().enumerate() {
            entry.is_current = i == self.current_index;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{GraphSnapshot, SnapshotEdge, SnapshotNode};

    fn node(id: &str) -> SnapshotNode {
        SnapshotNode {
            id: id.to_string(),
            label: id.to_uppercase(),
            description: String::new(),
            x: 0.0,
            y: 0.0,
        }
    }

    fn snapshot(ids: &[&str]) -> GraphSnapshot {
        GraphSnapshot {
            nodes: ids.iter().map(|id| node(id)).collect(),
            edges: vec![],
        }
    }

    #[test]
    fn test_record_prepends_and_marks_current() {
        let mut engine = HistoryEngine::new();
        engine.record("first", Visibility::Panel, snapshot(&["a"]));
        engine.record("second", Visibility::Panel, snapshot(&["a", "b"]));

        assert_eq!(engine.len(), 2);
        assert_eq!(engine.current_index(), 0);
        assert_eq!(engine.entries()[0].action, "second");
        assert!(engine.entries()[0].is_current);
        assert!(!engine.entries()[1].is_current);
    }

    #[test]
    fn test_visible_bound_keeps_five_most_recent() {
        let mut engine = HistoryEngine::new();
        for i in 0..8 {
            engine.record(&format!("edit {i}"), Visibility::Panel, snapshot(&["a"]));
        }

        assert_eq!(engine.visible_len(), MAX_VISIBLE_HISTORY);
        let actions: Vec<&str> = engine.entries().iter().map(|e| e.action.as_str()).collect();
        assert_eq!(actions, vec!["edit 7", "edit 6", "edit 5", "edit 4", "edit 3"]);
    }

    #[test]
    fn test_hidden_entries_do_not_count_toward_bound() {
        let mut engine = HistoryEngine::new();
        engine.record("hidden seed", Visibility::Hidden, snapshot(&["a"]));
        for i in 0..MAX_VISIBLE_HISTORY {
            engine.record(&format!("edit {i}"), Visibility::Panel, snapshot(&["a"]));
        }

        // Bound is satisfied; the hidden entry at the tail survives eviction.
        assert_eq!(engine.visible_len(), MAX_VISIBLE_HISTORY);
        assert_eq!(engine.len(), MAX_VISIBLE_HISTORY + 1);
        assert!(!engine.entries().last().unwrap().show_in_panel);

        // One more panel entry evicts the oldest *visible* entry, not the
        // hidden one at the very tail.
        engine.record("edit 5", Visibility::Panel, snapshot(&["a"]));
        assert_eq!(engine.visible_len(), MAX_VISIBLE_HISTORY);
        assert!(!engine.entries().last().unwrap().show_in_panel);
        assert!(!engine.entries().iter().any(|e| e.action == "edit 0"));
    }

    #[test]
    fn test_position_only_overwrites_current_slot() {
        let mut engine = HistoryEngine::new();
        engine.record("add", Visibility::Panel, snapshot(&["a"]));
        engine.record("move", Visibility::PositionOnly, snapshot(&["a", "b"]));
        engine.record("move", Visibility::PositionOnly, snapshot(&["a", "c"]));

        assert_eq!(engine.len(), 1);
        assert_eq!(engine.entries()[0].data, snapshot(&["a", "c"]));
        // The slot keeps the original action; only data and timestamp move.
        assert_eq!(engine.entries()[0].action, "add");
    }

    #[test]
    fn test_position_only_on_empty_log_creates_initial_entry() {
        let mut engine = HistoryEngine::new();
        engine.record("move", Visibility::PositionOnly, snapshot(&["a"]));

        assert_eq!(engine.len(), 1);
        assert_eq!(engine.current_index(), 0);
        assert!(engine.entries()[0].is_current);
    }

    #[test]
    fn test_branch_truncation_discards_redoable_future() {
        let mut engine = HistoryEngine::new();
        for action in ["E0", "E1", "E2", "E3", "E4"] {
            engine.record(action, Visibility::Panel, snapshot(&["a"]));
        }
        // Log is [E4, E3, E2, E1, E0]; move the cursor onto E2.
        engine.rollback(2).unwrap();
        engine.record("X", Visibility::Panel, snapshot(&["a", "x"]));

        let actions: Vec<&str> = engine.entries().iter().map(|e| e.action.as_str()).collect();
        assert_eq!(actions, vec!["X", "E2", "E1", "E0"]);
        assert_eq!(engine.current_index(), 0);
    }

    #[test]
    fn test_rollback_moves_cursor_without_deleting() {
        let mut engine = HistoryEngine::new();
        engine.record("first", Visibility::Panel, snapshot(&["a"]));
        engine.record("second", Visibility::Panel, snapshot(&["a", "b"]));

        let restored = engine.rollback(1).unwrap();
        assert_eq!(restored.nodes.len(), 1);
        assert_eq!(engine.len(), 2);
        assert_eq!(engine.current_index(), 1);
        assert!(engine.entries()[1].is_current);
        assert!(!engine.entries()[0].is_current);
    }

    #[test]
    fn test_rollback_out_of_range() {
        let mut engine = HistoryEngine::new();
        engine.record("first", Visibility::Panel, snapshot(&["a"]));
        assert_eq!(engine.rollback(3), Err(HistoryError::OutOfRange(3)));
        assert_eq!(engine.current_index(), 0);
    }

    #[test]
    fn test_rollback_to_unrestorable_entry_changes_nothing() {
        let mut engine = HistoryEngine::new();
        engine.record("good", Visibility::Panel, snapshot(&["a"]));
        // An entry whose nodes all fail validation and whose edges dangle.
        let corrupt = GraphSnapshot {
            nodes: vec![SnapshotNode {
                id: String::new(),
                label: "orphan".to_string(),
                description: String::new(),
                x: 0.0,
                y: 0.0,
            }],
            edges: vec![SnapshotEdge {
                id: "e1".to_string(),
                source: "ghost".to_string(),
                target: "ghost2".to_string(),
                label: "rel".to_string(),
            }],
        };
        engine.record("corrupt", Visibility::Panel, corrupt);

        assert!(engine.rollback(1).is_ok());
        assert_eq!(
            engine.rollback(0),
            Err(HistoryError::EmptyRollbackTarget(0))
        );
        // Cursor stays where the failed rollback found it.
        assert_eq!(engine.current_index(), 1);
        assert_eq!(engine.len(), 2);
    }

    #[test]
    fn test_delete_after_truncates_and_clamps_cursor() {
        let mut engine = HistoryEngine::new();
        for action in ["E0", "E1", "E2", "E3"] {
            engine.record(action, Visibility::Panel, snapshot(&["a"]));
        }
        engine.rollback(3).unwrap();

        assert!(engine.delete_after(1));
        assert_eq!(engine.len(), 2);
        // Cursor pointed past the truncation; clamped to the new oldest.
        assert_eq!(engine.current_index(), 1);
        assert!(engine.entries()[1].is_current);
    }

    #[test]
    fn test_delete_after_oldest_is_noop() {
        let mut engine = HistoryEngine::new();
        engine.record("origin", Visibility::Panel, snapshot(&["a"]));
        engine.record("edit", Visibility::Panel, snapshot(&["a", "b"]));

        // Index 1 is the oldest (last) entry; the origin is never deletable.
        assert!(!engine.delete_after(1));
        assert_eq!(engine.len(), 2);

        // Deleting after the newest entry drops everything older than it.
        assert!(engine.delete_after(0));
        assert_eq!(engine.len(), 1);
        assert_eq!(engine.entries()[0].action, "edit");
    }

    #[test]
    fn test_delete_after_on_empty_log() {
        let mut engine = HistoryEngine::new();
        assert!(!engine.delete_after(0));
    }

    #[test]
    fn test_replace_clamps_stored_cursor() {
        let mut engine = HistoryEngine::new();
        let entries = vec![
            HistoryEntry {
                timestamp: "00:00:00".to_string(),
                action: "newer".to_string(),
                data: snapshot(&["a", "b"]),
                show_in_panel: true,
                is_current: false,
            },
            HistoryEntry {
                timestamp: "00:00:00".to_string(),
                action: "older".to_string(),
                data: snapshot(&["a"]),
                show_in_panel: true,
                is_current: false,
            },
        ];

        engine.replace(entries, 9);
        assert_eq!(engine.current_index(), 1);
        assert!(engine.entries()[1].is_current);

        engine.replace(Vec::new(), 3);
        assert!(engine.is_empty());
        assert_eq!(engine.current_index(), 0);
    }

    #[test]
    fn test_entry_json_uses_stored_field_names() {
        let entry = HistoryEntry {
            timestamp: "12:00:00".to_string(),
            action: "add node \"A\"".to_string(),
            data: snapshot(&["a"]),
            show_in_panel: true,
            is_current: true,
        };

        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["showInHistoryPanel"], true);
        assert_eq!(json["isCurrent"], true);
        assert_eq!(json["data"]["nodes"][0]["id"], "a");

        // Entries persisted before the flags existed still parse.
        let legacy: HistoryEntry = serde_json::from_str(
            r#"{"timestamp":"12:00:00","action":"x","data":{"nodes":[],"edges":[]}}"#,
        )
        .unwrap();
        assert!(legacy.show_in_panel);
        assert!(!legacy.is_current);
    }
}
