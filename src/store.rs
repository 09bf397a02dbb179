/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Local persistence of the history log, backed by redb.
//!
//! One table of string keys and JSON string values, two keys per document:
//! `graphHistory_<routeKey>` holds the serialized entry array and
//! `graphHistory_<routeKey>_index` the stringified cursor. Corrupt stored
//! state (unparseable JSON, non-array shape) is discarded on load — both keys
//! removed, empty log returned — so a partially-written store can never crash
//! the editor.
//!
//! Writes are debounced: drag-position bursts coalesce into one physical
//! write while the in-memory log stays exact.

use log::warn;
use redb::{ReadableDatabase, ReadableTable};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use crate::history::HistoryEntry;

const HISTORY_TABLE: redb::TableDefinition<&str, &str> = redb::TableDefinition::new("history");

/// Trailing-edge debounce window for local writes.
pub const SAVE_DEBOUNCE: Duration = Duration::from_millis(200);

#[derive(Debug)]
pub enum HistoryStoreError {
    Io(String),
    Redb(String),
    Serialize(String),
}

impl std::fmt::Display for HistoryStoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HistoryStoreError::Io(e) => write!(f, "IO error: {e}"),
            HistoryStoreError::Redb(e) => write!(f, "Redb error: {e}"),
            HistoryStoreError::Serialize(e) => write!(f, "Serialize error: {e}"),
        }
    }
}

/// Derive the storage key suffix from a document location (path + hash).
/// `/` and `#` become `_`; an empty or root path maps to `root`.
pub fn route_key(path: &str) -> String {
    if path.is_empty() || path == "/" {
        return "root".to_string();
    }
    path.replace(['/', '#'], "_")
}

fn history_key(route_key: &str) -> String {
    format!("graphHistory_{route_key}")
}

fn index_key(route_key: &str) -> String {
    format!("graphHistory_{route_key}_index")
}

/// Default store location under the platform data directory.
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("graphslate")
}

/// Persistent history store. One database serves every document; documents
/// are distinguished by route key.
pub struct HistoryStore {
    db: redb::Database,
}

impl HistoryStore {
    /// Open or create a store at the given directory.
    pub fn open(base_dir: PathBuf) -> Result<Self, HistoryStoreError> {
        std::fs::create_dir_all(&base_dir)
            .map_err(|e| HistoryStoreError::Io(format!("Failed to create dir: {e}")))?;

        let db = redb::Database::create(base_dir.join("history.redb"))
            .map_err(|e| HistoryStoreError::Redb(format!("{e}")))?;

        Ok(Self { db })
    }

    /// Write the full log and cursor for a document in one transaction.
    pub fn save(
        &self,
        route_key: &str,
        entries: &[HistoryEntry],
        current_index: usize,
    ) -> Result<(), HistoryStoreError> {
        let json = serde_json::to_string(entries)
            .map_err(|e| HistoryStoreError::Serialize(format!("{e}")))?;

        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| HistoryStoreError::Redb(format!("{e}")))?;
        {
            let mut table = write_txn
                .open_table(HISTORY_TABLE)
                .map_err(|e| HistoryStoreError::Redb(format!("{e}")))?;
            table
                .insert(history_key(route_key).as_str(), json.as_str())
                .map_err(|e| HistoryStoreError::Redb(format!("{e}")))?;
            table
                .insert(
                    index_key(route_key).as_str(),
                    current_index.to_string().as_str(),
                )
                .map_err(|e| HistoryStoreError::Redb(format!("{e}")))?;
        }
        write_txn
            .commit()
            .map_err(|e| HistoryStoreError::Redb(format!("{e}")))
    }

    /// Load the log and cursor for a document. Returns `None` when nothing is
    /// stored or the stored value is corrupt; corruption also removes the
    /// offending keys so the next load starts clean. Never panics, never
    /// propagates a parse failure.
    pub fn load(&self, route_key: &str) -> Option<(Vec<HistoryEntry>, usize)> {
        let raw = self.read_raw(&history_key(route_key))?;

        let entries: Vec<HistoryEntry> = match serde_json::from_str(&raw) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Stored history for '{route_key}' is corrupt, discarding: {e}");
                self.remove(route_key);
                return None;
            },
        };

        let index = self
            .read_raw(&index_key(route_key))
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(0);
        let index = if entries.is_empty() {
            0
        } else {
            index.min(entries.len() - 1)
        };

        Some((entries, index))
    }

    /// Remove both keys for a document. Failures are logged and swallowed;
    /// this runs on the corrupt-state recovery path where nothing better can
    /// be done.
    pub fn remove(&self, route_key: &str) {
        let result = (|| -> Result<(), HistoryStoreError> {
            let write_txn = self
                .db
                .begin_write()
                .map_err(|e| HistoryStoreError::Redb(format!("{e}")))?;
            {
                let mut table = write_txn
                    .open_table(HISTORY_TABLE)
                    .map_err(|e| HistoryStoreError::Redb(format!("{e}")))?;
                table
                    .remove(history_key(route_key).as_str())
                    .map_err(|e| HistoryStoreError::Redb(format!("{e}")))?;
                table
                    .remove(index_key(route_key).as_str())
                    .map_err(|e| HistoryStoreError::Redb(format!("{e}")))?;
            }
            write_txn
                .commit()
                .map_err(|e| HistoryStoreError::Redb(format!("{e}")))
        })();

        if let Err(e) = result {
            warn!("Failed to remove stored history for '{route_key}': {e}");
        }
    }

    /// Whether any value is stored under the document's history key.
    pub fn contains(&self, route_key: &str) -> bool {
        self.read_raw(&history_key(route_key)).is_some()
    }

    fn read_raw(&self, key: &str) -> Option<String> {
        let read_txn = self.db.begin_read().ok()?;
        let table = read_txn.open_table(HISTORY_TABLE).ok()?;
        let entry = table.get(key).ok()??;
        Some(entry.value().to_string())
    }

    #[cfg(test)]
    fn write_raw(&self, key: &str, value: &str) {
        let write_txn = self.db.begin_write().unwrap();
        {
            let mut table = write_txn.open_table(HISTORY_TABLE).unwrap();
            table.insert(key, value).unwrap();
        }
        write_txn.commit().unwrap();
    }
}

/// Trailing-edge, single-flight write debouncer. Scheduling while a write is
/// pending pushes the deadline out instead of stacking a second write; the
/// session polls `take_due` from its tick.
#[derive(Debug)]
pub struct DebouncedSave {
    deadline: Option<Instant>,
    delay: Duration,
}

impl DebouncedSave {
    pub fn new(delay: Duration) -> Self {
        Self {
            deadline: None,
            delay,
        }
    }

    /// Schedule (or reschedule) the pending write.
    pub fn schedule(&mut self, now: Instant) {
        self.deadline = Some(now + self.delay);
    }

    pub fn pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// Consume the pending write if its deadline has passed.
    pub fn take_due(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            },
            _ => false,
        }
    }

    /// Consume the pending write regardless of deadline. Used on teardown.
    pub fn take_pending(&mut self) -> bool {
        self.deadline.take().is_some()
    }
}

impl Default for DebouncedSave {
    fn default() -> Self {
        Self::new(SAVE_DEBOUNCE)
    }
}
