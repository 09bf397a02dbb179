/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Per-document editor session.
//!
//! An `EditorSession` owns one adapter, one selection state, one history
//! engine, and the persistence/sync handles for a single open document. Any
//! number of sessions coexist in one process; nothing is module-global.
//!
//! Edit operations mutate the live graph first, record history second, and
//! never wait on the network: local state is authoritative and optimistic,
//! remote sync is advisory. Invalid input (empty label, no selection) is a
//! silent no-op; a selected item that has vanished from the live graph is
//! logged and the operation aborts without touching history.

use std::sync::Arc;
use std::time::Instant;

use euclid::default::Point2D;
use log::warn;
use rand::Rng;

use crate::adapter::{GraphAdapter, GraphEvent, Renderer, SELECTED_STATE};
use crate::graph::{EdgeData, GraphSnapshot, LiveGraph, NodeData, SnapshotEdge};
use crate::history::{HistoryEngine, Visibility};
use crate::selection::{EdgeForm, NodeForm, SelectionState};
use crate::store::{DebouncedSave, HistoryStore};
use crate::sync::{self, HistoryPayload, RemoteHistorySink};

/// New nodes land within this offset of the canvas center, both axes.
const PLACEMENT_SPREAD: f64 = 100.0;

pub struct EditorSession {
    adapter: GraphAdapter,
    selection: SelectionState,
    history: HistoryEngine,
    route_key: String,
    canvas_center: Point2D<f64>,
    store: Option<Arc<HistoryStore>>,
    debounce: DebouncedSave,
    remote: Option<(String, Arc<dyn RemoteHistorySink>)>,
}

impl EditorSession {
    /// Build an empty session for the document identified by `route_key`
    /// (see `store::route_key`).
    pub fn new(route_key: impl Into<String>) -> Self {
        Self {
            adapter: GraphAdapter::new(),
            selection: SelectionState::new(),
            history: HistoryEngine::new(),
            route_key: route_key.into(),
            canvas_center: Point2D::new(0.0, 0.0),
            store: None,
            debounce: DebouncedSave::default(),
            remote: None,
        }
    }

    pub fn with_store(mut self, store: Arc<HistoryStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Enable remote sync for the given server-side graph id (usually parsed
    /// from the document location via `sync::graph_id_from_location`).
    pub fn with_remote(mut self, graph_id: String, sink: Arc<dyn RemoteHistorySink>) -> Self {
        self.remote = Some((graph_id, sink));
        self
    }

    pub fn with_canvas_center(mut self, center: Point2D<f64>) -> Self {
        self.canvas_center = center;
        self
    }

    /// Attach a rendering surface. Safe to call repeatedly; the adapter tears
    /// down the previous renderer first.
    pub fn attach_renderer(&mut self, renderer: Box<dyn Renderer>) {
        self.adapter.attach_renderer(renderer);
    }

    pub fn adapter(&self) -> &GraphAdapter {
        &self.adapter
    }

    pub fn selection(&self) -> &SelectionState {
        &self.selection
    }

    pub fn selection_mut(&mut self) -> &mut SelectionState {
        &mut self.selection
    }

    pub fn history(&self) -> &HistoryEngine {
        &self.history
    }

    pub fn route_key(&self) -> &str {
        &self.route_key
    }

    /// Seed the session from backend data and record the origin entry.
    pub fn load_initial(&mut self, snapshot: &GraphSnapshot) {
        self.adapter.load(snapshot);
        self.selection.clear();
        self.record_history("load graph", Visibility::Panel);
    }

    /// Restore the persisted log for this document and apply its current
    /// entry to the live graph. Missing or corrupt storage leaves the session
    /// empty; corruption is cleaned up by the store.
    pub fn restore(&mut self) {
        let Some(store) = self.store.as_ref() else {
            return;
        };
        let Some((entries, index)) = store.load(&self.route_key) else {
            return;
        };

        self.history.replace(entries, index);
        if let Some(entry) = self.history.current() {
            let clean = entry.data.sanitized();
            if !clean.is_empty() {
                self.adapter.load(&clean);
            }
        }
        self.selection.clear();
    }

    /// Route a renderer interaction event into selection state. At most one
    /// item is selected afterward; a canvas click deselects everything.
    pub fn handle_event(&mut self, event: GraphEvent) {
        self.unhighlight_selection();
        match event {
            GraphEvent::NodeClick(id) => {
                let Some(node) = self.adapter.find_node(&id) else {
                    warn!("Click on unknown node '{id}' ignored");
                    self.selection.clear();
                    return;
                };
                let form = NodeForm {
                    label: node.label.clone(),
                    description: node.description.clone(),
                };
                self.selection.select_node(id.clone(), form);
                self.adapter.set_item_state(&id, SELECTED_STATE, true);
            },
            GraphEvent::EdgeClick(id) => {
                let Some(edge) = self.adapter.find_edge(&id) else {
                    warn!("Click on unknown edge '{id}' ignored");
                    self.selection.clear();
                    return;
                };
                let label = edge.label.clone();
                let (source, target) = self.adapter.edge_endpoints(&id).unwrap_or_default();
                self.selection.select_edge(
                    id.clone(),
                    EdgeForm {
                        source,
                        target,
                        label,
                    },
                );
                self.adapter.set_item_state(&id, SELECTED_STATE, true);
            },
            GraphEvent::CanvasClick => {
                self.selection.clear();
            },
        }
    }

    /// Add a node from the node form. No-op when the label is empty.
    /// Placement is randomized around the canvas center; position is not
    /// semantically significant.
    pub fn add_node(&mut self) {
        let form = self.selection.node_form.clone();
        if form.label.is_empty() {
            return;
        }

        let mut rng = rand::thread_rng();
        let position = Point2D::new(
            self.canvas_center.x + rng.gen_range(-PLACEMENT_SPREAD..=PLACEMENT_SPREAD),
            self.canvas_center.y + rng.gen_range(-PLACEMENT_SPREAD..=PLACEMENT_SPREAD),
        );

        let added = self.adapter.add_node(NodeData {
            id: LiveGraph::new_node_id(),
            label: form.label.clone(),
            description: form.description,
            position,
        });
        if !added {
            warn!("Node insert rejected for label '{}'", form.label);
            return;
        }

        self.record_history(&format!("add node \"{}\"", form.label), Visibility::Panel);
        self.deselect();
    }

    /// Update the selected node from the node form. Requires a selection and
    /// a non-empty label; tolerates the node having vanished from the graph.
    pub fn update_node(&mut self) {
        let Some(id) = self.selection.selected_node().map(str::to_string) else {
            return;
        };
        let form = self.selection.node_form.clone();
        if form.label.is_empty() {
            return;
        }

        let Some(old_label) = self.adapter.find_node(&id).map(|n| n.label.clone()) else {
            warn!("Selected node '{id}' no longer exists; update skipped");
            return;
        };
        self.adapter.update_node(&id, |node| {
            node.label = form.label.clone();
            node.description = form.description.clone();
        });

        self.record_history(
            &format!("update node \"{old_label}\" -> \"{}\"", form.label),
            Visibility::Panel,
        );
        self.deselect();
    }

    /// Delete the selected node (and its incident edges).
    pub fn delete_node(&mut self) {
        let Some(id) = self.selection.selected_node().map(str::to_string) else {
            return;
        };

        let Some(removed) = self.adapter.remove_node(&id) else {
            warn!("Selected node '{id}' no longer exists; delete skipped");
            return;
        };

        self.record_history(&format!("delete node \"{}\"", removed.label), Visibility::Panel);
        self.deselect();
    }

    /// Add an edge from the edge form. Both endpoints must name existing
    /// nodes; an empty label is stored as the placeholder the backend
    /// accepts.
    pub fn add_edge(&mut self) {
        let form = self.selection.edge_form.clone();
        if form.source.is_empty() || form.target.is_empty() {
            return;
        }
        if self.adapter.find_node(&form.source).is_none()
            || self.adapter.find_node(&form.target).is_none()
        {
            warn!(
                "Edge endpoints '{}' -> '{}' not found; add skipped",
                form.source, form.target
            );
            return;
        }

        let added = self.adapter.add_edge(
            &form.source,
            &form.target,
            EdgeData {
                id: LiveGraph::new_edge_id(),
                label: SnapshotEdge::normalized_label(&form.label),
            },
        );
        if !added {
            warn!("Edge insert rejected between '{}' and '{}'", form.source, form.target);
            return;
        }

        let action = format!(
            "add edge {} -> {}",
            self.node_display(&form.source),
            self.node_display(&form.target)
        );
        self.record_history(&action, Visibility::Panel);
        self.deselect();
    }

    /// Update the selected edge from the edge form. Changing an endpoint
    /// re-creates the edge under the same id; the new endpoints are validated
    /// before the old edge is touched.
    pub fn update_edge(&mut self) {
        let Some(id) = self.selection.selected_edge().map(str::to_string) else {
            return;
        };
        let form = self.selection.edge_form.clone();
        if form.source.is_empty() || form.target.is_empty() {
            return;
        }

        let Some((old_source, old_target)) = self.adapter.edge_endpoints(&id) else {
            warn!("Selected edge '{id}' no longer exists; update skipped");
            return;
        };
        let label = SnapshotEdge::normalized_label(&form.label);

        if form.source == old_source && form.target == old_target {
            self.adapter.update_edge(&id, |edge| edge.label = label.clone());
        } else {
            if self.adapter.find_node(&form.source).is_none()
                || self.adapter.find_node(&form.target).is_none()
            {
                warn!(
                    "Edge endpoints '{}' -> '{}' not found; update skipped",
                    form.source, form.target
                );
                return;
            }
            self.adapter.remove_edge(&id);
            self.adapter.add_edge(
                &form.source,
                &form.target,
                EdgeData {
                    id: id.clone(),
                    label,
                },
            );
        }

        let action = format!(
            "update edge {} -> {}",
            self.node_display(&form.source),
            self.node_display(&form.target)
        );
        self.record_history(&action, Visibility::Panel);
        self.deselect();
    }

    /// Delete the selected edge.
    pub fn delete_edge(&mut self) {
        let Some(id) = self.selection.selected_edge().map(str::to_string) else {
            return;
        };

        let endpoints = self.adapter.edge_endpoints(&id);
        if self.adapter.remove_edge(&id).is_none() {
            warn!("Selected edge '{id}' no longer exists; delete skipped");
            return;
        }

        let action = match endpoints {
            Some((source, target)) => format!(
                "delete edge {} -> {}",
                self.node_display(&source),
                self.node_display(&target)
            ),
            None => "delete edge".to_string(),
        };
        self.record_history(&action, Visibility::Panel);
        self.deselect();
    }

    /// Report a drag-move. Overwrites the current history slot instead of
    /// recording a new entry, so continuous drags cost one undo step total.
    pub fn node_moved(&mut self, id: &str, x: f64, y: f64) {
        let updated = self.adapter.update_node(id, |node| {
            node.position = Point2D::new(x, y);
        });
        if !updated {
            warn!("Drag on unknown node '{id}' ignored");
            return;
        }
        self.record_history("move node", Visibility::PositionOnly);
    }

    /// Roll the live graph back to the given history entry. The log keeps
    /// every entry; only the cursor moves. An unrestorable target (nothing
    /// valid left after filtering) leaves everything untouched.
    pub fn rollback(&mut self, index: usize) {
        match self.history.rollback(index) {
            Ok(snapshot) => {
                self.adapter.load(&snapshot);
                self.selection.clear();
                self.debounce.schedule(Instant::now());
            },
            Err(e) => {
                warn!("Rollback refused: {e}");
            },
        }
    }

    /// Delete every history entry older than `index`. The oldest entry is
    /// never deletable; selection is cleared when the log changed, since it
    /// may reference an item only reachable through deleted entries.
    pub fn delete_history_after(&mut self, index: usize) {
        if self.history.delete_after(index) {
            self.selection.clear();
            self.debounce.schedule(Instant::now());
        }
    }

    /// Drive the debounced local write. Call periodically (or after a burst
    /// of events); a due deadline persists the log once.
    pub fn tick(&mut self, now: Instant) {
        if self.debounce.take_due(now) {
            self.persist_now();
        }
    }

    /// Persist immediately if a write is pending. Used on teardown so the
    /// debounce window cannot drop the final state.
    pub fn flush(&mut self) {
        if self.debounce.take_pending() {
            self.persist_now();
        }
    }

    /// Snapshot the live graph and record it. Durable records schedule the
    /// local write and fire the advisory remote push; position-only records
    /// only reschedule the write.
    fn record_history(&mut self, action: &str, visibility: Visibility) {
        let snapshot = self.adapter.snapshot();
        self.history.record(action, visibility, snapshot);
        self.debounce.schedule(Instant::now());

        if visibility != Visibility::PositionOnly {
            self.push_remote();
        }
    }

    fn push_remote(&self) {
        let Some((graph_id, sink)) = self.remote.as_ref() else {
            return;
        };
        let Some(entry) = self.history.current() else {
            return;
        };

        let payload = match (
            serde_json::to_string(&entry.data.nodes),
            serde_json::to_string(&entry.data.edges),
            serde_json::to_string(self.history.entries()),
        ) {
            (Ok(nodes), Ok(edges), Ok(history)) => HistoryPayload {
                nodes,
                edges,
                history,
            },
            _ => {
                warn!("History payload failed to serialize; remote push skipped");
                return;
            },
        };

        sync::push_detached(sink.clone(), graph_id.clone(), payload);
    }

    fn persist_now(&self) {
        let Some(store) = self.store.as_ref() else {
            return;
        };
        if let Err(e) = store.save(
            &self.route_key,
            self.history.entries(),
            self.history.current_index(),
        ) {
            warn!("Failed to persist history for '{}': {e}", self.route_key);
        }
    }

    fn deselect(&mut self) {
        self.unhighlight_selection();
        self.selection.clear();
    }

    fn unhighlight_selection(&mut self) {
        if let Some(id) = self.selection.selected_node().map(str::to_string) {
            self.adapter.set_item_state(&id, SELECTED_STATE, false);
        }
        if let Some(id) = self.selection.selected_edge().map(str::to_string) {
            self.adapter.set_item_state(&id, SELECTED_STATE, false);
        }
    }

    /// Human-readable name for a node in action strings; labels are cosmetic
    /// and fall back to the raw id when the lookup fails.
    fn node_display(&self, id: &str) -> String {
        match self.adapter.find_node(id) {
            Some(node) => format!("\"{}\"", node.label),
            None => id.to_string(),
        }
    }
}
