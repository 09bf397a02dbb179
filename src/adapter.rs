/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Adapter between the live graph and an external rendering library.
//!
//! History and edit logic never talk to a renderer directly: they go through
//! `GraphAdapter`, which owns the `LiveGraph`, projects snapshots out of it,
//! loads validated snapshots back into it, and forwards item-state changes to
//! whatever `Renderer` is attached. Rendering itself is out of scope; the
//! trait is the whole contract.

use std::sync::{Arc, Mutex};

use crate::graph::{EdgeData, GraphSnapshot, LiveGraph, NodeData};

/// Item state name used to highlight the current selection.
pub const SELECTED_STATE: &str = "selected";

/// Low-level interaction events the rendering layer reports. The session
/// translates these into selection changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphEvent {
    NodeClick(String),
    EdgeClick(String),
    /// Click on empty canvas; clears the selection.
    CanvasClick,
}

/// The visualization-service boundary. Implementations draw a snapshot,
/// toggle per-item states, and tear down on request.
pub trait Renderer {
    fn draw(&mut self, snapshot: &GraphSnapshot);
    fn set_item_state(&mut self, item_id: &str, state: &str, enabled: bool);
    /// Release the rendering surface. Called before the adapter attaches a
    /// replacement, so repeated init never leaks listeners.
    fn clear(&mut self);
}

/// Renderer that does nothing. Headless sessions and most tests use this.
#[derive(Debug, Default)]
pub struct NullRenderer;

impl Renderer for NullRenderer {
    fn draw(&mut self, _snapshot: &GraphSnapshot) {}
    fn set_item_state(&mut self, _item_id: &str, _state: &str, _enabled: bool) {}
    fn clear(&mut self) {}
}

/// Everything a `RecordingRenderer` observed, for assertions.
#[derive(Debug, Default)]
pub struct RenderLog {
    pub draws: Vec<GraphSnapshot>,
    pub state_changes: Vec<(String, String, bool)>,
    pub clears: usize,
}

/// Test double that records every call. The shared log handle stays valid
/// after the renderer moves into an adapter.
#[derive(Debug, Default)]
pub struct RecordingRenderer {
    log: Arc<Mutex<RenderLog>>,
}

impl RecordingRenderer {
    pub fn new() -> (Self, Arc<Mutex<RenderLog>>) {
        let log = Arc::new(Mutex::new(RenderLog::default()));
        (Self { log: log.clone() }, log)
    }
}

impl Renderer for RecordingRenderer {
    fn draw(&mut self, snapshot: &GraphSnapshot) {
        if let Ok(mut log) = self.log.lock() {
            log.draws.push(snapshot.clone());
        }
    }

    fn set_item_state(&mut self, item_id: &str, state: &str, enabled: bool) {
        if let Ok(mut log) = self.log.lock() {
            log.state_changes
                .push((item_id.to_string(), state.to_string(), enabled));
        }
    }

    fn clear(&mut self) {
        if let Ok(mut log) = self.log.lock() {
            log.clears += 1;
        }
    }
}

/// Owns the live graph and the attached renderer. Mutations redraw; snapshot
/// extraction and loading apply the malformed-data filters from `graph`.
#[derive(Default)]
pub struct GraphAdapter {
    graph: LiveGraph,
    renderer: Option<Box<dyn Renderer>>,
}

impl GraphAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach (or replace) the renderer and draw the current graph. A prior
    /// renderer is torn down first, so calling this repeatedly on the same
    /// surface is safe.
    pub fn attach_renderer(&mut self, renderer: Box<dyn Renderer>) {
        if let Some(mut old) = self.renderer.take() {
            old.clear();
        }
        self.renderer = Some(renderer);
        self.redraw();
    }

    pub fn detach_renderer(&mut self) {
        if let Some(mut old) = self.renderer.take() {
            old.clear();
        }
    }

    /// Project the live graph into a snapshot. Edges with unresolvable
    /// endpoints never survive the projection (see `LiveGraph::to_snapshot`).
    pub fn snapshot(&self) -> GraphSnapshot {
        self.graph.to_snapshot()
    }

    /// Replace the live graph with a validated snapshot and redraw.
    pub fn load(&mut self, snapshot: &GraphSnapshot) {
        self.graph = LiveGraph::from_snapshot(snapshot);
        self.redraw();
    }

    pub fn find_node(&self, id: &str) -> Option<&NodeData> {
        self.graph.node(id)
    }

    pub fn find_edge(&self, id: &str) -> Option<&EdgeData> {
        self.graph.edge(id)
    }

    pub fn edge_endpoints(&self, id: &str) -> Option<(String, String)> {
        self.graph.edge_endpoints(id)
    }

    pub fn add_node(&mut self, data: NodeData) -> bool {
        let added = self.graph.add_node(data).is_some();
        if added {
            self.redraw();
        }
        added
    }

    pub fn add_edge(&mut self, source: &str, target: &str, data: EdgeData) -> bool {
        let added = self.graph.add_edge(source, target, data).is_some();
        if added {
            self.redraw();
        }
        added
    }

    pub fn remove_node(&mut self, id: &str) -> Option<NodeData> {
        let removed = self.graph.remove_node(id);
        if removed.is_some() {
            self.redraw();
        }
        removed
    }

    pub fn remove_edge(&mut self, id: &str) -> Option<EdgeData> {
        let removed = self.graph.remove_edge(id);
        if removed.is_some() {
            self.redraw();
        }
        removed
    }

    /// Mutate a node in place, then redraw. Returns false when the id is
    /// unknown (the update is skipped).
    pub fn update_node<F: FnOnce(&mut NodeData)>(&mut self, id: &str, apply: F) -> bool {
        let Some(node) = self.graph.node_mut(id) else {
            return false;
        };
        apply(node);
        self.redraw();
        true
    }

    /// Mutate an edge in place, then redraw.
    pub fn update_edge<F: FnOnce(&mut EdgeData)>(&mut self, id: &str, apply: F) -> bool {
        let Some(edge) = self.graph.edge_mut(id) else {
            return false;
        };
        apply(edge);
        self.redraw();
        true
    }

    pub fn set_item_state(&mut self, item_id: &str, state: &str, enabled: bool) {
        if let Some(renderer) = self.renderer.as_mut() {
            renderer.set_item_state(item_id, state, enabled);
        }
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    fn redraw(&mut self) {
        if let Some(renderer) = self.renderer.as_mut() {
            let snapshot = self.graph.to_snapshot();
            renderer.draw(&snapshot);
        }
    }
}
