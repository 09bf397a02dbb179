/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Graph data structures for the knowledge-graph editor.
//!
//! Core structures:
//! - `GraphSnapshot`: immutable-at-rest projection of the graph (nodes + edges)
//! - `LiveGraph`: mutable graph container backed by petgraph::StableGraph
//!
//! Snapshots are the unit of history and persistence; the live graph is what
//! edit operations mutate. Conversion between the two filters out malformed
//! data instead of raising: an edge whose endpoint is missing never survives
//! either direction.

use euclid::default::Point2D;
use petgraph::Directed;
use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableGraph};
use petgraph::visit::{EdgeRef, IntoEdgeReferences};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Stable node handle (petgraph NodeIndex — survives other deletions)
pub type NodeKey = NodeIndex;

/// Stable edge handle (petgraph EdgeIndex)
pub type EdgeKey = EdgeIndex;

/// Placeholder label for relations without one. The backend schema treats an
/// empty label as "no relation", so an absent label is stored as one space.
pub const EMPTY_RELATION_LABEL: &str = " ";

fn default_edge_label() -> String {
    EMPTY_RELATION_LABEL.to_string()
}

/// A node as it appears in a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotNode {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
}

/// An edge as it appears in a snapshot. `source`/`target` reference node ids
/// within the same snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(default = "default_edge_label")]
    pub label: String,
}

impl SnapshotEdge {
    /// Normalize an empty label to the placeholder the backend accepts.
    pub fn normalized_label(label: &str) -> String {
        if label.is_empty() {
            EMPTY_RELATION_LABEL.to_string()
        } else {
            label.to_string()
        }
    }
}

/// A complete copy of the graph at one point in time. Never mutated after
/// creation; rollback replaces the live graph with a snapshot, it does not
/// edit one.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub nodes: Vec<SnapshotNode>,
    pub edges: Vec<SnapshotEdge>,
}

impl GraphSnapshot {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }

    /// Drop entries that cannot be restored: nodes need a non-empty id and
    /// label, edges need non-empty endpoints that resolve to surviving nodes.
    /// Used before handing a persisted snapshot back to the live graph, which
    /// guards against partially-written storage.
    pub fn sanitized(&self) -> GraphSnapshot {
        let nodes: Vec<SnapshotNode> = self
            .nodes
            .iter()
            .filter(|n| !n.id.is_empty() && !n.label.is_empty())
            .cloned()
            .collect();

        let mut seen = std::collections::HashSet::new();
        let nodes: Vec<SnapshotNode> = nodes
            .into_iter()
            .filter(|n| seen.insert(n.id.clone()))
            .collect();

        let ids: std::collections::HashSet<&str> =
            nodes.iter().map(|n| n.id.as_str()).collect();

        let edges = self
            .edges
            .iter()
            .filter(|e| {
                !e.source.is_empty()
                    && !e.target.is_empty()
                    && ids.contains(e.source.as_str())
                    && ids.contains(e.target.as_str())
            })
            .map(|e| SnapshotEdge {
                id: e.id.clone(),
                source: e.source.clone(),
                target: e.target.clone(),
                label: SnapshotEdge::normalized_label(&e.label),
            })
            .collect();

        GraphSnapshot { nodes, edges }
    }
}

/// Node payload held by the live graph.
#[derive(Debug, Clone)]
pub struct NodeData {
    /// Stable node identity, unique within the graph.
    pub id: String,
    pub label: String,
    pub description: String,
    /// Position in canvas space.
    pub position: Point2D<f64>,
}

/// Edge payload held by the live graph. Endpoints live in the graph topology.
#[derive(Debug, Clone)]
pub struct EdgeData {
    pub id: String,
    pub label: String,
}

/// Mutable graph container backed by petgraph::StableGraph, with string-id
/// side indexes for node and edge lookup.
#[derive(Debug, Default, Clone)]
pub struct LiveGraph {
    inner: StableGraph<NodeData, EdgeData, Directed>,
    id_to_node: HashMap<String, NodeKey>,
    id_to_edge: HashMap<String, EdgeKey>,
}

impl LiveGraph {
    pub fn new() -> Self {
        Self {
            inner: StableGraph::new(),
            id_to_node: HashMap::new(),
            id_to_edge: HashMap::new(),
        }
    }

    /// Generate a fresh node id.
    pub fn new_node_id() -> String {
        format!("node-{}", Uuid::new_v4().as_simple())
    }

    /// Generate a fresh edge id.
    pub fn new_edge_id() -> String {
        format!("edge-{}", Uuid::new_v4().as_simple())
    }

    /// Add a node. Rejects an empty or duplicate id.
    pub fn add_node(&mut self, data: NodeData) -> Option<NodeKey> {
        if data.id.is_empty() || self.id_to_node.contains_key(&data.id) {
            return None;
        }
        let id = data.id.clone();
        let key = self.inner.add_node(data);
        self.id_to_node.insert(id, key);
        Some(key)
    }

    /// Add an edge between two existing nodes. Rejects missing endpoints and
    /// duplicate edge ids.
    pub fn add_edge(&mut self, source: &str, target: &str, data: EdgeData) -> Option<EdgeKey> {
        if data.id.is_empty() || self.id_to_edge.contains_key(&data.id) {
            return None;
        }
        let from = *self.id_to_node.get(source)?;
        let to = *self.id_to_node.get(target)?;
        let id = data.id.clone();
        let key = self.inner.add_edge(from, to, data);
        self.id_to_edge.insert(id, key);
        Some(key)
    }

    /// Remove a node and its incident edges. Returns the removed payload.
    pub fn remove_node(&mut self, id: &str) -> Option<NodeData> {
        let key = self.id_to_node.remove(id)?;
        // Incident edges vanish with the node; purge them from the id index
        // before petgraph invalidates their keys.
        let incident: Vec<String> = self
            .inner
            .edge_references()
            .filter(|e| e.source() == key || e.target() == key)
            .map(|e| e.weight().id.clone())
            .collect();
        for edge_id in incident {
            self.id_to_edge.remove(&edge_id);
        }
        self.inner.remove_node(key)
    }

    /// Remove an edge by id. Returns the removed payload.
    pub fn remove_edge(&mut self, id: &str) -> Option<EdgeData> {
        let key = self.id_to_edge.remove(id)?;
        self.inner.remove_edge(key)
    }

    pub fn node(&self, id: &str) -> Option<&NodeData> {
        let key = *self.id_to_node.get(id)?;
        self.inner.node_weight(key)
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut NodeData> {
        let key = *self.id_to_node.get(id)?;
        self.inner.node_weight_mut(key)
    }

    pub fn edge(&self, id: &str) -> Option<&EdgeData> {
        let key = *self.id_to_edge.get(id)?;
        self.inner.edge_weight(key)
    }

    pub fn edge_mut(&mut self, id: &str) -> Option<&mut EdgeData> {
        let key = *self.id_to_edge.get(id)?;
        self.inner.edge_weight_mut(key)
    }

    /// Resolve an edge's endpoint node ids.
    pub fn edge_endpoints(&self, id: &str) -> Option<(String, String)> {
        let key = *self.id_to_edge.get(id)?;
        let (from, to) = self.inner.edge_endpoints(key)?;
        let source = self.inner.node_weight(from)?.id.clone();
        let target = self.inner.node_weight(to)?.id.clone();
        Some((source, target))
    }

    pub fn nodes(&self) -> impl Iterator<Item = &NodeData> {
        self.inner.node_weights()
    }

    /// Iterate edges as (source id, target id, payload).
    pub fn edges(&self) -> impl Iterator<Item = (&NodeData, &NodeData, &EdgeData)> {
        self.inner.edge_references().filter_map(|e| {
            let source = self.inner.node_weight(e.source())?;
            let target = self.inner.node_weight(e.target())?;
            Some((source, target, e.weight()))
        })
    }

    pub fn node_count(&self) -> usize {
        self.inner.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.inner.edge_count()
    }

    pub fn clear(&mut self) {
        self.inner.clear();
        self.id_to_node.clear();
        self.id_to_edge.clear();
    }

    /// Project the live graph into a snapshot, keeping only the persisted
    /// fields. Edges whose endpoints cannot be resolved are dropped — the
    /// rendering layer's event model has produced half-formed edges before,
    /// and they must never enter a snapshot.
    pub fn to_snapshot(&self) -> GraphSnapshot {
        let nodes = self
            .nodes()
            .map(|n| SnapshotNode {
                id: n.id.clone(),
                label: n.label.clone(),
                description: n.description.clone(),
                x: n.position.x,
                y: n.position.y,
            })
            .collect();

        let edges = self
            .edges()
            .filter(|(source, target, _)| !source.id.is_empty() && !target.id.is_empty())
            .map(|(source, target, e)| SnapshotEdge {
                id: e.id.clone(),
                source: source.id.clone(),
                target: target.id.clone(),
                label: SnapshotEdge::normalized_label(&e.label),
            })
            .collect();

        GraphSnapshot { nodes, edges }
    }

    /// Rebuild a live graph from a snapshot. Malformed nodes and edges are
    /// silently dropped via the same filter `sanitized` applies.
    pub fn from_snapshot(snapshot: &GraphSnapshot) -> Self {
        let clean = snapshot.sanitized();
        let mut graph = LiveGraph::new();

        for n in &clean.nodes {
            let _ = graph.add_node(NodeData {
                id: n.id.clone(),
                label: n.label.clone(),
                description: n.description.clone(),
                position: Point2D::new(n.x, n.y),
            });
        }
        for e in &clean.edges {
            let _ = graph.add_edge(
                &e.source,
                &e.target,
                EdgeData {
                    id: e.id.clone(),
                    label: e.label.clone(),
                },
            );
        }
        graph
    }
}
