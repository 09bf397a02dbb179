/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! graphslate — editing core for a knowledge-graph authoring tool.
//!
//! The centerpiece is a bounded, persisted, branch-discarding undo/redo
//! history over a mutable node/edge graph ([`history::HistoryEngine`]),
//! wrapped in a per-document [`session::EditorSession`] that owns the live
//! graph, the single-selection state, local persistence, and best-effort
//! remote sync. Rendering and the document-store service stay behind the
//! [`adapter::Renderer`] and [`sync`] traits.

pub mod adapter;
pub mod graph;
pub mod history;
pub mod selection;
pub mod session;
pub mod store;
pub mod sync;

pub use adapter::{GraphAdapter, GraphEvent, Renderer};
pub use graph::{GraphSnapshot, LiveGraph, SnapshotEdge, SnapshotNode};
pub use history::{HistoryEngine, HistoryEntry, Visibility, MAX_VISIBLE_HISTORY};
pub use selection::{ActiveForm, EdgeForm, NodeForm, SelectionState};
pub use session::EditorSession;
pub use store::{HistoryStore, route_key};
pub use sync::{HistoryPayload, RemoteHistorySink};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
