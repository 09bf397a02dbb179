/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! End-to-end editing scenarios against the public API: sessions, history,
//! persistence, and remote sync wired together the way an embedder would.

use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use graphslate::sync::SyncError;
use graphslate::{
    EditorSession, GraphEvent, HistoryPayload, HistoryStore, NodeForm, RemoteHistorySink,
    SnapshotNode, MAX_VISIBLE_HISTORY, VERSION,
};
use tempfile::TempDir;

fn add_node(session: &mut EditorSession, label: &str) {
    session.selection_mut().node_form = NodeForm {
        label: label.to_string(),
        description: String::new(),
    };
    session.add_node();
}

fn node_labels(session: &EditorSession) -> Vec<String> {
    let mut labels: Vec<String> = session
        .adapter()
        .snapshot()
        .nodes
        .iter()
        .map(|n| n.label.clone())
        .collect();
    labels.sort();
    labels
}

#[test]
fn version_is_set() {
    assert!(!VERSION.is_empty());
}

/// Add A, add B, roll back to the A-state, add C: the B-state is discarded
/// and the log reads [C, A] with the cursor on the new entry.
#[test]
fn add_rollback_add_discards_the_abandoned_branch() {
    let mut session = EditorSession::new("scenario");

    add_node(&mut session, "A");
    assert_eq!(session.history().len(), 1);
    assert_eq!(session.history().current_index(), 0);

    add_node(&mut session, "B");
    assert_eq!(session.history().len(), 2);
    assert_eq!(node_labels(&session), vec!["A", "B"]);

    session.rollback(1);
    assert_eq!(node_labels(&session), vec!["A"]);
    assert_eq!(session.history().current_index(), 1);

    add_node(&mut session, "C");
    let actions: Vec<&str> = session
        .history()
        .entries()
        .iter()
        .map(|e| e.action.as_str())
        .collect();
    assert_eq!(actions, vec!["add node \"C\"", "add node \"A\""]);
    assert_eq!(node_labels(&session), vec!["A", "C"]);
    assert_eq!(session.history().current_index(), 0);
}

#[test]
fn visible_history_stays_bounded_across_many_edits() {
    let mut session = EditorSession::new("scenario");
    for i in 0..(MAX_VISIBLE_HISTORY + 4) {
        add_node(&mut session, &format!("N{i}"));
    }

    assert_eq!(session.history().visible_len(), MAX_VISIBLE_HISTORY);
    // The retained entries are the most recent ones.
    assert_eq!(session.history().entries()[0].action, "add node \"N8\"");
    assert!(session
        .history()
        .entries()
        .iter()
        .all(|e| e.action != "add node \"N0\""));
}

#[test]
fn drag_burst_persists_one_entry_with_final_position() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(HistoryStore::open(dir.path().to_path_buf()).unwrap());
    let mut session = EditorSession::new("drag_doc").with_store(store.clone());

    add_node(&mut session, "A");
    let id = session.adapter().snapshot().nodes[0].id.clone();
    for step in 1..=20 {
        session.node_moved(&id, step as f64 * 5.0, step as f64 * 3.0);
    }
    session.flush();

    let (entries, index) = store.load("drag_doc").unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(index, 0);
    let node = &entries[0].data.nodes[0];
    assert_eq!((node.x, node.y), (100.0, 60.0));
}

#[test]
fn restore_rebuilds_graph_history_and_cursor() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(HistoryStore::open(dir.path().to_path_buf()).unwrap());

    {
        let mut session = EditorSession::new("doc_1").with_store(store.clone());
        add_node(&mut session, "A");
        add_node(&mut session, "B");
        session.rollback(1);
        session.flush();
    }

    let mut restored = EditorSession::new("doc_1").with_store(store);
    restored.restore();

    assert_eq!(restored.history().len(), 2);
    assert_eq!(restored.history().current_index(), 1);
    // The live graph reflects the cursor entry, not the newest one.
    assert_eq!(node_labels(&restored), vec!["A"]);
    assert_eq!(restored.selection().selected_node(), None);
}

#[test]
fn restore_with_nothing_stored_leaves_session_empty() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(HistoryStore::open(dir.path().to_path_buf()).unwrap());

    let mut session = EditorSession::new("never_saved").with_store(store);
    session.restore();

    assert!(session.history().is_empty());
    assert_eq!(session.adapter().node_count(), 0);
}

struct ChannelSink {
    sender: Mutex<mpsc::Sender<(String, HistoryPayload)>>,
}

impl RemoteHistorySink for ChannelSink {
    fn push_history(&self, graph_id: &str, payload: &HistoryPayload) -> Result<(), SyncError> {
        let sender = self.sender.lock().unwrap();
        let _ = sender.send((graph_id.to_string(), payload.clone()));
        Ok(())
    }
}

#[test]
fn durable_edits_push_json_string_payloads() {
    let (sender, receiver) = mpsc::channel();
    let sink = Arc::new(ChannelSink {
        sender: Mutex::new(sender),
    });
    let mut session = EditorSession::new("doc_remote").with_remote("3".to_string(), sink);

    add_node(&mut session, "A");

    let (graph_id, payload) = receiver.recv_timeout(Duration::from_secs(2)).unwrap();
    assert_eq!(graph_id, "3");

    // Each payload field is itself a JSON string.
    let nodes: Vec<SnapshotNode> = serde_json::from_str(&payload.nodes).unwrap();
    assert_eq!(nodes.len(), 1);
    assert_eq!(nodes[0].label, "A");
    let history: serde_json::Value = serde_json::from_str(&payload.history).unwrap();
    assert!(history.is_array());
    assert_eq!(history[0]["action"], "add node \"A\"");
    assert_eq!(history[0]["showInHistoryPanel"], true);
}

#[test]
fn position_only_updates_do_not_push_remotely() {
    let (sender, receiver) = mpsc::channel();
    let sink = Arc::new(ChannelSink {
        sender: Mutex::new(sender),
    });
    let mut session = EditorSession::new("doc_remote").with_remote("3".to_string(), sink);

    add_node(&mut session, "A");
    receiver.recv_timeout(Duration::from_secs(2)).unwrap();

    let id = session.adapter().snapshot().nodes[0].id.clone();
    session.node_moved(&id, 50.0, 50.0);
    session.node_moved(&id, 60.0, 60.0);
    session.rollback(0);

    // Neither drags nor rollback are durable records.
    assert!(receiver.recv_timeout(Duration::from_millis(300)).is_err());
}

#[test]
fn sessions_are_independent_documents() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(HistoryStore::open(dir.path().to_path_buf()).unwrap());

    let mut first = EditorSession::new("doc_a").with_store(store.clone());
    let mut second = EditorSession::new("doc_b").with_store(store.clone());

    add_node(&mut first, "OnlyInA");
    add_node(&mut second, "OnlyInB");
    add_node(&mut second, "AlsoInB");
    first.flush();
    second.flush();

    assert_eq!(first.history().len(), 1);
    assert_eq!(second.history().len(), 2);
    assert_eq!(store.load("doc_a").unwrap().0.len(), 1);
    assert_eq!(store.load("doc_b").unwrap().0.len(), 2);
}

#[test]
fn selection_survives_only_valid_targets() {
    let mut session = EditorSession::new("scenario");
    add_node(&mut session, "A");
    let id = session.adapter().snapshot().nodes[0].id.clone();

    session.handle_event(GraphEvent::NodeClick(id.clone()));
    assert_eq!(session.selection().selected_node(), Some(id.as_str()));
    assert_eq!(session.selection().node_form.label, "A");

    session.handle_event(GraphEvent::NodeClick("ghost".to_string()));
    assert_eq!(session.selection().selected_node(), None);

    session.handle_event(GraphEvent::NodeClick(id));
    session.handle_event(GraphEvent::CanvasClick);
    assert_eq!(session.selection().selected_node(), None);
    assert_eq!(session.selection().node_form, NodeForm::default());
}
