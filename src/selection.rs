/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Selection state for the editor: at most one node XOR one edge is selected,
//! and the two edit forms mirror whatever is selected.

/// Edit form for the selected (or to-be-created) node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeForm {
    pub label: String,
    pub description: String,
}

/// Edit form for the selected (or to-be-created) edge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EdgeForm {
    pub source: String,
    pub target: String,
    pub label: String,
}

/// Which edit form the UI currently shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActiveForm {
    #[default]
    Node,
    Edge,
}

/// Single-selection interaction state. Selecting a node clears any selected
/// edge and vice versa; clearing resets both forms to their empty literals.
#[derive(Debug, Default)]
pub struct SelectionState {
    selected_node: Option<String>,
    selected_edge: Option<String>,
    pub node_form: NodeForm,
    pub edge_form: EdgeForm,
    pub active_form: ActiveForm,
}

impl SelectionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selected_node(&self) -> Option<&str> {
        self.selected_node.as_deref()
    }

    pub fn selected_edge(&self) -> Option<&str> {
        self.selected_edge.as_deref()
    }

    /// Select a node, mirroring its fields into the node form.
    pub fn select_node(&mut self, id: String, form: NodeForm) {
        self.selected_edge = None;
        self.selected_node = Some(id);
        self.node_form = form;
        self.active_form = ActiveForm::Node;
    }

    /// Select an edge, mirroring its fields into the edge form.
    pub fn select_edge(&mut self, id: String, form: EdgeForm) {
        self.selected_node = None;
        self.selected_edge = Some(id);
        self.edge_form = form;
        self.active_form = ActiveForm::Edge;
    }

    /// Deselect everything and reset both forms.
    pub fn clear(&mut self) {
        self.selected_node = None;
        self.selected_edge = None;
        self.node_form = NodeForm::default();
        self.edge_form = EdgeForm::default();
    }
}
