//! Tri-state checkbox forest.
//!
//! Leaves carry the authoritative state. Inner nodes are derived: `Checked`
//! iff every child is `Checked`, `Unchecked` iff every child is `Unchecked`,
//! `Indeterminate` otherwise. Setting a node forces its whole subtree to the
//! new state and then re-derives its ancestors bottom-up.
use crate::tree::{ContentProvider, LabelProvider, Resolution, Supplied, TreeItem, TreeWidget};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TriState {
    Checked,
    #[default]
    Unchecked,
    Indeterminate,
}

impl TriState {
    pub fn from_checked(checked: bool) -> Self {
        if checked {
            TriState::Checked
        } else {
            TriState::Unchecked
        }
    }

    /// Checkbox glyph used by the text renderers.
    pub fn marker(self) -> &'static str {
        match self {
            TriState::Checked => "[x]",
            TriState::Unchecked => "[ ]",
            TriState::Indeterminate => "[-]",
        }
    }

    /// Combined state of a set of sibling states.
    pub fn derive<I: IntoIterator<Item = TriState>>(states: I) -> Option<TriState> {
        let mut derived = None;
        for state in states {
            derived = match (derived, state) {
                (_, TriState::Indeterminate) => return Some(TriState::Indeterminate),
                (None, s) => Some(s),
                (Some(prev), s) if prev == s => Some(s),
                _ => return Some(TriState::Indeterminate),
            };
        }
        derived
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CheckId(pub usize);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckNode<T> {
    pub value: T,
    pub state: TriState,
    pub parent: Option<CheckId>,
    pub children: Vec<CheckId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckTree<T> {
    nodes: Vec<CheckNode<T>>,
    roots: Vec<CheckId>,
}

impl<T> Default for CheckTree<T> {
    fn default() -> Self {
        CheckTree {
            nodes: Vec::new(),
            roots: Vec::new(),
        }
    }
}

impl<T> CheckTree<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = CheckId> + '_ {
        (0..self.nodes.len()).map(CheckId)
    }

    pub fn roots(&self) -> &[CheckId] {
        &self.roots
    }

    pub fn node(&self, id: CheckId) -> Option<&CheckNode<T>> {
        self.nodes.get(id.0)
    }

    pub fn value(&self, id: CheckId) -> Option<&T> {
        self.node(id).map(|n| &n.value)
    }

    pub fn value_mut(&mut self, id: CheckId) -> Option<&mut T> {
        self.nodes.get_mut(id.0).map(|n| &mut n.value)
    }

    pub fn state(&self, id: CheckId) -> TriState {
        self.node(id).map(|n| n.state).unwrap_or_default()
    }

    /// Overwrite a single node's state. Neither descendants nor ancestors are
    /// touched.
    pub fn set_state(&mut self, id: CheckId, state: TriState) {
        if let Some(node) = self.nodes.get_mut(id.0) {
            node.state = state;
        }
    }

    pub fn parent(&self, id: CheckId) -> Option<CheckId> {
        self.node(id).and_then(|n| n.parent)
    }

    pub fn children(&self, id: CheckId) -> &[CheckId] {
        self.node(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    pub fn is_leaf(&self, id: CheckId) -> bool {
        self.children(id).is_empty()
    }

    /// Append a node. The state given here is only kept for leaves once
    /// [`CheckTree::normalize`] or a toggle re-derives the ancestors.
    pub fn add(&mut self, parent: Option<CheckId>, value: T, state: TriState) -> CheckId {
        let id = CheckId(self.nodes.len());
        let parent = parent.filter(|p| p.0 < self.nodes.len());
        self.nodes.push(CheckNode {
            value,
            state,
            parent,
            children: Vec::new(),
        });
        match parent {
            Some(p) => self.nodes[p.0].children.push(id),
            None => self.roots.push(id),
        }
        id
    }

    /// Set `id` checked or unchecked: descendants follow, ancestors are
    /// re-derived.
    pub fn set_checked(&mut self, id: CheckId, checked: bool) {
        if id.0 >= self.nodes.len() {
            return;
        }
        self.propagate_to_descendants(id, TriState::from_checked(checked));
        self.recompute_ancestors(id);
    }

    /// Click semantics: a `Checked` box becomes unchecked, anything else
    /// becomes checked.
    pub fn toggle(&mut self, id: CheckId) {
        let checked = self.state(id) != TriState::Checked;
        self.set_checked(id, checked);
    }

    pub fn propagate_to_descendants(&mut self, id: CheckId, state: TriState) {
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.get_mut(current.0) {
                node.state = state;
                stack.extend(node.children.iter().copied());
            }
        }
    }

    /// `id` followed by every descendant, depth first.
    pub fn subtree(&self, id: CheckId) -> Vec<CheckId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if current.0 >= self.nodes.len() {
                continue;
            }
            out.push(current);
            stack.extend(self.children(current).iter().rev().copied());
        }
        out
    }

    /// Ancestors of `id`, nearest first.
    pub fn ancestors(&self, id: CheckId) -> Vec<CheckId> {
        let mut out = Vec::new();
        let mut current = self.parent(id);
        while let Some(p) = current {
            out.push(p);
            current = self.parent(p);
        }
        out
    }

    pub fn recompute_ancestors(&mut self, id: CheckId) {
        let mut current = self.parent(id);
        while let Some(p) = current {
            let derived = TriState::derive(self.children(p).iter().map(|c| self.state(*c)));
            if let Some(derived) = derived {
                self.nodes[p.0].state = derived;
            }
            current = self.parent(p);
        }
    }

    /// Re-derive every inner node from the leaves.
    pub fn normalize(&mut self) {
        for idx in (0..self.nodes.len()).rev() {
            let id = CheckId(idx);
            if let Some(derived) =
                TriState::derive(self.children(id).iter().map(|c| self.state(*c)))
            {
                self.nodes[idx].state = derived;
            }
        }
    }

    /// Uncheck everything, then check the subtree at `id`.
    pub fn only(&mut self, id: CheckId) {
        for root in self.roots.clone() {
            self.propagate_to_descendants(root, TriState::Unchecked);
        }
        self.set_checked(id, true);
    }

    /// Checked nodes whose parent is not checked: the smallest set of
    /// subtrees that covers the whole selection.
    pub fn checked_tops(&self) -> Vec<CheckId> {
        self.ids()
            .filter(|id| self.state(*id) == TriState::Checked)
            .filter(|id| {
                self.parent(*id)
                    .map(|p| self.state(p) != TriState::Checked)
                    .unwrap_or(true)
            })
            .collect()
    }
}

pub type SharedCheckTree<T> = Arc<Mutex<CheckTree<T>>>;

/// Serves a [`CheckTree`] to a [`TreeWidget`]. Node data is the [`CheckId`];
/// everything else is read from the shared tree.
pub struct CheckTreeContent<T> {
    tree: SharedCheckTree<T>,
    open_roots: bool,
}

impl<T> CheckTreeContent<T> {
    /// With `open_roots` the top-level rows come up expanded.
    pub fn new(tree: SharedCheckTree<T>, open_roots: bool) -> Self {
        CheckTreeContent { tree, open_roots }
    }
}

impl<T> ContentProvider<CheckId> for CheckTreeContent<T> {
    async fn children(&self, parent: Option<&CheckId>) -> Option<Supplied<CheckId>> {
        let tree = self.tree.lock();
        let ids = match parent {
            Some(id) => tree.children(*id),
            None => tree.roots(),
        };
        let items = ids
            .iter()
            .map(|id| TreeItem {
                data: *id,
                is_leaf: tree.is_leaf(*id),
                children: Vec::new(),
            })
            .collect();
        Some(Supplied {
            items,
            auto_open: self.open_roots && parent.is_none(),
        })
    }

    async fn resolve_href(&self, _href: &str) -> Option<Resolution<CheckId>> {
        None
    }
}

struct CheckboxLabels<T, F> {
    tree: SharedCheckTree<T>,
    label: F,
}

impl<T, F> LabelProvider<CheckId> for CheckboxLabels<T, F>
where
    F: Fn(&T) -> String,
{
    fn label(&self, id: &CheckId) -> String {
        let tree = self.tree.lock();
        let text = tree.value(*id).map(&self.label).unwrap_or_default();
        format!("{} {}", tree.state(*id).marker(), text)
    }
}

/// Non-selectable, checkbox-labeled tree over a shared [`CheckTree`].
pub fn checkbox_widget<T, F>(
    tree: SharedCheckTree<T>,
    open_roots: bool,
    label: F,
) -> TreeWidget<CheckId, CheckTreeContent<T>>
where
    T: 'static,
    F: Fn(&T) -> String + 'static,
{
    TreeWidget::new(
        CheckTreeContent::new(tree.clone(), open_roots),
        CheckboxLabels { tree, label },
        false,
    )
}

/// A visible checkbox row with the check node it shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckRow {
    pub id: usize,
    pub check: usize,
    pub depth: usize,
    pub label: String,
    pub expanded: bool,
    pub state: TriState,
}

impl<T> TreeWidget<CheckId, CheckTreeContent<T>> {
    /// Visible rows together with their checkbox state.
    pub fn check_rows(&self) -> Vec<CheckRow> {
        let rows = self.render_rows();
        let checks: Vec<Option<CheckId>> = rows.iter().map(|row| self.data(row.id)).collect();
        let tree = self.provider().tree.lock();
        rows.into_iter()
            .zip(checks)
            .filter_map(|(row, check)| {
                let check = check?;
                Some(CheckRow {
                    id: row.id.0,
                    check: check.0,
                    depth: row.depth,
                    label: row.label,
                    expanded: row.expanded,
                    state: tree.state(check),
                })
            })
            .collect()
    }
}
