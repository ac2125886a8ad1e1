//! Generic lazily-loaded tree control.
//!
//! The control is split in two layers:
//!
//! - [`Tree`] is the synchronous arena: nodes addressed by [`NodeId`], parent
//!   and children stored as indices, a three-state loading marker per node,
//!   the expansion flags and the single selection.
//! - [`TreeWidget`] pairs a [`Tree`] with a [`ContentProvider`] and a
//!   [`LabelProvider`], and runs the asynchronous parts: lazy child loading,
//!   deep-link resolution and key handling.
//!
//! The widget never renders anything itself. [`TreeWidget::render_rows`]
//! produces the visible rows so any front end (DOM, terminal, tests) can draw
//! them.
//!
//! Invariants kept by [`Tree`]:
//!
//! - a leaf node never has children;
//! - at most one node is selected;
//! - every ancestor of the selected node is expanded.
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::future::Future;

pub mod keys;

pub use keys::{key_action, KeyAction, TreeKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub usize);

/// Loading marker of a node's (or the root's) child list.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Children {
    #[default]
    Unloaded,
    Loading,
    Loaded(Vec<NodeId>),
}

impl Children {
    pub fn ids(&self) -> &[NodeId] {
        match self {
            Children::Loaded(ids) => ids,
            _ => &[],
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self, Children::Loaded(_))
    }
}

/// A node descriptor as handed out by a [`ContentProvider`]. `children` holds
/// descendants the provider already knows about; they are only used while
/// resolving a deep link.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeItem<N> {
    pub data: N,
    pub is_leaf: bool,
    pub children: Vec<TreeItem<N>>,
}

impl<N> TreeItem<N> {
    pub fn leaf(data: N) -> Self {
        TreeItem {
            data,
            is_leaf: true,
            children: Vec::new(),
        }
    }

    pub fn branch(data: N, children: Vec<TreeItem<N>>) -> Self {
        TreeItem {
            data,
            is_leaf: false,
            children,
        }
    }
}

/// Answer of [`ContentProvider::children`].
#[derive(Debug, Clone, PartialEq)]
pub struct Supplied<N> {
    pub items: Vec<TreeItem<N>>,
    /// Expand every supplied non-leaf child right away.
    pub auto_open: bool,
}

impl<N> Supplied<N> {
    pub fn new(items: Vec<TreeItem<N>>) -> Self {
        Supplied {
            items,
            auto_open: false,
        }
    }
}

/// Answer of [`ContentProvider::resolve_href`]: the numeric index path of the
/// target (first segment indexes the roots) and the top-level items of the
/// resolution response, whose preloaded children cover the path.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution<N> {
    pub expand_path: Vec<usize>,
    pub items: Vec<TreeItem<N>>,
}

impl<N> Resolution<N> {
    /// Parse an underscore-separated numeric path such as `2_0_1`.
    pub fn parse_path(path: &str) -> Option<Vec<usize>> {
        if path.is_empty() {
            return None;
        }
        path.split('_').map(|seg| seg.trim().parse().ok()).collect()
    }
}

/// Lazy content hook. `parent == None` asks for the root children. `None`
/// answers mean the content could not be obtained; the tree stays as it was.
pub trait ContentProvider<N> {
    fn children(&self, parent: Option<&N>) -> impl Future<Output = Option<Supplied<N>>>;

    fn resolve_href(&self, href: &str) -> impl Future<Output = Option<Resolution<N>>>;
}

/// Builds the visible label of a node. The widget attaches no meaning to it.
pub trait LabelProvider<N> {
    fn label(&self, data: &N) -> String;
}

impl<N, F> LabelProvider<N> for F
where
    F: Fn(&N) -> String,
{
    fn label(&self, data: &N) -> String {
        self(data)
    }
}

#[derive(Debug, Clone)]
pub struct TreeNode<N> {
    pub data: N,
    pub is_leaf: bool,
    pub parent: Option<NodeId>,
    pub children: Children,
    pub expanded: bool,
    pub selected: bool,
}

#[derive(Debug, Clone)]
pub struct Tree<N> {
    nodes: Vec<TreeNode<N>>,
    roots: Children,
    selected: Option<NodeId>,
}

impl<N> Default for Tree<N> {
    fn default() -> Self {
        Tree {
            nodes: Vec::new(),
            roots: Children::Unloaded,
            selected: None,
        }
    }
}

impl<N> Tree<N> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> Option<&TreeNode<N>> {
        self.nodes.get(id.0)
    }

    pub fn data(&self, id: NodeId) -> Option<&N> {
        self.node(id).map(|n| &n.data)
    }

    pub fn selected(&self) -> Option<NodeId> {
        self.selected
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).and_then(|n| n.parent)
    }

    pub fn is_expanded(&self, id: NodeId) -> bool {
        self.node(id).map(|n| n.expanded).unwrap_or(false)
    }

    pub fn roots(&self) -> &[NodeId] {
        self.roots.ids()
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).map(|n| n.children.ids()).unwrap_or(&[])
    }

    /// Children list of `parent`, the roots for `None`.
    pub fn child_list(&self, parent: Option<NodeId>) -> &[NodeId] {
        match parent {
            Some(id) => self.children(id),
            None => self.roots(),
        }
    }

    pub fn children_state(&self, parent: Option<NodeId>) -> Option<&Children> {
        match parent {
            Some(id) => self.node(id).map(|n| &n.children),
            None => Some(&self.roots),
        }
    }

    /// Ancestors of `id`, nearest first.
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut chain = Vec::new();
        let mut current = self.parent(id);
        while let Some(p) = current {
            chain.push(p);
            current = self.parent(p);
        }
        chain
    }

    /// `id` and its ancestors, nearest first.
    pub fn chain(&self, id: NodeId) -> Vec<NodeId> {
        let mut chain = vec![id];
        chain.extend(self.ancestors(id));
        chain
    }

    pub fn siblings(&self, id: NodeId) -> &[NodeId] {
        self.child_list(self.parent(id))
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let siblings = self.siblings(id);
        let pos = siblings.iter().position(|s| *s == id)?;
        siblings.get(pos + 1).copied()
    }

    pub fn previous_sibling(&self, id: NodeId) -> Option<NodeId> {
        let siblings = self.siblings(id);
        let pos = siblings.iter().position(|s| *s == id)?;
        pos.checked_sub(1).and_then(|p| siblings.get(p).copied())
    }

    /// Follow the last child of every expanded node starting at `id`.
    pub fn deepest_visible(&self, id: NodeId) -> NodeId {
        let mut current = id;
        while self.is_expanded(current) {
            match self.children(current).last() {
                Some(last) => current = *last,
                None => break,
            }
        }
        current
    }

    /// Index path of `id` from the roots, the same shape a deep link uses.
    pub fn index_path(&self, id: NodeId) -> Vec<usize> {
        let mut path = Vec::new();
        for node in self.chain(id) {
            let siblings = self.siblings(node);
            if let Some(pos) = siblings.iter().position(|s| *s == node) {
                path.push(pos);
            }
        }
        path.reverse();
        path
    }

    /// Move an unloaded child list to `Loading`. Returns false when the list
    /// is already loading or loaded, or belongs to a leaf.
    pub fn begin_loading(&mut self, parent: Option<NodeId>) -> bool {
        let state = match parent {
            Some(id) => match self.nodes.get_mut(id.0) {
                Some(node) if !node.is_leaf => &mut node.children,
                _ => return false,
            },
            None => &mut self.roots,
        };
        if *state == Children::Unloaded {
            *state = Children::Loading;
            true
        } else {
            false
        }
    }

    /// Return a list stuck in `Loading` to `Unloaded` so a later expansion
    /// can try again.
    pub fn abandon_loading(&mut self, parent: Option<NodeId>) {
        let state = match parent {
            Some(id) => match self.nodes.get_mut(id.0) {
                Some(node) => &mut node.children,
                None => return,
            },
            None => &mut self.roots,
        };
        if *state == Children::Loading {
            *state = Children::Unloaded;
        }
    }

    /// Materialize `items` as the children of `parent`. Lists that are
    /// already loaded are kept and the new items dropped.
    pub fn attach(&mut self, parent: Option<NodeId>, items: Vec<TreeItem<N>>) -> Vec<NodeId> {
        match self.children_state(parent) {
            None => return Vec::new(),
            Some(Children::Loaded(_)) => {
                tracing::debug!("[Tree] Children of {:?} already loaded, dropping", parent);
                return Vec::new();
            }
            Some(_) => {}
        }
        if let Some(node) = parent.and_then(|id| self.node(id)) {
            if node.is_leaf {
                tracing::warn!("[Tree] Refusing to attach children to leaf {:?}", parent);
                return Vec::new();
            }
        }
        let mut ids = Vec::with_capacity(items.len());
        for item in items {
            let id = NodeId(self.nodes.len());
            self.nodes.push(TreeNode {
                data: item.data,
                is_leaf: item.is_leaf,
                parent,
                children: Children::Unloaded,
                expanded: false,
                selected: false,
            });
            ids.push(id);
        }
        let loaded = Children::Loaded(ids.clone());
        match parent {
            Some(p) => self.nodes[p.0].children = loaded,
            None => self.roots = loaded,
        }
        ids
    }

    pub fn set_expanded(&mut self, id: NodeId, expanded: bool) {
        if let Some(node) = self.nodes.get_mut(id.0) {
            if !node.is_leaf {
                node.expanded = expanded;
            }
        }
    }

    /// Select `id` (or clear the selection with `None`). Collapsed ancestors
    /// are expanded; with `close_siblings` every expanded sibling of the node
    /// and of its ancestors is collapsed.
    pub fn select(&mut self, id: Option<NodeId>, close_siblings: bool) {
        if let Some(old) = self.selected.take() {
            if let Some(node) = self.nodes.get_mut(old.0) {
                node.selected = false;
            }
        }
        let Some(id) = id.filter(|id| id.0 < self.nodes.len()) else {
            return;
        };
        self.nodes[id.0].selected = true;
        self.selected = Some(id);
        for ancestor in self.ancestors(id) {
            self.set_expanded(ancestor, true);
        }
        if close_siblings {
            for on_path in self.chain(id) {
                let others: Vec<NodeId> = self
                    .siblings(on_path)
                    .iter()
                    .copied()
                    .filter(|s| *s != on_path)
                    .collect();
                for other in others {
                    self.set_expanded(other, false);
                }
            }
        }
    }

    /// Nearest-first traversal over the materialized nodes. The selected
    /// node's subtree comes first (depth first), then walking outwards one
    /// level at a time: the parent, then the next siblings nearest first,
    /// then the previous siblings nearest first, each with its subtree.
    /// Without a selection the roots are visited in order. Stops as soon as
    /// `visitor` returns false.
    pub fn visit<F>(&self, mut visitor: F)
    where
        F: FnMut(NodeId, &N) -> bool,
    {
        let mut anchor = self.selected;
        let mut todo: Vec<NodeId> = match anchor {
            Some(id) => vec![id],
            None => self.roots().iter().rev().copied().collect(),
        };
        while !todo.is_empty() || anchor.is_some() {
            let next = if let Some(id) = todo.pop() {
                todo.extend(self.children(id).iter().rev().copied());
                id
            } else {
                let Some(current) = anchor else { break };
                let mut nearby: Vec<NodeId> = Vec::new();
                let mut sibling = self.next_sibling(current);
                while let Some(s) = sibling {
                    nearby.insert(0, s);
                    sibling = self.next_sibling(s);
                }
                sibling = self.previous_sibling(current);
                while let Some(s) = sibling {
                    nearby.insert(0, s);
                    sibling = self.previous_sibling(s);
                }
                todo = nearby;
                match self.parent(current) {
                    Some(parent) => {
                        anchor = Some(parent);
                        parent
                    }
                    None => {
                        anchor = None;
                        continue;
                    }
                }
            };
            if let Some(data) = self.data(next) {
                if !visitor(next, data) {
                    return;
                }
            }
        }
    }

    /// Visible nodes in display order with their depth.
    pub fn visible(&self) -> Vec<(NodeId, usize)> {
        let mut out = Vec::new();
        let mut stack: Vec<(NodeId, usize)> = self.roots().iter().rev().map(|id| (*id, 0)).collect();
        while let Some((id, depth)) = stack.pop() {
            out.push((id, depth));
            if self.is_expanded(id) {
                stack.extend(self.children(id).iter().rev().map(|c| (*c, depth + 1)));
            }
        }
        out
    }
}

/// One visible row of a rendered tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeRow {
    pub id: NodeId,
    pub depth: usize,
    pub label: String,
    pub is_leaf: bool,
    pub expanded: bool,
    pub selected: bool,
    /// Ancestor of the selected node.
    pub on_selection_path: bool,
}

pub struct TreeWidget<N, P> {
    provider: P,
    labels: Box<dyn LabelProvider<N>>,
    selectable: bool,
    right_to_left: bool,
    tree: Mutex<Tree<N>>,
}

impl<N: Clone, P: ContentProvider<N>> TreeWidget<N, P> {
    pub fn new<L>(provider: P, labels: L, selectable: bool) -> Self
    where
        L: LabelProvider<N> + 'static,
    {
        TreeWidget {
            provider,
            labels: Box::new(labels),
            selectable,
            right_to_left: false,
            tree: Mutex::new(Tree::new()),
        }
    }

    pub fn with_right_to_left(mut self, right_to_left: bool) -> Self {
        self.right_to_left = right_to_left;
        self
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn is_selectable(&self) -> bool {
        self.selectable
    }

    /// Run `f` against the current tree state. `f` must not call back into
    /// the widget.
    pub fn read<R>(&self, f: impl FnOnce(&Tree<N>) -> R) -> R {
        f(&self.tree.lock())
    }

    /// Mutate the tree state directly, for callers that manage node data
    /// themselves (e.g. checkbox state kept in `N`).
    pub fn write<R>(&self, f: impl FnOnce(&mut Tree<N>) -> R) -> R {
        f(&mut self.tree.lock())
    }

    pub fn selected(&self) -> Option<NodeId> {
        self.tree.lock().selected()
    }

    pub fn data(&self, id: NodeId) -> Option<N> {
        self.tree.lock().data(id).cloned()
    }

    pub fn is_expanded(&self, id: NodeId) -> bool {
        self.tree.lock().is_expanded(id)
    }

    pub fn roots(&self) -> Vec<NodeId> {
        self.tree.lock().roots().to_vec()
    }

    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.tree.lock().children(id).to_vec()
    }

    /// Data of the selected node followed by its ancestors'.
    pub fn selection_chain(&self) -> Vec<N> {
        let tree = self.tree.lock();
        match tree.selected() {
            Some(id) => tree
                .chain(id)
                .into_iter()
                .filter_map(|n| tree.data(n).cloned())
                .collect(),
            None => Vec::new(),
        }
    }

    /// Fetch the root children if they have not been requested yet.
    pub async fn load_roots(&self) {
        self.load(None).await;
    }

    /// Flip the expansion of `id`, loading its children on first expansion.
    /// Collapsing never drops loaded children.
    pub async fn toggle(&self, id: NodeId) {
        let needs_load = {
            let mut tree = self.tree.lock();
            let Some(node) = tree.node(id) else { return };
            if node.is_leaf {
                return;
            }
            let expanded = !node.expanded;
            tree.set_expanded(id, expanded);
            expanded && tree.children_state(Some(id)) == Some(&Children::Unloaded)
        };
        if needs_load {
            self.load(Some(id)).await;
        }
    }

    pub async fn expand(&self, id: NodeId) {
        if !self.is_expanded(id) {
            self.toggle(id).await;
        }
    }

    pub fn collapse(&self, id: NodeId) {
        self.tree.lock().set_expanded(id, false);
    }

    /// Select `id`, or clear the selection with `None`. Ignored by
    /// non-selectable trees.
    pub fn select(&self, id: Option<NodeId>, close_siblings: bool) -> bool {
        if !self.selectable {
            return false;
        }
        self.tree.lock().select(id, close_siblings);
        true
    }

    pub fn visit<F>(&self, visitor: F)
    where
        F: FnMut(NodeId, &N) -> bool,
    {
        self.tree.lock().visit(visitor)
    }

    /// First node, nearest to the selection, whose data satisfies `pred`.
    pub fn find<F>(&self, mut pred: F) -> Option<NodeId>
    where
        F: FnMut(&N) -> bool,
    {
        let mut found = None;
        self.visit(|id, data| {
            if pred(data) {
                found = Some(id);
                return false;
            }
            true
        });
        found
    }

    /// Resolve `href` through the content provider and select the node it
    /// names, materializing every level on the way from the preloaded
    /// descendants of the resolution answer. Any failure clears the
    /// selection.
    pub async fn navigate_to_href(&self, href: &str, close_siblings: bool) -> Option<NodeId> {
        let resolution = self.provider.resolve_href(href).await;
        let Some(resolution) = resolution.filter(|r| !r.expand_path.is_empty()) else {
            tracing::debug!("[Tree] Could not resolve '{}', clearing selection", href);
            self.select(None, false);
            return None;
        };
        if self.read(|t| !t.roots.is_loaded()) {
            self.load(None).await;
        }

        let mut tree = self.tree.lock();
        let mut source = resolution.items;
        let mut parent: Option<NodeId> = None;
        for (depth, nr) in resolution.expand_path.iter().copied().enumerate() {
            if parent.is_some() && !tree.children_state(parent).is_some_and(Children::is_loaded) {
                tree.attach(parent, source.clone());
            }
            let Some(id) = tree.child_list(parent).get(nr).copied() else {
                tracing::debug!(
                    "[Tree] Deep link for '{}' broke at depth {} (index {})",
                    href,
                    depth,
                    nr
                );
                if self.selectable {
                    tree.select(None, false);
                }
                return None;
            };
            let idx = if depth == 0 { 0 } else { nr };
            source = source
                .into_iter()
                .nth(idx)
                .map(|item| item.children)
                .unwrap_or_default();
            parent = Some(id);
        }
        if self.selectable {
            tree.select(parent, close_siblings);
        }
        parent
    }

    /// Apply a navigation key to the focused node and return the node that
    /// should receive focus next.
    pub async fn handle_key(&self, focused: NodeId, key: TreeKey) -> Option<NodeId> {
        let key = key.mirrored(self.right_to_left);
        let action = self.read(|tree| key_action(tree, focused, key));
        match action {
            KeyAction::Toggle(id) => {
                self.toggle(id).await;
                Some(id)
            }
            KeyAction::Focus(id) => Some(id),
            KeyAction::Stay => Some(focused),
        }
    }

    pub fn render_rows(&self) -> Vec<TreeRow> {
        let tree = self.tree.lock();
        let path = tree
            .selected()
            .map(|id| tree.ancestors(id))
            .unwrap_or_default();
        tree.visible()
            .into_iter()
            .filter_map(|(id, depth)| {
                let node = tree.node(id)?;
                Some(TreeRow {
                    id,
                    depth,
                    label: self.labels.label(&node.data),
                    is_leaf: node.is_leaf,
                    expanded: node.expanded,
                    selected: node.selected,
                    on_selection_path: path.contains(&id),
                })
            })
            .collect()
    }

    /// Indented plain-text rendering of the visible rows.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        for row in self.render_rows() {
            let marker = match (row.is_leaf, row.expanded) {
                (true, _) => ' ',
                (false, true) => '-',
                (false, false) => '+',
            };
            let selected = if row.selected { " *" } else { "" };
            out.push_str(&format!(
                "{}{} {}{}\n",
                "  ".repeat(row.depth),
                marker,
                row.label,
                selected
            ));
        }
        out
    }

    async fn load(&self, parent: Option<NodeId>) {
        let mut pending = vec![parent];
        while let Some(parent) = pending.pop() {
            let data = {
                let mut tree = self.tree.lock();
                if !tree.begin_loading(parent) {
                    continue;
                }
                match parent {
                    Some(id) => tree.data(id).cloned(),
                    None => None,
                }
            };
            if parent.is_some() && data.is_none() {
                continue;
            }
            let supplied = self.provider.children(data.as_ref()).await;
            let mut tree = self.tree.lock();
            let Some(supplied) = supplied else {
                tracing::debug!("[Tree] No children supplied for {:?}", parent);
                tree.abandon_loading(parent);
                continue;
            };
            let ids = tree.attach(parent, supplied.items);
            if supplied.auto_open {
                for id in ids {
                    if tree.node(id).is_some_and(|n| !n.is_leaf) {
                        tree.set_expanded(id, true);
                        pending.push(Some(id));
                    }
                }
            }
        }
    }
}
