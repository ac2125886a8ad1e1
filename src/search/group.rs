//! Full-search result grouping and the checkbox filter built on top of it.
//!
//! Results are folded by shared breadcrumb prefix. Every result has a path
//! `[href, label, …, own href, own title]`; a group is named by the
//! `(href, label)` pairs its members share below the group's location.
//! Groups whose members all continue the same way absorb the next pair
//! ("compaction"), so a chain of single-entry levels renders as one row.
use crate::{
    search::SearchResult,
    tree::TreeWidget,
    tristate::{checkbox_widget, CheckId, CheckTree, CheckTreeContent, SharedCheckTree, TriState},
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, sync::Arc};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResultEntry {
    /// Index into the result list.
    Result(usize),
    Group(ResultGroup),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultGroup {
    /// `(href, label)` pairs, flattened.
    pub name: Vec<String>,
    /// Path of the enclosing group, flattened the same way.
    pub location: Vec<String>,
    /// Number of results directly in this group.
    pub count: usize,
    pub children: Vec<ResultEntry>,
}

impl ResultGroup {
    /// Labels of the name pairs joined with ` > `.
    pub fn label(&self) -> String {
        self.name
            .iter()
            .skip(1)
            .step_by(2)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" > ")
    }

    /// Path prefix shared by every member, `\n`-joined.
    pub fn value(&self) -> String {
        self.location
            .iter()
            .chain(&self.name)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn subgroups(&self) -> impl Iterator<Item = &ResultGroup> {
        self.children.iter().filter_map(|c| match c {
            ResultEntry::Group(g) => Some(g),
            ResultEntry::Result(_) => None,
        })
    }

    /// Move the first `n` name entries into the location.
    fn shift(&mut self, n: usize) {
        let n = n.min(self.name.len());
        self.location.extend(self.name.drain(..n));
    }
}

struct Paths {
    full: Vec<Vec<String>>,
    /// Length of the flattened breadcrumb part of each path.
    crumbs: Vec<usize>,
}

struct Pending {
    name: Vec<String>,
    location: Vec<String>,
    members: Vec<usize>,
}

enum Slot {
    Result(usize),
    Group(usize),
}

/// Fold `results` into groups, recursing at most `depth` levels.
pub fn group_results(results: &[SearchResult], depth: usize) -> Vec<ResultEntry> {
    let paths = Paths {
        full: results.iter().map(SearchResult::tree_path).collect(),
        crumbs: results.iter().map(|r| r.breadcrumb.len() * 2).collect(),
    };
    as_tree(&paths, (0..results.len()).collect(), &[], depth)
}

fn pair_key(href: &str, label: &str) -> String {
    format!("{href}\n{label}")
}

fn as_tree(paths: &Paths, members: Vec<usize>, path: &[String], depth: usize) -> Vec<ResultEntry> {
    if depth < 1 {
        return members.into_iter().map(ResultEntry::Result).collect();
    }
    let level = path.len();
    let mut slots = Vec::new();
    let mut pending: Vec<Pending> = Vec::new();
    let mut by_key: HashMap<String, usize> = HashMap::new();
    for i in members {
        let full = &paths.full[i];
        let pair = (full.get(level), full.get(level + 1));
        let (Some(href), Some(label)) = pair else {
            slots.push(Slot::Result(i));
            continue;
        };
        if paths.crumbs[i] <= level {
            slots.push(Slot::Result(i));
            continue;
        }
        let key = pair_key(href, label);
        match by_key.get(&key) {
            Some(g) => pending[*g].members.push(i),
            None => {
                by_key.insert(key, pending.len());
                slots.push(Slot::Group(pending.len()));
                pending.push(Pending {
                    name: vec![href.clone(), label.clone()],
                    location: path.to_vec(),
                    members: vec![i],
                });
            }
        }
    }

    // A result that is itself the topic a group is named after joins it.
    slots.retain(|slot| {
        let Slot::Result(i) = slot else {
            return true;
        };
        let full = &paths.full[*i];
        let [.., href, title] = full.as_slice() else {
            return true;
        };
        match by_key.get(&pair_key(href, title)) {
            Some(g) => {
                pending[*g].members.push(*i);
                false
            }
            None => true,
        }
    });

    let mut built: Vec<Option<Pending>> = pending.into_iter().map(Some).collect();
    slots
        .into_iter()
        .filter_map(|slot| match slot {
            Slot::Result(i) => Some(ResultEntry::Result(i)),
            Slot::Group(g) => built[g].take().map(|mut group| {
                compact(paths, level, &mut group);
                let count = group.members.len();
                let child_path: Vec<String> = group
                    .members
                    .first()
                    .map(|first| {
                        let full = &paths.full[*first];
                        full[..(level + group.name.len()).min(full.len())].to_vec()
                    })
                    .unwrap_or_default();
                ResultEntry::Group(ResultGroup {
                    children: as_tree(paths, group.members, &child_path, depth - 1),
                    name: group.name,
                    location: group.location,
                    count,
                })
            }),
        })
        .collect()
}

fn compact(paths: &Paths, level: usize, group: &mut Pending) {
    let mut i = level + 2;
    while let Some(first) = group.members.first().copied() {
        if group.members.len() == 1 && paths.crumbs[first] == i {
            return;
        }
        let p0 = &paths.full[first];
        let shared = group.members.iter().all(|m| {
            let p = &paths.full[*m];
            p.len() >= i + 2 && p0.len() >= i + 2 && p[i] == p0[i] && p[i + 1] == p0[i + 1]
        });
        if !shared {
            return;
        }
        group.name.push(p0[i].clone());
        group.name.push(p0[i + 1].clone());
        i += 2;
    }
}

/// Drop the levels a Book/Chapter scope already implies. `chain_len` is the
/// number of nodes from the book down to the scoped node.
pub fn cut_off_scope(tree: Vec<ResultEntry>, chain_len: usize) -> Vec<ResultEntry> {
    if chain_len == 0 || tree.len() != 1 {
        return tree;
    }
    let mut tree = tree;
    let top = match tree.pop() {
        Some(ResultEntry::Group(top)) => top,
        Some(other) => return vec![other],
        None => return tree,
    };
    let scope = chain_len * 2;
    if top.name.len() > scope {
        let mut top = top;
        top.shift(scope);
        return vec![ResultEntry::Group(top)];
    }
    let after = scope - top.name.len();
    let mut children = top.children;
    if after > 0 {
        if let Some(ResultEntry::Group(first)) = children.first_mut() {
            if first.name.len() <= after {
                return std::mem::take(&mut first.children);
            }
            first.shift(after);
        }
    }
    children
}

/// Row of the filter tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterEntry {
    /// Path prefix this row stands for; empty for the root row.
    pub value: String,
    pub label: String,
    pub count: usize,
    /// Checked, but some results below are filtered out.
    pub partial: bool,
}

fn has_prefix(prefix: &str, path: &str) -> bool {
    prefix.is_empty()
        || path == prefix
        || (path.starts_with(prefix) && path[prefix.len()..].starts_with('\n'))
}

/// Checkbox filter over grouped full-search results. A result is shown iff a
/// checked row's value prefixes its path and no unchecked row's value does.
#[derive(Debug, Clone)]
pub struct ResultFilter {
    tree: SharedCheckTree<FilterEntry>,
    root: CheckId,
    paths: Vec<String>,
}

impl ResultFilter {
    pub fn new(results: &[SearchResult], groups: &[ResultEntry], root_label: &str) -> Self {
        let mut tree = CheckTree::new();
        let root = tree.add(
            None,
            FilterEntry {
                value: String::new(),
                label: root_label.to_string(),
                count: results.len(),
                partial: false,
            },
            TriState::Checked,
        );
        Self::add_groups(&mut tree, root, groups);
        ResultFilter {
            tree: Arc::new(Mutex::new(tree)),
            root,
            paths: results
                .iter()
                .map(|r| r.tree_path().join("\n"))
                .collect(),
        }
    }

    fn add_groups(tree: &mut CheckTree<FilterEntry>, parent: CheckId, entries: &[ResultEntry]) {
        for entry in entries {
            if let ResultEntry::Group(group) = entry {
                let id = tree.add(
                    Some(parent),
                    FilterEntry {
                        value: group.value(),
                        label: group.label(),
                        count: group.count,
                        partial: false,
                    },
                    TriState::Checked,
                );
                Self::add_groups(tree, id, &group.children);
            }
        }
    }

    pub fn tree(&self) -> SharedCheckTree<FilterEntry> {
        self.tree.clone()
    }

    pub fn root(&self) -> CheckId {
        self.root
    }

    /// Click on a group's checkbox.
    pub fn toggle(&self, id: CheckId) {
        let mut tree = self.tree.lock();
        let checked = tree.state(id) != TriState::Checked;
        Self::set_subtree(&mut tree, id, checked);
        Self::settle_ancestors(&mut tree, id);
    }

    /// Show only the results below `id`.
    pub fn only(&self, id: CheckId) {
        let mut tree = self.tree.lock();
        Self::set_subtree(&mut tree, self.root, false);
        Self::set_subtree(&mut tree, id, true);
        Self::settle_ancestors(&mut tree, id);
    }

    fn set_subtree(tree: &mut CheckTree<FilterEntry>, id: CheckId, checked: bool) {
        for node in tree.subtree(id) {
            tree.set_state(node, TriState::from_checked(checked));
            if let Some(entry) = tree.value_mut(node) {
                entry.partial = false;
            }
        }
    }

    // Parents are derived from result counts rather than child states, since
    // a group may hold results that are in none of its subgroups.
    fn settle_ancestors(tree: &mut CheckTree<FilterEntry>, id: CheckId) {
        for parent in tree.ancestors(id) {
            let mut checked = 0;
            let mut unchecked = 0;
            let mut total = 0;
            let mut mixed = 0;
            let mut all_unchecked = true;
            let mut partial = false;
            for child in tree.children(parent) {
                let count = tree.value(*child).map(|e| e.count).unwrap_or_default();
                partial |= tree.value(*child).is_some_and(|e| e.partial);
                match tree.state(*child) {
                    TriState::Indeterminate => {
                        mixed += 1;
                        all_unchecked = false;
                        partial = true;
                    }
                    TriState::Checked => {
                        checked += count;
                        total += count;
                        all_unchecked = false;
                    }
                    TriState::Unchecked => {
                        unchecked += count;
                        total += count;
                        partial = true;
                    }
                }
            }
            let own = tree.value(parent).map(|e| e.count).unwrap_or_default();
            let state = tree.state(parent);
            if checked == own && !partial {
                tree.set_state(parent, TriState::Checked);
                if let Some(entry) = tree.value_mut(parent) {
                    entry.partial = false;
                }
            } else if unchecked == own || (state == TriState::Indeterminate && all_unchecked) {
                tree.set_state(parent, TriState::Unchecked);
            } else if total == own
                || (state == TriState::Unchecked && (mixed > 0 || checked > 0 || partial))
            {
                tree.set_state(parent, TriState::Indeterminate);
            } else if let Some(entry) = tree.value_mut(parent) {
                entry.partial = partial;
            }
        }
    }

    pub fn is_visible(&self, index: usize) -> bool {
        let Some(path) = self.paths.get(index) else {
            return false;
        };
        let tree = self.tree.lock();
        let mut included = false;
        for id in tree.ids() {
            let Some(entry) = tree.value(id) else {
                continue;
            };
            if !has_prefix(&entry.value, path) {
                continue;
            }
            match tree.state(id) {
                TriState::Unchecked => return false,
                TriState::Checked => included = true,
                TriState::Indeterminate => {}
            }
        }
        included
    }

    /// Visibility of every result, in result order.
    pub fn visible(&self) -> Vec<bool> {
        (0..self.paths.len()).map(|i| self.is_visible(i)).collect()
    }

    /// Checkbox tree for display; the root row starts expanded.
    pub fn widget(&self) -> TreeWidget<CheckId, CheckTreeContent<FilterEntry>> {
        checkbox_widget(self.tree.clone(), true, |entry: &FilterEntry| {
            format!("{} ({})", entry.label, entry.count)
        })
    }
}
