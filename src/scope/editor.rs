//! Custom scope editor: the server's scope page parsed into a tri-state
//! checkbox forest of books and chapters.
use crate::{
    channel::{Fetcher, RequestChannels},
    markup::{cache_buster, decode_html, encode_component},
    scope::{parse_scope_names, ZWSP},
    tristate::{checkbox_widget, CheckId, CheckTree, CheckTreeContent, SharedCheckTree, TriState},
    tree::TreeWidget,
};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::{rc::Rc, sync::Arc};

const SCOPE_PAGE: &str = "advanced/workingSet.jsp";
const SCOPE_LIST_PAGE: &str = "advanced/workingSetManager.jsp";
const SCOPE_STATE: &str = "workingSetState.jsp";

static NAME_INPUT: Lazy<Regex> = Lazy::new(|| {
    RegexBuilder::new(
        r#"<input\s+type\s*=\s*["']text["']\s+(?:[\w\-]+\s*=\s*(?:'[^']*'|"[^"]*")\s+)*?value\s*=\s*'([^']*)'"#,
    )
    .case_insensitive(true)
    .build()
    .expect("static regex")
});
static IS_NEW: Lazy<Regex> = Lazy::new(|| {
    RegexBuilder::new(r"oldName\s*=\s*''")
        .case_insensitive(true)
        .build()
        .expect("static regex")
});
static ROW: Lazy<Regex> = Lazy::new(|| {
    RegexBuilder::new(
        r#"<input([^>]*)>[^<]*<label\s+for\s*=\s*"([^"]*)"[^>]*>([^<]*)</label>\s*(</div)?"#,
    )
    .case_insensitive(true)
    .build()
    .expect("static regex")
});
static CHECKED_ATTR: Lazy<Regex> = Lazy::new(|| {
    RegexBuilder::new(r#"(?:^|\s)checked(?:\s*=|\s|/|$)"#)
        .case_insensitive(true)
        .build()
        .expect("static regex")
});

/// A book or chapter row of the scope page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeEntry {
    /// Value sent back in `hrefs`.
    pub id: String,
    pub label: String,
}

/// An opened scope: its name and its checkbox forest.
#[derive(Debug, Clone)]
pub struct ScopeEditorPage {
    pub name: String,
    pub is_new: bool,
    pub tree: SharedCheckTree<ScopeEntry>,
}

impl ScopeEditorPage {
    /// Parse an edit/add page. Returns `None` for any other page (such as
    /// the scope list).
    pub fn parse(page: &str) -> Option<ScopeEditorPage> {
        let name = decode_html(&NAME_INPUT.captures(page)?[1]);
        let mut tree = CheckTree::new();
        let mut top: Option<CheckId> = None;
        for caps in ROW.captures_iter(page) {
            let entry = ScopeEntry {
                id: decode_html(&caps[2]),
                label: decode_html(&caps[3]),
            };
            let state = TriState::from_checked(CHECKED_ATTR.is_match(&caps[1]));
            match (caps.get(4).is_some(), top) {
                (true, Some(parent)) => {
                    tree.add(Some(parent), entry, state);
                }
                _ => top = Some(tree.add(None, entry, state)),
            }
        }
        tree.normalize();
        Some(ScopeEditorPage {
            name,
            is_new: IS_NEW.is_match(page),
            tree: Arc::new(Mutex::new(tree)),
        })
    }

    /// Click a checkbox.
    pub fn toggle(&self, id: CheckId) {
        self.tree.lock().toggle(id);
    }

    /// `&hrefs=` list: every checked entry whose parent is not checked.
    pub fn hrefs(&self) -> String {
        let tree = self.tree.lock();
        tree.checked_tops()
            .into_iter()
            .filter_map(|id| tree.value(id))
            .map(|entry| format!("&hrefs={}", encode_component(&entry.id)))
            .collect()
    }

    /// Query creating this scope under `name`.
    pub fn create_query(&self, name: &str) -> String {
        format!(
            "{SCOPE_STATE}?operation=add&oldName=&workingSet={}{}",
            encode_component(name),
            self.hrefs()
        )
    }

    /// Query storing this scope, renamed to `new_name`.
    pub fn apply_query(&self, new_name: &str) -> String {
        format!(
            "{SCOPE_STATE}?operation=edit&oldName={}&workingSet={}{}",
            encode_component(&self.name),
            encode_component(new_name),
            self.hrefs()
        )
    }

    pub fn delete_query(&self) -> String {
        format!(
            "{SCOPE_STATE}?operation=remove&workingSet={}",
            encode_component(&self.name)
        )
    }

    /// Checkbox tree for display. Top-level rows with a mixed selection are
    /// opened.
    pub async fn widget(&self) -> TreeWidget<CheckId, CheckTreeContent<ScopeEntry>> {
        let widget = checkbox_widget(self.tree.clone(), false, |entry: &ScopeEntry| {
            entry.label.clone()
        });
        widget.load_roots().await;
        let mixed: Vec<CheckId> = {
            let tree = self.tree.lock();
            tree.roots()
                .iter()
                .copied()
                .filter(|id| tree.state(*id) == TriState::Indeterminate)
                .collect()
        };
        for root in widget.roots() {
            if widget.data(root).is_some_and(|id| mixed.contains(&id)) {
                widget.expand(root).await;
            }
        }
        widget
    }
}

/// Network side of the editor.
pub struct ScopeEditor<F> {
    channels: Rc<RequestChannels<F>>,
}

impl<F: Fetcher> ScopeEditor<F> {
    pub fn new(channels: Rc<RequestChannels<F>>) -> Self {
        ScopeEditor { channels }
    }

    /// Names of the user's custom scopes.
    pub async fn list(&self) -> Vec<String> {
        let url = format!("{SCOPE_LIST_PAGE}?t={}", cache_buster());
        self.channels
            .request(&url, None)
            .await
            .map(|page| {
                parse_scope_names(&page)
                    .into_iter()
                    .filter(|n| !n.starts_with(ZWSP))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Open `name` for editing, or a blank new scope with `None`.
    pub async fn open(&self, name: Option<&str>) -> Option<ScopeEditorPage> {
        let query = match name {
            Some(name) => format!("operation=edit&workingSet={}", encode_component(name)),
            None => "operation=add".to_string(),
        };
        let url = format!("{SCOPE_PAGE}?{query}&t={}", cache_buster());
        let page = self.channels.request(&url, None).await?;
        let parsed = ScopeEditorPage::parse(&page);
        if parsed.is_none() {
            tracing::warn!("[Scope] '{}' did not answer with a scope editor page", url);
        }
        parsed
    }

    pub async fn create(&self, page: &ScopeEditorPage, name: &str) -> Vec<String> {
        self.run(page.create_query(name)).await
    }

    pub async fn apply(&self, page: &ScopeEditorPage, new_name: &str) -> Vec<String> {
        self.run(page.apply_query(new_name)).await
    }

    pub async fn delete(&self, page: &ScopeEditorPage) -> Vec<String> {
        self.run(page.delete_query()).await
    }

    /// Send an operation and return the refreshed scope list.
    async fn run(&self, query: String) -> Vec<String> {
        let url = format!("{query}&t={}", cache_buster());
        tracing::debug!("[Scope] {}", query);
        if self.channels.request(&url, None).await.is_none() {
            tracing::warn!("[Scope] Scope operation failed: {}", query);
        }
        self.list().await
    }
}
