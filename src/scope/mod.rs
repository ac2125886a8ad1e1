//! Search scope management.
//!
//! The active scope restricts searches to the selected book, the selected
//! chapter, or a named custom scope. Book, chapter and custom scopes are
//! registered with the server under names made of zero-width spaces, so the
//! legacy UI and the server agree on what is active.
use crate::{
    channel::{Fetcher, RequestChannels},
    config::{ClientState, ViewerConfig, BOOK_SCOPE_MARKER},
    markup::{decode_html, encode_component},
    toc::TocNode,
};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::rc::Rc;

pub mod editor;

pub const ZWSP: char = '\u{200B}';

const SEARCH_PAGE: &str = "advanced/search.jsp";
const SCOPE_STATE: &str = "workingSetState.jsp";
const SCOPE_MANAGER: &str = "advanced/workingSetManager.jsp";
const LEGACY_SCOPE_RESET: &str = "scopeState.jsp?workingSet=";

pub const LABEL_ALL: &str = "All";
pub const LABEL_BOOK: &str = "Book";
pub const LABEL_CHAPTER: &str = "Chapter";
pub const LABEL_SCOPES: &str = "Scopes...";

static CURRENT_SCOPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<div\s+id\s*=\s*"scope"\s*>([^<]*)<"#).expect("static regex"));
static SCOPE_TITLE: Lazy<Regex> = Lazy::new(|| {
    RegexBuilder::new(r#"<a\s+(?:[\w\-]+\s*=\s*(?:'[^']*'|"[^"]*")\s+)*?title\s*=\s*"([^"]*)""#)
        .case_insensitive(true)
        .build()
        .expect("static regex")
});
static BOOK_NAME_SUFFIX: Lazy<Regex> = Lazy::new(|| {
    RegexBuilder::new(r"\s+(Documentation\s*)?(-\s+([0-9,\-]+\s+)?Preview(\s+[0-9,\-]+)?\s*)?$")
        .case_insensitive(true)
        .build()
        .expect("static regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ScopeLevel {
    #[default]
    None,
    Book,
    Chapter,
    Custom,
}

/// Live scope state.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Scope {
    #[default]
    None,
    Book,
    Chapter,
    /// `index` is the position among the user's custom scopes; it picks the
    /// server registration name.
    Custom { name: String, index: usize },
}

impl Scope {
    pub fn level(&self) -> ScopeLevel {
        match self {
            Scope::None => ScopeLevel::None,
            Scope::Book => ScopeLevel::Book,
            Scope::Chapter => ScopeLevel::Chapter,
            Scope::Custom { .. } => ScopeLevel::Custom,
        }
    }

    pub fn custom_name(&self) -> Option<&str> {
        match self {
            Scope::Custom { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Zero-width-space name registered with the server, `None` for no scope.
    pub fn registration_name(&self) -> Option<String> {
        let count = match self {
            Scope::None => return None,
            Scope::Book => 1,
            Scope::Chapter => 2,
            Scope::Custom { index, .. } => index + 3,
        };
        Some(std::iter::repeat(ZWSP).take(count).collect())
    }

    /// Decode a registration name. Custom scopes come back without a name.
    pub fn from_registration(name: &str) -> Option<Scope> {
        if name.is_empty() || !name.chars().all(|c| c == ZWSP) {
            return None;
        }
        match name.chars().count() {
            1 => Some(Scope::Book),
            2 => Some(Scope::Chapter),
            n => Some(Scope::Custom {
                name: String::new(),
                index: n - 3,
            }),
        }
    }
}

/// Server request (relative, without cache buster) that moves the
/// registration from `old` to `new`, or `None` when nothing changes.
pub fn transition_query(old: &Scope, new: &Scope) -> Option<String> {
    let remove = old.registration_name();
    let add = new.registration_name();
    if remove == add {
        return None;
    }
    let query = match (remove, add) {
        (Some(remove), Some(add)) => format!(
            "operation=edit&oldName={}&workingSet={}",
            encode_component(&remove),
            encode_component(&add)
        ),
        (Some(remove), None) => format!("operation=remove&workingSet={}", encode_component(&remove)),
        (None, Some(add)) => format!("operation=add&workingSet={}", encode_component(&add)),
        (None, None) => return None,
    };
    Some(format!("{SCOPE_STATE}?{query}"))
}

/// Strip a trailing "Documentation" / "- Preview ..." from a book title.
pub fn shorten_book_name(name: &str) -> String {
    BOOK_NAME_SUFFIX.replace(name, "").into_owned()
}

/// Scope names listed on the scope manager page, decoded, in page order.
pub fn parse_scope_names(page: &str) -> Vec<String> {
    SCOPE_TITLE
        .captures_iter(page)
        .map(|caps| decode_html(&caps[1]))
        .collect()
}

/// Name shown in the `scope` element of the search page.
pub fn parse_current_scope(page: &str) -> Option<String> {
    CURRENT_SCOPE
        .captures(page)
        .map(|caps| caps[1].to_string())
}

/// Rebuild the scope state from the search page (which names the active
/// scope) and the scope manager page (which lists all registrations).
pub fn restore_scope(current: Option<&str>, names: &[String]) -> Scope {
    let mut scope = Scope::None;
    let mut index = 0;
    for name in names {
        if name.starts_with(ZWSP) {
            match Scope::from_registration(name) {
                Some(Scope::Custom { index: i, .. }) => {
                    scope = Scope::Custom {
                        name: String::new(),
                        index: i,
                    };
                    continue;
                }
                Some(found) => return found,
                None => continue,
            }
        }
        if current.is_some_and(|c| c == name) {
            return Scope::Custom {
                name: name.clone(),
                index,
            };
        }
        if let Scope::Custom { name: n, index: i } = &mut scope {
            if *i == index {
                *n = name.clone();
            }
        }
        index += 1;
    }
    scope
}

/// Frozen description of a scope, attached to a search query.
///
/// Two snapshots are equal when they restrict a search the same way; the
/// title chain is presentation only.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScopeSnapshot {
    pub level: ScopeLevel,
    pub custom_name: Option<String>,
    pub toc: Option<String>,
    pub path: Option<String>,
    /// Book → … → scoped node.
    pub chain: Vec<TocNode>,
}

impl PartialEq for ScopeSnapshot {
    fn eq(&self, other: &Self) -> bool {
        self.level == other.level
            && self.custom_name == other.custom_name
            && self.toc == other.toc
            && self.path == other.path
    }
}

impl Eq for ScopeSnapshot {}

impl ScopeSnapshot {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn custom(name: &str) -> Self {
        ScopeSnapshot {
            level: ScopeLevel::Custom,
            custom_name: Some(name.to_string()),
            ..Default::default()
        }
    }

    /// Human readable scope: the custom name, or the chain titles joined
    /// with ` > `.
    pub fn label(&self) -> String {
        let mut label = match self.level {
            ScopeLevel::Custom => self.custom_name.clone().unwrap_or_default(),
            _ => String::new(),
        };
        let titles: Vec<&str> = self.chain.iter().map(|n| n.title.as_str()).collect();
        label.push_str(&titles.join(" > "));
        label
    }
}

/// The node a Book or Chapter scope applies to, walking up from the
/// selection (`chain` is nearest first): the book, or for chapters the first
/// non-leaf node.
pub fn scoped_node(level: ScopeLevel, chain: &[TocNode]) -> Option<&TocNode> {
    chain.iter().find(|n| match level {
        ScopeLevel::Book => n.is_book(),
        ScopeLevel::Chapter => n.is_book() || !n.is_leaf,
        _ => false,
    })
}

/// One entry of the scope drop-down.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeMenuEntry {
    pub label: String,
    /// `None` opens the scope editor.
    pub scope: Option<Scope>,
    pub active: bool,
}

#[derive(Debug, Default)]
struct ScopeState {
    scope: Scope,
    /// Selected TOC node followed by its ancestors.
    selection: Vec<TocNode>,
}

pub struct ScopeManager<F> {
    channels: Rc<RequestChannels<F>>,
    state: Mutex<ScopeState>,
}

impl<F: Fetcher> ScopeManager<F> {
    pub fn new(channels: Rc<RequestChannels<F>>) -> Self {
        ScopeManager {
            channels,
            state: Mutex::new(ScopeState::default()),
        }
    }

    pub fn scope(&self) -> Scope {
        self.state.lock().scope.clone()
    }

    pub fn selection(&self) -> Vec<TocNode> {
        self.state.lock().selection.clone()
    }

    /// Track the TOC selection (nearest first) the Book/Chapter scopes follow.
    pub fn update_selection(&self, chain: Vec<TocNode>) {
        self.state.lock().selection = chain;
    }

    /// Read back the scope registered on the server and reset the legacy
    /// UI's own scope.
    pub async fn restore(&self) -> Scope {
        let current = self
            .channels
            .request(SEARCH_PAGE, None)
            .await
            .and_then(|page| parse_current_scope(&page));
        self.channels.request(LEGACY_SCOPE_RESET, None).await;
        let names = self.fetch_scope_names().await.unwrap_or_default();
        let scope = restore_scope(current.as_deref(), &names);
        tracing::debug!("[Scope] Restored {:?}", scope);
        self.state.lock().scope = scope.clone();
        scope
    }

    /// Switch to Book scope once per client, when configured to.
    pub async fn apply_book_scope_default(&self, config: &ViewerConfig, client: &dyn ClientState) {
        if !config.book_scope_by_default || self.scope() != Scope::None {
            return;
        }
        if client.get(BOOK_SCOPE_MARKER).as_deref() == Some("init") {
            return;
        }
        client.set(BOOK_SCOPE_MARKER, "init");
        self.set_scope(Scope::Book).await;
    }

    /// Make `scope` active, moving the server registration along.
    pub async fn set_scope(&self, scope: Scope) {
        let old = {
            let mut state = self.state.lock();
            std::mem::replace(&mut state.scope, scope.clone())
        };
        if let Some(query) = transition_query(&old, &scope) {
            tracing::debug!("[Scope] {:?} -> {:?}", old, scope);
            let url = format!("{query}&t={}", crate::markup::cache_buster());
            self.channels.request(&url, None).await;
        }
    }

    /// Custom scope names from the manager page, registrations excluded.
    pub async fn custom_scopes(&self) -> Vec<String> {
        self.fetch_scope_names()
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|n| !n.starts_with(ZWSP))
            .collect()
    }

    async fn fetch_scope_names(&self) -> Option<Vec<String>> {
        let url = format!("{SCOPE_MANAGER}?t={}", crate::markup::cache_buster());
        let page = self.channels.request(&url, None).await?;
        Some(parse_scope_names(&page))
    }

    pub fn snapshot(&self) -> ScopeSnapshot {
        let state = self.state.lock();
        snapshot_for(&state.scope, &state.selection)
    }

    /// Text for the scope button; `None` shows no label.
    pub fn button_label(&self) -> Option<String> {
        let state = self.state.lock();
        let label = match &state.scope {
            Scope::None => return None,
            Scope::Custom { name, .. } => name.clone(),
            scope => scoped_node(scope.level(), &state.selection)?.title.clone(),
        };
        Some(shorten_book_name(&label))
    }

    /// Drop-down entries given the user's custom scopes.
    pub fn menu_entries(&self, custom: &[String]) -> Vec<ScopeMenuEntry> {
        let state = self.state.lock();
        let book = state.selection.iter().find(|n| n.is_book()).map(|n| n.title.clone());
        let chapter = state
            .selection
            .iter()
            .find(|n| !n.is_book() && !n.is_leaf)
            .map(|n| n.title.clone())
            .or_else(|| book.clone());
        let with_title = |label: &str, title: &Option<String>| match title {
            Some(t) => format!("{label}: {t}"),
            None => label.to_string(),
        };
        let mut entries = vec![
            ScopeMenuEntry {
                label: LABEL_ALL.to_string(),
                scope: Some(Scope::None),
                active: state.scope == Scope::None,
            },
            ScopeMenuEntry {
                label: with_title(LABEL_BOOK, &book),
                scope: Some(Scope::Book),
                active: state.scope == Scope::Book,
            },
            ScopeMenuEntry {
                label: with_title(LABEL_CHAPTER, &chapter),
                scope: Some(Scope::Chapter),
                active: state.scope == Scope::Chapter,
            },
        ];
        for (index, name) in custom.iter().enumerate() {
            entries.push(ScopeMenuEntry {
                label: name.clone(),
                active: state.scope.custom_name() == Some(name.as_str()),
                scope: Some(Scope::Custom {
                    name: name.clone(),
                    index,
                }),
            });
        }
        entries.push(ScopeMenuEntry {
            label: LABEL_SCOPES.to_string(),
            scope: None,
            active: false,
        });
        entries
    }
}

/// Snapshot of `scope` for a selection chain (nearest first).
pub fn snapshot_for(scope: &Scope, selection: &[TocNode]) -> ScopeSnapshot {
    match scope {
        Scope::None => ScopeSnapshot::none(),
        Scope::Custom { name, .. } => ScopeSnapshot::custom(name),
        Scope::Book | Scope::Chapter => {
            let level = scope.level();
            let Some(target) = scoped_node(level, selection) else {
                return ScopeSnapshot {
                    level,
                    ..Default::default()
                };
            };
            let from = selection
                .iter()
                .position(|n| n == target)
                .unwrap_or_default();
            let mut chain: Vec<TocNode> = selection[from..].to_vec();
            chain.reverse();
            ScopeSnapshot {
                level,
                custom_name: None,
                toc: Some(target.toc.clone()),
                path: match level {
                    ScopeLevel::Chapter => target.path.clone(),
                    _ => None,
                },
                chain,
            }
        }
    }
}
