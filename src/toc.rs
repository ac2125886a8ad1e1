//! Table-of-contents adapter.
//!
//! Turns the server's `tocfragment` XML into [`TreeItem`]s for the generic
//! tree and answers deep-link resolution requests. A fragment either lists
//! `node` elements (possibly nested along a requested path) or reports a
//! single `numeric_path` marker, in which case the fragment for that path is
//! requested next.
use crate::{
    channel::{Fetcher, RequestChannels},
    error::HelpError,
    markup::{encode_component, without_query_and_hash},
    tree::{ContentProvider, Resolution, Supplied, TreeItem},
};
use roxmltree::{Document, Node};
use serde::{Deserialize, Serialize};
use std::rc::Rc;
use url::Url;

const TOC_FRAGMENT: &str = "advanced/tocfragment";

/// One entry of the navigation tree.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TocNode {
    /// Id of the owning book.
    pub toc: String,
    /// Id inside the book; `None` for the book itself.
    pub path: Option<String>,
    pub title: String,
    /// Absolute topic URL.
    pub href: String,
    pub image: Option<String>,
    /// Numeric path this node was reported under by an expand request.
    pub expand_path: Option<String>,
    pub is_leaf: bool,
}

impl TocNode {
    pub fn is_book(&self) -> bool {
        self.path.is_none()
    }

    /// Topic URL without query string and fragment.
    pub fn href_base(&self) -> &str {
        without_query_and_hash(&self.href)
    }

    /// Fragment of the topic URL including the leading `#`, if any.
    pub fn href_hash(&self) -> Option<&str> {
        self.href.find('#').map(|i| &self.href[i..])
    }
}

/// Parsed `tocfragment` answer.
#[derive(Debug, Clone, PartialEq)]
pub enum Fragment {
    Nodes(Vec<TreeItem<TocNode>>),
    NumericPath(String),
}

/// What a fragment request asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TocQuery {
    Roots,
    Children { toc: String, path: Option<String> },
    Topic(String),
    Expand(String),
}

impl TocQuery {
    pub fn relative_url(&self) -> String {
        match self {
            TocQuery::Roots => TOC_FRAGMENT.to_string(),
            TocQuery::Children { toc, path } => format!(
                "{TOC_FRAGMENT}?toc={}{}",
                encode_component(toc),
                path.as_ref()
                    .map(|p| format!("&path={}", encode_component(p)))
                    .unwrap_or_default()
            ),
            TocQuery::Topic(href) => format!(
                "{TOC_FRAGMENT}?errorSuppress=true&topic={}",
                encode_component(href)
            ),
            TocQuery::Expand(path) => format!(
                "{TOC_FRAGMENT}?errorSuppress=true&expandPath={}",
                encode_component(path)
            ),
        }
    }

    fn toc(&self) -> Option<&str> {
        match self {
            TocQuery::Children { toc, .. } => Some(toc),
            _ => None,
        }
    }

    fn path(&self) -> Option<&str> {
        match self {
            TocQuery::Children { path, .. } => path.as_deref(),
            _ => None,
        }
    }

    fn expand(&self) -> Option<&str> {
        match self {
            TocQuery::Expand(path) => Some(path),
            _ => None,
        }
    }
}

fn has_tag(node: Node<'_, '_>, expected: &str) -> bool {
    node.is_element() && node.tag_name().name() == expected
}

/// `id` names an ancestor of `path` (`1_2` is a prefix of `1_2_0`).
fn is_path_prefix(id: &str, path: &str) -> bool {
    !id.is_empty()
        && path.len() > id.len()
        && path.starts_with(id)
        && path[id.len()..].starts_with('_')
}

/// Element children of the part of the document that answers `toc`/`path`:
/// the books for a root request, the book's children for `toc` alone, or the
/// children of the node with id `path`, found by descending through nodes
/// whose id is an `_`-separated prefix of it.
fn fragment_level<'a, 'input>(
    doc: &'a Document<'input>,
    toc: Option<&str>,
    path: Option<&str>,
) -> Vec<Node<'a, 'input>> {
    let books = doc.root_element();
    let Some(toc) = toc else {
        return books.children().filter(Node::is_element).collect();
    };
    let Some(book) = books
        .children()
        .find(|n| has_tag(*n, "node") && n.attribute("id") == Some(toc))
    else {
        return Vec::new();
    };
    let Some(path) = path else {
        return book.children().filter(Node::is_element).collect();
    };
    let mut level = book;
    'descend: loop {
        for n in level.children().filter(|n| has_tag(*n, "node")) {
            let Some(id) = n.attribute("id") else {
                continue;
            };
            if id == path {
                return n.children().filter(Node::is_element).collect();
            }
            if is_path_prefix(id, path) {
                level = n;
                continue 'descend;
            }
        }
        return Vec::new();
    }
}

/// Resolve a server href (`../topic/...`) against the base url.
pub fn resolve_topic_href(base: &Url, href: &str) -> String {
    let relative = href
        .strip_prefix("../")
        .or_else(|| href.strip_prefix('/'))
        .unwrap_or(href);
    base.join(relative)
        .map(String::from)
        .unwrap_or_else(|_| href.to_string())
}

fn to_items(
    nodes: &[Node<'_, '_>],
    toc: Option<&str>,
    expand_path: Option<&str>,
    base: &Url,
) -> Vec<TreeItem<TocNode>> {
    nodes
        .iter()
        .filter(|n| has_tag(**n, "node"))
        .map(|n| {
            let id = n.attribute("id").unwrap_or_default();
            let owning = toc.unwrap_or(id).to_string();
            let is_leaf = n.attribute("is_leaf") == Some("true");
            let nested: Vec<Node<'_, '_>> = n.children().filter(Node::is_element).collect();
            TreeItem {
                data: TocNode {
                    toc: owning.clone(),
                    path: toc.map(|_| id.to_string()),
                    title: n.attribute("title").unwrap_or_default().to_string(),
                    href: resolve_topic_href(base, n.attribute("href").unwrap_or_default()),
                    image: n.attribute("image").map(str::to_string),
                    expand_path: expand_path.map(str::to_string),
                    is_leaf,
                },
                is_leaf,
                children: to_items(&nested, Some(&owning), None, base),
            }
        })
        .collect()
}

/// Parse a fragment answer for `query`.
pub fn parse_fragment(xml: &str, query: &TocQuery, base: &Url) -> Result<Fragment, HelpError> {
    let doc = Document::parse(xml)?;
    let level = fragment_level(&doc, query.toc(), query.path());
    for n in &level {
        if has_tag(*n, "numeric_path") {
            let path = n.attribute("path").ok_or_else(|| {
                HelpError::Parse("numeric_path element without path attribute".to_string())
            })?;
            return Ok(Fragment::NumericPath(path.to_string()));
        }
        if has_tag(*n, "node") {
            break;
        }
    }
    Ok(Fragment::Nodes(to_items(
        &level,
        query.toc(),
        query.expand(),
        base,
    )))
}

/// Titles (and ids) from the book down to `path`, read from a fragment
/// answer for `toc`/`path`. Used to rebuild a search scope from a link.
pub fn parse_scope_chain(xml: &str, toc: &str, path: Option<&str>) -> Result<Vec<TocNode>, HelpError> {
    let doc = Document::parse(xml)?;
    let Some(book) = doc
        .root_element()
        .children()
        .find(|n| has_tag(*n, "node") && n.attribute("id") == Some(toc))
    else {
        return Err(HelpError::NotFound(format!("book '{toc}' not in fragment")));
    };
    let mut chain = vec![TocNode {
        toc: toc.to_string(),
        title: book.attribute("title").unwrap_or_default().to_string(),
        ..Default::default()
    }];
    let Some(path) = path else {
        return Ok(chain);
    };
    let mut level = book;
    'descend: loop {
        for n in level.children().filter(|n| has_tag(*n, "node")) {
            let Some(id) = n.attribute("id") else {
                continue;
            };
            if id == path || is_path_prefix(id, path) {
                chain.push(TocNode {
                    toc: toc.to_string(),
                    path: Some(id.to_string()),
                    title: n.attribute("title").unwrap_or_default().to_string(),
                    is_leaf: n.attribute("is_leaf") == Some("true"),
                    ..Default::default()
                });
                if id == path {
                    break 'descend;
                }
                level = n;
                continue 'descend;
            }
        }
        break;
    }
    Ok(chain)
}

/// [`ContentProvider`] backed by the help server's TOC fragments.
pub struct TocProvider<F> {
    channels: Rc<RequestChannels<F>>,
    max_hops: usize,
}

impl<F: Fetcher> TocProvider<F> {
    pub fn new(channels: Rc<RequestChannels<F>>, max_hops: usize) -> Self {
        TocProvider { channels, max_hops }
    }

    /// Request `query`, following `numeric_path` answers at most `max_hops`
    /// times.
    pub async fn fetch(&self, query: TocQuery) -> Option<Vec<TreeItem<TocNode>>> {
        let mut query = query;
        let mut hops = 0;
        loop {
            let body = self.channels.request(&query.relative_url(), None).await?;
            match parse_fragment(&body, &query, self.channels.base()) {
                Ok(Fragment::Nodes(items)) => return Some(items),
                Ok(Fragment::NumericPath(path)) => {
                    if hops >= self.max_hops {
                        tracing::warn!(
                            "[Toc] Giving up on numeric path '{}' after {} hops",
                            path,
                            hops
                        );
                        return None;
                    }
                    hops += 1;
                    tracing::debug!("[Toc] Following numeric path '{}'", path);
                    query = TocQuery::Expand(path);
                }
                Err(e) => {
                    tracing::warn!("[Toc] Dropping fragment for {:?}: {}", query, e);
                    return None;
                }
            }
        }
    }

    /// Book → … → node chain for `toc`/`path`.
    pub async fn scope_chain(&self, toc: &str, path: Option<&str>) -> Option<Vec<TocNode>> {
        let query = TocQuery::Children {
            toc: toc.to_string(),
            path: path.map(str::to_string),
        };
        let body = self.channels.request(&query.relative_url(), None).await?;
        match parse_scope_chain(&body, toc, path) {
            Ok(chain) => Some(chain),
            Err(e) => {
                tracing::warn!("[Toc] Cannot rebuild scope chain for '{}': {}", toc, e);
                None
            }
        }
    }
}

impl<F: Fetcher> ContentProvider<TocNode> for TocProvider<F> {
    async fn children(&self, parent: Option<&TocNode>) -> Option<Supplied<TocNode>> {
        let query = match parent {
            None => TocQuery::Roots,
            Some(node) => TocQuery::Children {
                toc: node.toc.clone(),
                path: node.path.clone(),
            },
        };
        self.fetch(query).await.map(Supplied::new)
    }

    async fn resolve_href(&self, href: &str) -> Option<Resolution<TocNode>> {
        let items = self.fetch(TocQuery::Topic(href.to_string())).await?;
        let [only] = items.as_slice() else {
            tracing::debug!("[Toc] '{}' resolved to {} books", href, items.len());
            return None;
        };
        let path = only.data.expand_path.as_deref()?;
        let expand_path = Resolution::<TocNode>::parse_path(path)?;
        Some(Resolution { expand_path, items })
    }
}
