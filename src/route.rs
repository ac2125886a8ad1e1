//! Deep-link routes.
//!
//! The page fragment is the only persisted navigation state: `#topic/…`,
//! `#nav/…`, `#rtopic/…`, `#ntopic/…` and `#nftopic/…` name a content page,
//! `#q=<key>` a full search. Older links carry the same information as query
//! parameters (`topic`, `nav`, `anchor`, `searchWord` with `tab=search`).
use crate::{
    markup::{decode_component, decode_html, encode_component, query_param},
    search::query::{search_url, SEARCH_VIEW},
};
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

const QUERY_PREFIX: &str = "q=";
const START_PAGE_MARKER: &str = "title=\"Topic View\" src='";
// Longer prefixes first: `nftopic/` must not be read as `topic/`.
const CONTENT_PREFIXES: [&str; 5] = ["nftopic/", "rtopic/", "ntopic/", "topic/", "nav/"];

/// Page holding the default start topic.
pub const START_PAGE: &str = "advanced/content.jsp";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Route {
    /// Path below `topic`, starting with `/`.
    Topic(String),
    Nav(String),
    RTopic(String),
    NTopic(String),
    NfTopic(String),
    /// Search key as it appears in a search page URL.
    Query(String),
}

impl Route {
    fn content_prefix(&self) -> Option<&'static str> {
        match self {
            Route::Topic(_) => Some("topic"),
            Route::Nav(_) => Some("nav"),
            Route::RTopic(_) => Some("rtopic"),
            Route::NTopic(_) => Some("ntopic"),
            Route::NfTopic(_) => Some("nftopic"),
            Route::Query(_) => None,
        }
    }

    fn value(&self) -> &str {
        match self {
            Route::Topic(v)
            | Route::Nav(v)
            | Route::RTopic(v)
            | Route::NTopic(v)
            | Route::NfTopic(v)
            | Route::Query(v) => v,
        }
    }

    /// Parse `rest` (a base-relative location such as `topic/a/b.html`) as a
    /// content route.
    fn from_content_path(rest: &str) -> Option<Route> {
        let prefix = CONTENT_PREFIXES
            .iter()
            .find(|prefix| rest.starts_with(**prefix))?;
        // Keep the leading `/` in the value.
        let value = rest[prefix.len() - 1..].to_string();
        Some(match *prefix {
            "nftopic/" => Route::NfTopic(value),
            "rtopic/" => Route::RTopic(value),
            "ntopic/" => Route::NTopic(value),
            "topic/" => Route::Topic(value),
            _ => Route::Nav(value),
        })
    }

    /// Parse a URL fragment, with or without the leading `#`.
    pub fn parse_fragment(fragment: &str) -> Option<Route> {
        let fragment = fragment.strip_prefix('#').unwrap_or(fragment);
        if let Some(key) = fragment.strip_prefix(QUERY_PREFIX) {
            return Some(Route::Query(key.to_string()));
        }
        Self::from_content_path(fragment)
    }

    /// Route for the legacy query string of a viewer page URL.
    pub fn from_legacy(page_url: &str) -> Option<Route> {
        let without_hash = page_url.split('#').next().unwrap_or_default();
        let query = without_hash.split_once('?').map(|(_, q)| q)?;
        if let Some(word) = query_param(query, "searchWord") {
            if query_param(query, "tab").as_deref() == Some("search") {
                return Some(Route::Query(encode_component(&word)));
            }
        }
        let anchor = query_param(query, "anchor")
            .map(|a| format!("#{a}"))
            .unwrap_or_default();
        match (query_param(query, "topic"), query_param(query, "nav")) {
            (_, Some(nav)) => Some(Route::Nav(format!("{nav}{anchor}"))),
            (Some(topic), None) => Some(Route::Topic(format!("{topic}{anchor}"))),
            (None, None) => None,
        }
    }

    /// Route for an opened viewer page: its fragment if it names one,
    /// otherwise its legacy parameters.
    pub fn from_page_url(page_url: &str) -> Option<Route> {
        page_url
            .split_once('#')
            .and_then(|(_, fragment)| Route::parse_fragment(fragment))
            .or_else(|| Route::from_legacy(page_url))
    }

    /// Route a displayed content URL corresponds to, if it lies below `base`.
    pub fn for_content(url: &str, base: &Url) -> Option<Route> {
        let rest = url.strip_prefix(base.as_str())?;
        if let Some(query_part) = rest.strip_prefix(SEARCH_VIEW) {
            let key = query_part
                .find("&maxHits=")
                .map(|end| &query_part[..end])
                .unwrap_or(query_part);
            return Some(Route::Query(key.to_string()));
        }
        Self::from_content_path(rest)
    }

    /// URL the content view should load for this route.
    pub fn content_url(&self, base: &Url, search_hits_max: usize) -> String {
        let relative = match self {
            Route::Query(key) => search_url(key, true, search_hits_max),
            _ => format!("{}{}", self.content_prefix().unwrap_or_default(), self.value()),
        };
        base.join(&relative)
            .map(String::from)
            .unwrap_or(relative)
    }

    /// Decoded search word of a query route.
    pub fn search_word(&self) -> Option<String> {
        match self {
            Route::Query(key) => key.split('&').next().map(decode_component),
            _ => None,
        }
    }
}

impl fmt::Display for Route {
    /// Fragment form, including the leading `#`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Route::Query(key) => write!(f, "#{QUERY_PREFIX}{key}"),
            _ => write!(
                f,
                "#{}{}",
                self.content_prefix().unwrap_or_default(),
                self.value()
            ),
        }
    }
}

/// Start topic named by the start page's content frame, as a URL below
/// `base`.
pub fn start_topic(page: &str, base: &Url) -> Option<String> {
    let start = page.find(START_PAGE_MARKER)? + START_PAGE_MARKER.len();
    let end = page[start..].find('\'')? + start;
    let topic = decode_html(&page[start..end]);
    base.join(&format!("topic/{topic}"))
        .map(String::from)
        .ok()
}
