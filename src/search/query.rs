//! Search query identity: the normalized word plus the frozen scope, and the
//! key/URL forms the server understands.
use crate::{
    markup::{decode_component, encode_component},
    scope::{ScopeLevel, ScopeSnapshot},
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Prefix of every search page URL. The query key follows directly.
pub const SEARCH_VIEW: &str = "advanced/searchView.jsp?showSearchCategories=false&searchWord=";
pub const MAX_HITS_PARAM: &str = "&maxHits=";
const QUICK_SEARCH_TOC: &str = "&quickSearch=true&quickSearchType=QuickSearchToc";

// The server tokenizer splits a trailing `-suffix` badly; searching for
// `word suffix` instead finds the same topics.
static TRAILING_HYPHEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"-([^\-\s]*)$").expect("static regex"));

/// Trim and rewrite the last token's `-x` to ` x`.
pub fn normalize(raw: &str) -> String {
    TRAILING_HYPHEN
        .replace(raw.trim(), " $1")
        .into_owned()
}

/// Server query key: the encoded lowercase word followed by the scope
/// parameters. Empty for an empty word.
pub fn query_key(word: &str, snapshot: &ScopeSnapshot) -> String {
    if word.is_empty() {
        return String::new();
    }
    let mut key = encode_component(&word.to_lowercase());
    match snapshot.level {
        ScopeLevel::Book | ScopeLevel::Chapter => {
            if let Some(toc) = &snapshot.toc {
                key.push_str("&toc=");
                key.push_str(&encode_component(toc));
            }
            if snapshot.level == ScopeLevel::Chapter {
                if let Some(path) = &snapshot.path {
                    key.push_str("&path=");
                    key.push_str(&encode_component(path));
                }
            }
        }
        ScopeLevel::Custom => {
            if let Some(name) = &snapshot.custom_name {
                key.push_str("&scope=");
                key.push_str(&encode_component(name));
            }
        }
        ScopeLevel::None => {}
    }
    key
}

/// Relative search page URL for `key`. Type-ahead queries search for the
/// word as a prefix.
pub fn search_url(key: &str, full: bool, max_hits: usize) -> String {
    let mut url = String::from(SEARCH_VIEW);
    match (full, key.find('&')) {
        (true, _) => url.push_str(key),
        (false, Some(amp)) => {
            url.push_str(&key[..amp]);
            url.push('*');
            url.push_str(&key[amp..]);
        }
        (false, None) => {
            url.push_str(key);
            url.push('*');
        }
    }
    url.push_str(MAX_HITS_PARAM);
    url.push_str(&max_hits.to_string());
    if key.contains("&toc=") {
        url.push_str(QUICK_SEARCH_TOC);
    }
    url
}

/// One search submission. Equality is by key and scope; whether it was typed
/// or submitted does not matter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchQuery {
    pub word: String,
    pub key: String,
    pub snapshot: ScopeSnapshot,
    pub full: bool,
}

impl PartialEq for SearchQuery {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.snapshot == other.snapshot
    }
}

impl Eq for SearchQuery {}

impl SearchQuery {
    pub fn new(raw: &str, snapshot: ScopeSnapshot, full: bool) -> Self {
        let word = normalize(raw);
        let key = query_key(&word, &snapshot);
        SearchQuery {
            word,
            key,
            snapshot,
            full,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.word.is_empty()
    }

    pub fn url(&self, max_hits: usize) -> String {
        search_url(&self.key, self.full, max_hits)
    }

    /// `Search (<scope>): <word>`, or `Search: <word>` without a scope.
    pub fn label(&self) -> String {
        match self.snapshot.level {
            ScopeLevel::None => format!("Search: {}", self.word),
            _ => format!("Search ({}): {}", self.snapshot.label(), self.word),
        }
    }
}

/// Word and scope parameters read back from a search page URL.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct QueryPart {
    pub key: String,
    pub word: String,
    pub toc: Option<String>,
    pub path: Option<String>,
    pub scope: Option<String>,
}

impl QueryPart {
    pub fn level(&self) -> ScopeLevel {
        match (&self.scope, &self.toc, &self.path) {
            (Some(_), _, _) => ScopeLevel::Custom,
            (None, Some(_), Some(_)) => ScopeLevel::Chapter,
            (None, Some(_), None) => ScopeLevel::Book,
            (None, None, _) => ScopeLevel::None,
        }
    }
}

/// Parse the part of a search page URL after [`SEARCH_VIEW`]. The key is
/// everything before `&maxHits=`.
pub fn parse_query_part(query_part: &str) -> QueryPart {
    let key = query_part
        .find(MAX_HITS_PARAM)
        .map(|end| &query_part[..end])
        .unwrap_or(query_part);
    let mut part = QueryPart {
        key: key.to_string(),
        ..Default::default()
    };
    let mut word = None;
    for pair in query_part.split('&') {
        if let Some(value) = pair.strip_prefix("toc=") {
            part.toc = Some(decode_component(value));
        } else if let Some(value) = pair.strip_prefix("path=") {
            part.path = Some(decode_component(value));
        } else if let Some(value) = pair.strip_prefix("scope=") {
            part.scope = Some(decode_component(value));
        } else if word.is_none() && !pair.contains('=') {
            word = Some(decode_component(pair.trim_end_matches('*')));
        }
    }
    part.word = word.unwrap_or_default();
    part
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_trailing_hyphen() {
        assert_eq!(normalize("  java-doc "), "java doc");
        assert_eq!(normalize("a-b c-d"), "a-b c d");
        assert_eq!(normalize("plain"), "plain");
        assert_eq!(normalize("   "), "");
    }

    #[test]
    fn builds_type_ahead_and_full_urls() {
        let key = "editor&toc=%2Fplugin%2Ftoc.xml";
        assert_eq!(
            search_url(key, false, 7),
            format!(
                "{SEARCH_VIEW}editor*&toc=%2Fplugin%2Ftoc.xml&maxHits=7{QUICK_SEARCH_TOC}"
            )
        );
        assert_eq!(search_url("editor", true, 500), format!("{SEARCH_VIEW}editor&maxHits=500"));
        assert_eq!(search_url("editor", false, 7), format!("{SEARCH_VIEW}editor*&maxHits=7"));
    }

    #[test]
    fn reads_back_query_parts() {
        let part = parse_query_part("new%20project&toc=%2Fa%2Ftoc.xml&path=1_2&maxHits=500");
        assert_eq!(part.key, "new%20project&toc=%2Fa%2Ftoc.xml&path=1_2");
        assert_eq!(part.word, "new project");
        assert_eq!(part.toc.as_deref(), Some("/a/toc.xml"));
        assert_eq!(part.path.as_deref(), Some("1_2"));
        assert_eq!(part.level(), ScopeLevel::Chapter);

        let part = parse_query_part("x&scope=Mine&maxHits=500");
        assert_eq!(part.level(), ScopeLevel::Custom);
        assert_eq!(parse_query_part("x").level(), ScopeLevel::None);
    }
}
