//! Search engine: type-ahead proposals and full search over the help server's
//! HTML result pages.
//!
//! Both pipelines share the same shape. A [`SearchQuery`] freezes the word and
//! the scope at submission time; the tier cache is consulted by key; a miss
//! goes out on the pipeline's request channel; the answer is parsed into
//! [`SearchResult`]s and rendered only while the query is still the live one.
use serde::{Deserialize, Serialize};
use url::Url;

pub mod cache;
pub mod engine;
pub mod group;
pub mod hints;
pub mod parse;
pub mod query;

pub use cache::{CacheEntry, SearchCache};
pub use engine::{
    FullSearchView, PageStatus, ResultView, SearchEngine, SearchOutcome, TypeAheadView,
};
pub use group::{group_results, ResultEntry, ResultFilter, ResultGroup};
pub use hints::{highlight, Hints, Proposal, Segment};
pub use parse::{parse_search_page, SearchPage};
pub use query::{parse_query_part, QueryPart, SearchQuery};

/// One breadcrumb link. Results without a location carry a single crumb with
/// no href, naming the book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Crumb {
    pub href: Option<String>,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub description: String,
    /// Topic href relative to `<base>/topic`, query string included.
    pub href: String,
    pub breadcrumb: Vec<Crumb>,
}

impl SearchResult {
    /// Absolute topic URL.
    pub fn topic_url(&self, base: &Url) -> String {
        let relative = format!("topic{}", self.href);
        base.join(&relative)
            .map(String::from)
            .unwrap_or(relative)
    }

    /// Breadcrumb flattened to `[href, label, href, label, …]`.
    pub fn flat_breadcrumb(&self) -> Vec<String> {
        self.breadcrumb
            .iter()
            .flat_map(|c| [c.href.clone().unwrap_or_default(), c.label.clone()])
            .collect()
    }

    /// Server-relative topic href without the `?resultof=` highlighting
    /// parameter, in the `../topic/…` form breadcrumbs use.
    pub fn normalized_href(&self) -> String {
        let href = self
            .href
            .find("?resultof=")
            .map(|end| &self.href[..end])
            .unwrap_or(&self.href);
        format!("../topic{href}")
    }

    /// Flat breadcrumb followed by the result's own href and title. Group
    /// and filter values are prefixes of this path.
    pub fn tree_path(&self) -> Vec<String> {
        let mut path = self.flat_breadcrumb();
        path.push(self.normalized_href());
        path.push(self.title.clone());
        path
    }

    pub fn book_title(&self) -> Option<&str> {
        self.breadcrumb.first().map(|c| c.label.as_str())
    }
}
