use crate::{
    channel::{Fetcher, RequestChannels, FULL_SEARCH_CHANNEL, TYPE_AHEAD_CHANNEL},
    config::ViewerConfig,
    delay::Delay,
    scope::{ScopeLevel, ScopeSnapshot},
    search::{
        cache::{CacheEntry, SearchCache},
        group::{cut_off_scope, group_results, ResultEntry, ResultFilter},
        hints::{highlight, synthesize, Hints, Segment},
        parse::{parse_search_page, SearchPage},
        query::{parse_query_part, QueryPart, SearchQuery},
        SearchResult,
    },
    toc::{TocNode, TocProvider},
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::rc::Rc;

/// A rendered result row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultView {
    pub title: Vec<Segment>,
    pub description: Vec<Segment>,
    pub href: String,
    /// Absolute topic URL.
    pub url: String,
    /// Book title, shown for unscoped type-ahead rows.
    pub book: Option<String>,
    /// Breadcrumb labels below the search scope, full search only.
    pub location: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeAheadView {
    pub key: String,
    pub word: String,
    pub label: String,
    pub hints: Hints,
    pub results: Vec<ResultView>,
}

#[derive(Debug, Clone)]
pub struct FullSearchView {
    pub key: String,
    pub word: String,
    pub label: String,
    pub scope_label: Option<String>,
    pub results: Vec<ResultView>,
    pub groups: Vec<ResultEntry>,
    /// Absent when there is nothing to filter.
    pub filter: Option<ResultFilter>,
}

impl FullSearchView {
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Text shown instead of a result list.
    pub fn message(&self) -> Option<String> {
        self.is_empty()
            .then(|| format!("No results found for {}", self.word))
    }

    /// Rows the filter currently lets through.
    pub fn visible_results(&self) -> Vec<&ResultView> {
        match &self.filter {
            Some(filter) => self
                .results
                .iter()
                .enumerate()
                .filter(|(i, _)| filter.is_visible(*i))
                .map(|(_, r)| r)
                .collect(),
            None => self.results.iter().collect(),
        }
    }
}

/// State of the full-search page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PageStatus {
    #[default]
    Closed,
    Searching,
    Indexing(u32),
    Results,
}

impl PageStatus {
    pub fn text(&self) -> Option<String> {
        match self {
            PageStatus::Searching => Some("Searching...".to_string()),
            PageStatus::Indexing(progress) => Some(format!("Indexing... {progress}%")),
            PageStatus::Closed | PageStatus::Results => None,
        }
    }
}

#[derive(Debug, Clone)]
pub enum SearchOutcome {
    /// Nothing to show (empty word or no type-ahead rows).
    Hidden,
    TypeAhead(TypeAheadView),
    Full(FullSearchView),
    /// The page already holds this query's results; only the content view
    /// needs to be pointed at the URL again.
    Repointed(String),
    AlreadyShown,
    Indexing(u32),
    /// The answer belonged to a query that is no longer live.
    Stale,
    /// The request failed or was superseded on its channel.
    Dropped,
}

#[derive(Debug)]
struct Pipelines {
    /// Live type-ahead key, `None` when nothing is pending.
    current_type_ahead: Option<String>,
    current_full: Option<String>,
    type_ahead_cache: SearchCache,
    full_cache: SearchCache,
    /// Raw search field text of the latest type-ahead call.
    typed: String,
    proposals: Option<TypeAheadView>,
    proposals_visible: bool,
    page_key: Option<String>,
    page: PageStatus,
}

impl Pipelines {
    fn current(&self, full: bool) -> Option<&str> {
        match full {
            true => self.current_full.as_deref(),
            false => self.current_type_ahead.as_deref(),
        }
    }

    fn set_current(&mut self, full: bool, key: Option<String>) {
        match full {
            true => self.current_full = key,
            false => self.current_type_ahead = key,
        }
    }

    fn cache(&mut self, full: bool) -> &mut SearchCache {
        match full {
            true => &mut self.full_cache,
            false => &mut self.type_ahead_cache,
        }
    }
}

pub struct SearchEngine<F, D> {
    channels: Rc<RequestChannels<F>>,
    toc: TocProvider<F>,
    delay: D,
    config: ViewerConfig,
    state: Mutex<Pipelines>,
}

impl<F: Fetcher, D: Delay> SearchEngine<F, D> {
    pub fn new(channels: Rc<RequestChannels<F>>, delay: D, config: &ViewerConfig) -> Self {
        SearchEngine {
            toc: TocProvider::new(channels.clone(), config.numeric_path_max_hops),
            channels,
            delay,
            config: config.clone(),
            state: Mutex::new(Pipelines {
                current_type_ahead: None,
                current_full: None,
                type_ahead_cache: SearchCache::new(config.type_ahead_cache_size),
                full_cache: SearchCache::new(config.full_search_cache_size),
                typed: String::new(),
                proposals: None,
                proposals_visible: false,
                page_key: None,
                page: PageStatus::Closed,
            }),
        }
    }

    /// Key of the query still waiting for an answer on a pipeline.
    pub fn current(&self, full: bool) -> Option<String> {
        self.state.lock().current(full).map(str::to_string)
    }

    pub fn page_status(&self) -> PageStatus {
        self.state.lock().page
    }

    pub fn page_key(&self) -> Option<String> {
        self.state.lock().page_key.clone()
    }

    /// Proposals currently on screen.
    pub fn proposals(&self) -> Option<TypeAheadView> {
        let state = self.state.lock();
        state
            .proposals
            .clone()
            .filter(|_| state.proposals_visible)
    }

    pub fn hide_proposals(&self) {
        self.state.lock().proposals_visible = false;
    }

    /// The content view moved away from the search page.
    pub fn close_page(&self) {
        self.state.lock().page = PageStatus::Closed;
    }

    pub fn cached(&self, full: bool, key: &str, snapshot: &ScopeSnapshot) -> Option<CacheEntry> {
        self.state.lock().cache(full).get(key, snapshot).cloned()
    }

    pub fn cache_keys(&self, full: bool) -> Vec<String> {
        self.state
            .lock()
            .cache(full)
            .keys()
            .map(str::to_string)
            .collect()
    }

    /// Handle a change of the search field.
    pub async fn type_ahead(&self, raw: &str, snapshot: ScopeSnapshot) -> SearchOutcome {
        let query = SearchQuery::new(raw, snapshot, false);
        let (was_pending, cached) = {
            let mut state = self.state.lock();
            let was_pending = state.current_type_ahead.is_some()
                || self.channels.is_pending(TYPE_AHEAD_CHANNEL);
            state.typed = raw.to_string();
            state.current_type_ahead = (!query.is_empty()).then(|| query.key.clone());
            if query.is_empty() {
                state.proposals_visible = false;
                return SearchOutcome::Hidden;
            }
            if let Some(shown) = state.proposals.clone() {
                if shown.key == query.key {
                    state.current_type_ahead = None;
                    state.proposals_visible = !shown.results.is_empty();
                    return match state.proposals_visible {
                        true => SearchOutcome::TypeAhead(shown),
                        false => SearchOutcome::Hidden,
                    };
                }
            }
            (
                was_pending,
                state.type_ahead_cache.get(&query.key, &query.snapshot).cloned(),
            )
        };
        if let Some(entry) = cached {
            tracing::debug!("[Search] Type-ahead cache hit for '{}'", query.key);
            return self.render(&query, &entry);
        }
        if was_pending {
            self.delay.sleep(self.config.debounce_ms).await;
            if self.current(false).as_deref() != Some(query.key.as_str()) {
                tracing::debug!("[Search] '{}' superseded while debouncing", query.key);
                return SearchOutcome::Stale;
            }
        }
        let url = query.url(self.config.type_ahead_hits_max);
        match self.channels.request(&url, Some(TYPE_AHEAD_CHANNEL)).await {
            Some(body) => self.deliver(&query, &body),
            None => {
                self.finish(&query);
                SearchOutcome::Dropped
            }
        }
    }

    /// Handle a submitted search.
    pub async fn full_search(&self, raw: &str, snapshot: ScopeSnapshot) -> SearchOutcome {
        let query = SearchQuery::new(raw, snapshot, true);
        let url = query.url(self.config.search_hits_max);
        let cached = {
            let mut state = self.state.lock();
            state.current_full = (!query.is_empty()).then(|| query.key.clone());
            state.current_type_ahead = None;
            state.proposals_visible = false;
            if query.is_empty() {
                return SearchOutcome::Hidden;
            }
            let same_page = state.page_key.as_deref() == Some(query.key.as_str());
            if same_page && state.page != PageStatus::Closed {
                state.current_full = None;
                return SearchOutcome::AlreadyShown;
            }
            if same_page {
                state.current_full = None;
                state.page = PageStatus::Results;
                return SearchOutcome::Repointed(self.absolute(&url));
            }
            let cached = state.full_cache.get(&query.key, &query.snapshot).cloned();
            if cached.is_none() {
                state.page = PageStatus::Searching;
            }
            cached
        };
        if let Some(entry) = cached {
            tracing::debug!("[Search] Full search cache hit for '{}'", query.key);
            return self.render(&query, &entry);
        }
        match self.channels.request(&url, Some(FULL_SEARCH_CHANNEL)).await {
            Some(body) => self.deliver(&query, &body),
            None => {
                self.finish(&query);
                SearchOutcome::Dropped
            }
        }
    }

    /// Render a search page the content view loaded by itself (a deep link
    /// or browser navigation). `query_part` is the URL after the search page
    /// prefix; `selection` is the TOC selection, nearest first.
    pub async fn render_full_search(
        &self,
        query_part: &str,
        body: &str,
        selection: &[TocNode],
    ) -> SearchOutcome {
        let part = parse_query_part(query_part);
        {
            let mut state = self.state.lock();
            if state.page_key.as_deref() == Some(part.key.as_str()) {
                if state.page == PageStatus::Closed {
                    state.page = PageStatus::Results;
                }
                return SearchOutcome::AlreadyShown;
            }
        }
        let chain = match &part.toc {
            Some(toc) => match chain_from_selection(&part, selection) {
                Some(chain) => chain,
                None => self
                    .toc
                    .scope_chain(toc, part.path.as_deref())
                    .await
                    .unwrap_or_default(),
            },
            None => Vec::new(),
        };
        let level = part.level();
        let query = SearchQuery {
            word: part.word.clone(),
            key: part.key.clone(),
            snapshot: ScopeSnapshot {
                level,
                custom_name: part.scope.clone(),
                toc: part.toc.clone(),
                path: part.path.clone().filter(|_| level == ScopeLevel::Chapter),
                chain,
            },
            full: true,
        };
        {
            let mut state = self.state.lock();
            state.current_full = Some(query.key.clone());
            state.current_type_ahead = None;
            state.proposals_visible = false;
        }
        self.deliver(&query, body)
    }

    /// Apply a server answer to `query`: parse, guard against staleness,
    /// cache and render.
    pub(crate) fn deliver(&self, query: &SearchQuery, body: &str) -> SearchOutcome {
        let (results, has_breadcrumbs) = match parse_search_page(body) {
            SearchPage::Indexing(progress) => {
                if query.full {
                    let mut state = self.state.lock();
                    if state.current_full.as_deref() == Some(query.key.as_str()) {
                        state.page = PageStatus::Indexing(progress);
                    }
                } else {
                    self.finish(query);
                }
                tracing::debug!("[Search] Index not ready ({}%)", progress);
                return SearchOutcome::Indexing(progress);
            }
            SearchPage::Results {
                results,
                has_breadcrumbs,
            } => (results, has_breadcrumbs),
        };
        let entry = CacheEntry {
            key: query.key.clone(),
            snapshot: query.snapshot.clone(),
            results,
            has_breadcrumbs,
        };
        {
            let mut state = self.state.lock();
            if state.current(query.full) != Some(query.key.as_str()) {
                tracing::debug!("[Search] Discarding stale answer for '{}'", query.key);
                return SearchOutcome::Stale;
            }
            state.cache(query.full).insert(entry.clone());
        }
        tracing::debug!(
            "[Search] {} result(s) for '{}'",
            entry.results.len(),
            query.key
        );
        self.render(query, &entry)
    }

    fn render(&self, query: &SearchQuery, entry: &CacheEntry) -> SearchOutcome {
        let outcome = match query.full {
            true => {
                let view = self.render_full(query, entry);
                let mut state = self.state.lock();
                state.page_key = Some(query.key.clone());
                state.page = PageStatus::Results;
                SearchOutcome::Full(view)
            }
            false => {
                let view = self.render_type_ahead(query, entry);
                let mut state = self.state.lock();
                state.proposals_visible = !view.results.is_empty();
                state.proposals = Some(view.clone());
                match state.proposals_visible {
                    true => SearchOutcome::TypeAhead(view),
                    false => SearchOutcome::Hidden,
                }
            }
        };
        self.finish(query);
        outcome
    }

    /// Clear the pipeline's pending marker if it still names `query`.
    fn finish(&self, query: &SearchQuery) {
        let mut state = self.state.lock();
        if state.current(query.full) == Some(query.key.as_str()) {
            state.set_current(query.full, None);
        }
    }

    fn absolute(&self, relative: &str) -> String {
        self.channels
            .base()
            .join(relative)
            .map(String::from)
            .unwrap_or_else(|_| relative.to_string())
    }

    fn render_type_ahead(&self, query: &SearchQuery, entry: &CacheEntry) -> TypeAheadView {
        let typed = self.state.lock().typed.clone();
        let unscoped = query.snapshot.chain.is_empty();
        let results = entry
            .results
            .iter()
            .map(|r| ResultView {
                book: unscoped.then(|| r.book_title().map(str::to_string)).flatten(),
                ..self.row(r, &query.word, Vec::new())
            })
            .collect();
        TypeAheadView {
            key: query.key.clone(),
            word: query.word.clone(),
            label: query.label(),
            hints: synthesize(
                &query.key,
                &typed,
                &query.word,
                &entry.results,
                self.config.hint_max_query_chars,
                self.config.hint_proposals_max,
            ),
            results,
        }
    }

    fn render_full(&self, query: &SearchQuery, entry: &CacheEntry) -> FullSearchView {
        let scope_len = query.snapshot.chain.len();
        let scope_label = (query.snapshot.level != ScopeLevel::None).then(|| query.snapshot.label());
        let results = entry
            .results
            .iter()
            .map(|r| {
                let location = match entry.has_breadcrumbs {
                    true => r
                        .breadcrumb
                        .iter()
                        .skip(scope_len)
                        .map(|c| c.label.clone())
                        .collect(),
                    false => Vec::new(),
                };
                self.row(r, &query.word, location)
            })
            .collect();
        let groups = cut_off_scope(
            group_results(&entry.results, self.config.group_depth),
            scope_len,
        );
        let filter = (!entry.results.is_empty()).then(|| {
            let root_label = match &scope_label {
                Some(label) => format!("Results in {label}"),
                None => "Results".to_string(),
            };
            ResultFilter::new(&entry.results, &groups, &root_label)
        });
        FullSearchView {
            key: query.key.clone(),
            word: query.word.clone(),
            label: query.label(),
            scope_label,
            results,
            groups,
            filter,
        }
    }

    fn row(&self, result: &SearchResult, word: &str, location: Vec<String>) -> ResultView {
        ResultView {
            title: highlight(&result.title, word),
            description: highlight(&result.description, word),
            href: result.href.clone(),
            url: result.topic_url(self.channels.base()),
            book: None,
            location,
        }
    }
}

/// Scope chain for a search link, taken from the TOC selection when it lies
/// in the linked book (and, for chapters, is the linked node).
fn chain_from_selection(part: &QueryPart, selection: &[TocNode]) -> Option<Vec<TocNode>> {
    let toc = part.toc.as_deref()?;
    let nodes: Vec<TocNode> = match &part.path {
        Some(_) => selection.iter().rev().cloned().collect(),
        None => selection.last().cloned().into_iter().collect(),
    };
    let first = nodes.first()?;
    let last = nodes.last()?;
    let matches = first.toc == toc && part.path.as_ref().is_none_or(|p| last.path.as_ref() == Some(p));
    matches.then_some(nodes)
}
