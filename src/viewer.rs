//! Viewer session: one object owning the navigation tree, the scope state and
//! the search pipelines, created once per page load.
//!
//! The content view is external. Callers report every page it shows through
//! [`HelpViewer::on_content_loaded`], and load whatever URL the session hands
//! back from navigation calls.
use crate::{
    channel::{Fetcher, RequestChannels},
    config::{ClientState, ViewerConfig},
    delay::Delay,
    error::HelpError,
    markup::without_query_and_hash,
    route::{start_topic, Route, START_PAGE},
    scope::{editor::ScopeEditor, Scope, ScopeManager, ScopeMenuEntry},
    search::{query::SEARCH_VIEW, SearchEngine, SearchOutcome},
    toc::{TocNode, TocProvider},
    tree::{NodeId, TreeKey, TreeWidget},
};
use parking_lot::Mutex;
use std::rc::Rc;

/// What a loaded content page did to the session.
#[derive(Debug, Clone)]
pub enum ContentSync {
    /// A search page, rendered by the full-search pipeline.
    Search(SearchOutcome),
    /// A topic page; the TOC node now selected for it, if any.
    Topic(Option<NodeId>),
}

pub struct HelpViewer<F, D> {
    config: ViewerConfig,
    channels: Rc<RequestChannels<F>>,
    toc: TreeWidget<TocNode, TocProvider<F>>,
    scope: ScopeManager<F>,
    search: SearchEngine<F, D>,
    editor: ScopeEditor<F>,
    client: Box<dyn ClientState>,
    /// URL the content view shows.
    content: Mutex<Option<String>>,
}

impl<F: Fetcher, D: Delay> HelpViewer<F, D> {
    pub fn new<C>(fetcher: F, delay: D, config: ViewerConfig, client: C) -> Result<Self, HelpError>
    where
        C: ClientState + 'static,
    {
        config.validate()?;
        let channels = Rc::new(RequestChannels::new(fetcher, &config)?);
        let toc = TreeWidget::new(
            TocProvider::new(channels.clone(), config.numeric_path_max_hops),
            |node: &TocNode| node.title.clone(),
            true,
        )
        .with_right_to_left(config.right_to_left);
        Ok(HelpViewer {
            scope: ScopeManager::new(channels.clone()),
            search: SearchEngine::new(channels.clone(), delay, &config),
            editor: ScopeEditor::new(channels.clone()),
            toc,
            channels,
            config,
            client: Box::new(client),
            content: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn channels(&self) -> &RequestChannels<F> {
        &self.channels
    }

    pub fn toc(&self) -> &TreeWidget<TocNode, TocProvider<F>> {
        &self.toc
    }

    pub fn scope(&self) -> &ScopeManager<F> {
        &self.scope
    }

    pub fn search(&self) -> &SearchEngine<F, D> {
        &self.search
    }

    pub fn editor(&self) -> &ScopeEditor<F> {
        &self.editor
    }

    pub fn content(&self) -> Option<String> {
        self.content.lock().clone()
    }

    /// Load the books and restore the registered scope.
    pub async fn init(&self) {
        self.toc.load_roots().await;
        self.scope.restore().await;
        self.scope
            .apply_book_scope_default(&self.config, self.client.as_ref())
            .await;
    }

    /// URL the content view should show for an opened viewer page: the page's
    /// route, or the server's start topic.
    pub async fn open_location(&self, page_url: &str) -> Option<String> {
        let url = match Route::from_page_url(page_url) {
            Some(route) => {
                tracing::debug!("[Viewer] Opening {}", route);
                route.content_url(self.channels.base(), self.config.search_hits_max)
            }
            None => {
                let page = self.channels.request(START_PAGE, None).await?;
                start_topic(&page, self.channels.base())?
            }
        };
        *self.content.lock() = Some(url.clone());
        Some(url)
    }

    /// Route for the page the content view shows.
    pub fn route(&self) -> Option<Route> {
        self.content
            .lock()
            .as_deref()
            .and_then(|url| self.route_for_content(url))
    }

    pub fn route_for_content(&self, url: &str) -> Option<Route> {
        Route::for_content(url, self.channels.base())
    }

    /// Select a TOC node by click and return the topic to show.
    pub fn select_toc(&self, id: NodeId) -> Option<String> {
        self.toc.select(Some(id), false);
        self.sync_scope_selection();
        let href = self.toc.data(id).map(|node| node.href)?;
        *self.content.lock() = Some(href.clone());
        Some(href)
    }

    pub async fn toggle(&self, id: NodeId) {
        self.toc.toggle(id).await;
    }

    pub async fn handle_key(&self, focused: NodeId, key: TreeKey) -> Option<NodeId> {
        self.toc.handle_key(focused, key).await
    }

    /// Report a page the content view finished loading. Search pages are
    /// rendered as full search; anything else moves the TOC selection to it.
    pub async fn on_content_loaded(&self, url: &str, body: &str) -> ContentSync {
        *self.content.lock() = Some(url.to_string());
        let search_prefix = format!("{}{}", self.channels.base(), SEARCH_VIEW);
        if let Some(query_part) = url.strip_prefix(&search_prefix) {
            let selection = self.scope.selection();
            let outcome = self
                .search
                .render_full_search(query_part, body, &selection)
                .await;
            return ContentSync::Search(outcome);
        }
        self.search.close_page();
        ContentSync::Topic(self.sync_toc(url).await)
    }

    /// Select the TOC node for `url`, nearest to the current selection first.
    /// A node with the same hash wins over one that only shares the page; a
    /// URL without a hash takes the first node on its page. Without a loaded
    /// match the server resolves the topic.
    pub async fn sync_toc(&self, url: &str) -> Option<NodeId> {
        let selected = self.toc.selected();
        if let Some(id) = selected {
            if self.toc.data(id).is_some_and(|node| node.href == url) {
                return selected;
            }
        }
        let page = without_query_and_hash(url);
        let hash = url.find('#').map(|i| &url[i..]).filter(|h| h.len() > 1);
        let mut exact = None;
        let mut same_page = None;
        self.toc.visit(|id, node| {
            if node.href_base() != page {
                return true;
            }
            if hash.is_none() || node.href_hash() == hash {
                exact = Some(id);
                return false;
            }
            same_page.get_or_insert(id);
            true
        });
        let found = match exact.or(same_page) {
            Some(id) => {
                self.toc.select(Some(id), true);
                Some(id)
            }
            None => {
                tracing::debug!("[Viewer] '{}' not in loaded TOC, resolving", url);
                self.toc.navigate_to_href(url, true).await
            }
        };
        self.sync_scope_selection();
        found
    }

    pub async fn type_ahead(&self, raw: &str) -> SearchOutcome {
        self.search.type_ahead(raw, self.scope.snapshot()).await
    }

    /// Submit a search. A rendered or re-pointed result page becomes the
    /// content view's page.
    pub async fn full_search(&self, raw: &str) -> SearchOutcome {
        let outcome = self.search.full_search(raw, self.scope.snapshot()).await;
        let url = match &outcome {
            SearchOutcome::Full(view) => Some(
                Route::Query(view.key.clone())
                    .content_url(self.channels.base(), self.config.search_hits_max),
            ),
            SearchOutcome::Repointed(url) => Some(url.clone()),
            _ => None,
        };
        if let Some(url) = url {
            *self.content.lock() = Some(url);
        }
        outcome
    }

    pub async fn set_scope(&self, scope: Scope) {
        self.scope.set_scope(scope).await;
    }

    /// Entries of the scope drop-down, custom scopes fetched fresh.
    pub async fn scope_menu(&self) -> Vec<ScopeMenuEntry> {
        let custom = self.scope.custom_scopes().await;
        self.scope.menu_entries(&custom)
    }

    fn sync_scope_selection(&self) {
        self.scope.update_selection(self.toc.selection_chain());
    }
}
