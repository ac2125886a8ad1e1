//! WASM bindings for helpview-core
//!
//! Exposes one [`HelpViewerWasm`] session per viewer page. The page owns the
//! DOM; this module owns the state behind it and hands back plain data
//! (rows, views, URLs) for the page to draw.
//!
//! ## Usage
//!
//! ```javascript,ignore
//! import init, { HelpViewerWasm } from './helpview_core.js';
//!
//! async function main() {
//!     await init();
//!     const viewer = new HelpViewerWasm({ base_url: 'http://localhost/help/' });
//!     await viewer.init();
//!     contentFrame.src = await viewer.openLocation(window.location.href);
//!     contentFrame.onload = async () => {
//!         const doc = contentFrame.contentDocument;
//!         const sync = await viewer.contentLoaded(contentFrame.src, doc.documentElement.outerHTML);
//!         drawToc(viewer.tocRows());
//!         window.location.hash = viewer.route() ?? '';
//!     };
//!     searchField.oninput = async () => drawProposals(await viewer.typeAhead(searchField.value));
//! }
//! ```
//!
//! Views cross the boundary through `serde_wasm_bindgen`, so map-like fields
//! arrive as JavaScript `Map`s. Every view here is built from structs and
//! vectors only.
use crate::{
    channel::HttpFetcher,
    config::{ClientState, ViewerConfig},
    delay::TimeoutDelay,
    error::HelpError,
    scope::{editor::ScopeEditorPage, Scope},
    search::{PageStatus, ResultFilter, ResultView, SearchOutcome, TypeAheadView},
    tree::{NodeId, TreeKey, TreeRow},
    tristate::{CheckId, CheckRow},
    viewer::{ContentSync, HelpViewer},
};
use serde::Serialize;
use std::cell::RefCell;
use wasm_bindgen::prelude::*;
use web_sys::console;

/// `ClientState` over the browser's `localStorage`.
#[derive(Debug, Default)]
struct LocalStorageState;

impl LocalStorageState {
    fn storage() -> Option<web_sys::Storage> {
        web_sys::window()?.local_storage().ok().flatten()
    }
}

impl ClientState for LocalStorageState {
    fn get(&self, key: &str) -> Option<String> {
        Self::storage()?.get_item(key).ok().flatten()
    }

    fn set(&self, key: &str, value: &str) {
        if let Some(storage) = Self::storage() {
            if storage.set_item(key, value).is_err() {
                tracing::warn!("[Viewer] Cannot persist '{}'", key);
            }
        }
    }
}

#[derive(Serialize)]
#[serde(tag = "kind")]
enum OutcomeView<'a> {
    Hidden,
    TypeAhead {
        view: &'a TypeAheadView,
    },
    Full {
        key: &'a str,
        label: &'a str,
        scope_label: Option<&'a str>,
        message: Option<String>,
        results: Vec<&'a ResultView>,
    },
    Repointed {
        url: &'a str,
    },
    AlreadyShown,
    Status {
        text: Option<String>,
    },
    Stale,
    Dropped,
}

#[derive(Serialize)]
struct ScopeEditorView {
    name: String,
    is_new: bool,
    rows: Vec<CheckRow>,
}

fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(value).map_err(|e| {
        let msg = format!("Failed to serialize view: {e}");
        console::error_1(&msg.clone().into());
        JsValue::from_str(&msg)
    })
}

fn to_js_error(error: HelpError) -> JsValue {
    let msg = format!("{error}");
    console::error_1(&msg.clone().into());
    JsValue::from_str(&msg)
}

/// Browser session around [`HelpViewer`].
#[wasm_bindgen]
pub struct HelpViewerWasm {
    inner: HelpViewer<HttpFetcher, TimeoutDelay>,
    /// Filter of the full search on screen.
    filter: RefCell<Option<ResultFilter>>,
    /// Custom scope open in the editor.
    scope_page: RefCell<Option<ScopeEditorPage>>,
}

impl HelpViewerWasm {
    fn outcome_js(&self, outcome: &SearchOutcome) -> Result<JsValue, JsValue> {
        let status = || OutcomeView::Status {
            text: self.inner.search().page_status().text(),
        };
        match outcome {
            SearchOutcome::Hidden => to_js(&OutcomeView::Hidden),
            SearchOutcome::TypeAhead(view) => to_js(&OutcomeView::TypeAhead { view }),
            SearchOutcome::Full(view) => {
                *self.filter.borrow_mut() = view.filter.clone();
                to_js(&OutcomeView::Full {
                    key: &view.key,
                    label: &view.label,
                    scope_label: view.scope_label.as_deref(),
                    message: view.message(),
                    results: view.visible_results(),
                })
            }
            SearchOutcome::Repointed(url) => to_js(&OutcomeView::Repointed { url }),
            SearchOutcome::AlreadyShown => to_js(&OutcomeView::AlreadyShown),
            SearchOutcome::Indexing(_) => to_js(&status()),
            SearchOutcome::Stale => to_js(&OutcomeView::Stale),
            SearchOutcome::Dropped => match self.inner.search().page_status() {
                PageStatus::Searching => to_js(&status()),
                _ => to_js(&OutcomeView::Dropped),
            },
        }
    }

    /// Run `f` against the filter on screen, then hand back its visible
    /// result flags.
    fn with_filter(&self, f: impl FnOnce(&ResultFilter)) -> Result<JsValue, JsValue> {
        let filter = self.filter.borrow();
        let Some(filter) = filter.as_ref() else {
            return Ok(JsValue::NULL);
        };
        f(filter);
        to_js(&filter.visible())
    }

    fn open_scope_page(&self) -> Result<ScopeEditorPage, JsValue> {
        self.scope_page
            .borrow()
            .clone()
            .ok_or_else(|| to_js_error(HelpError::NotFound("open scope editor".to_string())))
    }

    async fn scope_view(page: &ScopeEditorPage) -> Result<JsValue, JsValue> {
        let rows = page.widget().await.check_rows();
        to_js(&ScopeEditorView {
            name: page.name.clone(),
            is_new: page.is_new,
            rows,
        })
    }
}

#[wasm_bindgen]
impl HelpViewerWasm {
    /// Create a session from a (possibly partial) `ViewerConfig` object.
    ///
    /// # JavaScript Example
    /// ```javascript,ignore
    /// const viewer = new HelpViewerWasm({ base_url: '/help/', right_to_left: false });
    /// ```
    #[wasm_bindgen(constructor)]
    pub fn new(config_js: JsValue) -> Result<HelpViewerWasm, JsValue> {
        if tracing_wasm::try_set_as_global_default().is_err() {
            console::log_1(&"tracing subscriber already installed".into());
        }
        let config: ViewerConfig = if config_js.is_undefined() || config_js.is_null() {
            ViewerConfig::default()
        } else {
            serde_wasm_bindgen::from_value(config_js)
                .map_err(HelpError::from)
                .map_err(to_js_error)?
        };
        let inner = HelpViewer::new(HttpFetcher::new(), TimeoutDelay, config, LocalStorageState)
            .map_err(to_js_error)?;
        console::log_1(&format!("Help viewer ready for {}", inner.channels().base()).into());
        Ok(HelpViewerWasm {
            inner,
            filter: RefCell::new(None),
            scope_page: RefCell::new(None),
        })
    }

    /// Load the books and restore the server-side scope.
    #[wasm_bindgen]
    pub async fn init(&self) {
        self.inner.init().await;
    }

    /// Content URL to show for the viewer page at `page_url`.
    #[wasm_bindgen(js_name = openLocation)]
    pub async fn open_location(&self, page_url: String) -> Option<String> {
        self.inner.open_location(&page_url).await
    }

    /// Fragment for the content view's page, including the `#`.
    #[wasm_bindgen]
    pub fn route(&self) -> Option<String> {
        self.inner.route().map(|route| route.to_string())
    }

    /// Visible TOC rows as `TreeRow` objects.
    #[wasm_bindgen(js_name = tocRows)]
    pub fn toc_rows(&self) -> Result<JsValue, JsValue> {
        let rows: Vec<TreeRow> = self.inner.toc().render_rows();
        to_js(&rows)
    }

    #[wasm_bindgen]
    pub async fn toggle(&self, id: usize) {
        self.inner.toggle(NodeId(id)).await;
    }

    /// Select a TOC row and return the topic URL to show.
    #[wasm_bindgen]
    pub fn select(&self, id: usize) -> Option<String> {
        self.inner.select_toc(NodeId(id))
    }

    /// Apply a navigation key (DOM `keyCode`) and return the row to focus.
    #[wasm_bindgen(js_name = handleKey)]
    pub async fn handle_key(&self, focused: usize, key_code: u32) -> Option<usize> {
        let key = TreeKey::from_key_code(key_code)?;
        self.inner
            .handle_key(NodeId(focused), key)
            .await
            .map(|id| id.0)
    }

    /// Report a page the content view loaded. Answers the search view for
    /// search pages and the selected row id for topics.
    #[wasm_bindgen(js_name = contentLoaded)]
    pub async fn content_loaded(&self, url: String, body: String) -> Result<JsValue, JsValue> {
        match self.inner.on_content_loaded(&url, &body).await {
            ContentSync::Search(outcome) => self.outcome_js(&outcome),
            ContentSync::Topic(id) => to_js(&id.map(|id| id.0)),
        }
    }

    #[wasm_bindgen(js_name = typeAhead)]
    pub async fn type_ahead(&self, raw: String) -> Result<JsValue, JsValue> {
        let outcome = self.inner.type_ahead(&raw).await;
        self.outcome_js(&outcome)
    }

    #[wasm_bindgen(js_name = hideProposals)]
    pub fn hide_proposals(&self) {
        self.inner.search().hide_proposals();
    }

    #[wasm_bindgen(js_name = fullSearch)]
    pub async fn full_search(&self, raw: String) -> Result<JsValue, JsValue> {
        let outcome = self.inner.full_search(&raw).await;
        self.outcome_js(&outcome)
    }

    /// `Searching...` / `Indexing... N%`, or null.
    #[wasm_bindgen(js_name = pageStatus)]
    pub fn page_status(&self) -> Option<String> {
        self.inner.search().page_status().text()
    }

    /// Rows of the result filter tree.
    #[wasm_bindgen(js_name = filterRows)]
    pub async fn filter_rows(&self) -> Result<JsValue, JsValue> {
        let widget = match self.filter.borrow().as_ref() {
            Some(filter) => filter.widget(),
            None => return Ok(JsValue::NULL),
        };
        widget.load_roots().await;
        to_js(&widget.check_rows())
    }

    /// Click a filter checkbox; answers the per-result visibility flags.
    #[wasm_bindgen(js_name = toggleFilter)]
    pub fn toggle_filter(&self, check: usize) -> Result<JsValue, JsValue> {
        self.with_filter(|filter| filter.toggle(CheckId(check)))
    }

    /// Show only the results below one filter node.
    #[wasm_bindgen(js_name = onlyFilter)]
    pub fn only_filter(&self, check: usize) -> Result<JsValue, JsValue> {
        self.with_filter(|filter| filter.only(CheckId(check)))
    }

    /// Switch scope. Accepts the `Scope` serde form (`"Book"`,
    /// `{ "Custom": { "name": "mine", "index": 0 } }`, ...).
    #[wasm_bindgen(js_name = setScope)]
    pub async fn set_scope(&self, scope_js: JsValue) -> Result<(), JsValue> {
        let scope: Scope = serde_wasm_bindgen::from_value(scope_js)
            .map_err(HelpError::from)
            .map_err(to_js_error)?;
        self.inner.set_scope(scope).await;
        Ok(())
    }

    #[wasm_bindgen(js_name = scopeMenu)]
    pub async fn scope_menu(&self) -> Result<JsValue, JsValue> {
        let entries = self.inner.scope_menu().await;
        to_js(&entries)
    }

    #[wasm_bindgen(js_name = scopeLabel)]
    pub fn scope_label(&self) -> Option<String> {
        self.inner.scope().button_label()
    }

    /// Names of the user's custom scopes.
    #[wasm_bindgen(js_name = customScopes)]
    pub async fn custom_scopes(&self) -> Result<JsValue, JsValue> {
        to_js(&self.inner.editor().list().await)
    }

    /// Open a custom scope for editing (a blank one without `name`). Answers
    /// `{ name, is_new, rows }`, or null when the server has no editor page.
    #[wasm_bindgen(js_name = openScope)]
    pub async fn open_scope(&self, name: Option<String>) -> Result<JsValue, JsValue> {
        let Some(page) = self.inner.editor().open(name.as_deref()).await else {
            *self.scope_page.borrow_mut() = None;
            return Ok(JsValue::NULL);
        };
        *self.scope_page.borrow_mut() = Some(page.clone());
        Self::scope_view(&page).await
    }

    /// Click a checkbox of the open scope; answers the refreshed editor view.
    #[wasm_bindgen(js_name = toggleScopeEntry)]
    pub async fn toggle_scope_entry(&self, check: usize) -> Result<JsValue, JsValue> {
        let page = self.open_scope_page()?;
        page.toggle(CheckId(check));
        Self::scope_view(&page).await
    }

    /// Store the open scope under `name` and close the editor. Answers the
    /// refreshed custom scope names.
    #[wasm_bindgen(js_name = saveScope)]
    pub async fn save_scope(&self, name: String) -> Result<JsValue, JsValue> {
        let page = self.open_scope_page()?;
        let names = match page.is_new {
            true => self.inner.editor().create(&page, &name).await,
            false => self.inner.editor().apply(&page, &name).await,
        };
        *self.scope_page.borrow_mut() = None;
        to_js(&names)
    }

    /// Delete the open scope and close the editor.
    #[wasm_bindgen(js_name = deleteScope)]
    pub async fn delete_scope(&self) -> Result<JsValue, JsValue> {
        let page = self.open_scope_page()?;
        let names = self.inner.editor().delete(&page).await;
        *self.scope_page.borrow_mut() = None;
        to_js(&names)
    }
}
