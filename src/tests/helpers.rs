//! Shared test utilities: a scripted fetcher and server fixtures.

use crate::{
    channel::{Fetcher, RequestChannels},
    config::ViewerConfig,
    error::HelpError,
};
use parking_lot::Mutex;
use std::rc::Rc;
use tokio::sync::oneshot;
use url::Url;

/// Initialize logging for tests
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init()
        .ok();
}

/// Book "B1" → chapter "C1" → topic "T1".
pub const TOC_XML: &str = r#"<tree_data><node id="B1" title="Book" href="/topic/b1" is_leaf="false"><node id="C1" title="Chap" href="/topic/c1" is_leaf="false"><node id="T1" title="Topic" href="/topic/t1" is_leaf="true"/></node></node></tree_data>"#;

/// Where T1 lives: book 0, chapter 0, topic 0.
pub const NUMERIC_PATH_XML: &str = r#"<tree_data><numeric_path path="0_0_0"/></tree_data>"#;

/// Two well-formed rows (the first with a breadcrumb location) and a third
/// row whose link has no href.
pub const SEARCH_HTML: &str = r#"<html><body><table>
<tr class="result"><td class="icon"><img src="images/topic.gif"></td><td class="title"><a href="../topic/org.x/edit.html?resultof=%22edi%22" title="Workbench Guide">Editor basics</a></td></tr>
<tr><td></td><td><div class="location"><a href="../topic/org.x/toc.html">Workbench Guide</a> &gt; <a href="../topic/org.x/ch1.html">Getting started</a></div></td></tr>
<tr><td></td><td><div class="description">Open an editor on a file.</div></td></tr>
<tr class="result"><td class="icon"><img src="images/topic.gif"></td><td class="title"><a href="../topic/org.y/ref.html" title="Reference">Editor preferences</a></td></tr>
<tr><td></td><td><div class="description">Configure editor &amp; fonts.</div></td></tr>
<tr class="result"><td class="icon"><img src="images/topic.gif"></td><td class="title"><a title="Broken">Broken row</a></td></tr>
<tr><td></td><td><div class="description">No link here.</div></td></tr>
</table></body></html>"#;

pub const INDEXING_HTML: &str = r#"<html><body><div id='divProgress' STYLE='width:42px;height:8px;'></div></body></html>"#;

pub const EMPTY_SEARCH_HTML: &str = "<html><body><p>Nothing found.</p></body></html>";

pub const SCOPE_EDITOR_HTML: &str = r#"<form>
<p><input type="text" id="workingSet" value='My scope' maxlength="256"></p>
<script>var oldName = 'My scope';</script>
<div class="book"><input type="checkbox" id="b1" checked>&nbsp;<label for="/org.x/toc.xml">Workbench Guide</label>
<div class="topic"><input type="checkbox" checked><label for="/org.x/toc.xml_0">Getting started</label></div>
<div class="topic"><input type="checkbox"><label for="/org.x/toc.xml_1">Reference</label></div>
</div>
<div class="book"><input type="checkbox"><label for="/org.y/toc.xml">Platform Reference</label>
<div class="topic"><input type="checkbox"><label for="/org.y/toc.xml_0">API</label></div>
</div>
</form>"#;

enum Reply {
    Body(String),
    Status(u16),
}

/// Scripted transport. The first route whose needle occurs in the requested
/// URL answers; unrouted URLs get a 404. Gated requests wait until the gate's
/// sender fires (or is dropped).
#[derive(Default)]
pub struct MockFetcher {
    routes: Vec<(String, Reply)>,
    gates: Mutex<Vec<(String, oneshot::Receiver<()>)>>,
    log: Mutex<Vec<String>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(mut self, needle: &str, body: &str) -> Self {
        self.routes
            .push((needle.to_string(), Reply::Body(body.to_string())));
        self
    }

    pub fn fail(mut self, needle: &str, status: u16) -> Self {
        self.routes.push((needle.to_string(), Reply::Status(status)));
        self
    }

    /// Hold the next request matching `needle` until the returned sender
    /// fires.
    pub fn gate(&self, needle: &str) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.gates.lock().push((needle.to_string(), rx));
        tx
    }

    pub fn requests(&self) -> Vec<String> {
        self.log.lock().clone()
    }

    pub fn count(&self, needle: &str) -> usize {
        self.log.lock().iter().filter(|url| url.contains(needle)).count()
    }
}

impl Fetcher for MockFetcher {
    async fn get(&self, url: Url) -> Result<String, HelpError> {
        let url = url.to_string();
        self.log.lock().push(url.clone());
        let gate = {
            let mut gates = self.gates.lock();
            gates
                .iter()
                .position(|(needle, _)| url.contains(needle.as_str()))
                .map(|i| gates.remove(i).1)
        };
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        match self.routes.iter().find(|(needle, _)| url.contains(needle.as_str())) {
            Some((_, Reply::Body(body))) => Ok(body.clone()),
            Some((_, Reply::Status(status))) => Err(HelpError::Status(*status)),
            None => Err(HelpError::Status(404)),
        }
    }
}

/// Serves the TOC fixture for browsing and resolves any topic to T1.
pub fn toc_fetcher() -> MockFetcher {
    MockFetcher::new()
        .route("topic=", NUMERIC_PATH_XML)
        .route("expandPath=", TOC_XML)
        .route("advanced/tocfragment", TOC_XML)
}

/// Serves the two-row search page for every query, except `slow` (index
/// still building), `zzz` (no hits) and `broken` (server error).
pub fn search_fetcher() -> MockFetcher {
    MockFetcher::new()
        .route("searchWord=slow", INDEXING_HTML)
        .route("searchWord=zzz", EMPTY_SEARCH_HTML)
        .fail("searchWord=broken", 500)
        .route("searchView.jsp", SEARCH_HTML)
        .route("advanced/tocfragment", TOC_XML)
}

pub fn channels(fetcher: &Rc<MockFetcher>) -> Rc<RequestChannels<Rc<MockFetcher>>> {
    init_logging();
    Rc::new(
        RequestChannels::new(fetcher.clone(), &ViewerConfig::default())
            .expect("default config is valid"),
    )
}
