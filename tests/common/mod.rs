//! Shared test utilities for integration tests.
//!
//! Import from integration test files as:
//! ```ignore
//! mod common;
//! ```

use helpview_core::{channel::Fetcher, HelpError};
use parking_lot::Mutex;
use url::Url;

/// Initialize tracing for tests, respecting RUST_LOG env var.
///
/// Safe to call multiple times; subsequent calls are no-ops.
#[allow(dead_code)]
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init()
        .ok();
}

pub const TOC_XML: &str = r#"<tree_data><node id="B1" title="Book" href="/topic/b1" is_leaf="false"><node id="C1" title="Chap" href="/topic/c1" is_leaf="false"><node id="T1" title="Topic" href="/topic/t1" is_leaf="true"/></node></node></tree_data>"#;

pub const NUMERIC_PATH_XML: &str = r#"<tree_data><numeric_path path="0_0_0"/></tree_data>"#;

pub const SEARCH_HTML: &str = r#"<table>
<tr class="result"><td class="icon"><img src="images/topic.gif"></td><td class="title"><a href="../topic/org.x/edit.html" title="Workbench Guide">Editor basics</a></td></tr>
<tr><td></td><td><div class="location"><a href="../topic/org.x/toc.html">Workbench Guide</a> &gt; <a href="../topic/org.x/ch1.html">Getting started</a></div></td></tr>
<tr><td></td><td><div class="description">Open an editor on a file.</div></td></tr>
<tr class="result"><td class="icon"><img src="images/topic.gif"></td><td class="title"><a href="../topic/org.y/ref.html" title="Reference">Editor preferences</a></td></tr>
<tr><td></td><td><div class="description">Configure editor fonts.</div></td></tr>
</table>"#;

pub const START_PAGE_HTML: &str =
    r#"<html><iframe name="ContentViewFrame" title="Topic View" src='t1'></iframe></html>"#;

/// Scripted transport: the first route whose needle occurs in the URL
/// answers, anything else is a 404.
#[derive(Default)]
pub struct MockFetcher {
    routes: Vec<(String, String)>,
    log: Mutex<Vec<String>>,
}

#[allow(dead_code)]
impl MockFetcher {
    pub fn route(mut self, needle: &str, body: &str) -> Self {
        self.routes.push((needle.to_string(), body.to_string()));
        self
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
        self.routes
            .iter()
            .find(|(needle, _)| url.contains(needle.as_str()))
            .map(|(_, body)| body.clone())
            .ok_or(HelpError::Status(404))
    }
}

/// A help server with one book, one custom scope and no active scope.
#[allow(dead_code)]
pub fn help_server() -> MockFetcher {
    MockFetcher::default()
        .route("topic=", NUMERIC_PATH_XML)
        .route("expandPath=", TOC_XML)
        .route("advanced/tocfragment", TOC_XML)
        .route("searchView.jsp", SEARCH_HTML)
        .route("advanced/content.jsp", START_PAGE_HTML)
        .route("advanced/search.jsp", r#"<div id="scope">All</div>"#)
        .route("workingSetManager.jsp", r#"<a href="x" title="Mine">Mine</a>"#)
        .route("workingSetState.jsp", "ok")
}
