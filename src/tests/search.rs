use super::helpers::*;
use crate::{
    config::ViewerConfig,
    delay::{Delay, NoDelay, TokioDelay},
    scope::{ScopeLevel, ScopeSnapshot},
    search::{
        group_results,
        parse::parse_results,
        query::SearchQuery,
        CacheEntry, Crumb, PageStatus, ResultEntry, ResultFilter, SearchCache, SearchEngine,
        SearchOutcome, Segment,
    },
    toc::TocNode,
    tristate::{CheckId, TriState},
};
use futures::join;
use std::rc::Rc;
use test_log::test;

fn engine<D: Delay>(fetcher: &Rc<MockFetcher>, delay: D) -> SearchEngine<Rc<MockFetcher>, D> {
    SearchEngine::new(channels(fetcher), delay, &ViewerConfig::default())
}

fn book_snapshot() -> ScopeSnapshot {
    ScopeSnapshot {
        level: ScopeLevel::Book,
        custom_name: None,
        toc: Some("B1".to_string()),
        path: None,
        chain: vec![TocNode {
            toc: "B1".to_string(),
            title: "Book".to_string(),
            ..Default::default()
        }],
    }
}

fn entry(key: &str) -> CacheEntry {
    CacheEntry {
        key: key.to_string(),
        snapshot: ScopeSnapshot::none(),
        results: Vec::new(),
        has_breadcrumbs: false,
    }
}

#[test]
fn test_result_rows_parse() {
    let (results, has_breadcrumbs) = parse_results(SEARCH_HTML);

    assert_eq!(results.len(), 2, "the row without href is skipped");
    assert!(has_breadcrumbs);

    assert_eq!(results[0].title, "Editor basics");
    assert_eq!(results[0].href, "/org.x/edit.html?resultof=%22edi%22");
    assert_eq!(results[0].description, "Open an editor on a file.");
    assert_eq!(
        results[0].breadcrumb,
        vec![
            Crumb {
                href: Some("../topic/org.x/toc.html".to_string()),
                label: "Workbench Guide".to_string(),
            },
            Crumb {
                href: Some("../topic/org.x/ch1.html".to_string()),
                label: "Getting started".to_string(),
            },
        ]
    );

    assert_eq!(results[1].title, "Editor preferences");
    assert_eq!(results[1].description, "Configure editor & fonts.");
    assert_eq!(
        results[1].breadcrumb,
        vec![Crumb {
            href: None,
            label: "Reference".to_string(),
        }]
    );
    assert_eq!(results[1].book_title(), Some("Reference"));
}

#[test]
fn test_result_row_needs_book_title() {
    let html = r#"<table>
<tr class="result"><td class="icon"><img src="images/topic.gif"></td><td class="title"><a href="../topic/org.x/a.html">Untitled</a></td></tr>
<tr><td></td><td><div class="description">Row without a book.</div></td></tr>
<tr class="result"><td class="icon"><img src="images/topic.gif"></td><td class="title"><a href="../topic/org.x/b.html" title="Guide">Titled</a></td></tr>
<tr><td></td><td><div class="description">Row with a book.</div></td></tr>
</table>"#;

    let (results, has_breadcrumbs) = parse_results(html);

    assert_eq!(results.len(), 1);
    assert!(!has_breadcrumbs);
    assert_eq!(results[0].title, "Titled");
    assert_eq!(results[0].book_title(), Some("Guide"));
}

#[test]
fn test_cache_overwrites_oldest() {
    let mut cache = SearchCache::new(3);
    for key in ["a", "b", "c", "d"] {
        cache.insert(entry(key));
    }

    assert_eq!(cache.len(), 3);
    assert!(cache.get("a", &ScopeSnapshot::none()).is_none());
    let mut keys: Vec<&str> = cache.keys().collect();
    keys.sort();
    assert_eq!(keys, vec!["b", "c", "d"]);

    cache.insert(entry("e"));
    assert!(cache.get("b", &ScopeSnapshot::none()).is_none());
    assert!(cache.get("c", &ScopeSnapshot::none()).is_some());
}

#[test]
fn test_cache_matches_scope() {
    let mut cache = SearchCache::new(2);
    cache.insert(CacheEntry {
        snapshot: book_snapshot(),
        ..entry("edi&toc=B1")
    });

    let mut other_titles = book_snapshot();
    other_titles.chain.clear();
    assert!(cache.get("edi&toc=B1", &other_titles).is_some());
    assert!(cache.get("edi&toc=B1", &ScopeSnapshot::none()).is_none());
}

#[test]
fn test_groups_follow_breadcrumbs() {
    let (results, _) = parse_results(SEARCH_HTML);

    let groups = group_results(&results, 9);

    let [ResultEntry::Group(guide), ResultEntry::Group(reference)] = groups.as_slice() else {
        panic!("expected two groups, got {groups:?}");
    };
    assert_eq!(guide.label(), "Workbench Guide > Getting started");
    assert_eq!(guide.count, 1);
    assert_eq!(guide.children, vec![ResultEntry::Result(0)]);
    assert_eq!(reference.label(), "Reference");
    assert_eq!(reference.children, vec![ResultEntry::Result(1)]);
}

#[test]
fn test_filter_toggles_visibility() {
    let (results, _) = parse_results(SEARCH_HTML);
    let groups = group_results(&results, 9);
    let filter = ResultFilter::new(&results, &groups, "Results");
    let guide = CheckId(1);
    let reference = CheckId(2);
    assert_eq!(filter.visible(), vec![true, true]);

    filter.toggle(reference);
    assert_eq!(filter.visible(), vec![true, false]);
    assert_eq!(filter.tree().lock().state(filter.root()), TriState::Indeterminate);

    filter.only(reference);
    assert_eq!(filter.visible(), vec![false, true]);
    assert_eq!(filter.tree().lock().state(guide), TriState::Unchecked);

    filter.toggle(filter.root());
    assert_eq!(filter.visible(), vec![true, true]);
    assert_eq!(filter.tree().lock().state(filter.root()), TriState::Checked);

    filter.toggle(guide);
    filter.toggle(reference);
    assert_eq!(filter.visible(), vec![false, false]);
    assert_eq!(filter.tree().lock().state(filter.root()), TriState::Unchecked);
}

#[test(tokio::test)]
async fn test_filter_widget_lists_groups() {
    let (results, _) = parse_results(SEARCH_HTML);
    let groups = group_results(&results, 9);
    let filter = ResultFilter::new(&results, &groups, "Results");
    let widget = filter.widget();

    widget.load_roots().await;

    let labels: Vec<String> = widget.render_rows().into_iter().map(|r| r.label).collect();
    assert_eq!(labels.len(), 3);
    assert!(labels[0].ends_with("Results (2)"));
    assert!(labels[1].ends_with("Workbench Guide > Getting started (1)"));
}

#[test(tokio::test)]
async fn test_type_ahead_hits_cache() {
    let fetcher = Rc::new(search_fetcher());
    let engine = engine(&fetcher, NoDelay);

    let first = engine.type_ahead("edi", ScopeSnapshot::none()).await;
    engine.hide_proposals();
    let second = engine.type_ahead("edi", ScopeSnapshot::none()).await;

    let (SearchOutcome::TypeAhead(first), SearchOutcome::TypeAhead(second)) = (first, second) else {
        panic!("expected proposals");
    };
    assert_eq!(first, second);
    assert_eq!(fetcher.count("searchWord=edi*"), 1);

    engine.type_ahead("edit", ScopeSnapshot::none()).await;
    engine.type_ahead("edi", ScopeSnapshot::none()).await;
    assert_eq!(fetcher.count("searchWord=edi*"), 1);
    assert_eq!(fetcher.count("searchWord=edit*"), 1);
}

#[test(tokio::test)]
async fn test_type_ahead_view() {
    let fetcher = Rc::new(search_fetcher());
    let engine = engine(&fetcher, NoDelay);

    let SearchOutcome::TypeAhead(view) = engine.type_ahead("edi", ScopeSnapshot::none()).await else {
        panic!("expected proposals");
    };

    assert_eq!(view.key, "edi");
    assert_eq!(view.label, "Search: edi");
    assert_eq!(view.results.len(), 2);
    assert_eq!(
        view.results[0].title,
        vec![
            Segment::Strong("Edi".to_string()),
            Segment::Plain("tor basics".to_string()),
        ]
    );
    assert_eq!(view.results[0].book.as_deref(), Some("Workbench Guide"));
    assert_eq!(
        view.results[0].url,
        "http://localhost/help/topic/org.x/edit.html?resultof=%22edi%22"
    );
    assert_eq!(view.hints.completion.as_deref(), Some("editor"));
    assert_eq!(view.hints.proposals.len(), 1);
    assert_eq!(view.hints.proposals[0].typed, "edi");
    assert_eq!(view.hints.proposals[0].completion, "tor");
    assert_eq!(engine.proposals(), Some(view));
    assert_eq!(
        fetcher.requests(),
        vec!["http://localhost/help/advanced/searchView.jsp?showSearchCategories=false&searchWord=edi*&maxHits=7".to_string()]
    );
}

#[test(tokio::test)]
async fn test_type_ahead_edge_cases() {
    let fetcher = Rc::new(search_fetcher());
    let engine = engine(&fetcher, NoDelay);

    assert!(matches!(
        engine.type_ahead("   ", ScopeSnapshot::none()).await,
        SearchOutcome::Hidden
    ));
    assert!(matches!(
        engine.type_ahead("zzz", ScopeSnapshot::none()).await,
        SearchOutcome::Hidden
    ));
    assert!(matches!(
        engine.type_ahead("broken", ScopeSnapshot::none()).await,
        SearchOutcome::Dropped
    ));
    assert!(matches!(
        engine.type_ahead("slow", ScopeSnapshot::none()).await,
        SearchOutcome::Indexing(42)
    ));
    assert_eq!(engine.current(false), None);
    assert_eq!(fetcher.requests().len(), 3);
    assert_eq!(engine.cache_keys(false), vec!["zzz".to_string()]);
}

#[test(tokio::test)]
async fn test_stale_answer_is_discarded() {
    let fetcher = Rc::new(search_fetcher());
    let engine = engine(&fetcher, NoDelay);
    let _held = fetcher.gate("searchWord=edi*");

    let (first, second) = join!(
        engine.type_ahead("edi", ScopeSnapshot::none()),
        engine.type_ahead("edit", ScopeSnapshot::none())
    );

    assert!(matches!(first, SearchOutcome::Dropped));
    let SearchOutcome::TypeAhead(view) = second else {
        panic!("expected proposals for the newer query");
    };
    assert_eq!(view.key, "edit");
    assert_eq!(engine.cache_keys(false), vec!["edit".to_string()]);

    // A late answer for the superseded query changes nothing.
    let late = SearchQuery::new("edi", ScopeSnapshot::none(), false);
    assert!(matches!(engine.deliver(&late, SEARCH_HTML), SearchOutcome::Stale));
    assert_eq!(engine.cache_keys(false), vec!["edit".to_string()]);
    assert_eq!(engine.proposals().map(|p| p.key), Some("edit".to_string()));
}

#[test(tokio::test(start_paused = true))]
async fn test_typing_burst_is_debounced() {
    let fetcher = Rc::new(search_fetcher());
    let engine = engine(&fetcher, TokioDelay);
    let _held = fetcher.gate("searchWord=e*");

    let (e, ed, edi) = join!(
        engine.type_ahead("e", ScopeSnapshot::none()),
        engine.type_ahead("ed", ScopeSnapshot::none()),
        engine.type_ahead("edi", ScopeSnapshot::none())
    );

    assert!(matches!(e, SearchOutcome::Dropped));
    assert!(matches!(ed, SearchOutcome::Stale));
    assert!(matches!(edi, SearchOutcome::TypeAhead(_)));
    assert_eq!(fetcher.count("searchWord=ed*"), 0);
    assert_eq!(fetcher.count("searchWord=edi*"), 1);
}

#[test(tokio::test)]
async fn test_full_search_page_lifecycle() {
    let fetcher = Rc::new(search_fetcher());
    let engine = engine(&fetcher, NoDelay);

    let SearchOutcome::Full(view) = engine.full_search("Editor", ScopeSnapshot::none()).await else {
        panic!("expected a result page");
    };
    assert_eq!(view.key, "editor");
    assert_eq!(view.label, "Search: Editor");
    assert_eq!(view.scope_label, None);
    assert_eq!(view.message(), None);
    assert_eq!(view.visible_results().len(), 2);
    assert_eq!(view.results[0].location, vec!["Workbench Guide", "Getting started"]);
    assert_eq!(engine.page_status(), PageStatus::Results);
    assert_eq!(engine.page_key().as_deref(), Some("editor"));

    assert!(matches!(
        engine.full_search("editor", ScopeSnapshot::none()).await,
        SearchOutcome::AlreadyShown
    ));

    engine.close_page();
    let SearchOutcome::Repointed(url) = engine.full_search("editor", ScopeSnapshot::none()).await else {
        panic!("expected the page to be re-pointed");
    };
    assert_eq!(
        url,
        "http://localhost/help/advanced/searchView.jsp?showSearchCategories=false&searchWord=editor&maxHits=500"
    );
    assert_eq!(fetcher.count("searchWord=editor&"), 1);

    engine.full_search("other", ScopeSnapshot::none()).await;
    assert!(matches!(
        engine.full_search("editor", ScopeSnapshot::none()).await,
        SearchOutcome::Full(_)
    ));
    assert_eq!(fetcher.count("searchWord=editor&"), 1, "served from cache");
}

#[test(tokio::test)]
async fn test_full_search_status() {
    let fetcher = Rc::new(search_fetcher());
    let engine = engine(&fetcher, NoDelay);

    assert!(matches!(
        engine.full_search("slow", ScopeSnapshot::none()).await,
        SearchOutcome::Indexing(42)
    ));
    assert_eq!(engine.page_status(), PageStatus::Indexing(42));
    assert_eq!(engine.page_status().text().as_deref(), Some("Indexing... 42%"));

    assert!(matches!(
        engine.full_search("broken", ScopeSnapshot::none()).await,
        SearchOutcome::Dropped
    ));
    assert_eq!(engine.page_status(), PageStatus::Searching);
    assert!(engine.cache_keys(true).is_empty());

    let SearchOutcome::Full(view) = engine.full_search("zzz", ScopeSnapshot::none()).await else {
        panic!("expected an empty result page");
    };
    assert_eq!(view.message().as_deref(), Some("No results found for zzz"));
    assert!(view.filter.is_none());
}

#[test(tokio::test)]
async fn test_scoped_full_search() {
    let fetcher = Rc::new(search_fetcher());
    let engine = engine(&fetcher, NoDelay);

    let SearchOutcome::Full(view) = engine.full_search("editor", book_snapshot()).await else {
        panic!("expected a result page");
    };

    assert_eq!(view.key, "editor&toc=B1");
    assert_eq!(view.label, "Search (Book): editor");
    assert_eq!(view.scope_label.as_deref(), Some("Book"));
    assert_eq!(view.results[0].location, vec!["Getting started"]);
    assert_eq!(
        fetcher.count("searchWord=editor&toc=B1&maxHits=500&quickSearch=true&quickSearchType=QuickSearchToc"),
        1
    );
    let filter = view.filter.expect("results come with a filter");
    let root = filter.tree().lock().value(filter.root()).map(|e| e.label.clone());
    assert_eq!(root.as_deref(), Some("Results in Book"));
}

#[test(tokio::test)]
async fn test_loaded_search_page_is_rendered() {
    let fetcher = Rc::new(search_fetcher());
    let engine = engine(&fetcher, NoDelay);
    let query_part = "editor&toc=B1&maxHits=500&quickSearch=true&quickSearchType=QuickSearchToc";

    let SearchOutcome::Full(view) = engine.render_full_search(query_part, SEARCH_HTML, &[]).await else {
        panic!("expected a result page");
    };
    assert_eq!(view.key, "editor&toc=B1");
    assert_eq!(view.label, "Search (Book): editor");
    assert_eq!(fetcher.count("tocfragment?toc=B1"), 1, "scope chain comes from the server");

    assert!(matches!(
        engine.render_full_search(query_part, SEARCH_HTML, &[]).await,
        SearchOutcome::AlreadyShown
    ));
    let cached = engine.cached(true, "editor&toc=B1", &book_snapshot());
    assert_eq!(cached.map(|e| e.results.len()), Some(2));
}
