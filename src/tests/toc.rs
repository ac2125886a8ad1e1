use super::helpers::*;
use crate::{
    toc::{parse_fragment, parse_scope_chain, Fragment, TocNode, TocProvider, TocQuery},
    tree::{NodeId, TreeWidget},
};
use std::rc::Rc;
use test_log::test;
use url::Url;

type TocWidget = TreeWidget<TocNode, TocProvider<Rc<MockFetcher>>>;

fn toc_widget(fetcher: &Rc<MockFetcher>) -> TocWidget {
    TreeWidget::new(
        TocProvider::new(channels(fetcher), 4),
        |node: &TocNode| node.title.clone(),
        true,
    )
}

fn titled(widget: &TocWidget, title: &str) -> Option<NodeId> {
    widget.read(|tree| {
        (0..tree.len())
            .map(NodeId)
            .find(|id| tree.data(*id).is_some_and(|n| n.title == title))
    })
}

#[test]
fn test_fragment_levels() {
    let base = Url::parse("http://localhost/help/").unwrap();

    let Fragment::Nodes(roots) = parse_fragment(TOC_XML, &TocQuery::Roots, &base).unwrap() else {
        panic!("expected nodes");
    };
    assert_eq!(roots.len(), 1);
    assert_eq!(roots[0].data.title, "Book");
    assert_eq!(roots[0].data.href, "http://localhost/help/topic/b1");
    assert!(roots[0].data.is_book());
    assert!(!roots[0].is_leaf);

    let chapter_query = TocQuery::Children {
        toc: "B1".to_string(),
        path: Some("C1".to_string()),
    };
    let Fragment::Nodes(topics) = parse_fragment(TOC_XML, &chapter_query, &base).unwrap() else {
        panic!("expected nodes");
    };
    assert_eq!(topics.len(), 1);
    assert_eq!(topics[0].data.toc, "B1");
    assert_eq!(topics[0].data.path.as_deref(), Some("T1"));
    assert!(topics[0].is_leaf);

    assert_eq!(
        parse_fragment(NUMERIC_PATH_XML, &TocQuery::Roots, &base).unwrap(),
        Fragment::NumericPath("0_0_0".to_string())
    );
    assert!(parse_fragment("<tree_data>", &TocQuery::Roots, &base).is_err());
}

#[test]
fn test_query_urls() {
    assert_eq!(TocQuery::Roots.relative_url(), "advanced/tocfragment");
    assert_eq!(
        TocQuery::Children {
            toc: "/org.x/toc.xml".to_string(),
            path: Some("0_1".to_string()),
        }
        .relative_url(),
        "advanced/tocfragment?toc=%2Forg.x%2Ftoc.xml&path=0_1"
    );
    assert_eq!(
        TocQuery::Expand("0_0_0".to_string()).relative_url(),
        "advanced/tocfragment?errorSuppress=true&expandPath=0_0_0"
    );
}

#[test]
fn test_scope_chain_titles() {
    let chain = parse_scope_chain(TOC_XML, "B1", Some("C1")).unwrap();
    let titles: Vec<&str> = chain.iter().map(|n| n.title.as_str()).collect();
    assert_eq!(titles, vec!["Book", "Chap"]);
    assert!(chain[0].is_book());

    let nested = r#"<tree_data><node id="b" title="B"><node id="0" title="Zero"><node id="0_2" title="Two" is_leaf="true"/></node></node></tree_data>"#;
    let chain = parse_scope_chain(nested, "b", Some("0_2")).unwrap();
    let titles: Vec<&str> = chain.iter().map(|n| n.title.as_str()).collect();
    assert_eq!(titles, vec!["B", "Zero", "Two"]);
    assert!(chain[2].is_leaf);

    assert!(parse_scope_chain(TOC_XML, "B9", None).is_err());
}

#[test(tokio::test)]
async fn test_toc_loads_lazily() {
    let fetcher = Rc::new(toc_fetcher());
    let widget = toc_widget(&fetcher);

    widget.load_roots().await;
    let book = titled(&widget, "Book").unwrap();
    widget.toggle(book).await;
    let chapter = titled(&widget, "Chap").unwrap();
    widget.toggle(chapter).await;

    assert!(titled(&widget, "Topic").is_some());
    assert_eq!(fetcher.count("toc=B1&path=C1"), 1);
    assert_eq!(fetcher.count("tocfragment"), 3);
}

#[test(tokio::test)]
async fn test_deep_link_selects_topic() {
    let fetcher = Rc::new(toc_fetcher());
    let widget = toc_widget(&fetcher);

    let found = widget
        .navigate_to_href("http://localhost/help/topic/t1", true)
        .await;

    let topic = titled(&widget, "Topic").unwrap();
    assert_eq!(found, Some(topic));
    assert_eq!(widget.selected(), Some(topic));
    assert!(widget.is_expanded(titled(&widget, "Book").unwrap()));
    assert!(widget.is_expanded(titled(&widget, "Chap").unwrap()));
    let labels: Vec<String> = widget.render_rows().into_iter().map(|r| r.label).collect();
    assert_eq!(labels, vec!["Book", "Chap", "Topic"]);
    let chain: Vec<String> = widget.selection_chain().into_iter().map(|n| n.title).collect();
    assert_eq!(chain, vec!["Topic", "Chap", "Book"]);
    assert_eq!(fetcher.count("expandPath=0_0_0"), 1);
}

#[test(tokio::test)]
async fn test_unknown_topic_clears_selection() {
    let fetcher = Rc::new(
        MockFetcher::new()
            .route("topic=", "<tree_data/>")
            .route("advanced/tocfragment", TOC_XML),
    );
    let widget = toc_widget(&fetcher);
    widget.load_roots().await;
    widget.select(titled(&widget, "Book"), false);

    assert_eq!(widget.navigate_to_href("http://localhost/help/topic/zz", true).await, None);
    assert_eq!(widget.selected(), None);
}

#[test(tokio::test)]
async fn test_numeric_path_hops_are_bounded() {
    let fetcher = Rc::new(
        MockFetcher::new()
            .route("topic=", NUMERIC_PATH_XML)
            .route("expandPath=", NUMERIC_PATH_XML),
    );
    let provider = TocProvider::new(channels(&fetcher), 4);

    let answer = provider
        .fetch(TocQuery::Topic("http://localhost/help/topic/t1".to_string()))
        .await;

    assert!(answer.is_none());
    assert_eq!(fetcher.count("expandPath="), 4);
}

#[test(tokio::test)]
async fn test_scope_chain_from_server() {
    let fetcher = Rc::new(toc_fetcher());
    let provider = TocProvider::new(channels(&fetcher), 4);

    let chain = provider.scope_chain("B1", Some("C1")).await.unwrap();

    let titles: Vec<&str> = chain.iter().map(|n| n.title.as_str()).collect();
    assert_eq!(titles, vec!["Book", "Chap"]);
    assert_eq!(fetcher.count("toc=B1&path=C1"), 1);
}
