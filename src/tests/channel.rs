use super::helpers::*;
use futures::join;
use std::rc::Rc;
use test_log::test;

#[test(tokio::test)]
async fn test_request_answers_body_or_none() {
    let fetcher = Rc::new(
        MockFetcher::new()
            .route("ok.html", "fine")
            .fail("broken.html", 500),
    );
    let channels = channels(&fetcher);

    assert_eq!(channels.request("ok.html", None).await.as_deref(), Some("fine"));
    assert_eq!(channels.request("broken.html", Some("c")).await, None);
    assert_eq!(channels.request("missing.html", None).await, None);
    assert!(!channels.is_pending("c"));
    assert_eq!(
        fetcher.requests(),
        vec![
            "http://localhost/help/ok.html".to_string(),
            "http://localhost/help/broken.html".to_string(),
            "http://localhost/help/missing.html".to_string(),
        ]
    );
}

#[test(tokio::test)]
async fn test_newer_request_supersedes_pending_one() {
    let fetcher = Rc::new(MockFetcher::new().route("page", "answer"));
    let channels = channels(&fetcher);
    let _held = fetcher.gate("page1");

    let (first, second) = join!(
        channels.request("page1", Some("search")),
        channels.request("page2", Some("search"))
    );

    assert_eq!(first, None);
    assert_eq!(second.as_deref(), Some("answer"));
    assert!(!channels.is_pending("search"));
}

#[test(tokio::test)]
async fn test_channel_serves_requests_after_supersession() {
    let fetcher = Rc::new(MockFetcher::new().route("page", "answer"));
    let channels = channels(&fetcher);
    let _held = fetcher.gate("page1");

    let (first, _) = join!(
        channels.request("page1", Some("search")),
        channels.request("page2", Some("search"))
    );
    let third = channels.request("page3", Some("search")).await;

    assert_eq!(first, None);
    assert_eq!(third.as_deref(), Some("answer"));
    assert!(!channels.is_pending("search"));
    assert_eq!(fetcher.count("page"), 3);
}

#[test(tokio::test)]
async fn test_cancel_drops_pending_request() {
    let fetcher = Rc::new(MockFetcher::new().route("page", "answer"));
    let channels = channels(&fetcher);
    let _held = fetcher.gate("page");

    let (answer, _) = join!(channels.request("page", Some("search")), async {
        assert!(channels.is_pending("search"));
        channels.cancel("search");
    });

    assert_eq!(answer, None);
    assert!(!channels.is_pending("search"));
}

#[test(tokio::test)]
async fn test_requests_without_channel_run_side_by_side() {
    let fetcher = Rc::new(MockFetcher::new().route(".html", "body"));
    let channels = channels(&fetcher);
    let gate = fetcher.gate("a.html");

    let (a, b) = join!(channels.request("a.html", None), async {
        let b = channels.request("b.html", None).await;
        gate.send(()).ok();
        b
    });

    assert_eq!(a.as_deref(), Some("body"));
    assert_eq!(b.as_deref(), Some("body"));
}
