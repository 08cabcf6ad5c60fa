mod common;

use common::{init_logging, FakeMailApi};
use sweep_engine::{FailureKind, Paginator};

#[tokio::test]
async fn page_limit_stops_an_endless_backend() {
    init_logging();
    let api = FakeMailApi::new().endless();
    let mut paginator = Paginator::new(&api, "has:nouserlabels", 500).with_page_limit(3);

    let mut pages = 0;
    while let Some(page) = paginator.next_page().await.unwrap() {
        assert_eq!(page.ids.len(), 1);
        pages += 1;
    }

    assert_eq!(pages, 3);
    assert_eq!(api.list_calls().len(), 3);
    assert!(!paginator.has_more());
}

#[tokio::test]
async fn continuation_tokens_are_forwarded() {
    let api = FakeMailApi::new().with_ids(5, 2);
    let mut paginator =
        Paginator::new(&api, "from:a.com", 2).with_label(Some("INBOX".to_string()));
    while paginator.next_page().await.unwrap().is_some() {}

    let calls = api.list_calls();
    let tokens: Vec<_> = calls.iter().map(|c| c.page_token.clone()).collect();
    assert_eq!(tokens, vec![None, Some("1".to_string()), Some("2".to_string())]);
    assert!(calls.iter().all(|c| c.query == "from:a.com"));
    assert!(calls.iter().all(|c| c.label.as_deref() == Some("INBOX")));
    assert!(calls.iter().all(|c| c.page_size == 2));
}

#[tokio::test]
async fn collect_ids_drains_every_page() {
    let api = FakeMailApi::new().with_ids(1200, 500);
    let ids = Paginator::new(&api, "q", 500).collect_ids().await.unwrap();

    assert_eq!(ids.len(), 1200);
    assert_eq!(ids[0], "id-0");
    assert_eq!(ids[1199], "id-1199");
    assert_eq!(api.list_calls().len(), 3);
}

#[tokio::test]
async fn failed_page_is_not_skipped() {
    let api = FakeMailApi::new().with_ids(4, 2).fail_list_at(2);
    let mut paginator = Paginator::new(&api, "q", 2);

    paginator.next_page().await.unwrap().unwrap();
    let err = paginator.next_page().await.unwrap_err();
    assert_eq!(err.kind, FailureKind::HttpStatus(500));
    assert_eq!(paginator.pages_fetched(), 1);

    // The caller decides to retry; the same token is requested again.
    let page = paginator.next_page().await.unwrap().unwrap();
    assert_eq!(page.ids, vec!["id-2".to_string(), "id-3".to_string()]);
    let calls = api.list_calls();
    assert_eq!(calls[1].page_token, calls[2].page_token);
}

#[tokio::test]
async fn empty_mailbox_yields_one_empty_page() {
    let api = FakeMailApi::new();
    let mut paginator = Paginator::new(&api, "q", 500);

    let page = paginator.next_page().await.unwrap().unwrap();
    assert!(page.ids.is_empty());
    assert!(paginator.next_page().await.unwrap().is_none());
}
