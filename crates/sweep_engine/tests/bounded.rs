mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use common::{init_logging, FakeMailApi};
use sweep_engine::{bounded_map, fetch_metadata, FailureKind};

fn ids(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("m{i}")).collect()
}

#[tokio::test]
async fn never_exceeds_the_limit_and_saturates_it() {
    init_logging();
    let mut api = FakeMailApi::new();
    for (i, id) in ids(12).iter().enumerate() {
        api = api.with_delay(id, Duration::from_millis(5 + (i as u64 % 4) * 7));
    }

    let ids = ids(12);
    let results = fetch_metadata(&api, &ids, 3).await.unwrap();

    assert_eq!(results.len(), 12);
    assert_eq!(api.max_in_flight(), 3);
}

#[tokio::test]
async fn output_follows_input_order_when_completion_does_not() {
    let api = FakeMailApi::new()
        .with_page(&[
            ("a", "A <a@a.com>"),
            ("b", "B <b@b.com>"),
            ("c", "C <c@c.com>"),
            ("d", "D <d@d.com>"),
        ])
        .with_delay("a", Duration::from_millis(5))
        .with_delay("b", Duration::from_millis(60))
        .with_delay("c", Duration::from_millis(1))
        .with_delay("d", Duration::from_millis(10));

    let input: Vec<String> = ["a", "b", "c", "d"].iter().map(|s| s.to_string()).collect();
    let results = fetch_metadata(&api, &input, 2).await.unwrap();

    let ids: Vec<_> = results.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b", "c", "d"]);
    assert_eq!(results[1].from.as_deref(), Some("B <b@b.com>"));
}

#[tokio::test]
async fn first_failure_is_propagated() {
    let api = FakeMailApi::new().fail_metadata_for("m4");
    let input = ids(10);

    let err = fetch_metadata(&api, &input, 4).await.unwrap_err();
    assert_eq!(err.kind, FailureKind::HttpStatus(500));
}

#[tokio::test]
async fn failure_stops_further_scheduling() {
    let input: Vec<usize> = (0..20).collect();
    let started = AtomicUsize::new(0);
    let limit = 2;

    let result = bounded_map(&input, limit, |n| {
        started.fetch_add(1, Ordering::SeqCst);
        let n = *n;
        async move {
            if n == 1 {
                return Err(format!("item {n} failed"));
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok(n)
        }
    })
    .await;

    assert_eq!(result, Err("item 1 failed".to_string()));
    let started = started.load(Ordering::SeqCst);
    assert!(
        started <= limit + 1,
        "{started} items started after the first failure"
    );
}

#[tokio::test]
async fn fewer_items_than_limit() {
    let input = vec![1u64, 2, 3];
    let doubled = bounded_map(&input, 10, |n| {
        let n = *n;
        async move {
            tokio::time::sleep(Duration::from_millis(4 - n)).await;
            Ok::<_, ()>(n * 2)
        }
    })
    .await
    .unwrap();
    assert_eq!(doubled, vec![2, 4, 6]);
}

#[tokio::test]
async fn empty_input_and_zero_limit() {
    let empty: Vec<u32> = Vec::new();
    let out = bounded_map(&empty, 0, |n| {
        let n = *n;
        async move { Ok::<_, ()>(n) }
    })
    .await
    .unwrap();
    assert!(out.is_empty());

    let input = vec![7u32, 8];
    let out = bounded_map(&input, 0, |n| {
        let n = *n;
        async move { Ok::<_, ()>(n + 1) }
    })
    .await
    .unwrap();
    assert_eq!(out, vec![8, 9]);
}
