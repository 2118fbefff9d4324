use super::*;
use s3sync_core::BackendClient;
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::listing::cache::DEFAULT_LISTING_TTL;

fn make_view(server: &MockServer, bucket: &str) -> ListingView {
    let client = BackendClient::with_base_url(&server.uri()).unwrap();
    ListingView::new(
        RemoteListingService::new(client),
        bucket,
        DEFAULT_LISTING_TTL,
    )
}

fn names(snapshot: &ListingSnapshot) -> Vec<&str> {
    snapshot.entries.iter().map(|e| e.name.as_str()).collect()
}

async fn mount_listing(server: &MockServer, prefix: &str, keys: serde_json::Value, calls: u64) {
    Mock::given(method("GET"))
        .and(path("/files"))
        .and(query_param("path", prefix))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "files": keys })))
        .expect(calls)
        .mount(server)
        .await;
}

#[tokio::test]
async fn navigate_fetches_once_then_serves_cache() {
    let server = MockServer::start().await;
    mount_listing(
        &server,
        "Media/",
        json!([
            {"Key": "Media/b.mp4", "Size": 5},
            {"Key": "Media/Raw/", "Type": "prefix"}
        ]),
        1,
    )
    .await;

    let view = make_view(&server, "photos");
    let first = view.navigate("/Media").await;
    assert_eq!(names(&first), vec!["Raw", "b.mp4"]);
    assert!(!first.loading);
    assert_eq!(first.error, None);

    let second = view.navigate("Media//").await;
    assert_eq!(second.entries, first.entries);
    assert_eq!(second.path, NormalizedPath::new("Media"));
}

#[tokio::test]
async fn refresh_bypasses_cache() {
    let server = MockServer::start().await;
    mount_listing(&server, "", json!([{"Key": "a.txt", "Size": 1}]), 2).await;

    let view = make_view(&server, "photos");
    view.navigate("").await;
    let refreshed = view.refresh().await;
    assert_eq!(names(&refreshed), vec!["a.txt"]);
}

#[tokio::test]
async fn late_response_for_previous_path_is_discarded() {
    let server = MockServer::start().await;
    mount_listing(&server, "y/", json!([{"Key": "y/new.txt", "Size": 1}]), 1).await;

    let view = make_view(&server, "photos");
    let Lookup::Fetch(x_ticket) = view.begin("/x") else {
        panic!("expected fetch for x");
    };
    let Lookup::Fetch(y_ticket) = view.begin("/y") else {
        panic!("expected fetch for y");
    };

    let y_result = view.service.fetch(y_ticket.path(), y_ticket.bucket()).await;
    assert!(view.complete(y_ticket, y_result));
    assert!(!view.complete(x_ticket, Ok(vec![RawStorageKey::object("x/old.txt", 1)])));

    let shown = view.snapshot();
    assert_eq!(shown.path, NormalizedPath::new("y"));
    assert_eq!(names(&shown), vec!["new.txt"]);

    // The late result was still a valid listing of x.
    let Lookup::Cached(cached) = view.begin("x") else {
        panic!("expected x to be cached");
    };
    assert_eq!(cached[0].name, "old.txt");
}

#[tokio::test]
async fn slow_fetch_does_not_overwrite_newer_path() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/files"))
        .and(query_param("path", "x/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"files": [{"Key": "x/slow.txt", "Size": 1}]}))
                .set_delay(Duration::from_millis(300)),
        )
        .mount(&server)
        .await;
    mount_listing(&server, "y/", json!([{"Key": "y/fast.txt", "Size": 1}]), 1).await;

    let view = make_view(&server, "photos");
    tokio::join!(view.navigate("/x"), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        view.navigate("/y").await
    });

    let shown = view.snapshot();
    assert_eq!(shown.path, NormalizedPath::new("y"));
    assert_eq!(names(&shown), vec!["fast.txt"]);
}

#[tokio::test]
async fn failed_listing_clears_entries_and_is_not_cached() {
    let server = MockServer::start().await;
    mount_listing(&server, "ok/", json!([{"Key": "ok/a.txt", "Size": 1}]), 1).await;
    Mock::given(method("GET"))
        .and(path("/files"))
        .and(query_param("path", "broken/"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({"error": "NoSuchBucket"})))
        .expect(2)
        .mount(&server)
        .await;

    let view = make_view(&server, "photos");
    view.navigate("ok").await;
    let failed = view.navigate("broken").await;
    assert!(failed.entries.is_empty());
    assert_eq!(failed.error.as_deref(), Some("NoSuchBucket"));

    let again = view.navigate("broken").await;
    assert_eq!(again.error.as_deref(), Some("NoSuchBucket"));
}

#[tokio::test]
async fn invalidate_all_forces_refetch_and_marks_snapshot_stale() {
    let server = MockServer::start().await;
    mount_listing(&server, "", json!([{"Key": "a.txt", "Size": 1}]), 2).await;

    let view = make_view(&server, "photos");
    view.navigate("/").await;
    view.invalidate_all();
    assert!(view.snapshot().stale);

    let fresh = view.navigate("/").await;
    assert!(!fresh.stale);
    assert_eq!(names(&fresh), vec!["a.txt"]);
}

#[tokio::test]
async fn fetch_straddling_invalidation_is_dropped() {
    let server = MockServer::start().await;
    let view = make_view(&server, "photos");

    let Lookup::Fetch(ticket) = view.begin("Docs") else {
        panic!("expected fetch");
    };
    view.invalidate_all();
    assert!(!view.complete(ticket, Ok(vec![RawStorageKey::object("Docs/pre-sync.txt", 1)])));

    assert!(matches!(view.begin("Docs"), Lookup::Fetch(_)));
}

#[tokio::test]
async fn invalidation_during_navigate_ends_loading_as_stale() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/files"))
        .and(query_param("path", ""))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"files": [{"Key": "a.txt", "Size": 1}]}))
                .set_delay(Duration::from_millis(200)),
        )
        .expect(2)
        .mount(&server)
        .await;

    let view = make_view(&server, "photos");
    let (shown, _) = tokio::join!(view.navigate("/"), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        view.invalidate_all();
    });

    assert!(!shown.loading);
    assert!(shown.stale);
    assert_eq!(names(&shown), vec!["a.txt"]);

    // Not cached: the next visit fetches again and comes back fresh.
    let fresh = view.navigate("/").await;
    assert!(!fresh.stale);
    assert!(!fresh.loading);
}

#[tokio::test]
async fn superseded_fetch_for_same_path_does_not_end_loading() {
    let server = MockServer::start().await;
    let view = make_view(&server, "photos");

    let Lookup::Fetch(older) = view.begin("Docs") else {
        panic!("expected fetch");
    };
    view.invalidate_all();
    let Lookup::Fetch(_newer) = view.begin("Docs") else {
        panic!("expected fetch");
    };

    assert!(!view.complete(older, Ok(vec![RawStorageKey::object("Docs/old.txt", 1)])));
    assert!(view.snapshot().loading);
}

#[tokio::test]
async fn bucket_change_during_fetch_shows_no_old_entries() {
    let server = MockServer::start().await;
    let view = make_view(&server, "photos");

    let Lookup::Fetch(ticket) = view.begin("") else {
        panic!("expected fetch");
    };
    view.set_bucket("videos");
    assert!(!view.complete(ticket, Ok(vec![RawStorageKey::object("p.jpg", 1)])));

    let shown = view.snapshot();
    assert!(!shown.loading);
    assert!(shown.stale);
    assert!(shown.entries.is_empty());
}

#[tokio::test]
async fn changing_bucket_drops_cached_listings() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/files"))
        .and(query_param("bucket", "photos"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"files": [{"Key": "p.jpg", "Size": 1}]})),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/files"))
        .and(query_param("bucket", "videos"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"files": [{"Key": "v.mp4", "Size": 1}]})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let view = make_view(&server, "photos");
    assert_eq!(names(&view.navigate("").await), vec!["p.jpg"]);
    view.set_bucket("videos");
    assert_eq!(view.bucket(), "videos");
    assert_eq!(names(&view.navigate("").await), vec!["v.mp4"]);
}

#[tokio::test]
async fn missing_bucket_surfaces_error_without_request() {
    let server = MockServer::start().await;
    let view = make_view(&server, "");

    let snapshot = view.navigate("").await;
    assert_eq!(snapshot.error.as_deref(), Some("no bucket selected"));
    assert!(server.received_requests().await.unwrap().is_empty());
}
