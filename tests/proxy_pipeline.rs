//! End-to-end tests: client → relay → mock origin.

use std::fs::File;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use axum::http::StatusCode;
use media_relay::routing::{ReloadOutcome, RouteReloader, RouteSource};

mod common;

use common::{MockReply, BROWSER_UA, ORIGIN_HOST};

#[tokio::test]
async fn routed_request_reaches_mapped_path_as_browser_traffic() {
    let backend = common::start_mock_backend(MockReply::new("text/plain", "hello")).await;
    let relay = common::start_relay(common::relay_config(backend.addr), &[("media", "cdn/media")]).await;

    let res = common::client()
        .get(relay.url("/media/video.mp4?start=10"))
        .header("accept-encoding", "gzip, br")
        .header("if-modified-since", "Wed, 21 Oct 2015 07:28:00 GMT")
        .header("x-request-id", "client-chosen")
        .header("range", "bytes=0-4")
        .send()
        .await
        .expect("Relay unreachable");

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["access-control-allow-origin"], "*");
    assert_eq!(res.headers()["x-request-id"], "client-chosen");
    assert_eq!(res.text().await.unwrap(), "hello");

    let seen = backend.last().expect("origin should have been called");
    assert_eq!(seen.method, "GET");
    assert_eq!(seen.target, "/cdn/media/video.mp4?start=10");
    assert_eq!(seen.header("host"), Some(ORIGIN_HOST));
    assert_eq!(seen.header("user-agent"), Some(BROWSER_UA));
    assert_eq!(seen.header("range"), Some("bytes=0-4"));
    assert!(seen.header("accept-encoding").is_none());
    assert!(seen.header("if-modified-since").is_none());
    assert!(seen.header("x-request-id").is_none());
    assert!(seen.header("x-forwarded-for").is_none());
}

#[tokio::test]
async fn unknown_prefix_is_404_without_upstream_call() {
    let backend = common::start_mock_backend(MockReply::new("text/plain", "unused")).await;
    let relay = common::start_relay(common::relay_config(backend.addr), &[("media", "cdn/media")]).await;

    let res = common::client().get(relay.url("/unknown/x")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(res.text().await.unwrap(), "404 page not found\n");

    let root = common::client().get(relay.url("/")).send().await.unwrap();
    assert_eq!(root.status(), StatusCode::NOT_FOUND);

    assert_eq!(backend.hits(), 0);
}

#[tokio::test]
async fn media_response_is_streamed_chunked() {
    let payload = vec![7u8; 40 * 1024];
    let backend = common::start_mock_backend(MockReply::new("video/mp4", payload.clone())).await;
    let relay = common::start_relay(common::relay_config(backend.addr), &[("media", "cdn/media")]).await;

    let res = common::client().get(relay.url("/media/clip.mp4")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.headers().get("content-length").is_none());
    assert_eq!(res.headers()["transfer-encoding"], "chunked");
    assert_eq!(res.headers()["access-control-allow-origin"], "*");

    let body = res.bytes().await.unwrap();
    assert_eq!(body.len(), payload.len());
    assert!(relay.wait_for_idle_buffers().await, "buffer not returned to pool");
    assert_eq!(relay.state.traffic.total_bytes(), payload.len() as u64);
}

#[tokio::test]
async fn small_response_keeps_content_length() {
    let backend = common::start_mock_backend(MockReply::new("text/plain", vec![b'a'; 100])).await;
    let relay = common::start_relay(common::relay_config(backend.addr), &[("txt", "docs")]).await;

    let res = common::client().get(relay.url("/txt/readme")).send().await.unwrap();
    assert_eq!(res.headers()["content-length"], "100");
    assert!(res.headers().get("transfer-encoding").is_none());
    assert_eq!(res.bytes().await.unwrap().len(), 100);
}

#[tokio::test]
async fn large_response_crosses_threshold() {
    let backend = common::start_mock_backend(MockReply::new("application/json", vec![b'1'; 2048])).await;
    let mut config = common::relay_config(backend.addr);
    config.response.chunked_threshold_bytes = 2048;
    let relay = common::start_relay(config, &[("api", "v2")]).await;

    let res = common::client().get(relay.url("/api/list")).send().await.unwrap();
    assert!(res.headers().get("content-length").is_none());
    assert_eq!(res.headers()["transfer-encoding"], "chunked");
    assert_eq!(res.bytes().await.unwrap().len(), 2048);
}

#[tokio::test]
async fn chunked_origin_response_stays_chunked() {
    let backend = common::start_mock_backend(MockReply::new("text/html", "<p>hi</p>").chunked()).await;
    let relay = common::start_relay(common::relay_config(backend.addr), &[("site", "www")]).await;

    let res = common::client().get(relay.url("/site/index.html")).send().await.unwrap();
    assert_eq!(res.headers()["transfer-encoding"], "chunked");
    assert_eq!(res.text().await.unwrap(), "<p>hi</p>");
}

#[tokio::test]
async fn unreachable_origin_is_bad_gateway() {
    let dead = common::closed_port().await;
    let relay = common::start_relay(common::relay_config(dead), &[("media", "cdn/media")]).await;

    let res = common::client().get(relay.url("/media/a.mp4")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(relay.state.upstream_slots.available_permits(), 16);
    assert_eq!(relay.state.buffers.active(), 0);
}

#[tokio::test]
async fn reloaded_routes_apply_to_later_requests() {
    let backend = common::start_mock_backend(MockReply::new("text/plain", "ok")).await;
    let relay = common::start_relay(common::relay_config(backend.addr), &[("media", "cdn/media")]).await;
    let source = RouteSource::new(relay.routes_file.path());
    let reloader = RouteReloader::new(Arc::clone(&relay.state.routes), source, Duration::from_secs(60));

    assert_eq!(reloader.check().unwrap(), ReloadOutcome::Unchanged);

    common::write_routes(relay.routes_file.path(), &[("media", "cdn/v2/media"), ("img", "static/img")]);
    File::options()
        .write(true)
        .open(relay.routes_file.path())
        .unwrap()
        .set_modified(SystemTime::now() + Duration::from_secs(60))
        .unwrap();
    assert_eq!(reloader.check().unwrap(), ReloadOutcome::Reloaded(2));
    assert_eq!(reloader.check().unwrap(), ReloadOutcome::Unchanged);

    let res = common::client().get(relay.url("/img/logo.png")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(backend.last().unwrap().target, "/static/img/logo.png");

    common::client().get(relay.url("/media/a.mp4")).send().await.unwrap();
    assert_eq!(backend.last().unwrap().target, "/cdn/v2/media/a.mp4");
}

#[tokio::test]
async fn broken_route_file_keeps_serving_previous_routes() {
    let backend = common::start_mock_backend(MockReply::new("text/plain", "ok")).await;
    let relay = common::start_relay(common::relay_config(backend.addr), &[("media", "cdn/media")]).await;
    let reloader = RouteReloader::new(
        Arc::clone(&relay.state.routes),
        RouteSource::new(relay.routes_file.path()),
        Duration::from_secs(60),
    );

    std::fs::write(relay.routes_file.path(), "{ not json").unwrap();
    File::options()
        .write(true)
        .open(relay.routes_file.path())
        .unwrap()
        .set_modified(SystemTime::now() + Duration::from_secs(60))
        .unwrap();
    assert!(reloader.check().is_err());

    let res = common::client().get(relay.url("/media/a.mp4")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(backend.last().unwrap().target, "/cdn/media/a.mp4");
}

#[tokio::test]
async fn saturated_upstream_answers_bad_gateway_within_deadline() {
    let backend = common::start_mock_backend(MockReply::new("text/plain", vec![b'x'; 100]).stalled()).await;
    let mut config = common::relay_config(backend.addr);
    config.upstream.max_connections = 1;
    config.upstream.response_header_secs = 1;
    config.upstream.body_idle_secs = 30;
    let relay = common::start_relay(config, &[("media", "cdn/media")]).await;

    // Holds the only upstream slot: headers arrived, body never will.
    let first = common::client().get(relay.url("/media/a.mp4")).send().await.unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let second = tokio::time::timeout(
        Duration::from_secs(5),
        common::client().get(relay.url("/media/b.mp4")).send(),
    )
    .await
    .expect("second request should be answered before the test deadline")
    .unwrap();
    assert_eq!(second.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(backend.hits(), 1);
    drop(first);
}

#[tokio::test]
async fn stalled_origin_body_gives_back_its_slot() {
    let backend = common::start_mock_backend(MockReply::new("text/plain", vec![b'x'; 100]).stalled()).await;
    let mut config = common::relay_config(backend.addr);
    config.upstream.max_connections = 1;
    config.upstream.body_idle_secs = 1;
    let relay = common::start_relay(config, &[("media", "cdn/media")]).await;

    let first = common::client().get(relay.url("/media/a.mp4")).send().await.unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    let body = tokio::time::timeout(Duration::from_secs(5), first.bytes()).await.unwrap();
    assert!(body.is_err(), "a stalled origin body must not end cleanly");

    assert!(relay.wait_for_idle_buffers().await);
    for _ in 0..100 {
        if relay.state.upstream_slots.available_permits() == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(relay.state.upstream_slots.available_permits(), 1);

    let second = common::client().get(relay.url("/media/b.mp4")).send().await.unwrap();
    assert_eq!(second.status(), StatusCode::OK);
    assert_eq!(backend.hits(), 2);
}
