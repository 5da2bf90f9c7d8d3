//! HTTP origin behaviour against a mock server
//!
//! The origin uses the blocking reqwest client, so the mock server is driven by
//! a tokio runtime while the origin itself is called from the test thread.
#![allow(clippy::unwrap_used, clippy::expect_used)]

use pretty_assertions::assert_eq;
use rangecache_origin::{HttpConfig, HttpOrigin, Origin, OriginError, RetryPolicy};
use std::time::Duration;
use tokio::runtime::Runtime;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{header, method, path},
};

fn content() -> Vec<u8> {
    (0..5000u32).map(|i| (i * 7 % 251) as u8).collect()
}

fn start_server() -> (Runtime, MockServer) {
    let rt = Runtime::new().expect("runtime");
    let server = rt.block_on(MockServer::start());
    (rt, server)
}

fn origin_for(server: &MockServer, retry: RetryPolicy) -> HttpOrigin {
    HttpOrigin::new(
        &format!("{}/data.bin", server.uri()),
        &HttpConfig::default().with_timeout(Duration::from_secs(5)),
        retry,
    )
    .expect("origin")
}

fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 2,
        initial_backoff: Duration::from_millis(1),
        max_backoff: Duration::from_millis(5),
        multiplier: 2.0,
    }
}

#[test]
fn stat_falls_back_to_range_probe_when_head_refused() {
    let (rt, server) = start_server();
    rt.block_on(async {
        Mock::given(method("HEAD"))
            .and(path("/data.bin"))
            .respond_with(ResponseTemplate::new(405))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/data.bin"))
            .and(header("Range", "bytes=0-0"))
            .respond_with(
                ResponseTemplate::new(206)
                    .insert_header("Content-Range", "bytes 0-0/5000")
                    .insert_header("Last-Modified", "Wed, 21 Oct 2015 07:28:00 GMT")
                    .set_body_bytes(vec![0u8]),
            )
            .expect(1)
            .mount(&server)
            .await;
    });

    let stat = origin_for(&server, RetryPolicy::none()).stat().expect("stat");
    assert_eq!(stat.size, 5000);
    assert_eq!(stat.modified, 1_445_412_480);
}

#[test]
fn fetch_range_sends_inclusive_range_header() {
    let data = content();
    let (rt, server) = start_server();
    rt.block_on(async {
        Mock::given(method("GET"))
            .and(path("/data.bin"))
            .and(header("Range", "bytes=100-199"))
            .respond_with(
                ResponseTemplate::new(206)
                    .insert_header("Content-Range", "bytes 100-199/5000")
                    .set_body_bytes(data[100..200].to_vec()),
            )
            .expect(1)
            .mount(&server)
            .await;
    });

    let bytes = origin_for(&server, RetryPolicy::none())
        .fetch_range(100, 200)
        .expect("fetch");
    assert_eq!(&bytes[..], &data[100..200]);
}

#[test]
fn full_body_is_sliced_when_range_ignored() {
    let data = content();
    let (rt, server) = start_server();
    rt.block_on(async {
        Mock::given(method("GET"))
            .and(path("/data.bin"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(data.clone()))
            .mount(&server)
            .await;
    });

    let bytes = origin_for(&server, RetryPolicy::none())
        .fetch_range(4096, 4500)
        .expect("fetch");
    assert_eq!(&bytes[..], &data[4096..4500]);
}

#[test]
fn status_416_maps_to_range_unsatisfiable() {
    let (rt, server) = start_server();
    rt.block_on(async {
        Mock::given(method("GET"))
            .and(path("/data.bin"))
            .respond_with(
                ResponseTemplate::new(416).insert_header("Content-Range", "bytes */5000"),
            )
            .mount(&server)
            .await;
    });

    let err = origin_for(&server, RetryPolicy::none())
        .fetch_range(6000, 7000)
        .expect_err("beyond end");
    assert!(err.is_range_unsatisfiable(), "unexpected error: {err}");
}

#[test]
fn truncated_body_is_a_short_read() {
    let data = content();
    let (rt, server) = start_server();
    rt.block_on(async {
        Mock::given(method("GET"))
            .and(path("/data.bin"))
            .respond_with(
                ResponseTemplate::new(206)
                    .insert_header("Content-Range", "bytes 0-99/5000")
                    .set_body_bytes(data[..50].to_vec()),
            )
            .mount(&server)
            .await;
    });

    let err = origin_for(&server, RetryPolicy::none())
        .fetch_range(0, 100)
        .expect_err("short body");
    match err {
        OriginError::ShortRead {
            expected, actual, ..
        } => {
            assert_eq!(expected, 100);
            assert_eq!(actual, 50);
        }
        other => panic!("expected ShortRead, got {other}"),
    }
}

#[test]
fn missing_resource_is_not_found() {
    let (rt, server) = start_server();
    rt.block_on(async {
        Mock::given(method("HEAD"))
            .and(path("/data.bin"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
    });

    let err = origin_for(&server, RetryPolicy::none())
        .stat()
        .expect_err("missing");
    assert!(err.is_not_found());
}

#[test]
fn server_errors_are_retried() {
    let data = content();
    let (rt, server) = start_server();
    rt.block_on(async {
        Mock::given(method("GET"))
            .and(path("/data.bin"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/data.bin"))
            .respond_with(
                ResponseTemplate::new(206)
                    .insert_header("Content-Range", "bytes 0-9/5000")
                    .set_body_bytes(data[..10].to_vec()),
            )
            .expect(1)
            .mount(&server)
            .await;
    });

    let bytes = origin_for(&server, fast_retry())
        .fetch_range(0, 10)
        .expect("second attempt succeeds");
    assert_eq!(&bytes[..], &data[..10]);
}

#[test]
fn closed_port_is_unreachable() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().expect("addr").port();
    drop(listener);

    let origin = HttpOrigin::new(
        &format!("http://127.0.0.1:{port}/data.bin"),
        &HttpConfig::default().with_connect_timeout(Duration::from_secs(2)),
        RetryPolicy::none(),
    )
    .expect("origin");

    let err = origin.fetch_range(0, 10).expect_err("nothing listening");
    assert!(
        matches!(err, OriginError::Unreachable { .. }),
        "unexpected error: {err}"
    );
}
