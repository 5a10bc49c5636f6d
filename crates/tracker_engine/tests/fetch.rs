use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tracker_core::TransportKind;
use tracker_engine::{FetchSettings, Pacer, PageFetcher, ReqwestFetcher};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fetcher(settings: FetchSettings) -> ReqwestFetcher {
    ReqwestFetcher::new(settings, Arc::new(Pacer::disabled())).unwrap()
}

#[tokio::test]
async fn fetcher_returns_body_and_metadata() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/doc"))
        .and(header("user-agent", "tracker-test/1.0"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw("<html>ok</html>", "text/html; charset=utf-8"),
        )
        .mount(&server)
        .await;

    let settings = FetchSettings {
        user_agent: "tracker-test/1.0".into(),
        ..FetchSettings::default()
    };
    let url = format!("{}/doc", server.uri());
    let page = fetcher(settings).fetch(&url).await.expect("fetch ok");

    assert!(page.is_success());
    assert_eq!(page.status, 200);
    assert_eq!(page.requested_url, url);
    assert_eq!(page.final_url, url);
    assert!(!page.redirected);
    assert_eq!(page.body, b"<html>ok</html>");
    assert_eq!(page.decode().text, "<html>ok</html>");
}

#[tokio::test]
async fn error_status_is_a_page_not_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404).set_body_raw("nope", "application/json"))
        .mount(&server)
        .await;

    let url = format!("{}/gone", server.uri());
    let page = fetcher(FetchSettings::default()).fetch(&url).await.expect("page");
    assert!(!page.is_success());
    assert_eq!(page.status, 404);
}

#[tokio::test]
async fn fetcher_times_out_on_slow_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_millis(250))
                .set_body_string("slow"),
        )
        .mount(&server)
        .await;

    let settings = FetchSettings {
        request_timeout: Duration::from_millis(50),
        ..FetchSettings::default()
    };
    let err = fetcher(settings)
        .fetch(&format!("{}/slow", server.uri()))
        .await
        .unwrap_err();
    assert_eq!(err.kind, TransportKind::Timeout);
}

#[tokio::test]
async fn fetcher_rejects_too_large_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/large"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("01234567890", "text/html"))
        .mount(&server)
        .await;

    let settings = FetchSettings {
        max_bytes: 10,
        ..FetchSettings::default()
    };
    let err = fetcher(settings)
        .fetch(&format!("{}/large", server.uri()))
        .await
        .unwrap_err();
    assert_eq!(
        err.kind,
        TransportKind::TooLarge {
            max_bytes: 10,
            actual: Some(11)
        }
    );
}

/// Serves one canned HTTP response on a fresh port and closes the connection.
async fn serve_once(response: &'static [u8]) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = [0u8; 2048];
        let _ = socket.read(&mut request).await;
        socket.write_all(response).await.unwrap();
        let _ = socket.shutdown().await;
    });
    format!("http://{addr}/stream")
}

#[tokio::test]
async fn body_without_length_is_capped_while_streaming() {
    let url = serve_once(
        b"HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nConnection: close\r\n\r\n\
          <html>well over ten bytes</html>",
    )
    .await;

    let settings = FetchSettings {
        max_bytes: 10,
        ..FetchSettings::default()
    };
    let err = fetcher(settings).fetch(&url).await.unwrap_err();
    match err.kind {
        TransportKind::TooLarge { max_bytes, actual } => {
            assert_eq!(max_bytes, 10);
            assert!(actual.is_some_and(|seen| seen > 10), "{actual:?}");
        }
        other => panic!("expected too large, got {other:?}"),
    }
}

#[tokio::test]
async fn fetcher_rejects_unsupported_content_type() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/image"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(vec![0u8; 4], "image/png"))
        .mount(&server)
        .await;

    let err = fetcher(FetchSettings::default())
        .fetch(&format!("{}/image", server.uri()))
        .await
        .unwrap_err();
    assert_eq!(
        err.kind,
        TransportKind::UnsupportedContentType {
            content_type: "image/png".into()
        }
    );
}

#[tokio::test]
async fn invalid_url_is_reported() {
    let err = fetcher(FetchSettings::default())
        .fetch("not a url")
        .await
        .unwrap_err();
    assert_eq!(err.kind, TransportKind::InvalidUrl);
}

#[tokio::test]
async fn shared_pacer_spaces_consecutive_requests() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("x", "text/html"))
        .mount(&server)
        .await;

    let pacer = Arc::new(Pacer::new(Duration::from_millis(60), Duration::from_millis(60)));
    let first = ReqwestFetcher::new(FetchSettings::default(), pacer.clone()).unwrap();
    let second = ReqwestFetcher::new(FetchSettings::default(), pacer).unwrap();
    let url = format!("{}/a", server.uri());

    let started = Instant::now();
    first.fetch(&url).await.unwrap();
    second.fetch(&url).await.unwrap();
    first.fetch(&url).await.unwrap();
    assert!(started.elapsed() >= Duration::from_millis(120));
}

#[tokio::test]
async fn pacing_gap_starts_after_slow_response_completes() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_millis(100))
                .set_body_raw("x", "text/html"),
        )
        .mount(&server)
        .await;

    let pacer = Arc::new(Pacer::new(Duration::from_millis(50), Duration::from_millis(50)));
    let fetcher = ReqwestFetcher::new(FetchSettings::default(), pacer).unwrap();
    let url = format!("{}/slow", server.uri());

    let started = Instant::now();
    fetcher.fetch(&url).await.unwrap();
    fetcher.fetch(&url).await.unwrap();
    assert!(started.elapsed() >= Duration::from_millis(240));
}

async fn mount_redirect(server: &MockServer, from: &str, to: &str) {
    Mock::given(method("GET"))
        .and(path(from))
        .respond_with(ResponseTemplate::new(302).insert_header("location", to))
        .mount(server)
        .await;
}

#[tokio::test]
async fn redirects_are_followed_and_flagged() {
    let server = MockServer::start().await;
    mount_redirect(&server, "/old", "/new").await;
    Mock::given(method("GET"))
        .and(path("/new"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("moved", "text/html"))
        .mount(&server)
        .await;

    let page = fetcher(FetchSettings::default())
        .fetch(&format!("{}/old", server.uri()))
        .await
        .unwrap();

    assert!(page.redirected);
    assert_eq!(page.final_url, format!("{}/new", server.uri()));
    assert_eq!(page.body, b"moved");
}

#[tokio::test]
async fn redirect_chain_beyond_limit_fails() {
    let server = MockServer::start().await;
    mount_redirect(&server, "/a", "/b").await;
    mount_redirect(&server, "/b", "/c").await;
    Mock::given(method("GET"))
        .and(path("/c"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("end", "text/html"))
        .mount(&server)
        .await;

    let settings = FetchSettings {
        redirect_limit: 1,
        ..FetchSettings::default()
    };
    let err = fetcher(settings)
        .fetch(&format!("{}/a", server.uri()))
        .await
        .unwrap_err();
    assert_eq!(err.kind, TransportKind::RedirectLimitExceeded);
}
