//! Integration tests for the bounded fetch utility.

mod common;

use common::StubTransport;
use demibot::fetch::{FetchSettings, Fetcher, MAX_CONTENT_KIB};
use std::sync::Arc;
use std::time::Duration;

fn fetcher(transport: &StubTransport) -> Fetcher {
    Fetcher::new(Arc::new(transport.clone()), FetchSettings::default())
}

fn small_fetcher(transport: &StubTransport, max_content_kib: u64) -> Fetcher {
    let settings = FetchSettings {
        max_content_kib,
        ..FetchSettings::default()
    };
    Fetcher::new(Arc::new(transport.clone()), settings)
}

#[tokio::test]
async fn test_oversized_declared_length_is_never_read() {
    let transport = StubTransport::ok("<title>big</title>").with_content_length(4 * 1024 * 1024);
    let fetcher = fetcher(&transport);

    assert!(fetcher.fetch("https://big.test/", &[], &[]).await.is_none());
    assert!(fetcher.title_of("https://big.test/").await.is_none());
    assert!(
        fetcher
            .fetch_document("https://big.test/", &[], &[])
            .await
            .is_none()
    );
    assert_eq!(transport.chunk_reads(), 0);
    assert_eq!(transport.requests().len(), 3);
}

#[tokio::test]
async fn test_declared_length_boundary_uses_whole_kib() {
    let at_cap = StubTransport::ok("<title>ok</title>").with_content_length(MAX_CONTENT_KIB * 1024 + 1023);
    assert_eq!(
        fetcher(&at_cap).title_of("https://edge.test/").await.as_deref(),
        Some("Title: ok")
    );

    let over = StubTransport::ok("<title>no</title>").with_content_length((MAX_CONTENT_KIB + 1) * 1024);
    assert!(fetcher(&over).title_of("https://edge.test/").await.is_none());
    assert_eq!(over.chunk_reads(), 0);
}

#[tokio::test]
async fn test_title_is_case_insensitive_and_trimmed() {
    let transport = StubTransport::ok("<html><TITLE> Hi </TITLE></html>");
    assert_eq!(
        fetcher(&transport).title_of("http://page.test/").await.as_deref(),
        Some("Title: Hi")
    );
}

#[tokio::test]
async fn test_error_status_has_no_title() {
    let transport = StubTransport::new(404, "<title>Not Found</title>");
    assert!(fetcher(&transport).title_of("http://page.test/missing").await.is_none());

    // The raw fetch still succeeds; only title lookup treats it as absent.
    let response = fetcher(&transport)
        .fetch("http://page.test/missing", &[], &[])
        .await
        .expect("response");
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn test_undeclared_body_is_truncated_at_cap() {
    let transport = StubTransport::ok("").with_chunks(5, 1000);
    let document = small_fetcher(&transport, 1)
        .fetch_document("http://stream.test/", &[], &[])
        .await
        .expect("document");
    assert_eq!(document.body.len(), 2047);
    assert_eq!(document.status, 200);
    assert_eq!(transport.chunk_reads(), 3);
}

#[tokio::test]
async fn test_user_agent_pinned_and_overridable() {
    let transport = StubTransport::ok("");
    let fetcher = fetcher(&transport);
    fetcher.fetch("http://a.test/", &[("q", "1")], &[]).await;
    fetcher
        .fetch("http://a.test/", &[], &[("USER-AGENT", "custom/1"), ("Accept", "text/html")])
        .await;

    let requests = transport.requests();
    assert_eq!(requests[0].params, vec![("q".to_string(), "1".to_string())]);
    assert_eq!(requests[0].headers.len(), 1);
    assert_eq!(requests[0].headers[0].0, "User-Agent");
    assert_eq!(requests[0].headers[0].1, fetcher.settings().user_agent);
    assert_eq!(
        requests[1].headers,
        vec![
            ("USER-AGENT".to_string(), "custom/1".to_string()),
            ("Accept".to_string(), "text/html".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_non_http_scheme_is_rejected_without_request() {
    let transport = StubTransport::ok("");
    assert!(fetcher(&transport).fetch("file:///etc/passwd", &[], &[]).await.is_none());
    assert!(transport.requests().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_stalled_server_times_out() {
    let transport = StubTransport::ok("").stalled();
    let started = tokio::time::Instant::now();
    assert!(fetcher(&transport).title_of("http://slow.test/").await.is_none());
    assert!(started.elapsed() >= Duration::from_secs(10));
}

#[tokio::test]
async fn test_latin1_document_is_decoded() {
    let transport = StubTransport::ok("").with_body(b"<title>Caf\xe9 cr\xe8me</title>");
    let fetcher = fetcher(&transport);
    assert_eq!(
        fetcher.title_of("http://old.test/").await.as_deref(),
        Some("Title: Caf\u{e9} cr\u{e8}me")
    );
    let document = fetcher
        .fetch_document("http://old.test/", &[], &[])
        .await
        .expect("document");
    assert!(document.body.contains("Caf\u{e9}"));
}

#[tokio::test]
async fn test_truncation_keeps_utf8_intact() {
    let title = "<title>Grüße</title>";
    let mut body = title.as_bytes().to_vec();
    // A 1 KiB cap keeps 2047 bytes, which ends inside the two-byte "é".
    body.resize(2046, b'a');
    body.extend_from_slice("é and the rest".as_bytes());
    let transport = StubTransport::ok("").with_body(&body);
    let fetcher = small_fetcher(&transport, 1);

    assert_eq!(
        fetcher.title_of("http://umlaut.test/").await.as_deref(),
        Some("Title: Grüße")
    );

    let document = fetcher
        .fetch_document("http://umlaut.test/", &[], &[])
        .await
        .expect("document");
    assert_eq!(document.body.len(), 2046);
    assert!(document.body.starts_with(title));
    assert!(document.body.ends_with('a'));
}
