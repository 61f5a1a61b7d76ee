use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use rawhttp::config::LimitsConfig;
use rawhttp::http::connection::{Connection, ConnectionSettings};
use rawhttp::http::headers::Headers;
use rawhttp::http::request::Request;
use rawhttp::http::response::{StatusCode, default_headers};
use rawhttp::http::writer::ResponseWriter;
use rawhttp::server::{Handler, HandlerFuture};
use tokio::io::{AsyncReadExt, AsyncWriteExt, duplex};

/// Echoes the target and body back, counting invocations.
#[derive(Default)]
struct Echo {
    calls: AtomicUsize,
}

impl Handler for Echo {
    fn call<'a>(&'a self, req: &'a Request, w: &'a mut ResponseWriter) -> HandlerFuture<'a> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let body = format!("{} {}", req.request_line.target, String::from_utf8_lossy(&req.body));
            w.write_status_line(StatusCode::Ok).await.unwrap();
            w.write_headers(&default_headers(body.len())).await.unwrap();
            w.write_body(body.as_bytes()).await.unwrap();
        })
    }
}

/// Streams two chunks and an empty trailer block.
struct Chunky;

impl Handler for Chunky {
    fn call<'a>(&'a self, _req: &'a Request, w: &'a mut ResponseWriter) -> HandlerFuture<'a> {
        Box::pin(async move {
            let mut headers = default_headers(0);
            headers.remove("content-length");
            headers.replace("Transfer-Encoding", "chunked");
            w.write_status_line(StatusCode::Ok).await.unwrap();
            w.write_headers(&headers).await.unwrap();
            w.write_chunked_body(b"abc").await.unwrap();
            w.write_chunked_body(b"de").await.unwrap();
            w.write_chunked_body_done().await.unwrap();
            w.write_trailers(&Headers::new()).await.unwrap();
        })
    }
}

fn settings() -> ConnectionSettings {
    ConnectionSettings {
        limits: LimitsConfig {
            read_timeout_ms: Some(2_000),
            ..LimitsConfig::default()
        },
        body_trailing_crlf: false,
    }
}

/// Sends `raw`, half-closes, and returns everything the connection wrote.
async fn exchange(handler: Arc<dyn Handler>, settings: ConnectionSettings, raw: &[u8]) -> (String, anyhow::Result<()>) {
    let (mut client, server) = duplex(64 * 1024);
    let task = tokio::spawn(Connection::new(server, handler, settings).run());

    client.write_all(raw).await.unwrap();
    client.shutdown().await.unwrap();

    let mut out = Vec::new();
    client.read_to_end(&mut out).await.unwrap();
    let result = task.await.unwrap();

    (String::from_utf8(out).unwrap(), result)
}

#[tokio::test]
async fn test_valid_request_reaches_handler() {
    let echo = Arc::new(Echo::default());
    let (out, result) = exchange(
        echo.clone(),
        settings(),
        b"POST /submit HTTP/1.1\r\nHost: x\r\nContent-Length: 5\r\n\r\nhello",
    )
    .await;

    assert!(result.is_ok());
    assert_eq!(echo.calls.load(Ordering::SeqCst), 1);
    assert!(out.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(out.ends_with("\r\n\r\n/submit hello"));
}

#[tokio::test]
async fn test_malformed_request_gets_400_without_handler() {
    let echo = Arc::new(Echo::default());
    let (out, result) = exchange(echo.clone(), settings(), b"get / HTTP/1.1\r\n\r\n").await;

    assert!(result.is_ok());
    assert_eq!(echo.calls.load(Ordering::SeqCst), 0);
    assert!(out.starts_with("HTTP/1.1 400 Bad Request\r\n"));
    assert!(out.contains("Error parsing request: method token is invalid"));
}

#[tokio::test]
async fn test_truncated_request_gets_400() {
    let echo = Arc::new(Echo::default());
    let (out, _) = exchange(echo.clone(), settings(), b"GET / HTTP/1.1\r\nHost: lo").await;

    assert_eq!(echo.calls.load(Ordering::SeqCst), 0);
    assert!(out.starts_with("HTTP/1.1 400 Bad Request\r\n"));
    assert!(out.contains("incomplete request"));
}

#[tokio::test]
async fn test_oversized_request_gets_400() {
    let echo = Arc::new(Echo::default());
    let mut small = settings();
    small.limits.max_request_bytes = 32;
    let raw = format!("GET / HTTP/1.1\r\nX-Pad: {}\r\n\r\n", "p".repeat(64));

    let (out, _) = exchange(echo.clone(), small, raw.as_bytes()).await;

    assert_eq!(echo.calls.load(Ordering::SeqCst), 0);
    assert!(out.starts_with("HTTP/1.1 400 Bad Request\r\n"));
    assert!(out.contains("request exceeds 32 bytes"));
}

#[tokio::test]
async fn test_chunked_handler_output() {
    let (out, result) = exchange(Arc::new(Chunky), settings(), b"GET / HTTP/1.1\r\n\r\n").await;

    assert!(result.is_ok());
    assert!(out.contains("transfer-encoding: chunked\r\n"));
    assert!(out.ends_with("\r\n\r\n3\r\nabc\r\n2\r\nde\r\n0\r\n\r\n"));
}

#[tokio::test]
async fn test_read_timeout_closes_without_response() {
    let echo = Arc::new(Echo::default());
    let mut quick = settings();
    quick.limits.read_timeout_ms = Some(50);

    let (mut client, server) = duplex(1024);
    let task = tokio::spawn(Connection::new(server, echo.clone(), quick).run());

    // Never finish the request.
    client.write_all(b"GET / HTTP/1.1\r\n").await.unwrap();

    let mut out = Vec::new();
    client.read_to_end(&mut out).await.unwrap();

    assert!(task.await.unwrap().is_ok());
    assert!(out.is_empty());
    assert_eq!(echo.calls.load(Ordering::SeqCst), 0);
}
