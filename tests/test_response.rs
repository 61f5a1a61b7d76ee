use rawhttp::http::response::{HandlerError, StatusCode, default_headers};
use rawhttp::http::writer::{ResponseWriter, WriterState};

#[test]
fn test_status_code_as_u16() {
    assert_eq!(StatusCode::Ok.as_u16(), 200);
    assert_eq!(StatusCode::BadRequest.as_u16(), 400);
    assert_eq!(StatusCode::InternalServerError.as_u16(), 500);
    assert_eq!(StatusCode::Other(404).as_u16(), 404);
}

#[test]
fn test_status_code_reason_phrase() {
    assert_eq!(StatusCode::Ok.reason_phrase(), "OK");
    assert_eq!(StatusCode::BadRequest.reason_phrase(), "Bad Request");
    assert_eq!(
        StatusCode::InternalServerError.reason_phrase(),
        "Internal Server Error"
    );
    assert_eq!(StatusCode::Other(418).reason_phrase(), "");
}

#[test]
fn test_status_code_from_u16() {
    assert_eq!(StatusCode::from(200), StatusCode::Ok);
    assert_eq!(StatusCode::from(400), StatusCode::BadRequest);
    assert_eq!(StatusCode::from(500), StatusCode::InternalServerError);
    assert_eq!(StatusCode::from(302), StatusCode::Other(302));
}

#[test]
fn test_default_headers() {
    let headers = default_headers(13);

    assert_eq!(headers.len(), 3);
    assert_eq!(headers.get("Content-Length"), Some("13"));
    assert_eq!(headers.get("Connection"), Some("close"));
    assert_eq!(headers.get("Content-Type"), Some("text/plain"));
}

#[test]
fn test_default_headers_can_be_overridden() {
    let mut headers = default_headers(0);
    headers.replace("Content-Type", "text/html");

    assert_eq!(headers.get("content-type"), Some("text/html"));
}

#[tokio::test]
async fn test_handler_error_writes_complete_response() {
    let mut w = ResponseWriter::new(Vec::new());
    HandlerError::new(StatusCode::BadRequest, "nope")
        .write_to(&mut w)
        .await
        .unwrap();

    assert_eq!(w.state(), WriterState::Done);
    let out = String::from_utf8(w.into_inner()).unwrap();
    assert!(out.starts_with("HTTP/1.1 400 Bad Request\r\n"));
    assert!(out.contains("content-length: 4\r\n"));
    assert!(out.contains("connection: close\r\n"));
    assert!(out.ends_with("\r\n\r\nnope"));
}
