use rawhttp::http::parser::ParseError;
use rawhttp::http::request::{ParseState, Request, RequestLine};

#[test]
fn test_request_line_get_path() {
    let line = RequestLine::parse(b"GET /path HTTP/1.1").unwrap();

    assert_eq!(line.method, "GET");
    assert_eq!(line.target, "/path");
    assert_eq!(line.http_version, "1.1");
}

#[test]
fn test_request_line_with_query_string() {
    let line = RequestLine::parse(b"POST /search?q=rust HTTP/1.1").unwrap();

    assert_eq!(line.method, "POST");
    assert_eq!(line.target, "/search?q=rust");
}

#[test]
fn test_request_line_lowercase_method() {
    let result = RequestLine::parse(b"get / HTTP/1.1");
    assert!(matches!(result, Err(ParseError::InvalidMethod(m)) if m == "get"));
}

#[test]
fn test_request_line_method_with_digit() {
    let result = RequestLine::parse(b"G3T / HTTP/1.1");
    assert!(matches!(result, Err(ParseError::InvalidMethod(_))));
}

#[test]
fn test_request_line_empty_method() {
    let result = RequestLine::parse(b" / HTTP/1.1");
    assert!(matches!(result, Err(ParseError::InvalidMethod(_))));
}

#[test]
fn test_request_line_target_without_slash() {
    let result = RequestLine::parse(b"GET coffee HTTP/1.1");
    assert!(matches!(result, Err(ParseError::InvalidTarget(t)) if t == "coffee"));
}

#[test]
fn test_request_line_wrong_version() {
    for version in ["HTTP/1.0", "HTTP/2", "http/1.1", "HTTP/1.1 "] {
        let line = format!("GET / {version}");
        let result = RequestLine::parse(line.as_bytes());
        assert!(
            matches!(
                result,
                Err(ParseError::InvalidVersion(_)) | Err(ParseError::InvalidRequestLineParts(_))
            ),
            "{version:?} -> {result:?}"
        );
    }

    assert!(matches!(
        RequestLine::parse(b"GET / HTTP/1.0"),
        Err(ParseError::InvalidVersion(_))
    ));
}

#[test]
fn test_request_line_wrong_part_count() {
    assert!(matches!(
        RequestLine::parse(b"/coffee HTTP/1.1"),
        Err(ParseError::InvalidRequestLineParts(2))
    ));
    assert!(matches!(
        RequestLine::parse(b"GET  / HTTP/1.1"),
        Err(ParseError::InvalidRequestLineParts(4))
    ));
}

#[test]
fn test_request_line_errors_are_distinct() {
    let errors = [
        RequestLine::parse(b"get / HTTP/1.1").unwrap_err().to_string(),
        RequestLine::parse(b"GET x HTTP/1.1").unwrap_err().to_string(),
        RequestLine::parse(b"GET / HTTP/1.0").unwrap_err().to_string(),
    ];

    assert!(errors[0].starts_with("method token is invalid"));
    assert!(errors[1].starts_with("invalid target"));
    assert!(errors[2].starts_with("invalid http version"));
}

#[test]
fn test_request_parse_reports_consumed_bytes() {
    let mut req = Request::new();
    let data = b"GET / HTTP/1.1\r\nHost: x\r\n";

    let n = req.parse(data).unwrap();

    assert_eq!(n, data.len());
    assert_eq!(req.state(), ParseState::ParsingHeaders);
    assert_eq!(req.header("host"), Some("x"));
}

#[test]
fn test_request_body_in_two_pieces() {
    let mut req = Request::new();
    let head = b"POST /submit HTTP/1.1\r\nContent-Length: 5\r\n\r\n";

    assert_eq!(req.parse(head).unwrap(), head.len());
    assert_eq!(req.state(), ParseState::ParsingBody);

    assert_eq!(req.parse(b"he").unwrap(), 2);
    assert_eq!(req.state(), ParseState::ParsingBody);

    assert_eq!(req.parse(b"llo").unwrap(), 3);
    assert!(req.is_done());
    assert_eq!(req.body, b"hello");
}

#[test]
fn test_request_body_over_length() {
    let mut req = Request::new();
    req.parse(b"POST /submit HTTP/1.1\r\nContent-Length: 5\r\n\r\n").unwrap();
    req.parse(b"he").unwrap();

    let result = req.parse(b"llo!");
    assert!(matches!(
        result,
        Err(ParseError::BodyTooLong { declared: 5, actual: 6 })
    ));
}

#[test]
fn test_request_content_length_zero() {
    let mut req = Request::new();
    req.parse(b"POST / HTTP/1.1\r\nContent-Length: 0\r\n\r\n").unwrap();

    assert!(req.is_done());
    assert!(req.body.is_empty());
}

#[test]
fn test_request_invalid_content_length() {
    let mut req = Request::new();
    let result = req.parse(b"POST / HTTP/1.1\r\nContent-Length: five\r\n\r\n");

    assert!(matches!(result, Err(ParseError::InvalidContentLength(v)) if v == "five"));
}

#[test]
fn test_request_body_without_content_length() {
    let mut req = Request::new();
    let result = req.parse(b"POST / HTTP/1.1\r\nHost: x\r\n\r\nsurprise");

    assert!(matches!(result, Err(ParseError::BodyWithoutContentLength(8))));
}

#[test]
fn test_request_content_length_accessor() {
    let mut req = Request::new();
    req.parse(b"POST / HTTP/1.1\r\nContent-Length: 42\r\n").unwrap();

    assert_eq!(req.content_length().unwrap(), Some(42));
    assert_eq!(Request::new().content_length().unwrap(), None);
}

#[test]
fn test_request_header_error_propagates() {
    let mut req = Request::new();
    let result = req.parse(b"GET / HTTP/1.1\r\nHost : x\r\n\r\n");

    assert!(matches!(result, Err(ParseError::Header(_))));
}
