//! Line level parsing of the request head.
//!
//! Both parser paths feed lines into these functions, so the contiguous and the segmented
//! input produce identical requests. A line is passed together with the `Bytes` that owns
//! it: header values and the path are either interned or sliced out of that owner, never
//! copied.

use bytes::Bytes;
use http::header::{CONTENT_LENGTH, Entry, TRANSFER_ENCODING};
use http::{HeaderMap, HeaderName, HeaderValue, Method, Version};
use tracing::trace;

use crate::ensure;
use crate::interner::ByteInterner;
use crate::protocol::{ParseError, PayloadSize, Request};

/// Parses `METHOD SP TARGET SP VERSION` into `request`.
///
/// `line` must not contain the trailing CRLF and must be a subslice of `owner`.
pub(crate) fn parse_request_line(
    owner: &Bytes,
    line: &[u8],
    interner: &ByteInterner,
    request: &mut Request,
) -> Result<(), ParseError> {
    let first_space = memchr::memchr(b' ', line).ok_or_else(|| ParseError::malformed_request_line("missing spaces"))?;
    let last_space = memchr::memrchr(b' ', line).unwrap_or(first_space);
    ensure!(last_space > first_space, ParseError::malformed_request_line("missing space before version"));

    let method = &line[..first_space];
    let target = &line[first_space + 1..last_space];
    let version = &line[last_space + 1..];

    ensure!(!method.is_empty(), ParseError::malformed_request_line("empty method"));
    ensure!(!target.is_empty(), ParseError::malformed_request_line("empty target"));

    *request.method_mut() =
        Method::from_bytes(method).map_err(|_| ParseError::malformed_request_line("invalid method"))?;

    *request.version_mut() = match version {
        b"HTTP/1.1" => Version::HTTP_11,
        b"HTTP/1.0" => Version::HTTP_10,
        _ => return Err(ParseError::malformed_request_line("unsupported version")),
    };

    let (path, query) = match memchr::memchr(b'?', target) {
        Some(index) => (&target[..index], Some(&target[index + 1..])),
        None => (target, None),
    };

    *request.path_mut() =
        interner.atom(owner, path).map_err(|_| ParseError::malformed_request_line("path is not valid utf-8"))?;

    match query {
        Some(query) => request.query_mut().parse(owner.slice_ref(query)),
        None => request.query_mut().clear(),
    }

    Ok(())
}

/// Parses one `Name: value` line into `headers`.
///
/// A line without `:` is skipped. The first occurrence of a name wins, later duplicates
/// are dropped.
pub(crate) fn parse_header_line(
    owner: &Bytes,
    line: &[u8],
    interner: &ByteInterner,
    headers: &mut HeaderMap,
) -> Result<(), ParseError> {
    let Some(colon) = memchr::memchr(b':', line) else {
        trace!(len = line.len(), "skip header line without colon");
        return Ok(());
    };

    let name = HeaderName::from_bytes(&line[..colon]).map_err(|_| ParseError::malformed_header("invalid header name"))?;

    let mut value = &line[colon + 1..];
    if let [b' ', rest @ ..] = value {
        value = rest;
    }

    if let Entry::Vacant(entry) = headers.entry(name) {
        let value = HeaderValue::from_maybe_shared(interner.intern_or_slice(owner, value))
            .map_err(|_| ParseError::malformed_header("invalid header value"))?;
        entry.insert(value);
    }

    Ok(())
}

/// Decides how the body is framed.
///
/// Content-Length and chunked Transfer-Encoding together are rejected. A Transfer-Encoding
/// whose last coding is not `chunked` is treated as no body.
pub(crate) fn parse_payload(headers: &HeaderMap, max_body: usize) -> Result<PayloadSize, ParseError> {
    // refer: https://www.rfc-editor.org/rfc/rfc9112.html#name-transfer-encoding
    let te_header = headers.get(TRANSFER_ENCODING);
    let cl_header = headers.get(CONTENT_LENGTH);

    match (te_header, cl_header) {
        (None, None) => Ok(PayloadSize::Empty),

        (Some(te_value), None) => {
            if is_chunked(te_value) {
                Ok(PayloadSize::Chunked)
            } else {
                Ok(PayloadSize::Empty)
            }
        }

        (None, Some(cl_value)) => {
            let cl_str = cl_value.to_str().map_err(|_| ParseError::invalid_content_length("value is not ascii"))?;

            let length = cl_str
                .trim()
                .parse::<u64>()
                .map_err(|_| ParseError::invalid_content_length(format!("value {cl_str} is not u64")))?;

            ensure!(length <= max_body as u64, ParseError::too_large_body(max_body));

            if length == 0 { Ok(PayloadSize::Empty) } else { Ok(PayloadSize::Length(length)) }
        }

        (Some(_), Some(_)) => Err(ParseError::malformed_header("transfer-encoding and content-length both present")),
    }
}

fn is_chunked(header_value: &HeaderValue) -> bool {
    header_value
        .as_bytes()
        .rsplit(|b| *b == b',')
        .next()
        .is_some_and(|last| last.trim_ascii().eq_ignore_ascii_case(b"chunked"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request_line(raw: &'static str) -> Result<Request, ParseError> {
        let owner = Bytes::from_static(raw.as_bytes());
        let mut request = Request::new();
        parse_request_line(&owner, &owner, &ByteInterner::default(), &mut request)?;
        Ok(request)
    }

    fn headers(lines: &[&'static str]) -> HeaderMap {
        let interner = ByteInterner::default();
        let mut headers = HeaderMap::new();
        for line in lines {
            let owner = Bytes::from_static(line.as_bytes());
            parse_header_line(&owner, &owner, &interner, &mut headers).unwrap();
        }
        headers
    }

    #[test]
    fn check_is_chunked() {
        assert!(is_chunked(&HeaderValue::from_static("gzip, chunked")));
        assert!(is_chunked(&HeaderValue::from_static("Chunked")));
        assert!(!is_chunked(&HeaderValue::from_static("chunked, gzip")));
        assert!(!is_chunked(&HeaderValue::from_static("gzip")));
    }

    #[test]
    fn request_line_with_query() {
        let request = request_line("GET /users/42?x=1&y HTTP/1.1").unwrap();

        assert_eq!(request.method(), Method::GET);
        assert_eq!(request.path(), "/users/42");
        assert_eq!(request.version(), Version::HTTP_11);
        assert_eq!(request.query().get("x"), Some("1"));
        assert_eq!(request.query().get("y"), Some(""));
    }

    #[test]
    fn request_line_errors() {
        for raw in ["GET", "GET /", "GET  HTTP/1.1", " / HTTP/1.1", "GET / HTTP/2.0", "G(T / HTTP/1.1"] {
            assert!(
                matches!(request_line(raw), Err(ParseError::MalformedRequestLine { .. })),
                "{raw} should be rejected"
            );
        }
    }

    #[test]
    fn header_lines() {
        let headers = headers(&["Host: a", "X-Empty:", "no colon here", "host: b", "X-Spaces:   padded"]);

        assert_eq!(headers.len(), 3);
        assert_eq!(headers.get("host").unwrap(), "a");
        assert_eq!(headers.get("x-empty").unwrap(), "");
        // exactly one leading space is trimmed
        assert_eq!(headers.get("x-spaces").unwrap().as_bytes(), b"  padded");
    }

    #[test]
    fn invalid_header_name() {
        let owner = Bytes::from_static(b"Bad Name: x");
        let result = parse_header_line(&owner, &owner, &ByteInterner::default(), &mut HeaderMap::new());
        assert!(matches!(result, Err(ParseError::MalformedHeaderBlock { .. })));
    }

    #[test]
    fn payload_framing() {
        let limit = 1024;
        assert_eq!(parse_payload(&headers(&[]), limit).unwrap(), PayloadSize::Empty);
        assert_eq!(parse_payload(&headers(&["Content-Length: 5"]), limit).unwrap(), PayloadSize::Length(5));
        assert_eq!(parse_payload(&headers(&["Content-Length: 0"]), limit).unwrap(), PayloadSize::Empty);
        assert_eq!(parse_payload(&headers(&["Transfer-Encoding: chunked"]), limit).unwrap(), PayloadSize::Chunked);
        assert_eq!(parse_payload(&headers(&["Transfer-Encoding: gzip"]), limit).unwrap(), PayloadSize::Empty);

        assert!(matches!(
            parse_payload(&headers(&["Content-Length: -1"]), limit),
            Err(ParseError::InvalidContentLength { .. })
        ));
        assert!(matches!(
            parse_payload(&headers(&["Content-Length: 2048"]), limit),
            Err(ParseError::TooLargeBody { limit: 1024 })
        ));
        assert!(matches!(
            parse_payload(&headers(&["Content-Length: 5", "Transfer-Encoding: chunked"]), limit),
            Err(ParseError::MalformedHeaderBlock { .. })
        ));
    }
}
