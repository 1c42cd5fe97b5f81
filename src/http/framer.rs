//! Streaming HTTP/1 request framer.
//!
//! Operates over a contiguous prefix of the client's read buffer; never
//! copies or owns the bytes. `parse` is a pure function of its input prefix
//! — calling it again with a longer prefix makes monotonic progress and,
//! once `Complete`, returns the same `total_length` and field values
//! forever. It performs no I/O and never blocks, so it can be re-run after
//! every partial read without owning the socket.

use super::types::{slice_to_usize, HeaderMap, Method, Version};
use crate::limits::ReqLimits;

/// The framer's three possible answers to "is this prefix a complete
/// request yet?".
pub enum Outcome<'a> {
    /// Not enough bytes yet; call again once more have arrived.
    Need,
    /// A fully-framed request; `total_length` bytes of `prefix` belong to it.
    Complete(Request<'a>),
    /// The prefix can never become a valid request.
    Malformed,
}

/// A fully framed HTTP/1 request.
pub struct Request<'a> {
    pub method: Method,
    pub path: &'a [u8],
    pub version: Version,
    pub host: &'a [u8],
    pub headers: HeaderMap<'a>,
    /// `None` when the request declared neither `Content-Length` nor
    /// chunked framing.
    pub content_length: Option<usize>,
    pub chunked: bool,
    pub keep_alive: bool,
    pub headers_end_offset: usize,
    pub total_length: usize,
}

/// Trims leading/trailing optional whitespace (space, tab) per RFC 7230 OWS.
fn trim_ows(mut s: &[u8]) -> &[u8] {
    while let [b' ' | b'\t', rest @ ..] = s {
        s = rest;
    }
    while let [rest @ .., b' ' | b'\t'] = s {
        s = rest;
    }
    s
}

fn trim_trailing_cr(s: &[u8]) -> &[u8] {
    match s {
        [rest @ .., b'\r'] => rest,
        _ => s,
    }
}

/// Parses `prefix` as far as it can: request line, headers, then the body
/// framing decision (`Content-Length`, chunked, or bodyless).
pub fn parse(prefix: &[u8]) -> Outcome<'_> {
    let headers_end = match memchr::memmem::find(prefix, b"\r\n\r\n") {
        Some(pos) => pos + 4,
        None => return Outcome::Need,
    };
    let head = &prefix[..headers_end - 4];

    // Step 2: request line — the first line of `head`, terminated by \r\n.
    let request_line_end = match memchr::memmem::find(head, b"\r\n") {
        Some(pos) => pos,
        None => return Outcome::Malformed,
    };
    let request_line = &head[..request_line_end];

    let mut tokens = request_line.split(|&b| b == b' ').filter(|t| !t.is_empty());
    let method_tok = match tokens.next() {
        Some(t) => t,
        None => return Outcome::Malformed,
    };
    let path = match tokens.next() {
        Some(t) => t,
        None => return Outcome::Malformed,
    };
    let version_tok = match tokens.next() {
        Some(t) => t,
        None => return Outcome::Malformed,
    };
    if tokens.next().is_some() {
        return Outcome::Malformed;
    }

    let method = match Method::parse(method_tok) {
        Some(m) => m,
        None => return Outcome::Malformed,
    };
    if path.is_empty() || path.len() > ReqLimits::MAX_PATH_LEN {
        return Outcome::Malformed;
    }
    let version = match Version::parse(version_tok) {
        Some(v) => v,
        None => return Outcome::Malformed,
    };

    // Step 3/4: header lines between the request line and end-of-headers.
    let mut headers = HeaderMap::new();
    let mut host: &[u8] = b"";
    let mut content_length: Option<usize> = None;
    let mut chunked = false;
    let mut connection_close: Option<bool> = None;

    let mut rest = &head[request_line_end + 2..];
    while !rest.is_empty() {
        let line_end = match memchr::memmem::find(rest, b"\r\n") {
            Some(pos) => pos,
            None => rest.len(),
        };
        let line = &rest[..line_end];
        rest = if line_end + 2 <= rest.len() {
            &rest[line_end + 2..]
        } else {
            &rest[rest.len()..]
        };

        if line.is_empty() {
            continue;
        }
        let colon = match memchr::memchr(b':', line) {
            Some(pos) => pos,
            None => return Outcome::Malformed,
        };
        let name = &line[..colon];
        let value = trim_ows(trim_trailing_cr(&line[colon + 1..]));
        if name.is_empty() || name.len() > ReqLimits::MAX_HEADER_NAME_LEN {
            return Outcome::Malformed;
        }
        if value.len() > ReqLimits::MAX_HEADER_VALUE_LEN {
            return Outcome::Malformed;
        }
        if !headers.push(name, value) {
            return Outcome::Malformed;
        }

        if super::types::eq_ignore_ascii_case(name, b"Host") {
            host = value;
        } else if super::types::eq_ignore_ascii_case(name, b"Content-Length") {
            content_length = Some(match slice_to_usize(value) {
                Some(n) => n,
                None => return Outcome::Malformed,
            });
        } else if super::types::eq_ignore_ascii_case(name, b"Connection") {
            if super::types::eq_ignore_ascii_case(trim_ows(value), b"keep-alive") {
                connection_close = Some(false);
            } else if super::types::eq_ignore_ascii_case(trim_ows(value), b"close") {
                connection_close = Some(true);
            }
        } else if super::types::eq_ignore_ascii_case(name, b"Transfer-Encoding")
            && super::types::eq_ignore_ascii_case(trim_ows(value), b"chunked")
        {
            chunked = true;
        }
    }

    // Step 5: framing.
    let total_length = if chunked {
        headers_end
    } else if let Some(cl) = content_length {
        let total = headers_end + cl;
        if prefix.len() < total {
            return Outcome::Need;
        }
        total
    } else if method.is_bodyless() {
        headers_end
    } else {
        return Outcome::Malformed;
    };

    // Step 6: keep-alive default, then override from Connection header.
    let keep_alive = match connection_close {
        Some(close) => !close,
        None => version.default_keep_alive(),
    };

    // Post-parse validation.
    if let Some(cl) = content_length {
        if cl > ReqLimits::default().max_content_length {
            return Outcome::Malformed;
        }
    }

    Outcome::Complete(Request {
        method,
        path,
        version,
        host,
        headers,
        content_length,
        chunked,
        keep_alive,
        headers_end_offset: headers_end,
        total_length,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete(prefix: &[u8]) -> Request<'_> {
        match parse(prefix) {
            Outcome::Complete(r) => r,
            Outcome::Need => panic!("expected Complete, got Need"),
            Outcome::Malformed => panic!("expected Complete, got Malformed"),
        }
    }

    #[test]
    fn incomplete_headers_need_more() {
        assert!(matches!(parse(b"GET / HTTP/1.1\r\nHost: h"), Outcome::Need));
    }

    #[test]
    fn get_request_frames_fully() {
        let raw = b"GET /x HTTP/1.1\r\nHost: h\r\n\r\n";
        assert_eq!(raw.len(), 28);
        let req = complete(raw);
        assert_eq!(req.method, Method::Get);
        assert_eq!(req.path, b"/x");
        assert_eq!(req.version, Version::Http11);
        assert_eq!(req.host, b"h");
        assert!(req.keep_alive);
        assert_eq!(req.total_length, raw.len());
    }

    #[test]
    fn post_without_content_length_or_chunked_is_malformed() {
        let raw = b"POST /p HTTP/1.1\r\nHost: h\r\n\r\n";
        assert!(matches!(parse(raw), Outcome::Malformed));
    }

    #[test]
    fn post_with_content_length_waits_for_body() {
        let raw = b"POST /p HTTP/1.1\r\nHost: h\r\nContent-Length: 5\r\n\r\nhel";
        assert!(matches!(parse(raw), Outcome::Need));
        let full = b"POST /p HTTP/1.1\r\nHost: h\r\nContent-Length: 5\r\n\r\nhello";
        let req = complete(full);
        assert_eq!(req.content_length, Some(5));
        assert_eq!(req.total_length, full.len());
    }

    #[test]
    fn chunked_is_complete_at_headers_end() {
        let raw = b"POST /p HTTP/1.1\r\nHost: h\r\nTransfer-Encoding: chunked\r\n\r\n5\r\nhello\r\n0\r\n\r\n";
        let req = complete(raw);
        assert!(req.chunked);
        assert_eq!(req.total_length, req.headers_end_offset);
    }

    #[test]
    fn connection_close_overrides_http11_default() {
        let raw = b"GET / HTTP/1.1\r\nHost: h\r\nConnection: close\r\n\r\n";
        let req = complete(raw);
        assert!(!req.keep_alive);
    }

    #[test]
    fn http10_defaults_to_close_unless_keep_alive() {
        let raw = b"GET / HTTP/1.0\r\nHost: h\r\n\r\n";
        assert!(!complete(raw).keep_alive);

        let raw = b"GET / HTTP/1.0\r\nHost: h\r\nConnection: keep-alive\r\n\r\n";
        assert!(complete(raw).keep_alive);
    }

    #[test]
    fn unknown_method_is_malformed() {
        assert!(matches!(parse(b"FROB / HTTP/1.1\r\n\r\n"), Outcome::Malformed));
    }

    #[test]
    fn unknown_version_is_malformed() {
        assert!(matches!(parse(b"GET / HTTP/2.0\r\n\r\n"), Outcome::Malformed));
    }

    #[test]
    fn header_without_colon_is_malformed() {
        assert!(matches!(
            parse(b"GET / HTTP/1.1\r\nHost h\r\n\r\n"),
            Outcome::Malformed
        ));
    }

    #[test]
    fn path_over_bound_is_malformed() {
        let long_path = vec![b'a'; ReqLimits::MAX_PATH_LEN + 1];
        let mut raw = Vec::new();
        raw.extend_from_slice(b"GET /");
        raw.extend_from_slice(&long_path);
        raw.extend_from_slice(b" HTTP/1.1\r\n\r\n");
        assert!(matches!(parse(&raw), Outcome::Malformed));
    }

    #[test]
    fn too_many_headers_is_malformed() {
        let mut raw = Vec::new();
        raw.extend_from_slice(b"GET / HTTP/1.1\r\n");
        for i in 0..ReqLimits::MAX_HEADERS + 1 {
            raw.extend_from_slice(format!("X-{i}: v\r\n").as_bytes());
        }
        raw.extend_from_slice(b"\r\n");
        assert!(matches!(parse(&raw), Outcome::Malformed));
    }

    #[test]
    fn monotonic_progress_extending_prefix_keeps_same_answer() {
        let raw = b"POST /p HTTP/1.1\r\nHost: h\r\nContent-Length: 5\r\n\r\nhello";
        let req1 = complete(raw);
        let total1 = req1.total_length;

        let mut extended = raw.to_vec();
        extended.extend_from_slice(b"garbage-from-next-request");
        let req2 = complete(&extended);
        assert_eq!(req2.total_length, total1);
        assert_eq!(req2.content_length, req1.content_length);
    }

    #[rustfmt::skip]
    #[test]
    fn all_nine_methods_recognized() {
        let cases: &[(&[u8], Method)] = &[
            (b"GET / HTTP/1.1\r\n\r\n", Method::Get),
            (b"HEAD / HTTP/1.1\r\n\r\n", Method::Head),
            (b"DELETE / HTTP/1.1\r\n\r\n", Method::Delete),
            (b"OPTIONS / HTTP/1.1\r\nContent-Length: 0\r\n\r\n", Method::Options),
            (b"TRACE / HTTP/1.1\r\nContent-Length: 0\r\n\r\n", Method::Trace),
            (b"CONNECT / HTTP/1.1\r\nContent-Length: 0\r\n\r\n", Method::Connect),
            (b"PUT / HTTP/1.1\r\nContent-Length: 0\r\n\r\n", Method::Put),
            (b"PATCH / HTTP/1.1\r\nContent-Length: 0\r\n\r\n", Method::Patch),
            (b"POST / HTTP/1.1\r\nContent-Length: 0\r\n\r\n", Method::Post),
        ];
        for (raw, expected) in cases {
            assert_eq!(complete(raw).method, *expected);
        }
    }
}
