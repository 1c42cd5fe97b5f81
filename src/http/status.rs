//! Synthesized HTTP error responses.
//!
//! This proxy never builds a general response — real `200`s come from the
//! backend and are relayed as opaque bytes. The only responses it
//! constructs itself are a fixed set of error bodies, one per recognized
//! status code, always `HTTP/1.1` and always `Connection: close`.

macro_rules! status_responses {
    ($($name:ident => $code:literal, $reason:literal, $body_len:literal => $message:literal;)*) => {
        /// One of the status codes this proxy can synthesize a response for.
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum StatusCode {
            $($name,)*
        }

        impl StatusCode {
            pub fn code(self) -> u16 {
                match self { $(Self::$name => $code,)* }
            }

            pub fn reason(self) -> &'static str {
                match self { $(Self::$name => $reason,)* }
            }

            /// The full wire-format response: status line, headers, blank
            /// line, message body, trailing `\n`.
            /// `$body_len` is the message length plus the trailing `\n`,
            /// baked in by hand and checked against the literal in tests
            /// below (`concat!` can't compute it for us — its arguments
            /// must all themselves be literals).
            pub const fn as_bytes(self) -> &'static [u8] {
                match self {
                    $(Self::$name => concat!(
                        "HTTP/1.1 ", stringify!($code), " ", $reason, "\r\n",
                        "Content-Type: text/plain\r\n",
                        "Content-Length: ", stringify!($body_len), "\r\n",
                        "Connection: close\r\n",
                        "\r\n",
                        $message, "\n",
                    ).as_bytes(),)*
                }
            }
        }
    };
}

status_responses! {
    Ok => 200, "OK", 3 => "OK";
    BadRequest => 400, "Bad Request", 12 => "Bad Request";
    NotFound => 404, "Not Found", 10 => "Not Found";
    PayloadTooLarge => 413, "Request Too Large", 18 => "Request Too Large";
    InternalServerError => 500, "Internal Server Error", 22 => "Internal Server Error";
    BadGateway => 502, "Bad Gateway", 12 => "Bad Gateway";
    ServiceUnavailable => 503, "Service Unavailable", 20 => "Service Unavailable";
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_content_length(resp: &[u8]) -> usize {
        let s = std::str::from_utf8(resp).unwrap();
        let line = s
            .lines()
            .find(|l| l.to_ascii_lowercase().starts_with("content-length:"))
            .unwrap();
        line.split(':').nth(1).unwrap().trim().parse().unwrap()
    }

    #[test]
    fn status_line_matches_template() {
        let resp = StatusCode::BadRequest.as_bytes();
        let s = std::str::from_utf8(resp).unwrap();
        assert!(s.starts_with("HTTP/1.1 400 Bad Request\r\n"));
        assert!(s.contains("Content-Type: text/plain\r\n"));
        assert!(s.contains("Connection: close\r\n"));
        assert!(s.ends_with("Bad Request\n"));
    }

    #[test]
    fn content_length_matches_body() {
        for status in [
            StatusCode::Ok,
            StatusCode::BadRequest,
            StatusCode::NotFound,
            StatusCode::PayloadTooLarge,
            StatusCode::InternalServerError,
            StatusCode::BadGateway,
            StatusCode::ServiceUnavailable,
        ] {
            let resp = status.as_bytes();
            let declared = parse_content_length(resp);
            let body_start = resp.windows(4).position(|w| w == b"\r\n\r\n").unwrap() + 4;
            let body = &resp[body_start..];
            assert_eq!(declared, body.len(), "{:?}", status.code());
        }
    }

    #[test]
    fn codes_match_documented_list() {
        assert_eq!(StatusCode::Ok.code(), 200);
        assert_eq!(StatusCode::BadRequest.code(), 400);
        assert_eq!(StatusCode::NotFound.code(), 404);
        assert_eq!(StatusCode::PayloadTooLarge.code(), 413);
        assert_eq!(StatusCode::InternalServerError.code(), 500);
        assert_eq!(StatusCode::BadGateway.code(), 502);
        assert_eq!(StatusCode::ServiceUnavailable.code(), 503);
    }
}
