//! HTTP method/version tags and the bounded, case-insensitive header map
//! attached to a framed request.

use crate::limits::ReqLimits;

const ASCII_TABLE: [u8; 256] = [
    //   x0    x1    x2    x3    x4    x5    x6    x7    x8    x9    xA    xB    xC    xD    xE    xF
    0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0A, 0x0B, 0x0C, 0x0D, 0x0E, 0x0F, // 0x
    0x10, 0x11, 0x12, 0x13, 0x14, 0x15, 0x16, 0x17, 0x18, 0x19, 0x1A, 0x1B, 0x1C, 0x1D, 0x1E, 0x1F, // 1x
    0x20, 0x21, 0x22, 0x23, 0x24, 0x25, 0x26, 0x27, 0x28, 0x29, 0x2A, 0x2B, 0x2C, 0x2D, 0x2E, 0x2F, // 2x
    0x30, 0x31, 0x32, 0x33, 0x34, 0x35, 0x36, 0x37, 0x38, 0x39, 0x3A, 0x3B, 0x3C, 0x3D, 0x3E, 0x3F, // 3x
    0x40, b'a', b'b', b'c', b'd', b'e', b'f', b'g', b'h', b'i', b'j', b'k', b'l', b'm', b'n', b'o', // 4x
    b'p', b'q', b'r', b's', b't', b'u', b'v', b'w', b'x', b'y', b'z', 0x5B, 0x5C, 0x5D, 0x5E, 0x5F, // 5x
    0x60, b'a', b'b', b'c', b'd', b'e', b'f', b'g', b'h', b'i', b'j', b'k', b'l', b'm', b'n', b'o', // 6x
    b'p', b'q', b'r', b's', b't', b'u', b'v', b'w', b'x', b'y', b'z', 0x7B, 0x7C, 0x7D, 0x7E, 0x7F, // 7x
    0x80, 0x81, 0x82, 0x83, 0x84, 0x85, 0x86, 0x87, 0x88, 0x89, 0x8A, 0x8B, 0x8C, 0x8D, 0x8E, 0x8F, // 8x
    0x90, 0x91, 0x92, 0x93, 0x94, 0x95, 0x96, 0x97, 0x98, 0x99, 0x9A, 0x9B, 0x9C, 0x9D, 0x9E, 0x9F, // 9x
    0xA0, 0xA1, 0xA2, 0xA3, 0xA4, 0xA5, 0xA6, 0xA7, 0xA8, 0xA9, 0xAA, 0xAB, 0xAC, 0xAD, 0xAE, 0xAF, // Ax
    0xB0, 0xB1, 0xB2, 0xB3, 0xB4, 0xB5, 0xB6, 0xB7, 0xB8, 0xB9, 0xBA, 0xBB, 0xBC, 0xBD, 0xBE, 0xBF, // Bx
    0xC0, 0xC1, 0xC2, 0xC3, 0xC4, 0xC5, 0xC6, 0xC7, 0xC8, 0xC9, 0xCA, 0xCB, 0xCC, 0xCD, 0xCE, 0xCF, // Cx
    0xD0, 0xD1, 0xD2, 0xD3, 0xD4, 0xD5, 0xD6, 0xD7, 0xD8, 0xD9, 0xDA, 0xDB, 0xDC, 0xDD, 0xDE, 0xDF, // Dx
    0xE0, 0xE1, 0xE2, 0xE3, 0xE4, 0xE5, 0xE6, 0xE7, 0xE8, 0xE9, 0xEA, 0xEB, 0xEC, 0xED, 0xEE, 0xEF, // Ex
    0xF0, 0xF1, 0xF2, 0xF3, 0xF4, 0xF5, 0xF6, 0xF7, 0xF8, 0xF9, 0xFA, 0xFB, 0xFC, 0xFD, 0xFE, 0xFF, // Fx
];

#[inline(always)]
pub(crate) fn eq_ignore_ascii_case(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| ASCII_TABLE[*x as usize] == ASCII_TABLE[*y as usize])
}

/// Parses a run of ASCII digits into a `usize`, rejecting anything else.
///
/// Used for `Content-Length`; overflow is treated as a parse failure rather
/// than wrapping, since a request claiming an absurd length is malformed,
/// not merely large.
#[inline(always)]
pub(crate) fn slice_to_usize(bytes: &[u8]) -> Option<usize> {
    if bytes.is_empty() {
        return None;
    }
    let mut result: usize = 0;
    for &byte in bytes {
        if !byte.is_ascii_digit() {
            return None;
        }
        result = result.checked_mul(10)?.checked_add((byte - b'0') as usize)?;
    }
    Some(result)
}

/// Request method, matched case-insensitively.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Delete,
    Patch,
    Options,
    Trace,
    Connect,
}

impl Method {
    /// `None` for anything not in the nine recognized tokens.
    pub(crate) fn parse(token: &[u8]) -> Option<Self> {
        Some(match token {
            t if eq_ignore_ascii_case(t, b"GET") => Method::Get,
            t if eq_ignore_ascii_case(t, b"HEAD") => Method::Head,
            t if eq_ignore_ascii_case(t, b"POST") => Method::Post,
            t if eq_ignore_ascii_case(t, b"PUT") => Method::Put,
            t if eq_ignore_ascii_case(t, b"DELETE") => Method::Delete,
            t if eq_ignore_ascii_case(t, b"PATCH") => Method::Patch,
            t if eq_ignore_ascii_case(t, b"OPTIONS") => Method::Options,
            t if eq_ignore_ascii_case(t, b"TRACE") => Method::Trace,
            t if eq_ignore_ascii_case(t, b"CONNECT") => Method::Connect,
            _ => return None,
        })
    }

    /// True for methods the framer treats as body-less absent other framing
    /// signals.
    pub(crate) fn is_bodyless(self) -> bool {
        matches!(self, Method::Get | Method::Head | Method::Delete)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Patch => "PATCH",
            Method::Options => "OPTIONS",
            Method::Trace => "TRACE",
            Method::Connect => "CONNECT",
        }
    }
}

/// Request-line HTTP version. HTTP/0.9 is out of scope for this spec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Version {
    Http10,
    Http11,
}

impl Version {
    pub(crate) fn parse(token: &[u8]) -> Option<Self> {
        if eq_ignore_ascii_case(token, b"HTTP/1.1") {
            Some(Version::Http11)
        } else if eq_ignore_ascii_case(token, b"HTTP/1.0") {
            Some(Version::Http10)
        } else {
            None
        }
    }

    /// Keep-alive default before any `Connection` header is applied.
    pub(crate) fn default_keep_alive(self) -> bool {
        matches!(self, Version::Http11)
    }
}

/// One header slot: raw bytes as they appeared on the wire, not copied.
#[derive(Debug, Clone, Copy)]
pub struct Header<'a> {
    pub name: &'a [u8],
    pub value: &'a [u8],
}

/// Bounded, append-only header list over a shared buffer prefix with
/// case-insensitive lookup by name.
///
/// Backed by a fixed array rather than a `Vec`: the framer never allocates.
pub struct HeaderMap<'a> {
    slots: [Option<Header<'a>>; ReqLimits::MAX_HEADERS],
    len: usize,
}

impl<'a> HeaderMap<'a> {
    pub(crate) fn new() -> Self {
        HeaderMap {
            slots: [None; ReqLimits::MAX_HEADERS],
            len: 0,
        }
    }

    /// Returns `false` if the map is already at `MAX_HEADERS` capacity.
    #[must_use]
    pub(crate) fn push(&mut self, name: &'a [u8], value: &'a [u8]) -> bool {
        if self.len >= self.slots.len() {
            return false;
        }
        self.slots[self.len] = Some(Header { name, value });
        self.len += 1;
        true
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &Header<'a>> {
        self.slots[..self.len].iter().filter_map(|s| s.as_ref())
    }

    /// Case-insensitive lookup; returns the first match, as the wire order
    /// specifies (RFC 7230 combines later dupes, but this proxy only cares
    /// about a handful of recognized names and never sees legitimate dupes
    /// of them from a conforming client).
    pub fn get(&self, name: &[u8]) -> Option<&[u8]> {
        self.iter()
            .find(|h| eq_ignore_ascii_case(h.name, name))
            .map(|h| h.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_case_insensitive() {
        assert_eq!(Method::parse(b"get"), Some(Method::Get));
        assert_eq!(Method::parse(b"GeT"), Some(Method::Get));
        assert_eq!(Method::parse(b"CONNECT"), Some(Method::Connect));
        assert_eq!(Method::parse(b"FROB"), None);
    }

    #[test]
    fn version_case_insensitive() {
        assert_eq!(Version::parse(b"http/1.1"), Some(Version::Http11));
        assert_eq!(Version::parse(b"HTTP/1.0"), Some(Version::Http10));
        assert_eq!(Version::parse(b"HTTP/2"), None);
    }

    #[test]
    fn digits_only() {
        assert_eq!(slice_to_usize(b"1234"), Some(1234));
        assert_eq!(slice_to_usize(b""), None);
        assert_eq!(slice_to_usize(b"12a4"), None);
        assert_eq!(slice_to_usize(b"99999999999999999999999999"), None);
    }

    #[test]
    fn header_lookup_case_insensitive() {
        let mut map = HeaderMap::new();
        assert!(map.push(b"Content-Length", b"5"));
        assert!(map.push(b"Host", b"example.com"));
        assert_eq!(map.get(b"content-length"), Some(&b"5"[..]));
        assert_eq!(map.get(b"HOST"), Some(&b"example.com"[..]));
        assert_eq!(map.get(b"Missing"), None);
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn header_map_full() {
        let mut map = HeaderMap::new();
        for i in 0..ReqLimits::MAX_HEADERS {
            assert!(map.push(b"X", b"v"), "slot {i} should accept");
        }
        assert!(!map.push(b"overflow", b"v"));
    }
}
