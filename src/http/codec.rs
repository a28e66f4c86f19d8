//! HTTP/1.x wire format.
//!
//! - Client side: [`encode_request`] and the incremental [`ResponseParser`].
//! - Server side: [`parse_request`] and [`encode_response`].
//!
//! # Framing of responses
//!
//! | Headers                          | Body                                        |
//! |----------------------------------|---------------------------------------------|
//! | `Content-Length: N`, `N > 0`     | exactly `N` bytes, complete as soon as read |
//! | no `Content-Length` (or `0`)     | everything until the peer closes            |
//! | `Transfer-Encoding: chunked`     | everything until the peer closes, **raw**   |
//!
//! Chunked framing is detected and reported through
//! [`Response::is_chunked`], but never decoded.

use crate::{
    errors::Error,
    http::types::{reason_phrase, slice_to_usize},
    Headers, Method, Request, Response, Url,
};
use memchr::{memchr, memmem};

const HEADER_END: &[u8] = b"\r\n\r\n";

/// Serializes a client request.
///
/// ```text
/// METHOD SP full_path SP "HTTP/1.1" CRLF
/// "Host: " host CRLF
/// (name ": " value CRLF)*
/// CRLF
/// body
/// ```
///
/// A `host` entry in the header store is not written a second time.
pub fn encode_request(req: &Request) -> Vec<u8> {
    let url = req.url();
    let mut out = Vec::with_capacity(128 + req.body().len());

    out.extend_from_slice(req.method().as_str().as_bytes());
    out.push(b' ');
    out.extend_from_slice(url.path().as_bytes());
    out.extend_from_slice(url.query().as_bytes());
    out.extend_from_slice(b" HTTP/1.1\r\n");

    push_header(&mut out, "Host", url.host());
    for (name, value) in req.headers() {
        if name != "host" {
            push_header(&mut out, name, value);
        }
    }
    out.extend_from_slice(b"\r\n");

    out.extend_from_slice(req.body());
    out
}

/// Serializes a server response. The reason phrase comes from the fixed
/// table in [`reason_phrase`], not from [`Response::status_text`].
pub fn encode_response(resp: &Response) -> Vec<u8> {
    let code = resp.status_code();
    let mut out = Vec::with_capacity(128 + resp.body().len());

    out.extend_from_slice(b"HTTP/1.1 ");
    out.extend_from_slice(code.to_string().as_bytes());
    out.push(b' ');
    out.extend_from_slice(reason_phrase(code).as_bytes());
    out.extend_from_slice(b"\r\n");

    for (name, value) in resp.headers() {
        push_header(&mut out, name, value);
    }
    out.extend_from_slice(b"\r\n");

    out.extend_from_slice(resp.body());
    out
}

#[inline(always)]
fn push_header(out: &mut Vec<u8>, name: &str, value: &str) {
    out.extend_from_slice(name.as_bytes());
    out.extend_from_slice(b": ");
    out.extend_from_slice(value.as_bytes());
    out.extend_from_slice(b"\r\n");
}

// `Key: Value`, one leading space trimmed from the value. Lines without a
// colon are skipped.
#[inline]
fn parse_header_line(line: &str) -> Option<(&str, &str)> {
    let colon = memchr(b':', line.as_bytes())?;
    let value = &line[colon + 1..];

    Some((&line[..colon], value.strip_prefix(' ').unwrap_or(value)))
}

#[inline(always)]
fn strip_cr(line: &[u8]) -> &[u8] {
    line.strip_suffix(b"\r").unwrap_or(line)
}

// RESPONSE

/// Incremental response parser.
///
/// Feed it bytes as they arrive; [`feed`](ResponseParser::feed) returns `true`
/// once a `Content-Length` framed body is complete. For bodies framed by
/// connection close keep feeding until the stream ends, then call
/// [`finish`](ResponseParser::finish).
///
/// # Examples
/// ```
/// use wire_http::codec::ResponseParser;
///
/// let mut parser = ResponseParser::new();
///
/// assert!(!parser.feed(b"HTTP/1.1 200 OK\r\nContent-Len").unwrap());
/// assert!(!parser.feed(b"gth: 5\r\n\r\nhel").unwrap());
/// assert!(parser.feed(b"lo").unwrap());
///
/// let resp = parser.finish().unwrap();
/// assert_eq!(resp.status_code(), 200);
/// assert_eq!(resp.body(), b"hello");
/// ```
#[derive(Debug, Default)]
pub struct ResponseParser {
    buffer: Vec<u8>,
    // Bytes of `buffer` already searched for the header terminator
    scanned: usize,
    head: Option<Head>,
}

#[derive(Debug)]
struct Head {
    status_code: u16,
    status_text: String,
    headers: Headers,
    content_length: usize,
    chunked: bool,
}

impl ResponseParser {
    #[inline(always)]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `data`, parses the header block once its terminator arrived,
    /// and reports whether the response is fully framed.
    pub fn feed(&mut self, data: &[u8]) -> Result<bool, Error> {
        self.buffer.extend_from_slice(data);

        if self.head.is_none() {
            // The terminator may straddle the previous chunk
            let from = self.scanned.saturating_sub(HEADER_END.len() - 1);
            let Some(pos) = memmem::find(&self.buffer[from..], HEADER_END) else {
                self.scanned = self.buffer.len();
                return Ok(false);
            };

            let end = from + pos;
            let head = Self::parse_head(&self.buffer[..end])?;
            self.buffer.drain(..end + HEADER_END.len());
            self.head = Some(head);

            tracing::trace!(
                content_length = self.head.as_ref().map(|h| h.content_length),
                "response head parsed"
            );
        }

        Ok(self.is_complete())
    }

    /// Whether the header block has been parsed.
    #[inline(always)]
    pub fn has_head(&self) -> bool {
        self.head.is_some()
    }

    /// Whether a `Content-Length` framed body has fully arrived. Other
    /// framings complete only when the stream ends.
    #[inline]
    pub fn is_complete(&self) -> bool {
        match &self.head {
            Some(head) => {
                !head.chunked && head.content_length > 0 && self.buffer.len() >= head.content_length
            }
            None => false,
        }
    }

    /// Builds the response from everything fed so far.
    ///
    /// Fails with [`Error::ResponseParse`] if the header terminator never
    /// arrived.
    pub fn finish(self) -> Result<Response, Error> {
        let head = self.head.ok_or(Error::ResponseParse(
            "stream ended before the header block was complete",
        ))?;

        let mut body = self.buffer;
        if !head.chunked && head.content_length > 0 {
            body.truncate(head.content_length);
        }

        Ok(Response::from_parts(
            head.status_code,
            head.status_text,
            head.headers,
            body,
            head.chunked,
        ))
    }

    fn parse_head(block: &[u8]) -> Result<Head, Error> {
        let text = simdutf8::basic::from_utf8(block)
            .map_err(|_| Error::ResponseParse("header block is not valid UTF-8"))?;

        let mut lines = text.split('\n').map(|l| l.strip_suffix('\r').unwrap_or(l));

        // VERSION SP STATUS_CODE SP STATUS_TEXT
        let status_line = lines.next().unwrap_or_default();
        let mut parts = status_line.splitn(3, ' ');

        let status_code = match (parts.next(), parts.next()) {
            (Some(version), Some(code)) if version.starts_with("HTTP/") => code.parse::<u16>().ok(),
            _ => None,
        }
        .ok_or(Error::ResponseParse("invalid status line"))?;
        let status_text = parts.next().unwrap_or_default().to_owned();

        let headers: Headers = lines.filter_map(parse_header_line).collect();

        let content_length = match headers.get("content-length") {
            Some(value) => slice_to_usize(value.trim().as_bytes())
                .ok_or(Error::ResponseParse("invalid Content-Length"))?,
            None => 0,
        };
        let chunked = headers
            .get("transfer-encoding")
            .is_some_and(|te| te.contains("chunked"));

        Ok(Head {
            status_code,
            status_text,
            headers,
            content_length,
            chunked,
        })
    }
}

// REQUEST

/// Parses a request the server received in a single read.
///
/// The parse is line oriented (lines end at `\n`, a trailing `\r` is
/// dropped):
/// 1. `METHOD SP TARGET SP VERSION`; `TARGET` splits at the first `?` into
///    path and query, the version is not checked.
/// 2. Header lines up to the first empty line.
/// 3. Everything after is the body, minus one trailing `\n`.
///
/// `Content-Length` is not consulted, so the body is whatever the single read
/// delivered.
///
/// # Errors
/// - [`Error::EmptyRequest`]: no request line at all
/// - [`Error::InvalidMethod`]: method token outside the supported set
/// - [`Error::InvalidEncoding`]: request line or headers are not UTF-8
pub fn parse_request(raw: &[u8]) -> Result<Request, Error> {
    let mut rest = raw;

    let first_line = next_line(&mut rest).ok_or(Error::EmptyRequest)?;
    let first_line = as_text(first_line)?;

    let mut tokens = first_line.split_ascii_whitespace();
    let method = tokens.next().ok_or(Error::EmptyRequest)?;
    let method = Method::from_bytes(method.as_bytes())
        .ok_or_else(|| Error::InvalidMethod(method.to_owned()))?;
    let target = tokens.next().unwrap_or_default();

    let mut headers = Headers::new();
    while let Some(line) = next_line(&mut rest) {
        if line.is_empty() {
            break;
        }

        if let Some((name, value)) = parse_header_line(as_text(line)?) {
            headers.set(name, value);
        }
    }

    let body = rest.strip_suffix(b"\n").unwrap_or(rest).to_vec();

    Ok(Request::from_parts(
        method,
        Url::from_path(target),
        headers,
        body,
    ))
}

// Next `\n`-terminated line without its terminator and trailing `\r`. The last
// line may lack the `\n`.
#[inline]
fn next_line<'a>(rest: &mut &'a [u8]) -> Option<&'a [u8]> {
    if rest.is_empty() {
        return None;
    }

    let line = match memchr(b'\n', rest) {
        Some(pos) => {
            let line = &rest[..pos];
            *rest = &rest[pos + 1..];
            line
        }
        None => std::mem::take(rest),
    };

    Some(strip_cr(line))
}

#[inline(always)]
fn as_text(line: &[u8]) -> Result<&str, Error> {
    simdutf8::basic::from_utf8(line).map_err(|_| Error::InvalidEncoding)
}


#[cfg(test)]
mod response_parser_tests {
    use super::*;

    fn parse_all(chunks: &[&[u8]]) -> Result<(bool, Response), Error> {
        let mut parser = ResponseParser::new();
        let mut complete = false;

        for chunk in chunks {
            complete = parser.feed(chunk)?;
            if complete {
                break;
            }
        }

        Ok((complete, parser.finish()?))
    }

    #[test]
    fn content_length() {
        let (complete, resp) =
            parse_all(&[b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\nX-A: b\r\n\r\nok"]).unwrap();

        assert!(complete);
        assert_eq!(resp.status_code(), 200);
        assert_eq!(resp.status_text(), "OK");
        assert_eq!(resp.header("x-a"), Some("b"));
        assert_eq!(resp.body(), b"ok");
        assert!(!resp.is_chunked());
    }

    #[test]
    fn extra_bytes_after_body_dropped() {
        let (complete, resp) =
            parse_all(&[b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nokEXTRA"]).unwrap();

        assert!(complete);
        assert_eq!(resp.body(), b"ok");
    }

    #[test]
    fn split_everywhere() {
        let raw = b"HTTP/1.1 404 Not Found\r\ncontent-length: 9\r\n\r\nNot Found";

        for split in 1..raw.len() {
            let (head, tail) = raw.split_at(split);
            let (complete, resp) = parse_all(&[head, tail]).unwrap();

            assert!(complete, "split at {split}");
            assert_eq!(resp.status_code(), 404);
            assert_eq!(resp.status_text(), "Not Found");
            assert_eq!(resp.body(), b"Not Found");
        }
    }

    #[test]
    fn byte_by_byte() {
        let raw = b"HTTP/1.1 201 Created\r\nContent-Length: 4\r\n\r\nmade";
        let chunks: Vec<&[u8]> = raw.chunks(1).collect();

        let (complete, resp) = parse_all(&chunks).unwrap();

        assert!(complete);
        assert_eq!(resp.status_code(), 201);
        assert_eq!(resp.body(), b"made");
    }

    #[test]
    fn read_until_close() {
        let (complete, resp) = parse_all(&[
            b"HTTP/1.0 200 OK\r\nServer: x\r\n\r\nfirst ",
            b"second",
        ])
        .unwrap();

        assert!(!complete);
        assert_eq!(resp.body(), b"first second");
    }

    #[test]
    fn no_body() {
        let (complete, resp) = parse_all(&[b"HTTP/1.1 204 No Content\r\n\r\n"]).unwrap();

        assert!(!complete);
        assert_eq!(resp.status_code(), 204);
        assert!(resp.body().is_empty());
    }

    #[test]
    fn short_body_kept() {
        let (complete, resp) =
            parse_all(&[b"HTTP/1.1 200 OK\r\nContent-Length: 10\r\n\r\nshort"]).unwrap();

        assert!(!complete);
        assert_eq!(resp.body(), b"short");
    }

    #[test]
    fn chunked_is_raw() {
        let raw: &[u8] = b"HTTP/1.1 200 OK\r\nTransfer-Encoding: gzip, chunked\r\n\r\n5\r\nhello\r\n0\r\n\r\n";
        let (complete, resp) = parse_all(&[raw]).unwrap();

        assert!(!complete);
        assert!(resp.is_chunked());
        assert_eq!(resp.body(), b"5\r\nhello\r\n0\r\n\r\n");
    }

    #[test]
    fn chunked_ignores_content_length() {
        let raw: &[u8] =
            b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\nContent-Length: 1\r\n\r\n3\r\nabc\r\n";
        let (complete, resp) = parse_all(&[raw]).unwrap();

        assert!(!complete);
        assert_eq!(resp.body(), b"3\r\nabc\r\n");
    }

    #[test]
    fn header_value_trim() {
        let raw: &[u8] = b"HTTP/1.1 200 OK\r\nA:no-space\r\nB:  two\r\nbroken line\r\n\r\n";
        let (_, resp) = parse_all(&[raw]).unwrap();

        assert_eq!(resp.header("a"), Some("no-space"));
        assert_eq!(resp.header("b"), Some(" two"));
        assert_eq!(resp.headers().len(), 2);
    }

    #[test]
    fn status_text_with_spaces() {
        let (_, resp) = parse_all(&[b"HTTP/1.1 500 Internal Server Error\r\n\r\n"]).unwrap();

        assert_eq!(resp.status_code(), 500);
        assert_eq!(resp.status_text(), "Internal Server Error");
    }

    #[test]
    fn missing_terminator() {
        let cases: [&[&[u8]]; 3] = [
            &[],
            &[b"HTTP/1.1 200 OK\r\n"],
            &[b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n", b"\r"],
        ];

        for chunks in cases {
            assert!(matches!(parse_all(chunks), Err(Error::ResponseParse(_))));
        }
    }

    #[test]
    fn invalid_head() {
        let cases: [&[u8]; 5] = [
            b"HTTP/1.1 abc OK\r\n\r\n",
            b"HTTP/1.1\r\n\r\n",
            b"SPDY 200 OK\r\n\r\n",
            b"HTTP/1.1 200 OK\r\nContent-Length: ten\r\n\r\n",
            b"HTTP/1.1 200 OK\r\nX-Bad: \xff\xfe\r\n\r\n",
        ];

        for raw in cases {
            let mut parser = ResponseParser::new();
            assert!(matches!(parser.feed(raw), Err(Error::ResponseParse(_))));
        }
    }

    #[test]
    fn binary_body() {
        let mut raw = b"HTTP/1.1 200 OK\r\nContent-Length: 4\r\n\r\n".to_vec();
        raw.extend_from_slice(&[0, 0xff, b'\n', 0x80]);

        let (complete, resp) = parse_all(&[&raw]).unwrap();

        assert!(complete);
        assert_eq!(resp.body(), &[0, 0xff, b'\n', 0x80]);
    }
}
