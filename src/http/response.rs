//! HTTP response value shared by the client parser and the server writer.

use crate::{http::types::reason_phrase, Headers};
use std::borrow::Cow;

/// HTTP response.
///
/// On the client side it is produced by the response parser with the status
/// text and headers exactly as received. On the server side handlers build it
/// with [`Response::new`], which fills in `Content-Length` and a default
/// `Content-Type: text/plain`.
///
/// # Examples
/// ```
/// use wire_http::Response;
///
/// let resp = Response::new(201, r#"{"status":"created"}"#)
///     .with_header("Content-Type", "application/json");
///
/// assert!(resp.is_success());
/// assert_eq!(resp.header("content-length"), Some("20"));
/// assert_eq!(resp.header("content-type"), Some("application/json"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Response {
    status_code: u16,
    status_text: String,
    headers: Headers,
    body: Vec<u8>,
    chunked: bool,
}

impl Response {
    /// Builds a response with `body`, `Content-Length` and
    /// `Content-Type: text/plain`.
    pub fn new(status_code: u16, body: impl Into<Vec<u8>>) -> Self {
        let body = body.into();

        let mut headers = Headers::new();
        headers.set("content-length", body.len().to_string());
        headers.set("content-type", "text/plain");

        Response {
            status_code,
            status_text: reason_phrase(status_code).to_owned(),
            headers,
            body,
            chunked: false,
        }
    }

    // Client side: everything comes from the wire as-is.
    #[inline]
    pub(crate) fn from_parts(
        status_code: u16,
        status_text: String,
        headers: Headers,
        body: Vec<u8>,
        chunked: bool,
    ) -> Self {
        Response {
            status_code,
            status_text,
            headers,
            body,
            chunked,
        }
    }
}

// Public API
impl Response {
    #[inline(always)]
    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    #[inline(always)]
    pub fn status_text(&self) -> &str {
        &self.status_text
    }

    /// `true` for status codes in `200..300`.
    #[inline(always)]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }

    /// `true` when the response was framed with `Transfer-Encoding: chunked`.
    ///
    /// Chunk framing is not decoded: the body holds the raw bytes received
    /// after the header block.
    #[inline(always)]
    pub fn is_chunked(&self) -> bool {
        self.chunked
    }

    #[inline(always)]
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    #[inline(always)]
    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    #[inline(always)]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    #[inline(always)]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// The body as text, with invalid UTF-8 replaced.
    #[inline]
    pub fn body_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    #[inline]
    pub fn into_body(self) -> Vec<u8> {
        self.body
    }

    #[inline]
    pub fn set_header(&mut self, key: &str, value: impl Into<String>) {
        self.headers.set(key, value);
    }

    /// Replaces the body and updates `Content-Length` to match.
    pub fn set_body(&mut self, body: impl Into<Vec<u8>>) {
        self.body = body.into();
        self.headers.set("content-length", self.body.len().to_string());
    }

    /// Builder form of [`set_header`](Response::set_header).
    #[inline]
    pub fn with_header(mut self, key: &str, value: impl Into<String>) -> Self {
        self.set_header(key, value);
        self
    }

    /// Builder form of [`set_body`](Response::set_body).
    #[inline]
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.set_body(body);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_sets_default_headers() {
        let resp = Response::new(200, "ok");

        assert_eq!(resp.status_code(), 200);
        assert_eq!(resp.status_text(), "OK");
        assert_eq!(resp.header("Content-Length"), Some("2"));
        assert_eq!(resp.header("Content-Type"), Some("text/plain"));
        assert_eq!(resp.body(), b"ok");
        assert!(!resp.is_chunked());
    }

    #[test]
    fn is_success() {
        #[rustfmt::skip]
        let cases = [
            (199, false),
            (200, true),
            (201, true),
            (204, true),
            (299, true),
            (300, false),
            (404, false),
            (500, false),
            (0,   false),
        ];

        for (code, expected) in cases {
            assert_eq!(Response::new(code, "").is_success(), expected, "{code}");
        }
    }

    #[test]
    fn default_is_empty() {
        let resp = Response::default();

        assert_eq!(resp.status_code(), 0);
        assert!(!resp.is_success());
        assert!(resp.headers().is_empty());
        assert!(resp.body().is_empty());
    }

    #[test]
    fn unknown_status_text() {
        assert_eq!(Response::new(418, "teapot").status_text(), "Unknown");
    }

    #[test]
    fn set_body_updates_length() {
        let resp = Response::new(200, "").with_body("four");

        assert_eq!(resp.header("content-length"), Some("4"));
        assert_eq!(resp.body_text(), "four");
        assert_eq!(resp.into_body(), b"four".to_vec());
    }
}
