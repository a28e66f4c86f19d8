use crate::{Headers, Method, Url};
use std::{borrow::Cow, collections::HashMap, time::Duration};

/// HTTP request, used both for outgoing client requests and for requests the
/// server parsed off a connection.
///
/// A request built with [`Request::new`] for a URL that has a host gets two
/// default headers:
///
/// | Header       | Value                  |
/// |--------------|------------------------|
/// | `User-Agent` | `wire_http/<version>`  |
/// | `Accept`     | `*/*`                  |
///
/// [`set_body`](Request::set_body) keeps `Content-Length` equal to the body
/// length unless the header was set explicitly beforehand.
///
/// # Examples
/// ```
/// use wire_http::{Method, Request, Url};
///
/// let url = Url::parse("http://localhost:8080/api").unwrap();
/// let mut req = Request::new(Method::Post, url);
/// req.set_body("test body content");
///
/// assert_eq!(req.headers().get("Content-Length"), Some("17"));
/// assert_eq!(req.headers().get("accept"), Some("*/*"));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    method: Method,
    url: Url,
    headers: Headers,
    body: Vec<u8>,
    timeout: Duration,
    params: HashMap<String, String>,
    // Length `set_body` last wrote into `Content-Length`, if it owns the header.
    auto_length: Option<usize>,
}

impl Request {
    /// Default time budget for a whole client exchange.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    pub(crate) const USER_AGENT: &'static str =
        concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

    pub fn new(method: Method, url: Url) -> Self {
        let mut headers = Headers::new();
        if !url.host().is_empty() {
            headers.set("User-Agent", Self::USER_AGENT);
            headers.set("Accept", "*/*");
        }

        Request {
            method,
            url,
            headers,
            body: Vec::new(),
            timeout: Self::DEFAULT_TIMEOUT,
            params: HashMap::new(),
            auto_length: None,
        }
    }

    // Server side: headers and body come straight off the wire, nothing is
    // added or recomputed.
    #[inline]
    pub(crate) fn from_parts(method: Method, url: Url, headers: Headers, body: Vec<u8>) -> Self {
        Request {
            method,
            url,
            headers,
            body,
            timeout: Self::DEFAULT_TIMEOUT,
            params: HashMap::new(),
            auto_length: None,
        }
    }
}

// Public API
impl Request {
    #[inline(always)]
    pub fn method(&self) -> Method {
        self.method
    }

    #[inline(always)]
    pub fn url(&self) -> &Url {
        &self.url
    }

    #[inline(always)]
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    #[inline(always)]
    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    /// Returns the first header value with case-insensitive name matching.
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

    #[inline(always)]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Route parameter by name. Exact-match routing never fills these in.
    #[inline]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    #[inline(always)]
    pub fn params(&self) -> &HashMap<String, String> {
        &self.params
    }

    #[inline]
    pub fn set_header(&mut self, key: &str, value: impl Into<String>) {
        if key.eq_ignore_ascii_case("content-length") {
            self.auto_length = None;
        }
        self.headers.set(key, value);
    }

    /// Replaces the body. `Content-Length` is set to its byte length unless
    /// the header was set explicitly, through [`set_header`](Request::set_header)
    /// or [`headers_mut`](Request::headers_mut).
    pub fn set_body(&mut self, body: impl Into<Vec<u8>>) {
        self.body = body.into();

        // A value other than the one written last time came from the caller
        let owned = match (self.auto_length, self.headers.get("content-length")) {
            (_, None) => true,
            (Some(written), Some(current)) => current == written.to_string(),
            (None, Some(_)) => false,
        };

        if owned {
            self.headers.set("content-length", self.body.len().to_string());
            self.auto_length = Some(self.body.len());
        } else {
            self.auto_length = None;
        }
    }

    #[inline]
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    #[inline]
    pub fn set_param(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.params.insert(name.into(), value.into());
    }

    /// Builder form of [`set_header`](Request::set_header).
    #[inline]
    pub fn with_header(mut self, key: &str, value: impl Into<String>) -> Self {
        self.set_header(key, value);
        self
    }

    /// Builder form of [`set_body`](Request::set_body).
    #[inline]
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.set_body(body);
        self
    }

    /// Builder form of [`set_timeout`](Request::set_timeout).
    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.set_timeout(timeout);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(raw: &str) -> Url {
        Url::parse(raw).unwrap()
    }

    #[test]
    fn default_headers() {
        let req = Request::new(Method::Get, url("http://example.com/"));

        assert_eq!(req.header("User-Agent"), Some(Request::USER_AGENT));
        assert_eq!(req.header("Accept"), Some("*/*"));
        assert_eq!(req.timeout(), Duration::from_secs(30));
        assert!(req.body().is_empty());
        assert!(!req.headers().has("Content-Length"));
    }

    #[test]
    fn no_default_headers_without_host() {
        let req = Request::new(Method::Get, Url::from_path("/test"));

        assert!(req.headers().is_empty());
    }

    #[test]
    fn body_sets_content_length() {
        #[rustfmt::skip]
        let cases = [
            ("test body content", "17"),
            ("",                  "0"),
            (r#"{"a":1}"#,        "7"),
            ("привет",            "12"),
        ];

        for (body, length) in cases {
            let mut req = Request::new(Method::Post, url("http://h/"));
            req.set_body(body);

            assert_eq!(req.body(), body.as_bytes());
            assert_eq!(req.header("CONTENT-LENGTH"), Some(length));
        }
    }

    #[test]
    fn explicit_content_length_wins() {
        let mut req = Request::new(Method::Put, url("http://h/"));
        req.set_header("Content-Length", "99");
        req.set_body("short");

        assert_eq!(req.header("content-length"), Some("99"));
    }

    #[test]
    fn second_body_updates_length() {
        let mut req = Request::new(Method::Post, url("http://h/"));
        req.set_body("first");
        req.set_body("second body");

        assert_eq!(req.body_text(), "second body");
        assert_eq!(req.header("content-length"), Some("11"));
    }

    #[test]
    fn length_set_through_headers_mut_is_kept() {
        let mut req = Request::new(Method::Post, url("http://h/"));
        req.set_body("first");
        req.headers_mut().set("Content-Length", "99");
        req.set_body("second body");

        assert_eq!(req.header("content-length"), Some("99"));

        // Once the caller owns the header, later bodies leave it alone too
        req.set_body("third");
        assert_eq!(req.header("content-length"), Some("99"));

        req.headers_mut().remove("content-length");
        req.set_body("fourth");
        assert_eq!(req.header("content-length"), Some("6"));
    }

    #[test]
    fn builders() {
        let req = Request::new(Method::Patch, url("http://h/x"))
            .with_header("X-Trace", "abc")
            .with_body(vec![0u8, 159, 146, 150])
            .with_timeout(Duration::from_millis(250));

        assert_eq!(req.method(), Method::Patch);
        assert_eq!(req.header("x-trace"), Some("abc"));
        assert_eq!(req.body(), &[0u8, 159, 146, 150]);
        assert_eq!(req.header("content-length"), Some("4"));
        assert_eq!(req.timeout(), Duration::from_millis(250));
    }

    #[test]
    fn params() {
        let mut req = Request::new(Method::Get, Url::from_path("/users/7"));
        assert_eq!(req.param("id"), None);

        req.set_param("id", "7");
        assert_eq!(req.param("id"), Some("7"));
        assert_eq!(req.params().len(), 1);
    }
}
