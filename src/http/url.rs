//! Absolute URL and request-target parsing.

use crate::{errors::Error, query::Query};
use memchr::{memchr, memchr2, memmem};
use std::{fmt, str::FromStr};

/// A parsed URL: `scheme://host[:port][/path][?query]`.
///
/// Every component is kept as text exactly as it appeared in the input, no
/// percent decoding is performed. A URL produced by [`Url::parse`] always has
/// a non-empty scheme, host, port and path:
///
/// | Input                      | host      | port   | path   | query    |
/// |----------------------------|-----------|--------|--------|----------|
/// | `http://h/p`               | `h`       | `80`   | `/p`   |          |
/// | `https://h/p`              | `h`       | `443`  | `/p`   |          |
/// | `http://h:8080`            | `h`       | `8080` | `/`    |          |
/// | `http://h?q=1`             | `h`       | `80`   | `/`    | `?q=1`   |
///
/// The query keeps its leading `?`, so [`full_path`](Url::full_path) is a
/// plain concatenation.
///
/// # Examples
/// ```
/// use wire_http::Url;
///
/// let url = Url::parse("http://example.com:8080/search?q=rust").unwrap();
///
/// assert_eq!(url.host(), "example.com");
/// assert_eq!(url.port(), "8080");
/// assert_eq!(url.full_path(), "/search?q=rust");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Url {
    scheme: String,
    host: String,
    port: String,
    path: String,
    query: String,
}

impl Url {
    /// Parses an absolute URL.
    ///
    /// Fails with [`Error::InvalidUrl`] when `"://"` is missing or when the
    /// scheme or host is empty.
    pub fn parse(raw: &str) -> Result<Self, Error> {
        let invalid = || Error::InvalidUrl(raw.to_owned());

        let scheme_end = memmem::find(raw.as_bytes(), b"://").ok_or_else(invalid)?;
        let scheme = &raw[..scheme_end];
        let rest = &raw[scheme_end + 3..];

        // Host segment runs until the first `/` or `?`
        let host_end = memchr2(b'/', b'?', rest.as_bytes()).unwrap_or(rest.len());
        let (host_port, target) = rest.split_at(host_end);

        let (host, port) = match memchr(b':', host_port.as_bytes()) {
            Some(colon) => (&host_port[..colon], &host_port[colon + 1..]),
            None => (host_port, ""),
        };

        if scheme.is_empty() || host.is_empty() {
            return Err(invalid());
        }

        let port = match port {
            "" => Self::default_port(scheme),
            explicit => explicit,
        };

        let mut url = Self::from_path(target);
        url.scheme = scheme.to_owned();
        url.host = host.to_owned();
        url.port = port.to_owned();

        if url.path.is_empty() {
            url.path.push('/');
        }

        Ok(url)
    }

    /// Builds a URL from a request target (`path[?query]`) with no scheme,
    /// host or port. Used for targets read off a request line.
    ///
    /// # Examples
    /// ```
    /// use wire_http::Url;
    ///
    /// let url = Url::from_path("/users?id=7");
    ///
    /// assert_eq!(url.path(), "/users");
    /// assert_eq!(url.query(), "?id=7");
    /// assert_eq!(url.host(), "");
    /// ```
    pub fn from_path(target: &str) -> Self {
        let (path, query) = match memchr(b'?', target.as_bytes()) {
            Some(pos) => target.split_at(pos),
            None => (target, ""),
        };

        Url {
            path: path.to_owned(),
            query: query.to_owned(),
            ..Url::default()
        }
    }

    #[inline]
    fn default_port(scheme: &str) -> &'static str {
        match scheme {
            "https" => "443",
            _ => "80",
        }
    }
}

// Public API
impl Url {
    #[inline(always)]
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    #[inline(always)]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// The port as text, either explicit or the scheme's default.
    #[inline(always)]
    pub fn port(&self) -> &str {
        &self.port
    }

    #[inline(always)]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The query including its leading `?`, or an empty string.
    #[inline(always)]
    pub fn query(&self) -> &str {
        &self.query
    }

    /// `path` followed by `query`, as written on the request line.
    #[inline]
    pub fn full_path(&self) -> String {
        let mut full = String::with_capacity(self.path.len() + self.query.len());
        full.push_str(&self.path);
        full.push_str(&self.query);
        full
    }

    /// Splits the query into `(name, value)` pairs.
    ///
    /// See [`Query::parse`] for the accepted forms.
    #[inline]
    pub fn query_pairs(&self) -> Vec<(&str, &str)> {
        Query::parse(&self.query)
    }
}

impl FromStr for Url {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Url::parse(s)
    }
}

impl fmt::Display for Url {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.host.is_empty() {
            write!(f, "{}://{}:{}", self.scheme, self.host, self.port)?;
        }

        write!(f, "{}{}", self.path, self.query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse() {
        #[rustfmt::skip]
        let cases = [
            ("http://h/p",              ("http",  "h",       "80",   "/p",      "")),
            ("https://h/p",             ("https", "h",       "443",  "/p",      "")),
            ("http://h:8080/p",         ("http",  "h",       "8080", "/p",      "")),
            ("https://h:8443",          ("https", "h",       "8443", "/",       "")),
            ("http://h",                ("http",  "h",       "80",   "/",       "")),
            ("http://h?q=1",            ("http",  "h",       "80",   "/",       "?q=1")),
            ("http://h/s?q=t",          ("http",  "h",       "80",   "/s",      "?q=t")),
            ("http://h/a/b/c?x=1&y=2",  ("http",  "h",       "80",   "/a/b/c",  "?x=1&y=2")),
            ("http://h?q=/not/a/path",  ("http",  "h",       "80",   "/",       "?q=/not/a/path")),
            ("ftp://files.local:21/x",  ("ftp",   "files.local", "21", "/x",    "")),
            ("http://127.0.0.1:0/",     ("http",  "127.0.0.1", "0",  "/",       "")),
            ("http://h:/p",             ("http",  "h",       "80",   "/p",      "")),
        ];

        for (raw, (scheme, host, port, path, query)) in cases {
            let url = Url::parse(raw).unwrap();

            assert_eq!(url.scheme(), scheme, "{raw}");
            assert_eq!(url.host(), host, "{raw}");
            assert_eq!(url.port(), port, "{raw}");
            assert_eq!(url.path(), path, "{raw}");
            assert_eq!(url.query(), query, "{raw}");
        }
    }

    #[test]
    fn parse_invalid() {
        let cases = [
            "not-a-valid-url",
            "",
            "http:/h/p",
            "h/p?x=://",
            "://h/p",
            "http://",
            "http://:80/p",
            "http:///p",
        ];

        for raw in cases {
            assert!(
                matches!(Url::parse(raw), Err(Error::InvalidUrl(ref r)) if r == raw),
                "{raw}"
            );
        }
    }

    #[test]
    fn full_path() {
        let cases = [
            ("http://h/s?q=t", "/s?q=t"),
            ("http://h", "/"),
            ("http://h?q=1", "/?q=1"),
            ("http://h/a/b", "/a/b"),
        ];

        for (raw, expected) in cases {
            assert_eq!(Url::parse(raw).unwrap().full_path(), expected);
        }
    }

    #[test]
    fn from_path() {
        #[rustfmt::skip]
        let cases = [
            ("/",            ("/",      "")),
            ("/test",        ("/test",  "")),
            ("/s?q=t",       ("/s",     "?q=t")),
            ("/s?",          ("/s",     "?")),
            ("/a?b?c",       ("/a",     "?b?c")),
            ("",             ("",       "")),
        ];

        for (target, (path, query)) in cases {
            let url = Url::from_path(target);

            assert_eq!(url.path(), path);
            assert_eq!(url.query(), query);
            assert_eq!(url.full_path(), target);
            assert_eq!(url.host(), "");
            assert_eq!(url.port(), "");
        }
    }

    #[test]
    fn display() {
        let url: Url = "http://h/s?q=t".parse().unwrap();
        assert_eq!(url.to_string(), "http://h:80/s?q=t");

        assert_eq!(Url::from_path("/x?y").to_string(), "/x?y");
    }

    #[test]
    fn query_pairs() {
        let url = Url::parse("http://h/s?q=rust&page=2&debug").unwrap();

        assert_eq!(
            url.query_pairs(),
            vec![("q", "rust"), ("page", "2"), ("debug", "")]
        );
        assert!(Url::parse("http://h/s").unwrap().query_pairs().is_empty());
    }
}
