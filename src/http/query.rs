//! Zero-copy URL query string splitting.

use memchr::memchr;

/// Zero-copy URL query string parser.
///
/// Splits a query into `(name, value)` pairs borrowing from the input. There is
/// no percent decoding: `%20` stays `%20`.
///
/// All possible formats:
/// ```rust
/// use wire_http::query::Query;
///
/// let params = Query::parse("?debug&name=&=Qwe&key=sda&&");
///
/// assert_eq!(params.len(), 5);
/// assert_eq!(params[0], ("debug", ""));
/// assert_eq!(params[1], ("name", ""));
/// assert_eq!(params[2], ("", "Qwe"));
/// assert_eq!(params[3], ("key", "sda"));
/// assert_eq!(params[4], ("", ""));
/// ```
pub struct Query;

impl Query {
    /// Parses a query string, with or without its leading `?`.
    ///
    /// An empty query (or a lone `?`) yields no pairs. A segment without `=`
    /// becomes a name with an empty value; only the first `=` splits.
    #[inline]
    pub fn parse(query: &str) -> Vec<(&str, &str)> {
        let data = query.strip_prefix('?').unwrap_or(query);
        let bytes = data.as_bytes();

        let mut result = Vec::new();
        let mut start = 0;
        while start < data.len() {
            // Find next '&' or end of string
            let end = memchr(b'&', &bytes[start..])
                .map(|pos| start + pos)
                .unwrap_or(data.len());

            // Find '=' within current parameter segment
            let split = memchr(b'=', &bytes[start..end])
                .map(|pos| start + pos)
                .unwrap_or(end);

            let key = &data[start..split];
            let value = match split < end {
                true => &data[split + 1..end],
                false => "",
            };

            result.push((key, value));
            start = end + 1;
        }

        result
    }
}
