use std::collections::{btree_map, BTreeMap};

/// Case-insensitive header store.
///
/// Names are normalized to ASCII lower case on the way in, so `Content-Type`,
/// `content-type` and `CONTENT-TYPE` address the same entry. Setting an
/// existing name overwrites its value, it never adds a second entry.
///
/// Iteration (and therefore the wire order) follows the normalized names in
/// sorted order; that order carries no meaning.
///
/// # Examples
/// ```
/// use wire_http::Headers;
///
/// let mut headers = Headers::new();
/// headers.set("Content-Type", "text/plain");
/// headers.set("content-type", "application/json");
///
/// assert_eq!(headers.len(), 1);
/// assert_eq!(headers.get("CONTENT-TYPE"), Some("application/json"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    data: BTreeMap<String, String>,
}

impl Headers {
    #[inline(always)]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or overwrites `key`.
    #[inline]
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.data.insert(key.to_ascii_lowercase(), value.into());
    }

    /// Returns the value for `key`, or `None` when absent.
    #[inline]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.data.get(&*normalize(key)).map(String::as_str)
    }

    /// Case-insensitive membership test.
    #[inline]
    pub fn has(&self, key: &str) -> bool {
        self.data.contains_key(&*normalize(key))
    }

    #[inline]
    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.data.remove(&*normalize(key))
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Iterates `(name, value)` pairs, names in lower case.
    #[inline]
    pub fn iter(&self) -> Iter<'_> {
        Iter(self.data.iter())
    }
}

// Skips the allocation for names that are already lower case, which is every
// name the crate itself uses.
#[inline]
fn normalize(key: &str) -> std::borrow::Cow<'_, str> {
    match key.bytes().any(|b| b.is_ascii_uppercase()) {
        true => key.to_ascii_lowercase().into(),
        false => key.into(),
    }
}

/// Iterator over the entries of [`Headers`].
#[derive(Debug, Clone)]
pub struct Iter<'a>(btree_map::Iter<'a, String, String>);

impl<'a> Iterator for Iter<'a> {
    type Item = (&'a str, &'a str);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.0.next().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.0.size_hint()
    }
}

impl<'a> IntoIterator for &'a Headers {
    type Item = (&'a str, &'a str);
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        for (key, value) in iter {
            headers.set(key.as_ref(), value);
        }
        headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn case_insensitive() {
        let mut headers = Headers::new();
        headers.set("Content-Type", "application/json");

        for key in ["Content-Type", "content-type", "CONTENT-TYPE", "cOnTeNt-TyPe"] {
            assert_eq!(headers.get(key), Some("application/json"));
            assert!(headers.has(key));
        }
    }

    #[test]
    fn overwrite() {
        let mut headers = Headers::new();
        headers.set("X-Custom", "one");
        headers.set("x-custom", "two");
        headers.set("X-CUSTOM", "three");

        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get("x-custom"), Some("three"));
    }

    #[test]
    fn missing() {
        let headers = Headers::new();

        assert_eq!(headers.get("Host"), None);
        assert!(!headers.has("Host"));
        assert!(headers.is_empty());
    }

    #[test]
    fn remove() {
        let mut headers: Headers = [("Accept", "*/*"), ("Host", "h")].into_iter().collect();

        assert_eq!(headers.remove("HOST"), Some("h".to_owned()));
        assert_eq!(headers.remove("host"), None);
        assert_eq!(headers.len(), 1);
    }

    #[test]
    fn iter_sorted_lowercase() {
        let headers: Headers = [("User-Agent", "t"), ("Accept", "*/*"), ("Content-Length", "0")]
            .into_iter()
            .collect();

        let pairs: Vec<_> = headers.iter().collect();
        assert_eq!(
            pairs,
            vec![("accept", "*/*"), ("content-length", "0"), ("user-agent", "t")]
        );
    }
}
