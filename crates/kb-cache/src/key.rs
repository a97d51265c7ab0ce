//! Cache key derivation.

use std::fmt;

/// Identity of a cacheable request.
///
/// Parameters are stored sorted, so two requests that differ only in the
/// order their query parameters were supplied map to the same key. The URL,
/// the parameter multiset and the accept type are kept as separate fields,
/// which keeps keys unambiguous even when a URL contains separator
/// characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    url: String,
    params: Vec<(String, String)>,
    accept: String,
}

impl CacheKey {
    /// Derive the key for `url` with `params`, requested as `accept`.
    pub fn derive<K, V>(url: &str, params: &[(K, V)], accept: &str) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut params: Vec<(String, String)> = params
            .iter()
            .map(|(k, v)| (k.as_ref().to_string(), v.as_ref().to_string()))
            .collect();
        params.sort();

        Self {
            url: url.to_string(),
            params,
            accept: accept.to_string(),
        }
    }

    /// Key for a request without query parameters.
    pub fn for_url(url: &str, accept: &str) -> Self {
        Self::derive::<&str, &str>(url, &[], accept)
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Sorted query parameters.
    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    pub fn accept(&self) -> &str {
        &self.accept
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.url)?;
        for (i, (k, v)) in self.params.iter().enumerate() {
            let sep = if i == 0 { '?' } else { '&' };
            write!(f, "{sep}{k}={v}")?;
        }
        write!(f, " [{}]", self.accept)
    }
}
