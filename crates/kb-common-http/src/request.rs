//! Request descriptions for the gateway client.

use crate::client::HttpError;
use bytes::Bytes;
use kb_cache::CacheKey;
use url::Url;

/// Common media types.
pub mod headers {
    pub const ACCEPT_JSON: &str = "application/json";
    pub const ACCEPT_LD_JSON: &str = "application/ld+json";
    pub const ACCEPT_XML: &str = "application/xml";
    pub const ACCEPT_SPARQL_JSON: &str = "application/sparql-results+json";
    pub const CONTENT_TYPE_FORM: &str = "application/x-www-form-urlencoded";
    pub const CONTENT_TYPE_JSON: &str = "application/json";
    pub const CONTENT_TYPE_SPARQL_QUERY: &str = "application/sparql-query";
}

/// A cacheable GET.
///
/// ```
/// use kb_common_http::{headers, GetRequest};
///
/// let req = GetRequest::new("https://libris.kb.se/xsearch")
///     .param("query", "strindberg")
///     .param("format", "json")
///     .accept(headers::ACCEPT_JSON);
/// assert!(req.uses_cache());
/// ```
#[derive(Debug, Clone)]
pub struct GetRequest {
    url: String,
    params: Vec<(String, String)>,
    accept: String,
    use_cache: bool,
    retry: bool,
}

impl GetRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            params: Vec::new(),
            accept: headers::ACCEPT_JSON.to_string(),
            use_cache: true,
            retry: true,
        }
    }

    /// Append a query parameter. Repeated names are kept.
    pub fn param(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.params.push((name.into(), value.to_string()));
        self
    }

    pub fn params<I, K, V>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: ToString,
    {
        self.params
            .extend(params.into_iter().map(|(k, v)| (k.into(), v.to_string())));
        self
    }

    pub fn accept(mut self, accept: impl Into<String>) -> Self {
        self.accept = accept.into();
        self
    }

    /// Bypass the cache for both lookup and store.
    pub fn no_cache(mut self) -> Self {
        self.use_cache = false;
        self
    }

    /// Make exactly one attempt.
    pub fn no_retry(mut self) -> Self {
        self.retry = false;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn query(&self) -> &[(String, String)] {
        &self.params
    }

    pub fn accept_type(&self) -> &str {
        &self.accept
    }

    pub fn uses_cache(&self) -> bool {
        self.use_cache
    }

    pub fn retries(&self) -> bool {
        self.retry
    }

    pub fn cache_key(&self) -> CacheKey {
        CacheKey::derive(&self.url, &self.params, &self.accept)
    }

    /// The target URL with query parameters appended.
    pub fn full_url(&self) -> Result<Url, HttpError> {
        let mut url = parse_url(&self.url)?;
        if !self.params.is_empty() {
            url.query_pairs_mut().extend_pairs(&self.params);
        }
        Ok(url)
    }
}

/// Body of a POST.
#[derive(Debug, Clone, PartialEq)]
pub enum PostBody {
    Empty,
    Form(Vec<(String, String)>),
    Raw(Bytes),
}

impl PostBody {
    /// Wire bytes; form fields are URL-encoded.
    pub fn to_bytes(&self) -> Bytes {
        match self {
            PostBody::Empty => Bytes::new(),
            PostBody::Form(fields) => url::form_urlencoded::Serializer::new(String::new())
                .extend_pairs(fields)
                .finish()
                .into(),
            PostBody::Raw(bytes) => bytes.clone(),
        }
    }
}

/// An uncached POST.
#[derive(Debug, Clone)]
pub struct PostRequest {
    url: String,
    body: PostBody,
    accept: String,
    content_type: String,
    retry: bool,
}

impl PostRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            body: PostBody::Empty,
            accept: headers::ACCEPT_JSON.to_string(),
            content_type: headers::CONTENT_TYPE_FORM.to_string(),
            retry: true,
        }
    }

    /// Send URL-encoded form fields.
    pub fn form<I, K, V>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: ToString,
    {
        self.body = PostBody::Form(
            fields
                .into_iter()
                .map(|(k, v)| (k.into(), v.to_string()))
                .collect(),
        );
        self.content_type = headers::CONTENT_TYPE_FORM.to_string();
        self
    }

    /// Send a raw body; pair with [`PostRequest::content_type`].
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = PostBody::Raw(body.into());
        self
    }

    pub fn accept(mut self, accept: impl Into<String>) -> Self {
        self.accept = accept.into();
        self
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    pub fn no_retry(mut self) -> Self {
        self.retry = false;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn payload(&self) -> &PostBody {
        &self.body
    }

    pub fn accept_type(&self) -> &str {
        &self.accept
    }

    pub fn content_type_value(&self) -> &str {
        &self.content_type
    }

    pub fn retries(&self) -> bool {
        self.retry
    }

    pub fn target(&self) -> Result<Url, HttpError> {
        parse_url(&self.url)
    }
}

fn parse_url(raw: &str) -> Result<Url, HttpError> {
    Url::parse(raw).map_err(|e| HttpError::InvalidRequest {
        message: format!("invalid URL {raw:?}: {e}"),
    })
}
