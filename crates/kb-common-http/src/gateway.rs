//! Cached, retrying access to the upstream APIs.

use crate::client::{build_client, check_response, HttpConfig, HttpError};
use crate::request::{GetRequest, PostRequest};
use crate::response::HttpResponse;
use crate::retry::RetryPolicy;
use kb_cache::{CacheStats, ResponseCache};
use kb_common_config::{ConfigError, ConfigLoader, GatewayConfig};
use kb_common_log::spans::{record_cache, record_error, record_status, request_span};
use parking_lot::Mutex;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::Client;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, Instrument};
use url::Url;

/// Shared entry point for all outbound calls.
///
/// GETs consult the response cache before touching the network; POSTs are
/// never cached. The pooled transport is created on first use and released
/// by [`GatewayClient::close`]; a call after `close` builds a fresh one.
pub struct GatewayClient {
    config: GatewayConfig,
    http: HttpConfig,
    policy: RetryPolicy,
    cache: Arc<ResponseCache<HttpResponse>>,
    transport: Mutex<Option<Client>>,
}

impl GatewayClient {
    /// Client with default settings.
    pub fn new() -> Self {
        Self::from_config(GatewayConfig::default())
    }

    /// Client configured the way [`ConfigLoader::load`] resolves settings:
    /// `.env` files, the optional YAML file, then `KB_*` variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self::from_config(ConfigLoader::from_env().load()?))
    }

    pub fn from_config(config: GatewayConfig) -> Self {
        let cache = Arc::new(ResponseCache::with_enabled(
            config.cache.ttl(),
            config.cache.max_size,
            config.cache.enabled,
        ));
        Self::with_cache(config, cache)
    }

    /// Client storing responses in an existing cache.
    pub fn with_cache(config: GatewayConfig, cache: Arc<ResponseCache<HttpResponse>>) -> Self {
        Self {
            http: HttpConfig::from(&config.http),
            policy: RetryPolicy::from(&config.retry),
            config,
            cache,
            transport: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn cache(&self) -> &Arc<ResponseCache<HttpResponse>> {
        &self.cache
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
        debug!("Response cache cleared");
    }

    /// Whether a pooled transport currently exists.
    pub fn is_open(&self) -> bool {
        self.transport.lock().is_some()
    }

    /// Release the pooled transport. Safe to call repeatedly.
    pub fn close(&self) {
        if self.transport.lock().take().is_some() {
            debug!("HTTP transport closed");
        }
    }

    /// Fetch a resource, serving it from cache when possible.
    pub async fn get(&self, request: GetRequest) -> Result<HttpResponse, HttpError> {
        let span = request_span("GET", request.url());
        self.fetch(&request).instrument(span).await
    }

    /// Send a POST. Responses are never cached.
    pub async fn post(&self, request: PostRequest) -> Result<HttpResponse, HttpError> {
        let span = request_span("POST", request.url());
        self.submit(&request).instrument(span).await
    }

    async fn fetch(&self, request: &GetRequest) -> Result<HttpResponse, HttpError> {
        let key = request.uses_cache().then(|| request.cache_key());

        if let Some(key) = &key {
            if let Some(cached) = self.cache.get(key) {
                record_cache("hit");
                debug!(key = %key, "Cache hit");
                return Ok(cached);
            }
            record_cache("miss");
        }

        let url = request.full_url()?;
        let response = self
            .dispatch(request.retries(), || self.send_get(&url, request.accept_type()))
            .await?;

        if let Some(key) = key {
            self.cache.set(key, response.clone());
        }
        Ok(response)
    }

    async fn submit(&self, request: &PostRequest) -> Result<HttpResponse, HttpError> {
        let url = request.target()?;
        let body = request.payload().to_bytes();
        self.dispatch(request.retries(), || {
            self.send_post(
                &url,
                body.clone(),
                request.accept_type(),
                request.content_type_value(),
            )
        })
        .await
    }

    async fn dispatch<F, Fut>(&self, retry: bool, mut send: F) -> Result<HttpResponse, HttpError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<HttpResponse, HttpError>>,
    {
        let result = if retry {
            self.policy.execute(send).await
        } else {
            send().await
        };

        match &result {
            Ok(response) => record_status(response.status()),
            Err(e) => {
                if let Some(status) = e.status() {
                    record_status(status);
                }
                record_error(e);
            }
        }
        result
    }

    async fn send_get(&self, url: &Url, accept: &str) -> Result<HttpResponse, HttpError> {
        let client = self.transport()?;
        debug!(%url, "Sending GET");
        let response = client
            .get(url.clone())
            .header(ACCEPT, accept)
            .send()
            .await?;
        let response = check_response(response).await?;
        debug!(%url, status = response.status(), bytes = response.bytes().len(), "GET response");
        Ok(response)
    }

    async fn send_post(
        &self,
        url: &Url,
        body: bytes::Bytes,
        accept: &str,
        content_type: &str,
    ) -> Result<HttpResponse, HttpError> {
        let client = self.transport()?;
        debug!(%url, "Sending POST");
        let response = client
            .post(url.clone())
            .header(ACCEPT, accept)
            .header(CONTENT_TYPE, content_type)
            .body(body)
            .send()
            .await?;
        let response = check_response(response).await?;
        debug!(%url, status = response.status(), "POST response");
        Ok(response)
    }

    fn transport(&self) -> Result<Client, HttpError> {
        let mut transport = self.transport.lock();
        if let Some(client) = transport.as_ref() {
            return Ok(client.clone());
        }
        let client = build_client(&self.http)?;
        debug!(user_agent = %self.http.user_agent, "HTTP transport created");
        *transport = Some(client.clone());
        Ok(client)
    }
}

impl Default for GatewayClient {
    fn default() -> Self {
        Self::new()
    }
}
