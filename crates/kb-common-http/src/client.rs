//! HTTP transport configuration and error classification.

use crate::response::{HttpResponse, ResponseError};
use kb_common_config::HttpSettings;
use reqwest::{redirect, Client, ClientBuilder, StatusCode};
use std::time::Duration;

/// Redirect hops followed before giving up.
const MAX_REDIRECTS: usize = 10;

/// HTTP client configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpConfig {
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Request timeout.
    pub request_timeout: Duration,
    /// User agent string.
    pub user_agent: String,
    /// Idle keep-alive connections kept per host.
    pub pool_max_idle_per_host: usize,
    /// How long an idle pooled connection is kept.
    pub pool_idle_timeout: Duration,
    /// Enable gzip decompression.
    pub gzip: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self::from(&HttpSettings::default())
    }
}

impl From<&HttpSettings> for HttpConfig {
    fn from(settings: &HttpSettings) -> Self {
        Self {
            connect_timeout: settings.connect_timeout(),
            request_timeout: settings.timeout(),
            user_agent: settings.user_agent.clone(),
            pool_max_idle_per_host: settings.pool_max_idle_per_host,
            pool_idle_timeout: settings.pool_idle_timeout(),
            gzip: true,
        }
    }
}

/// Build a configured HTTP client.
pub fn build_client(config: &HttpConfig) -> Result<Client, HttpError> {
    let mut builder = ClientBuilder::new()
        .connect_timeout(config.connect_timeout)
        .timeout(config.request_timeout)
        .user_agent(&config.user_agent)
        .pool_max_idle_per_host(config.pool_max_idle_per_host)
        .pool_idle_timeout(config.pool_idle_timeout)
        .redirect(redirect::Policy::limited(MAX_REDIRECTS));

    if config.gzip {
        builder = builder.gzip(true);
    }

    builder.build().map_err(HttpError::ClientBuild)
}

/// Coarse failure category, for callers that translate errors into messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    RateLimited,
    ServerError,
    ClientError,
    Timeout,
    Connect,
    Transport,
    InvalidRequest,
    InvalidResponse,
    ClientBuild,
}

/// HTTP errors.
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),

    #[error("invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("connection failed: {0}")]
    Connect(#[source] reqwest::Error),

    #[error("request timed out")]
    Timeout,

    #[error("request failed: {0}")]
    Request(#[source] reqwest::Error),

    #[error("rate limited (retry after {retry_after:?})")]
    RateLimited {
        retry_after: Option<Duration>,
        body: String,
    },

    #[error("server error: {status}")]
    ServerError { status: u16, body: String },

    /// Any other non-2xx status that reached the caller: 4xx, plus a 3xx
    /// the redirect policy did not follow (such as 304) or a stray 1xx.
    #[error("client error: {status}")]
    ClientError { status: u16, body: String },

    #[error(transparent)]
    InvalidResponse(#[from] ResponseError),
}

impl From<reqwest::Error> for HttpError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            HttpError::Timeout
        } else if e.is_connect() {
            HttpError::Connect(e)
        } else if e.is_builder() {
            HttpError::InvalidRequest {
                message: e.to_string(),
            }
        } else {
            HttpError::Request(e)
        }
    }
}

impl HttpError {
    /// Upstream status code, for status errors.
    pub fn status(&self) -> Option<u16> {
        match self {
            HttpError::RateLimited { .. } => Some(StatusCode::TOO_MANY_REQUESTS.as_u16()),
            HttpError::ServerError { status, .. } | HttpError::ClientError { status, .. } => {
                Some(*status)
            }
            HttpError::InvalidResponse(ResponseError::Parse { status, .. }) => Some(*status),
            _ => None,
        }
    }

    /// Upstream response body, for status errors.
    pub fn body(&self) -> Option<&str> {
        match self {
            HttpError::RateLimited { body, .. }
            | HttpError::ServerError { body, .. }
            | HttpError::ClientError { body, .. } => Some(body),
            _ => None,
        }
    }

    /// Transient failures worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            HttpError::RateLimited { .. } | HttpError::Timeout | HttpError::Connect(_) => true,
            HttpError::ServerError { status, .. } => matches!(status, 500 | 502 | 503 | 504),
            _ => false,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            HttpError::ClientBuild(_) => ErrorKind::ClientBuild,
            HttpError::InvalidRequest { .. } => ErrorKind::InvalidRequest,
            HttpError::Connect(_) => ErrorKind::Connect,
            HttpError::Timeout => ErrorKind::Timeout,
            HttpError::Request(_) => ErrorKind::Transport,
            HttpError::RateLimited { .. } => ErrorKind::RateLimited,
            HttpError::ServerError { .. } => ErrorKind::ServerError,
            HttpError::ClientError { .. } => ErrorKind::ClientError,
            HttpError::InvalidResponse(_) => ErrorKind::InvalidResponse,
        }
    }
}

/// Read a response fully, converting non-2xx statuses into errors.
///
/// 429 is `RateLimited`, 5xx is `ServerError`, and every other non-2xx status
/// is a non-retryable `ClientError`.
pub async fn check_response(response: reqwest::Response) -> Result<HttpResponse, HttpError> {
    let status = response.status();
    let url = response.url().to_string();
    let headers = response.headers().clone();

    let body = response.bytes().await.map_err(|e| {
        if e.is_timeout() {
            HttpError::Timeout
        } else {
            HttpError::InvalidResponse(ResponseError::Read(e))
        }
    })?;

    if status.is_success() {
        return Ok(HttpResponse::new(url, status.as_u16(), headers, body));
    }

    let body = String::from_utf8_lossy(&body).into_owned();

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = headers
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs);

        return Err(HttpError::RateLimited { retry_after, body });
    }

    if status.is_server_error() {
        Err(HttpError::ServerError {
            status: status.as_u16(),
            body,
        })
    } else {
        Err(HttpError::ClientError {
            status: status.as_u16(),
            body,
        })
    }
}
