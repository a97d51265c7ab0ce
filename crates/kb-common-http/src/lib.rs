//! HTTP access layer for the KB gateway.
//!
//! [`GatewayClient`] is the single way the tool layer reaches the upstream
//! APIs: GET responses are cached in a bounded TTL cache, transient
//! failures are retried with exponential backoff, and one pooled transport
//! is shared by all calls.

pub mod client;
pub mod endpoints;
pub mod gateway;
pub mod request;
pub mod response;
pub mod retry;

pub use client::{build_client, check_response, ErrorKind, HttpConfig, HttpError};
pub use endpoints::Endpoint;
pub use gateway::GatewayClient;
pub use request::{headers, GetRequest, PostBody, PostRequest};
pub use response::{HttpResponse, ResponseError};
pub use retry::{execute_with_retry, Attempt, RetryAttempt, RetryPolicy, Retryable};
