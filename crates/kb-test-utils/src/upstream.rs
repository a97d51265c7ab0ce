//! Mock upstream API built on wiremock.

use serde::Serialize;
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

/// Mock upstream server with shortcuts for the shapes gateway tests need.
pub struct TestHttpServer {
    server: MockServer,
}

impl TestHttpServer {
    /// Start a new mock server
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Get URL for a specific path
    pub fn url_for(&self, path: &str) -> String {
        format!("{}{}", self.server.uri(), path)
    }

    /// Access the underlying MockServer
    pub fn inner(&self) -> &MockServer {
        &self.server
    }

    /// Register a GET endpoint that returns JSON
    pub async fn get_json<T: Serialize>(&self, endpoint: &str, response: &T) {
        Mock::given(method("GET"))
            .and(path(endpoint))
            .respond_with(ResponseTemplate::new(200).set_body_json(response))
            .mount(&self.server)
            .await;
    }

    /// Register a GET endpoint that only answers when `params` are present.
    pub async fn get_json_with_query<T: Serialize>(
        &self,
        endpoint: &str,
        params: &[(&str, &str)],
        response: &T,
    ) {
        let mut mock = Mock::given(method("GET")).and(path(endpoint));
        for (name, value) in params {
            mock = mock.and(query_param(*name, *value));
        }
        mock.respond_with(ResponseTemplate::new(200).set_body_json(response))
            .mount(&self.server)
            .await;
    }

    /// Register a GET endpoint that returns a raw body with a content type.
    pub async fn get_raw(&self, endpoint: &str, body: &str, content_type: &str) {
        Mock::given(method("GET"))
            .and(path(endpoint))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, content_type))
            .mount(&self.server)
            .await;
    }

    /// Register an endpoint that always returns an error
    pub async fn error(&self, endpoint: &str, status: u16, message: &str) {
        Mock::given(path(endpoint))
            .respond_with(
                ResponseTemplate::new(status)
                    .set_body_json(serde_json::json!({ "error": message })),
            )
            .mount(&self.server)
            .await;
    }

    /// Register an endpoint with simulated latency
    pub async fn with_latency<T: Serialize>(
        &self,
        endpoint: &str,
        response: &T,
        latency: Duration,
    ) {
        Mock::given(path(endpoint))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(response)
                    .set_delay(latency),
            )
            .mount(&self.server)
            .await;
    }

    /// Register responses served once each, in order.
    ///
    /// Requests past the end of the sequence fall through to any other mock
    /// on the same path, or 404.
    pub async fn sequence(&self, endpoint: &str, responses: Vec<ResponseTemplate>) {
        for (i, response) in responses.into_iter().enumerate() {
            // wiremock tries lower priority numbers first.
            let priority = u8::try_from(i + 1).unwrap_or(u8::MAX);
            Mock::given(path(endpoint))
                .respond_with(response)
                .up_to_n_times(1)
                .with_priority(priority)
                .mount(&self.server)
                .await;
        }
    }

    /// Number of requests received on `endpoint`.
    pub async fn hits(&self, endpoint: &str) -> usize {
        self.received_requests()
            .await
            .iter()
            .filter(|r| r.url.path() == endpoint)
            .count()
    }

    /// Verify that a request was received
    pub async fn verify_received(&self, endpoint: &str, times: usize) {
        let count = self.hits(endpoint).await;
        assert_eq!(
            count, times,
            "Expected {} requests to {}, got {}",
            times, endpoint, count
        );
    }

    /// Get all received requests
    pub async fn received_requests(&self) -> Vec<Request> {
        self.server.received_requests().await.unwrap_or_default()
    }
}

/// Common response templates
pub mod responses {
    use super::*;

    pub fn ok_json<T: Serialize>(body: &T) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(body)
    }

    pub fn rate_limited(retry_after: u32) -> ResponseTemplate {
        ResponseTemplate::new(429)
            .insert_header("Retry-After", retry_after.to_string())
            .set_body_json(serde_json::json!({ "error": "Rate limited" }))
    }

    pub fn server_error() -> ResponseTemplate {
        ResponseTemplate::new(500)
            .set_body_json(serde_json::json!({ "error": "Internal server error" }))
    }

    pub fn unavailable() -> ResponseTemplate {
        ResponseTemplate::new(503).set_body_string("Service Unavailable")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sequence_is_served_in_order() {
        let server = TestHttpServer::start().await;
        server
            .sequence(
                "/flaky",
                vec![responses::unavailable(), responses::ok_json(&"done")],
            )
            .await;

        let first = reqwest::get(server.url_for("/flaky")).await.unwrap();
        assert_eq!(first.status().as_u16(), 503);

        let second = reqwest::get(server.url_for("/flaky")).await.unwrap();
        assert_eq!(second.status().as_u16(), 200);

        let third = reqwest::get(server.url_for("/flaky")).await.unwrap();
        assert_eq!(third.status().as_u16(), 404);

        server.verify_received("/flaky", 3).await;
    }

    #[tokio::test]
    async fn test_query_matching() {
        let server = TestHttpServer::start().await;
        server
            .get_json_with_query("/xsearch", &[("query", "strindberg")], &serde_json::json!({"n": 1}))
            .await;

        let url = format!("{}?query=strindberg&format=json", server.url_for("/xsearch"));
        let matched = reqwest::get(url).await.unwrap();
        assert_eq!(matched.status().as_u16(), 200);

        let unmatched = reqwest::get(server.url_for("/xsearch")).await.unwrap();
        assert_eq!(unmatched.status().as_u16(), 404);
    }
}
