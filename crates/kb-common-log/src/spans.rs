//! Request tracing utilities.

use tracing::{field, info_span, Span};

/// Span covering one logical gateway call, retries included.
///
/// `status`, `cache` and `error` start empty and are filled in as the call
/// progresses.
pub fn request_span(method: &str, url: &str) -> Span {
    info_span!(
        "kb_request",
        method = %method,
        url = %url,
        status = field::Empty,
        cache = field::Empty,
        error = field::Empty,
    )
}

/// Record a response status on the current span.
pub fn record_status(status: u16) {
    Span::current().record("status", status);
}

/// Record whether the current call was served from cache.
pub fn record_cache(outcome: &'static str) {
    Span::current().record("cache", outcome);
}

/// Record an error on the current span.
pub fn record_error(error: &dyn std::error::Error) {
    Span::current().record("error", field::display(error));
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::EnvFilter;

    fn with_subscriber<F>(f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let subscriber = tracing_subscriber::fmt()
            .with_test_writer()
            .with_env_filter(EnvFilter::new("trace"))
            .finish();

        tracing::subscriber::with_default(subscriber, f);
    }

    #[test]
    fn test_request_span_fields() {
        with_subscriber(|| {
            let span = request_span("GET", "https://libris.kb.se/xsearch");
            let _guard = span.enter();

            record_cache("miss");
            record_status(200);
            tracing::info!("request finished");

            assert!(span.has_field("method"));
            assert!(span.has_field("url"));
            assert!(span.has_field("status"));
        });
    }

    #[test]
    fn test_record_error() {
        with_subscriber(|| {
            let span = request_span("POST", "https://libris.kb.se/api/sparql/");
            let _guard = span.enter();

            let error = std::io::Error::new(std::io::ErrorKind::TimedOut, "timed out");
            record_error(&error);
            tracing::warn!("request failed");
        });
    }

    #[tokio::test]
    async fn test_fields_recorded_inside_instrumented_future() {
        use tracing::Instrument;

        let span = request_span("GET", "https://id.kb.se/vocab");
        let status = async {
            record_cache("miss");
            record_status(404);
            404
        }
        .instrument(span)
        .await;
        assert_eq!(status, 404);
    }
}
