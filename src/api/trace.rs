use axum::{extract::Request, http::HeaderValue, middleware::Next, response::Response};
use tracing::{info_span, Instrument};
use uuid::Uuid;

/// HTTP header carrying the per-request trace ID
pub const TRACE_ID_HEADER: &str = "X-Trace-Id";

/// Trace ID stored in the request extensions
#[derive(Clone, Debug)]
pub struct TraceId(pub String);

impl TraceId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Tag every request with a fresh UUID v4 trace ID.
///
/// The ID is recorded on the request span, inserted into the request
/// extensions for handlers and echoed in the response headers.
pub async fn trace_id_middleware(mut request: Request, next: Next) -> Response {
    let trace_id = Uuid::new_v4().to_string();

    let span = info_span!(
        "channel_request",
        trace_id = %trace_id,
        method = %request.method(),
        uri = %request.uri(),
    );
    tracing::debug!(parent: &span, "Request started");

    request.extensions_mut().insert(TraceId(trace_id.clone()));

    let mut response = async move {
        let response = next.run(request).await;
        tracing::debug!(status = %response.status(), "Request completed");
        response
    }
    .instrument(span)
    .await;

    response.headers_mut().insert(
        TRACE_ID_HEADER,
        HeaderValue::from_str(&trace_id).unwrap_or_else(|_| HeaderValue::from_static("invalid")),
    );
    response
}
