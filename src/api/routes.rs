//! Channel routes
//!
//! Each method-channel call is a `POST /channel/:method` whose JSON body is
//! the argument payload. Successful calls reply `{"result": ...}`; failures
//! reply with an `ErrorResponse` carrying the transport error code.

use axum::{
    body::Bytes,
    extract::{Path, State},
    response::{IntoResponse, Response},
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Serialize;
use serde_json::{json, Value};

use crate::api::trace::TraceId;
use crate::bridge::{ExtensionBridge, MethodCall};
use crate::core::error::BridgeError;
use crate::extension::types::MediaKind;

#[derive(Debug, Serialize)]
pub struct ChannelReply {
    pub result: Value,
}

pub fn build_routes(bridge: ExtensionBridge) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/channel/:method", post(call_method))
        .with_state(bridge)
}

/// An empty body is a call without arguments
fn parse_arguments(body: &[u8]) -> Result<Value, BridgeError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    serde_json::from_slice(body)
        .map_err(|e| BridgeError::InvalidArguments(format!("Arguments are not valid JSON: {}", e)))
}

async fn call_method(
    State(bridge): State<ExtensionBridge>,
    Path(method): Path<String>,
    trace_id: Option<Extension<TraceId>>,
    body: Bytes,
) -> Response {
    let trace_id = trace_id.map(|Extension(id)| id.0);

    let arguments = match parse_arguments(&body) {
        Ok(arguments) => arguments,
        Err(e) => return e.into_traced_response(trace_id),
    };

    match bridge.handle(MethodCall::new(method, arguments)).await {
        Ok(result) => Json(ChannelReply { result }).into_response(),
        Err(e) => e.into_traced_response(trace_id),
    }
}

async fn health_check(State(bridge): State<ExtensionBridge>) -> Json<Value> {
    let catalog = bridge.catalog();
    let anime = catalog.manager(MediaKind::Anime).installed().await.len();
    let manga = catalog.manager(MediaKind::Manga).installed().await.len();

    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "installed": { "anime": anime, "manga": manga },
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::trace::{trace_id_middleware, TRACE_ID_HEADER};
    use crate::test_support::test_bridge;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
        middleware,
    };
    use tower::util::ServiceExt;

    async fn post_call(app: Router, method: &str, body: &str) -> (StatusCode, Value, Option<String>) {
        let request = Request::builder()
            .method("POST")
            .uri(format!("/channel/{}", method))
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        let status = response.status();
        let trace_id = response
            .headers()
            .get(TRACE_ID_HEADER)
            .map(|v| v.to_str().unwrap().to_string());
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap(), trace_id)
    }

    #[tokio::test]
    async fn test_call_replies_with_result() {
        let (bridge, _, _icons) = test_bridge().await;
        let (status, body, _) = post_call(
            build_routes(bridge),
            "getPopular",
            r#"{"sourceId": "eu.kanade.manga", "isAnime": false, "page": 1}"#,
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["result"]["list"][0]["title"], "Manga 1");
        assert_eq!(body["result"]["hasNextPage"], true);
    }

    #[tokio::test]
    async fn test_error_carries_code_and_request_trace_id() {
        let (bridge, _, _icons) = test_bridge().await;
        let app = build_routes(bridge).layer(middleware::from_fn(trace_id_middleware));

        let (status, body, trace_id) = post_call(app, "unknownMethod", "").await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "NOT_IMPLEMENTED");
        assert_eq!(body["trace_id"].as_str(), trace_id.as_deref());
    }

    #[tokio::test]
    async fn test_malformed_body_is_invalid_arguments() {
        let (bridge, _, _icons) = test_bridge().await;
        let (status, body, _) = post_call(build_routes(bridge), "getPopular", "{not json").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "INVALID_ARGS");
    }

    #[tokio::test]
    async fn test_health_reports_installed_counts() {
        let (bridge, _, _icons) = test_bridge().await;
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let response = build_routes(bridge).oneshot(request).await.unwrap();

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["installed"], json!({ "anime": 1, "manga": 1 }));
    }
}
