//! Per-request logging keyed by the `x-request-id` header.

use axum::{extract::Request, http::StatusCode, middleware::Next, response::Response};
use std::time::{Duration, Instant};
use tower_http::request_id::{
    MakeRequestUuid, PropagateRequestIdLayer, RequestId, SetRequestIdLayer,
};
use tracing::Instrument;

fn request_id_of(request: &Request) -> String {
    request
        .extensions()
        .get::<RequestId>()
        .and_then(|id| id.header_value().to_str().ok())
        .unwrap_or("unknown")
        .to_string()
}

fn log_completion(status: StatusCode, elapsed: Duration) {
    let duration_ms = elapsed.as_millis() as u64;
    if status.is_server_error() {
        tracing::error!(status = status.as_u16(), duration_ms, "request failed");
    } else if status.is_client_error() {
        tracing::warn!(status = status.as_u16(), duration_ms, "request rejected");
    } else {
        tracing::info!(status = status.as_u16(), duration_ms, "request completed");
    }
}

/// Wraps the rest of the stack in a `request` span, so handler logs carry
/// the request id, method and path.
pub async fn log_request(request: Request, next: Next) -> Response {
    let span = tracing::info_span!(
        "request",
        request_id = %request_id_of(&request),
        method = %request.method(),
        path = %request.uri().path(),
    );

    async move {
        let start = Instant::now();
        tracing::debug!("incoming request");
        let response = next.run(request).await;
        log_completion(response.status(), start.elapsed());
        response
    }
    .instrument(span)
    .await
}

pub fn request_id_layer() -> SetRequestIdLayer<MakeRequestUuid> {
    SetRequestIdLayer::x_request_id(MakeRequestUuid)
}

pub fn propagate_request_id_layer() -> PropagateRequestIdLayer {
    PropagateRequestIdLayer::x_request_id()
}
