use axum::{
    extract::Request,
    http::{header, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use panel_core::domain::is_post_only;
use shared::error::ErrorCode;
use tracing::debug;

use crate::render::http_error;

/// Rejects non-POST requests to state-changing domain routes with 405.
pub(crate) async fn verb_filter(req: Request, next: Next) -> Response {
    let route = req.uri().path().rsplit('/').next().unwrap_or_default();
    if req.method() != Method::POST && is_post_only(route) {
        debug!(route, method = %req.method(), "method not allowed");
        let mut response = http_error(
            StatusCode::METHOD_NOT_ALLOWED,
            ErrorCode::MethodNotAllowed,
            format!("{route} only accepts POST"),
        )
        .into_response();
        response
            .headers_mut()
            .insert(header::ALLOW, HeaderValue::from_static("POST"));
        return response;
    }
    next.run(req).await
}
