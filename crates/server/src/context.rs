use std::convert::Infallible;

use axum::{
    async_trait,
    extract::{FromRequestParts, Request},
    http::{header, request::Parts, HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use panel_core::SessionId;
use tracing::debug;

pub(crate) const SESSION_COOKIE: &str = "panel_sid";

/// Attaches a session id to every request, issuing a cookie when the client
/// did not send a usable one.
pub(crate) async fn session_layer(mut req: Request, next: Next) -> Response {
    let existing = cookie_value(req.headers(), SESSION_COOKIE).and_then(SessionId::parse);
    let session = existing.unwrap_or_else(SessionId::generate);
    req.extensions_mut().insert(session);

    let mut response = next.run(req).await;
    if existing.is_none() {
        debug!(%session, "issued session cookie");
        let cookie = format!("{SESSION_COOKIE}={session}; Path=/; HttpOnly; SameSite=Lax");
        if let Ok(value) = HeaderValue::from_str(&cookie) {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
    }
    response
}

pub(crate) fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
}

/// Per-request view of who is asking. Handlers receive this instead of
/// reaching for process-wide session state.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RequestContext {
    pub(crate) session: SessionId,
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for RequestContext {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let session = parts
            .extensions
            .get::<SessionId>()
            .copied()
            .unwrap_or_else(SessionId::generate);
        Ok(Self { session })
    }
}
