use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode, Uri},
    response::Response,
    Form,
};
use serde::Deserialize;
use shared::error::ErrorCode;
use tracing::{error, info};

use crate::{
    app_state::AppState,
    context::RequestContext,
    render::{http_error, redirect, HttpError},
};

#[derive(Debug, Deserialize)]
pub(crate) struct ThemeForm {
    theme: String,
}

pub(crate) async fn home() -> Response {
    redirect("/domain/index".to_string())
}

pub(crate) async fn healthz(State(state): State<Arc<AppState>>) -> Result<&'static str, HttpError> {
    state.storage.health_check().await.map_err(|err| {
        error!(error = %err, "health check failed");
        http_error(
            StatusCode::SERVICE_UNAVAILABLE,
            ErrorCode::Internal,
            "storage unavailable",
        )
    })?;
    Ok("ok")
}

/// Stores the theme for this session and goes back where the form was.
pub(crate) async fn set_theme(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
    headers: HeaderMap,
    Form(form): Form<ThemeForm>,
) -> Result<Response, HttpError> {
    let theme = form.theme.trim();
    if !state.themes.contains(theme) {
        return Err(http_error(
            StatusCode::BAD_REQUEST,
            ErrorCode::BadRequest,
            format!("unknown theme \"{theme}\""),
        ));
    }
    state.sessions.set_theme(ctx.session, theme);
    info!(session = %ctx.session, theme, "theme changed");

    let back = same_site_referer(&headers).unwrap_or_else(|| "/".to_string());
    Ok(redirect(back))
}

/// Path and query of the Referer when it points back at this host.
fn same_site_referer(headers: &HeaderMap) -> Option<String> {
    let referer: Uri = headers.get(header::REFERER)?.to_str().ok()?.parse().ok()?;
    if let Some(authority) = referer.authority() {
        let host = headers.get(header::HOST)?.to_str().ok()?;
        if !authority.as_str().eq_ignore_ascii_case(host) {
            return None;
        }
    }
    let target = referer.path_and_query()?.as_str();
    (target.starts_with('/') && !target.starts_with("//")).then(|| target.to_string())
}
