use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use panel_core::CrudError;
use serde::Serialize;
use shared::{
    error::{ApiError, ErrorCode},
    model::Params,
    protocol::Notification,
};

use crate::{app_state::AppState, context::RequestContext};

pub(crate) type HttpError = (StatusCode, Json<ApiError>);

/// Everything a template needs for one page, rendered as JSON.
#[derive(Debug, Serialize)]
pub(crate) struct Page<T> {
    pub(crate) view: String,
    pub(crate) theme: String,
    pub(crate) language: String,
    pub(crate) flashes: Vec<Notification>,
    pub(crate) data: T,
}

/// Renders a page and drains the session's pending flashes into it.
pub(crate) fn page<T: Serialize>(
    state: &AppState,
    ctx: &RequestContext,
    status: StatusCode,
    view: String,
    data: T,
) -> Response {
    let page = Page {
        view,
        theme: state.theme_for(ctx.session),
        language: state.translator.language().to_string(),
        flashes: state.sessions.take_flashes(ctx.session),
        data,
    };
    (status, Json(page)).into_response()
}

pub(crate) fn redirect(location: String) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
}

pub(crate) fn http_error(status: StatusCode, code: ErrorCode, message: impl Into<String>) -> HttpError {
    (status, Json(ApiError::new(code, message)))
}

pub(crate) fn crud_error(err: CrudError) -> HttpError {
    let status = match &err {
        CrudError::NotFound { .. } => StatusCode::NOT_FOUND,
        CrudError::MissingParam(_) => StatusCode::BAD_REQUEST,
        CrudError::Invalid(_) => StatusCode::UNPROCESSABLE_ENTITY,
        CrudError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(err.to_api_error()))
}

/// Reads the mandatory `id` query or form parameter.
pub(crate) fn required_id(params: &Params) -> Result<i64, HttpError> {
    let raw = params
        .get("id")
        .map(|id| id.trim())
        .filter(|id| !id.is_empty())
        .ok_or_else(|| crud_error(CrudError::MissingParam("id")))?;
    raw.parse().map_err(|_| {
        http_error(
            StatusCode::BAD_REQUEST,
            ErrorCode::BadRequest,
            format!("\"{raw}\" is not a valid id"),
        )
    })
}

/// Query string and form body seen as one parameter set; the body wins.
pub(crate) fn merged(query: Params, form: Option<Params>) -> Params {
    let mut params = query;
    if let Some(form) = form {
        params.extend(form);
    }
    params
}
