use std::{io::ErrorKind, sync::Arc};

use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use panel_core::files::{Rename, ServedFile};
use shared::{error::ErrorCode, model::Params};
use tokio_util::io::ReaderStream;
use tracing::{debug, error};

use crate::{
    app_state::AppState,
    render::{crud_error, http_error, required_id, HttpError},
};

pub(crate) fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/view", get(view))
        .route("/get", get(download))
        .route("/temp-view", get(temp_view))
}

#[derive(Clone, Copy)]
enum Disposition {
    Inline,
    Attachment,
}

fn optional_int(raw: &Params, key: &str) -> Result<Option<i64>, HttpError> {
    match raw.get(key).map(|v| v.trim()).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(value) => value.parse().map(Some).map_err(|_| {
            http_error(
                StatusCode::BAD_REQUEST,
                ErrorCode::BadRequest,
                format!("\"{value}\" is not a valid {key}"),
            )
        }),
    }
}

async fn view(
    State(state): State<Arc<AppState>>,
    Query(raw): Query<Params>,
) -> Result<Response, HttpError> {
    let id = required_id(&raw)?;
    let served = state
        .files
        .resolve(
            id,
            optional_int(&raw, "object_id")?,
            raw.get("object_name").map(String::as_str),
            Rename::default(),
        )
        .await
        .map_err(crud_error)?;
    stream(served, Disposition::Inline).await
}

async fn download(
    State(state): State<Arc<AppState>>,
    Query(raw): Query<Params>,
) -> Result<Response, HttpError> {
    let id = required_id(&raw)?;
    let rename = Rename {
        ext: raw.get("ext").map(String::as_str),
        content_type: raw
            .get("content_type")
            .map(String::as_str)
            .filter(|ct| HeaderValue::from_str(ct).is_ok()),
    };
    let served = state
        .files
        .resolve(
            id,
            optional_int(&raw, "object_id")?,
            raw.get("object_name").map(String::as_str),
            rename,
        )
        .await
        .map_err(crud_error)?;
    stream(served, Disposition::Attachment).await
}

/// Signed link into the temp directory. Any doubt about the link is a bare
/// 403 so nothing is learned about what exists there.
async fn temp_view(State(state): State<Arc<AppState>>, Query(raw): Query<Params>) -> Response {
    let name = raw.get("temp_file").map(String::as_str).unwrap_or_default();
    let key = raw.get("key").map(String::as_str).unwrap_or_default();
    let Some(served) = state.files.resolve_temp(name, key) else {
        debug!(temp_file = name, "temp link refused");
        return StatusCode::FORBIDDEN.into_response();
    };
    match stream(served, Disposition::Inline).await {
        Ok(response) => response,
        Err((status, _)) => status.into_response(),
    }
}

async fn stream(served: ServedFile, disposition: Disposition) -> Result<Response, HttpError> {
    let file = match tokio::fs::File::open(&served.path).await {
        Ok(file) => file,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            return Err(http_error(
                StatusCode::NOT_FOUND,
                ErrorCode::NotFound,
                "file content is missing",
            ));
        }
        Err(err) => {
            error!(path = %served.path.display(), error = %err, "failed to open file");
            return Err(http_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorCode::Internal,
                "internal error",
            ));
        }
    };

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&served.mime_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );
    let kind = match disposition {
        Disposition::Inline => "inline",
        Disposition::Attachment => "attachment",
    };
    let filename = served.filename.replace('"', "");
    if let Ok(value) = HeaderValue::from_str(&format!("{kind}; filename=\"{filename}\"")) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }

    let body = Body::from_stream(ReaderStream::new(file));
    Ok((StatusCode::OK, headers, body).into_response())
}
