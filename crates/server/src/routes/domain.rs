use std::{collections::BTreeMap, sync::Arc};

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    response::Response,
    routing::{get, post},
    Form, Json, Router,
};
use chrono::Utc;
use panel_core::domain::{
    self as domain_ops, find_action, parse_ids, perform_action, vnc_info, vnc_window_end,
};
use serde::Serialize;
use shared::{
    domain::Domain,
    error::ErrorCode,
    model::Params,
    protocol::{NoteUpdated, RequestState, VncInfo},
};

use crate::{
    app_state::AppState,
    context::RequestContext,
    render::{crud_error, http_error, merged, page, redirect, required_id, HttpError},
    routes::{crud::view_location, crud_routes, DomainPages},
    verbs::verb_filter,
};

#[derive(Debug, Serialize)]
struct DomainView {
    model: Domain,
    vnc: VncInfo,
}

pub(crate) fn routes() -> Router<Arc<AppState>> {
    crud_routes::<DomainPages>()
        .route("/view", get(view))
        .route("/enable-vnc", get(enable_vnc).post(enable_vnc))
        .route("/set-note", post(set_note))
        .route("/requests-state", get(requests_state))
        .route("/:action", get(action).post(action))
        .layer(middleware::from_fn(verb_filter))
}

fn render_view(state: &AppState, ctx: &RequestContext, model: Domain, vnc: VncInfo) -> Response {
    page(
        state,
        ctx,
        StatusCode::OK,
        "domain/view".to_string(),
        DomainView { model, vnc },
    )
}

async fn view(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
    Query(raw): Query<Params>,
) -> Result<Response, HttpError> {
    let id = required_id(&raw)?;
    let domain = state.domains.view(id).await.map_err(crud_error)?;
    let vnc = vnc_info(state.backend.as_ref(), &domain, Utc::now()).await;
    Ok(render_view(&state, &ctx, domain, vnc))
}

/// Any row of the action table. The outcome is flashed and the client is
/// sent back to the domain page.
async fn action(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
    Path(route): Path<String>,
    Query(query): Query<Params>,
    form: Option<Form<Params>>,
) -> Result<Response, HttpError> {
    let Some(action) = find_action(&route) else {
        return Err(http_error(
            StatusCode::NOT_FOUND,
            ErrorCode::NotFound,
            format!("unknown domain action \"{route}\""),
        ));
    };
    let params = merged(query, form.map(|Form(form)| form));
    let id = required_id(&params)?;

    let dispatched = perform_action(
        state.domains.repo(),
        state.backend.as_ref(),
        &state.translator,
        action,
        id,
        &params,
    )
    .await
    .map_err(crud_error)?;

    state.sessions.add_flash(ctx.session, dispatched.notification);
    Ok(redirect(view_location::<DomainPages>(id)))
}

async fn enable_vnc(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
    Query(raw): Query<Params>,
) -> Result<Response, HttpError> {
    let id = required_id(&raw)?;
    let now = Utc::now();
    let (domain, opened) = domain_ops::enable_vnc(
        state.domains.repo(),
        state.backend.as_ref(),
        &state.translator,
        id,
        now,
    )
    .await
    .map_err(crud_error)?;

    let vnc = match opened {
        Ok(vnc) => vnc,
        Err(notification) => {
            state.sessions.add_flash(ctx.session, notification);
            VncInfo {
                end_time: vnc_window_end(&domain),
                ..VncInfo::default()
            }
        }
    };
    Ok(render_view(&state, &ctx, domain, vnc))
}

async fn set_note(
    State(state): State<Arc<AppState>>,
    Query(query): Query<Params>,
    Form(form): Form<Params>,
) -> Result<Json<NoteUpdated>, HttpError> {
    let params = merged(query, Some(form));
    let id = required_id(&params)?;
    let note = params.get("note").map(String::as_str).unwrap_or_default();
    let updated = domain_ops::set_note(state.domains.repo(), id, note)
        .await
        .map_err(crud_error)?;
    Ok(Json(updated))
}

async fn requests_state(
    State(state): State<Arc<AppState>>,
    Query(raw): Query<Params>,
) -> Result<Json<BTreeMap<i64, RequestState>>, HttpError> {
    let ids = raw.get("ids").map(|ids| parse_ids(ids)).unwrap_or_default();
    let states = domain_ops::requests_state(state.domains.repo(), &ids)
        .await
        .map_err(crud_error)?;
    Ok(Json(states))
}
