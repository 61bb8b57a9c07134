use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Response,
    Form,
};
use panel_core::FormOutcome;
use serde::Serialize;
use shared::{error::ValidationErrors, model::{Entity, Params}};

use crate::{
    app_state::AppState,
    context::RequestContext,
    render::{crud_error, merged, page, redirect, required_id, HttpError},
    routes::Resource,
};

#[derive(Debug, Serialize)]
pub(crate) struct ModelData<T> {
    pub(crate) model: T,
}

#[derive(Debug, Serialize)]
pub(crate) struct FormData<D> {
    pub(crate) id: Option<i64>,
    pub(crate) model: D,
    pub(crate) errors: ValidationErrors,
}

fn view_name<E: Resource>(view: &str) -> String {
    format!("{}/{view}", E::PATH)
}

pub(crate) fn view_location<E: Resource>(id: i64) -> String {
    format!("/{}/view?id={id}", E::PATH)
}

pub(crate) async fn index<E: Resource>(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
    Query(raw): Query<Params>,
) -> Result<Response, HttpError> {
    let listing = E::controller(&state).index(&raw).await.map_err(crud_error)?;
    Ok(page(&state, &ctx, StatusCode::OK, view_name::<E>("index"), listing))
}

pub(crate) async fn view<E: Resource>(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
    Query(raw): Query<Params>,
) -> Result<Response, HttpError> {
    let id = required_id(&raw)?;
    let model = E::controller(&state).view(id).await.map_err(crud_error)?;
    Ok(page(
        &state,
        &ctx,
        StatusCode::OK,
        view_name::<E>("view"),
        ModelData { model },
    ))
}

pub(crate) async fn create_form<E: Resource>(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
) -> Result<Response, HttpError> {
    let outcome = E::controller(&state).create(None).await.map_err(crud_error)?;
    Ok(form_response::<E, _, _>(&state, &ctx, "create", None, outcome))
}

pub(crate) async fn create_submit<E: Resource>(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
    Form(payload): Form<Params>,
) -> Result<Response, HttpError> {
    let outcome = E::controller(&state)
        .create(Some(payload))
        .await
        .map_err(crud_error)?;
    Ok(form_response::<E, _, _>(&state, &ctx, "create", None, outcome))
}

pub(crate) async fn update_form<E: Resource>(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
    Query(raw): Query<Params>,
) -> Result<Response, HttpError> {
    let id = required_id(&raw)?;
    let outcome = E::controller(&state).update(id, None).await.map_err(crud_error)?;
    Ok(form_response::<E, _, _>(&state, &ctx, "update", Some(id), outcome))
}

pub(crate) async fn update_submit<E: Resource>(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
    Query(raw): Query<Params>,
    Form(payload): Form<Params>,
) -> Result<Response, HttpError> {
    let id = required_id(&raw)?;
    let outcome = E::controller(&state)
        .update(id, Some(payload))
        .await
        .map_err(crud_error)?;
    Ok(form_response::<E, _, _>(&state, &ctx, "update", Some(id), outcome))
}

pub(crate) async fn delete<E: Resource>(
    State(state): State<Arc<AppState>>,
    Query(raw): Query<Params>,
    form: Option<Form<Params>>,
) -> Result<Response, HttpError> {
    let params = merged(raw, form.map(|Form(form)| form));
    let id = required_id(&params)?;
    E::controller(&state).delete(id).await.map_err(crud_error)?;
    Ok(redirect(format!("/{}/index", E::PATH)))
}

/// Saved records redirect to their page; anything else re-renders the form,
/// with 422 when it carries validation errors.
fn form_response<E, T, D>(
    state: &AppState,
    ctx: &RequestContext,
    view: &str,
    id: Option<i64>,
    outcome: FormOutcome<T, D>,
) -> Response
where
    E: Resource,
    T: Entity,
    D: Serialize,
{
    let (status, data) = match outcome {
        FormOutcome::Saved(record) => return redirect(view_location::<E>(record.id())),
        FormOutcome::Blank(model) => (
            StatusCode::OK,
            FormData {
                id,
                model,
                errors: ValidationErrors::new(),
            },
        ),
        FormOutcome::Invalid { draft, errors } => (
            StatusCode::UNPROCESSABLE_ENTITY,
            FormData {
                id,
                model: draft,
                errors,
            },
        ),
    };
    page(state, ctx, status, view_name::<E>(view), data)
}
