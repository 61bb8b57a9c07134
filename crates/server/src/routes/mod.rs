use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use panel_core::{
    criteria::{ArticleSearch, DomainSearch, ThreadSearch},
    search::Criteria,
    CrudController,
};
use storage::{Articles, Domains, Repository, Threads};

use crate::app_state::AppState;

pub(crate) mod crud;
pub(crate) mod domain;
pub(crate) mod files;
pub(crate) mod site;

/// An entity served under `/{PATH}/*` by the generic CRUD handlers.
pub(crate) trait Resource: Send + Sync + 'static {
    type Repo: Repository;
    type Criteria: Criteria;

    const PATH: &'static str;

    fn controller(state: &AppState) -> &CrudController<Self::Repo, Self::Criteria>;
}

pub(crate) struct DomainPages;
pub(crate) struct ThreadPages;
pub(crate) struct ArticlePages;

impl Resource for DomainPages {
    type Repo = Domains;
    type Criteria = DomainSearch;
    const PATH: &'static str = "domain";

    fn controller(state: &AppState) -> &CrudController<Domains, DomainSearch> {
        &state.domains
    }
}

impl Resource for ThreadPages {
    type Repo = Threads;
    type Criteria = ThreadSearch;
    const PATH: &'static str = "thread";

    fn controller(state: &AppState) -> &CrudController<Threads, ThreadSearch> {
        &state.threads
    }
}

impl Resource for ArticlePages {
    type Repo = Articles;
    type Criteria = ArticleSearch;
    const PATH: &'static str = "article";

    fn controller(state: &AppState) -> &CrudController<Articles, ArticleSearch> {
        &state.articles
    }
}

/// Index, create, update and delete. `/view` is added per entity.
pub(crate) fn crud_routes<E: Resource>() -> Router<Arc<AppState>> {
    Router::new()
        .route("/index", get(crud::index::<E>))
        .route(
            "/create",
            get(crud::create_form::<E>).post(crud::create_submit::<E>),
        )
        .route(
            "/update",
            get(crud::update_form::<E>).post(crud::update_submit::<E>),
        )
        .route("/delete", post(crud::delete::<E>))
}

pub(crate) fn plain_routes<E: Resource>() -> Router<Arc<AppState>> {
    crud_routes::<E>().route("/view", get(crud::view::<E>))
}
