use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use panel_core::{
    files::{FileService, TempLinkSigner},
    Translator,
};
use provisioning::{BackendConfig, HttpBackend, ProvisioningBackend, UnconfiguredBackend};
use storage::Storage;
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod app_state;
mod config;
mod context;
mod render;
mod routes;
mod verbs;

use app_state::{AppState, Themes};
use config::{load_settings, prepare_database_url, Settings};
use routes::{plain_routes, ArticlePages, ThreadPages};

const MAX_FORM_BYTES: usize = 1024 * 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = load_settings()?;
    let database_url = prepare_database_url(&settings.database_url)?;
    let storage = Storage::new(&database_url).await.map_err(|error| {
        error!(
            %database_url,
            %error,
            "failed to open SQLite database; verify parent directory exists and permissions are correct"
        );
        error
    })?;

    let backend = build_backend(&settings)?;
    let state = build_state(storage, backend, &settings)?;
    let app = build_router(Arc::new(state));

    let addr: SocketAddr = settings.bind_addr.parse()?;
    info!(%addr, "panel listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_backend(settings: &Settings) -> anyhow::Result<Arc<dyn ProvisioningBackend>> {
    let Some(base_url) = settings.backend_url.clone() else {
        warn!("no backend_url configured; remote actions will be refused");
        return Ok(Arc::new(UnconfiguredBackend));
    };
    let backend = HttpBackend::new(&BackendConfig {
        base_url,
        token: settings.backend_token.clone(),
        timeout_secs: settings.backend_timeout_secs,
    })
    .context("invalid provisioning backend settings")?;
    Ok(Arc::new(backend))
}

fn build_state(
    storage: Storage,
    backend: Arc<dyn ProvisioningBackend>,
    settings: &Settings,
) -> anyhow::Result<AppState> {
    if settings.uses_dev_file_secret() {
        warn!("file_secret is not configured; temp file links can be forged");
    }
    let signer = TempLinkSigner::new(settings.file_secret.as_bytes())?;
    let files = FileService::new(
        storage.files(),
        settings.files_root.clone(),
        settings.temp_dir.clone(),
        signer,
    );
    let translator = Translator::new(settings.language.clone(), settings.translations.clone());
    let themes = Themes {
        default_theme: settings.default_theme.clone(),
        available: settings.themes.clone(),
    };
    Ok(AppState::new(storage, backend, translator, files, themes))
}

fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(routes::site::home))
        .route("/healthz", get(routes::site::healthz))
        .route("/site/theme", post(routes::site::set_theme))
        .nest("/domain", routes::domain::routes())
        .nest("/thread", plain_routes::<ThreadPages>())
        .nest("/article", plain_routes::<ArticlePages>())
        .nest("/file", routes::files::routes())
        .layer(middleware::from_fn(context::session_layer))
        .layer(RequestBodyLimitLayer::new(MAX_FORM_BYTES))
        .with_state(state)
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
