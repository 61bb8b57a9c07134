use std::sync::Arc;

use panel_core::{
    criteria::{ArticleSearch, DomainSearch, ThreadSearch},
    crud::article_data_to_texts,
    files::FileService,
    CrudController, SessionId, SessionStore, Translator,
};
use provisioning::ProvisioningBackend;
use storage::{Articles, Domains, Storage, Threads};

#[derive(Debug, Clone)]
pub(crate) struct Themes {
    pub(crate) default_theme: String,
    pub(crate) available: Vec<String>,
}

impl Themes {
    pub(crate) fn contains(&self, theme: &str) -> bool {
        theme == self.default_theme || self.available.iter().any(|t| t == theme)
    }
}

pub(crate) struct AppState {
    pub(crate) storage: Storage,
    pub(crate) backend: Arc<dyn ProvisioningBackend>,
    pub(crate) translator: Translator,
    pub(crate) sessions: SessionStore,
    pub(crate) files: FileService,
    pub(crate) themes: Themes,
    pub(crate) domains: CrudController<Domains, DomainSearch>,
    pub(crate) threads: CrudController<Threads, ThreadSearch>,
    pub(crate) articles: CrudController<Articles, ArticleSearch>,
}

impl AppState {
    pub(crate) fn new(
        storage: Storage,
        backend: Arc<dyn ProvisioningBackend>,
        translator: Translator,
        files: FileService,
        themes: Themes,
    ) -> Self {
        Self {
            domains: CrudController::new(storage.domains()),
            threads: CrudController::new(storage.threads()),
            articles: CrudController::new(storage.articles()).with_hook(article_data_to_texts),
            storage,
            backend,
            translator,
            sessions: SessionStore::new(),
            files,
            themes,
        }
    }

    pub(crate) fn theme_for(&self, session: SessionId) -> String {
        self.sessions
            .theme(session)
            .unwrap_or_else(|| self.themes.default_theme.clone())
    }
}
