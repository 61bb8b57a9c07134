use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use anyhow::Context;
use panel_core::files::DEV_FILE_SECRET;
use serde::Deserialize;

#[derive(Debug, Clone)]
pub struct Settings {
    pub bind_addr: String,
    pub database_url: String,
    pub backend_url: Option<String>,
    pub backend_token: Option<String>,
    pub backend_timeout_secs: u64,
    pub file_secret: String,
    pub files_root: PathBuf,
    pub temp_dir: PathBuf,
    pub default_theme: String,
    pub themes: Vec<String>,
    pub language: String,
    pub translations: HashMap<String, String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".into(),
            database_url: "sqlite://./data/panel.db".into(),
            backend_url: None,
            backend_token: None,
            backend_timeout_secs: 30,
            file_secret: DEV_FILE_SECRET.into(),
            files_root: PathBuf::from("./data/files"),
            temp_dir: std::env::temp_dir().join("panel"),
            default_theme: "adminlte".into(),
            themes: vec!["adminlte".into(), "dark".into()],
            language: "en".into(),
            translations: HashMap::new(),
        }
    }
}

/// Shape of `server.toml`. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileSettings {
    bind_addr: Option<String>,
    database_url: Option<String>,
    backend_url: Option<String>,
    backend_token: Option<String>,
    backend_timeout_secs: Option<u64>,
    file_secret: Option<String>,
    files_root: Option<PathBuf>,
    temp_dir: Option<PathBuf>,
    default_theme: Option<String>,
    themes: Option<Vec<String>>,
    language: Option<String>,
    #[serde(default)]
    translations: HashMap<String, String>,
}

impl Settings {
    pub fn uses_dev_file_secret(&self) -> bool {
        self.file_secret == DEV_FILE_SECRET
    }
}

pub fn load_settings() -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string("server.toml") {
        apply_file(&mut settings, &raw).context("invalid server.toml")?;
    }
    apply_env(&mut settings, |key| std::env::var(key).ok());

    Ok(settings)
}

pub(crate) fn apply_file(settings: &mut Settings, raw: &str) -> anyhow::Result<()> {
    let file_cfg: FileSettings = toml::from_str(raw)?;

    if let Some(v) = file_cfg.bind_addr {
        settings.bind_addr = v;
    }
    if let Some(v) = file_cfg.database_url {
        settings.database_url = v;
    }
    if let Some(v) = file_cfg.backend_url {
        settings.backend_url = Some(v);
    }
    if let Some(v) = file_cfg.backend_token {
        settings.backend_token = Some(v);
    }
    if let Some(v) = file_cfg.backend_timeout_secs {
        settings.backend_timeout_secs = v;
    }
    if let Some(v) = file_cfg.file_secret {
        settings.file_secret = v;
    }
    if let Some(v) = file_cfg.files_root {
        settings.files_root = v;
    }
    if let Some(v) = file_cfg.temp_dir {
        settings.temp_dir = v;
    }
    if let Some(v) = file_cfg.default_theme {
        settings.default_theme = v;
    }
    if let Some(v) = file_cfg.themes {
        settings.themes = v;
    }
    if let Some(v) = file_cfg.language {
        settings.language = v;
    }
    settings.translations.extend(file_cfg.translations);

    Ok(())
}

/// `APP__*` names win over the legacy unprefixed ones.
pub(crate) fn apply_env(settings: &mut Settings, lookup: impl Fn(&str) -> Option<String>) {
    let pick = |legacy: Option<&str>, key: &str| lookup(key).or_else(|| legacy.and_then(&lookup));

    if let Some(v) = pick(Some("SERVER_BIND"), "APP__BIND_ADDR") {
        settings.bind_addr = v;
    }
    if let Some(v) = pick(Some("DATABASE_URL"), "APP__DATABASE_URL") {
        settings.database_url = v;
    }
    if let Some(v) = pick(Some("BACKEND_URL"), "APP__BACKEND_URL") {
        settings.backend_url = Some(v).filter(|url| !url.trim().is_empty());
    }
    if let Some(v) = pick(None, "APP__BACKEND_TOKEN") {
        settings.backend_token = Some(v);
    }
    if let Some(v) = pick(None, "APP__BACKEND_TIMEOUT_SECS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.backend_timeout_secs = parsed;
        }
    }
    if let Some(v) = pick(None, "APP__FILE_SECRET") {
        settings.file_secret = v;
    }
    if let Some(v) = pick(None, "APP__FILES_ROOT") {
        settings.files_root = PathBuf::from(v);
    }
    if let Some(v) = pick(None, "APP__TEMP_DIR") {
        settings.temp_dir = PathBuf::from(v);
    }
    if let Some(v) = pick(None, "APP__DEFAULT_THEME") {
        settings.default_theme = v;
    }
    if let Some(v) = pick(None, "APP__LANGUAGE") {
        settings.language = v;
    }
}

pub fn prepare_database_url(raw_database_url: &str) -> anyhow::Result<String> {
    let database_url = normalize_database_url(raw_database_url);
    ensure_parent_dir_exists(&database_url)?;
    Ok(database_url)
}

pub(crate) fn normalize_database_url(raw_database_url: &str) -> String {
    let raw_database_url = raw_database_url.trim();

    if raw_database_url.is_empty() {
        return Settings::default().database_url;
    }

    if raw_database_url.starts_with("sqlite::memory:")
        || raw_database_url.starts_with("sqlite://")
        || raw_database_url.contains("://")
    {
        return raw_database_url.to_string();
    }

    if let Some(path) = raw_database_url.strip_prefix("sqlite:") {
        let path = path.replace('\\', "/");
        return format!("sqlite://{path}");
    }

    format!("sqlite://{}", raw_database_url.replace('\\', "/"))
}

fn ensure_parent_dir_exists(database_url: &str) -> anyhow::Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url == "sqlite::memory:" || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
