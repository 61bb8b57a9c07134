use std::path::{Component, Path, PathBuf};

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use shared::domain::FileId;
use storage::{Files, StoredFile};
use thiserror::Error;
use tracing::debug;

use crate::CrudError;

type HmacSha256 = Hmac<Sha256>;

const MAX_KEY_LEN: usize = 128;

/// Signing secret used when none is configured. Links signed with it can be
/// forged by anyone who knows this value.
pub const DEV_FILE_SECRET: &str = "dev-file-secret";

#[derive(Debug, Error)]
pub enum FileError {
    #[error("file secret cannot be used as a signing key")]
    InvalidSecret,
}

/// Signs temp file names so a link can be handed out without a session.
#[derive(Clone)]
pub struct TempLinkSigner {
    mac: HmacSha256,
}

impl TempLinkSigner {
    pub fn new(secret: &[u8]) -> Result<Self, FileError> {
        let mac = HmacSha256::new_from_slice(secret).map_err(|_| FileError::InvalidSecret)?;
        Ok(Self { mac })
    }

    /// `base64url(HMAC-SHA256(secret, name))` without padding.
    pub fn sign(&self, name: &str) -> String {
        let mut mac = self.mac.clone();
        mac.update(name.as_bytes());
        URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes())
    }

    pub fn verify(&self, name: &str, key: &str) -> bool {
        if key.is_empty() || key.len() > MAX_KEY_LEN {
            return false;
        }
        let Ok(expected) = URL_SAFE_NO_PAD.decode(key) else {
            return false;
        };
        let mut mac = self.mac.clone();
        mac.update(name.as_bytes());
        mac.verify_slice(&expected).is_ok()
    }
}

/// A bare file name: no separators, no `..`, nothing hidden.
pub fn is_safe_file_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && !name.contains(['/', '\\', '\0'])
        && name != ".."
}

fn is_safe_relative_path(path: &Path) -> bool {
    path.components().all(|c| matches!(c, Component::Normal(_)))
}

/// Everything a handler needs to stream one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServedFile {
    pub path: PathBuf,
    pub filename: String,
    pub mime_type: String,
}

/// Optional overrides for the download name and type.
#[derive(Debug, Clone, Copy, Default)]
pub struct Rename<'a> {
    pub ext: Option<&'a str>,
    pub content_type: Option<&'a str>,
}

#[derive(Clone)]
pub struct FileService {
    files: Files,
    root: PathBuf,
    temp_dir: PathBuf,
    signer: TempLinkSigner,
}

impl FileService {
    pub fn new(files: Files, root: PathBuf, temp_dir: PathBuf, signer: TempLinkSigner) -> Self {
        Self {
            files,
            root,
            temp_dir,
            signer,
        }
    }

    pub fn signer(&self) -> &TempLinkSigner {
        &self.signer
    }

    /// Looks up a registered file. When `object_id` or `object_name` are
    /// given they must match the owner recorded for the file.
    pub async fn resolve(
        &self,
        id: i64,
        object_id: Option<i64>,
        object_name: Option<&str>,
        rename: Rename<'_>,
    ) -> Result<ServedFile, CrudError> {
        let not_found = || CrudError::NotFound { kind: "file", id };
        let stored = self.files.load(FileId(id)).await?.ok_or_else(not_found)?;
        if !owner_matches(&stored, object_id, object_name) {
            debug!(id, "file owner mismatch");
            return Err(not_found());
        }
        let relative = Path::new(&stored.path);
        if !is_safe_relative_path(relative) {
            debug!(id, path = %stored.path, "refusing stored path outside the files root");
            return Err(not_found());
        }

        let filename = match rename.ext.filter(|ext| is_safe_extension(ext)) {
            Some(ext) => format!("{id}.{ext}"),
            None => stored.filename.clone(),
        };
        let mime_type = rename
            .content_type
            .map(str::to_string)
            .or_else(|| stored.mime_type.clone())
            .unwrap_or_else(|| guess_mime(&filename));

        Ok(ServedFile {
            path: self.root.join(relative),
            filename,
            mime_type,
        })
    }

    /// `None` for a bad key or an unsafe name; the caller answers 403.
    pub fn resolve_temp(&self, name: &str, key: &str) -> Option<ServedFile> {
        if !is_safe_file_name(name) || !self.signer.verify(name, key) {
            return None;
        }
        Some(ServedFile {
            path: self.temp_dir.join(name),
            filename: name.to_string(),
            mime_type: guess_mime(name),
        })
    }
}

fn owner_matches(stored: &StoredFile, object_id: Option<i64>, object_name: Option<&str>) -> bool {
    let id_ok = object_id.map_or(true, |id| stored.object_id == Some(id));
    let name_ok = object_name
        .filter(|name| !name.is_empty())
        .map_or(true, |name| stored.object_name.as_deref() == Some(name));
    id_ok && name_ok
}

fn is_safe_extension(ext: &str) -> bool {
    !ext.is_empty() && ext.len() <= 16 && ext.bytes().all(|b| b.is_ascii_alphanumeric())
}

pub fn guess_mime(filename: &str) -> String {
    mime_guess::from_path(filename)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

#[cfg(test)]
mod tests {
    use storage::{NewFile, Storage};

    use super::*;

    fn signer() -> TempLinkSigner {
        TempLinkSigner::new(b"file-secret").expect("signer")
    }

    async fn service() -> (FileService, FileId) {
        let storage = Storage::new("sqlite::memory:").await.expect("storage");
        let files = storage.files();
        let id = files
            .register(NewFile {
                object_id: Some(7),
                object_name: Some("thread"),
                filename: "report.pdf",
                mime_type: None,
                path: "2026/03/abc123",
                size_bytes: 42,
            })
            .await
            .expect("register");
        let service = FileService::new(
            files,
            PathBuf::from("/srv/files"),
            PathBuf::from("/tmp/panel"),
            signer(),
        );
        (service, id)
    }

    #[test]
    fn signed_names_verify() {
        let signer = signer();
        let key = signer.sign("export.csv");
        assert!(!key.contains('='));
        assert!(signer.verify("export.csv", &key));
        assert!(!signer.verify("other.csv", &key));
        assert!(!signer.verify("export.csv", "not base64!"));
        assert!(!signer.verify("export.csv", ""));
    }

    #[test]
    fn unsafe_names_are_refused() {
        for name in ["../etc/passwd", "a/b", "a\\b", "..", ".env", ""] {
            assert!(!is_safe_file_name(name), "{name}");
        }
        assert!(is_safe_file_name("export-2026.csv"));
    }

    #[test]
    fn mime_is_guessed_from_the_name() {
        assert_eq!(guess_mime("a.pdf"), "application/pdf");
        assert_eq!(guess_mime("noext"), "application/octet-stream");
    }

    #[tokio::test]
    async fn temp_view_needs_a_valid_key() {
        let (service, _) = service().await;
        let key = service.signer().sign("export.csv");
        let served = service.resolve_temp("export.csv", &key).expect("served");
        assert_eq!(served.path, PathBuf::from("/tmp/panel/export.csv"));
        assert_eq!(served.mime_type, "text/csv");

        assert!(service.resolve_temp("export.csv", "forged").is_none());
        let traversal_key = service.signer().sign("../secret");
        assert!(service.resolve_temp("../secret", &traversal_key).is_none());
    }

    #[tokio::test]
    async fn stored_file_resolves_under_the_root() {
        let (service, id) = service().await;
        let served = service
            .resolve(id.0, Some(7), Some("thread"), Rename::default())
            .await
            .expect("resolve");
        assert_eq!(served.path, PathBuf::from("/srv/files/2026/03/abc123"));
        assert_eq!(served.filename, "report.pdf");
        assert_eq!(served.mime_type, "application/pdf");
    }

    #[tokio::test]
    async fn owner_mismatch_is_not_found() {
        let (service, id) = service().await;
        let err = service
            .resolve(id.0, Some(8), None, Rename::default())
            .await
            .expect_err("wrong owner");
        assert!(matches!(err, CrudError::NotFound { kind: "file", .. }));
    }

    #[tokio::test]
    async fn get_renames_by_id_and_extension() {
        let (service, id) = service().await;
        let served = service
            .resolve(
                id.0,
                None,
                None,
                Rename {
                    ext: Some("png"),
                    content_type: Some("image/png"),
                },
            )
            .await
            .expect("resolve");
        assert_eq!(served.filename, format!("{}.png", id.0));
        assert_eq!(served.mime_type, "image/png");
    }
}
