use anyhow::Result;
use chrono::{DateTime, Utc};
use shared::domain::FileId;
use sqlx::{sqlite::SqliteRow, Pool, Row, Sqlite};

/// Registry row for a file kept under the configured files root.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredFile {
    pub file_id: FileId,
    pub object_id: Option<i64>,
    pub object_name: Option<String>,
    pub filename: String,
    pub mime_type: Option<String>,
    /// Relative to the files root.
    pub path: String,
    pub size_bytes: u64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewFile<'a> {
    pub object_id: Option<i64>,
    pub object_name: Option<&'a str>,
    pub filename: &'a str,
    pub mime_type: Option<&'a str>,
    pub path: &'a str,
    pub size_bytes: u64,
}

#[derive(Clone)]
pub struct Files {
    pool: Pool<Sqlite>,
}

impl Files {
    pub(crate) fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    pub async fn register(&self, file: NewFile<'_>) -> Result<FileId> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO files (object_id, object_name, filename, mime_type, path, size_bytes, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             RETURNING id",
        )
        .bind(file.object_id)
        .bind(file.object_name)
        .bind(file.filename)
        .bind(file.mime_type)
        .bind(file.path)
        .bind(i64::try_from(file.size_bytes)?)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;
        Ok(FileId(id))
    }

    pub async fn load(&self, file_id: FileId) -> Result<Option<StoredFile>> {
        let row = sqlx::query(
            "SELECT id, object_id, object_name, filename, mime_type, path, size_bytes, created_at
             FROM files WHERE id = ?",
        )
        .bind(file_id.0)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(file_from_row).transpose()
    }
}

fn file_from_row(row: &SqliteRow) -> Result<StoredFile> {
    let size: i64 = row.try_get("size_bytes")?;
    Ok(StoredFile {
        file_id: FileId(row.try_get("id")?),
        object_id: row.try_get("object_id")?,
        object_name: row.try_get("object_name")?,
        filename: row.try_get("filename")?,
        mime_type: row.try_get("mime_type")?,
        path: row.try_get("path")?,
        size_bytes: u64::try_from(size)?,
        created_at: row.try_get("created_at")?,
    })
}
