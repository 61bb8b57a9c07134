use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;
use shared::{
    content::{Thread, ThreadDraft},
    domain::ThreadId,
};
use sqlx::{sqlite::SqliteRow, Pool, Row, Sqlite};

use crate::{
    query::{count_rows, fetch_rows, Query},
    repository::Repository,
};

macro_rules! thread_columns {
    () => {
        "id, subject, author_id, responsible_id, state, priority, message, created_at"
    };
}

#[derive(Clone)]
pub struct Threads {
    pool: Pool<Sqlite>,
}

impl Threads {
    pub(crate) fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Repository for Threads {
    type Record = Thread;

    async fn find_by_id(&self, id: i64) -> Result<Option<Thread>> {
        let row = sqlx::query(concat!(
            "SELECT ",
            thread_columns!(),
            " FROM threads WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(thread_from_row).transpose()
    }

    async fn find_all(&self, query: &Query) -> Result<Vec<Thread>> {
        fetch_rows(&self.pool, "threads", thread_columns!(), query, thread_from_row).await
    }

    async fn count(&self, query: &Query) -> Result<u64> {
        count_rows(&self.pool, "threads", query).await
    }

    async fn insert(&self, draft: &ThreadDraft) -> Result<Thread> {
        let author_id = draft
            .author_id
            .ok_or_else(|| anyhow!("thread draft has no author"))?;
        let row = sqlx::query(concat!(
            "INSERT INTO threads (subject, author_id, responsible_id, state, priority, message, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             RETURNING ",
            thread_columns!()
        ))
        .bind(&draft.subject)
        .bind(author_id)
        .bind(draft.responsible_id)
        .bind(draft.state.as_str())
        .bind(draft.priority.as_str())
        .bind(&draft.message)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;
        thread_from_row(&row)
    }

    async fn update(&self, id: i64, draft: &ThreadDraft) -> Result<Option<Thread>> {
        let author_id = draft
            .author_id
            .ok_or_else(|| anyhow!("thread draft has no author"))?;
        let row = sqlx::query(concat!(
            "UPDATE threads
             SET subject = ?, author_id = ?, responsible_id = ?, state = ?, priority = ?, message = ?
             WHERE id = ?
             RETURNING ",
            thread_columns!()
        ))
        .bind(&draft.subject)
        .bind(author_id)
        .bind(draft.responsible_id)
        .bind(draft.state.as_str())
        .bind(draft.priority.as_str())
        .bind(&draft.message)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(thread_from_row).transpose()
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let done = sqlx::query("DELETE FROM threads WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(done.rows_affected() > 0)
    }
}

fn thread_from_row(row: &SqliteRow) -> Result<Thread> {
    let state: String = row.try_get("state")?;
    let priority: String = row.try_get("priority")?;
    Ok(Thread {
        id: ThreadId(row.try_get("id")?),
        subject: row.try_get("subject")?,
        author_id: row.try_get("author_id")?,
        responsible_id: row.try_get("responsible_id")?,
        state: state
            .parse()
            .map_err(|e: String| anyhow!("corrupt threads.state: {e}"))?,
        priority: priority
            .parse()
            .map_err(|e: String| anyhow!("corrupt threads.priority: {e}"))?,
        message: row.try_get("message")?,
        created_at: row.try_get("created_at")?,
    })
}
