use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use shared::{
    content::{Article, ArticleDraft},
    domain::ArticleId,
};
use sqlx::{sqlite::SqliteRow, Pool, Row, Sqlite};

use crate::{
    query::{count_rows, fetch_rows, Query},
    repository::{map_unique, Repository},
};

const COLUMNS: &str = "id, name, is_published, texts, created_at";

#[derive(Clone)]
pub struct Articles {
    pool: Pool<Sqlite>,
}

impl Articles {
    pub(crate) fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Repository for Articles {
    type Record = Article;

    async fn find_by_id(&self, id: i64) -> Result<Option<Article>> {
        let row = sqlx::query(
            "SELECT id, name, is_published, texts, created_at FROM articles WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(article_from_row).transpose()
    }

    async fn find_all(&self, query: &Query) -> Result<Vec<Article>> {
        fetch_rows(&self.pool, "articles", COLUMNS, query, article_from_row).await
    }

    async fn count(&self, query: &Query) -> Result<u64> {
        count_rows(&self.pool, "articles", query).await
    }

    async fn insert(&self, draft: &ArticleDraft) -> Result<Article> {
        let row = sqlx::query(
            "INSERT INTO articles (name, is_published, texts, created_at)
             VALUES (?, ?, ?, ?)
             RETURNING id, name, is_published, texts, created_at",
        )
        .bind(&draft.name)
        .bind(draft.is_published)
        .bind(draft.texts.as_deref())
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_unique(e, "name"))?;
        article_from_row(&row)
    }

    async fn update(&self, id: i64, draft: &ArticleDraft) -> Result<Option<Article>> {
        let row = sqlx::query(
            "UPDATE articles SET name = ?, is_published = ?, texts = ?
             WHERE id = ?
             RETURNING id, name, is_published, texts, created_at",
        )
        .bind(&draft.name)
        .bind(draft.is_published)
        .bind(draft.texts.as_deref())
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_unique(e, "name"))?;
        row.as_ref().map(article_from_row).transpose()
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let done = sqlx::query("DELETE FROM articles WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(done.rows_affected() > 0)
    }
}

fn article_from_row(row: &SqliteRow) -> Result<Article> {
    Ok(Article {
        id: ArticleId(row.try_get("id")?),
        name: row.try_get("name")?,
        is_published: row.try_get("is_published")?,
        texts: row.try_get("texts")?,
        created_at: row.try_get("created_at")?,
    })
}
