use anyhow::Result;
use async_trait::async_trait;
use shared::model::Entity;
use thiserror::Error;

use crate::query::Query;

pub type DraftOf<R> = <<R as Repository>::Record as Entity>::Draft;

/// Persistence seam the generic controllers are written against.
///
/// Each call is its own transaction; nothing spans calls.
#[async_trait]
pub trait Repository: Clone + Send + Sync + 'static {
    type Record: Entity;

    async fn find_by_id(&self, id: i64) -> Result<Option<Self::Record>>;
    async fn find_all(&self, query: &Query) -> Result<Vec<Self::Record>>;
    async fn count(&self, query: &Query) -> Result<u64>;
    async fn insert(&self, draft: &DraftOf<Self>) -> Result<Self::Record>;
    /// Returns `None` when no row has this id.
    async fn update(&self, id: i64, draft: &DraftOf<Self>) -> Result<Option<Self::Record>>;
    /// Returns `false` when no row has this id.
    async fn delete(&self, id: i64) -> Result<bool>;
}

/// A write violated a uniqueness constraint on `field`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field} is already taken")]
pub struct Conflict {
    pub field: &'static str,
}

pub(crate) fn map_unique(err: sqlx::Error, field: &'static str) -> anyhow::Error {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => Conflict { field }.into(),
        _ => err.into(),
    }
}
