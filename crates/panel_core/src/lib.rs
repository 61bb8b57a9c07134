//! Controller layer shared by every panel entity: listing with search
//! criteria, the create/update/delete flow, and remote action dispatch.

use shared::{
    error::{ApiError, ErrorCode, ValidationErrors},
    model::Entity,
};
use storage::Repository;
use thiserror::Error;

pub mod criteria;
pub mod crud;
pub mod dispatch;
pub mod domain;
pub mod files;
pub mod i18n;
pub mod search;
pub mod session;

pub use crud::{CrudController, FormOutcome, Listing, PayloadHook};
pub use dispatch::{dispatch, ActionSpec, Dispatched, ParamSpec, RequestParam};
pub use i18n::Translator;
pub use session::{SessionId, SessionStore};

#[derive(Debug, Error)]
pub enum CrudError {
    #[error("{kind} #{id} not found")]
    NotFound { kind: &'static str, id: i64 },
    #[error("missing required parameter: {0}")]
    MissingParam(&'static str),
    #[error("{0}")]
    Invalid(ValidationErrors),
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl CrudError {
    pub fn not_found<E: Entity>(id: i64) -> Self {
        CrudError::NotFound { kind: E::KIND, id }
    }

    pub fn to_api_error(&self) -> ApiError {
        match self {
            CrudError::NotFound { .. } => ApiError::new(ErrorCode::NotFound, self.to_string()),
            CrudError::MissingParam(_) => ApiError::new(ErrorCode::BadRequest, self.to_string()),
            CrudError::Invalid(_) => ApiError::new(ErrorCode::Validation, self.to_string()),
            CrudError::Storage(err) => internal(err),
        }
    }
}

/// Loads a record or reports it missing.
pub async fn find_model<R: Repository>(repo: &R, id: i64) -> Result<R::Record, CrudError> {
    repo.find_by_id(id)
        .await?
        .ok_or_else(|| CrudError::not_found::<R::Record>(id))
}

fn internal(err: &anyhow::Error) -> ApiError {
    tracing::error!(error = %err, "storage failure");
    ApiError::new(ErrorCode::Internal, "internal error")
}
