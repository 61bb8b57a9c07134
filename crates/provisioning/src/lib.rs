//! Seam to the external provisioning system that executes server and domain
//! operations. Every call enqueues remote work; nothing here retries.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shared::model::Params;
use thiserror::Error;

mod http;
mod recording;

pub use http::{BackendConfig, HttpBackend};
pub use recording::RecordingBackend;

pub type RemoteResponse = serde_json::Value;

#[derive(Debug, Error)]
pub enum RemoteError {
    /// The backend answered and refused the operation.
    #[error("{0}")]
    Rejected(String),
    #[error("provisioning backend unreachable: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("invalid provisioning backend url: {0}")]
    Url(#[from] url::ParseError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteCall {
    pub action: String,
    pub params: Params,
}

#[async_trait]
pub trait ProvisioningBackend: Send + Sync {
    async fn perform(&self, action: &str, params: &Params) -> Result<RemoteResponse, RemoteError>;
}

/// Used when no backend url is configured: every operation is refused.
pub struct UnconfiguredBackend;

#[async_trait]
impl ProvisioningBackend for UnconfiguredBackend {
    async fn perform(&self, action: &str, _params: &Params) -> Result<RemoteResponse, RemoteError> {
        tracing::warn!(action, "provisioning backend is not configured");
        Err(RemoteError::Rejected(
            "Provisioning backend is not configured".to_string(),
        ))
    }
}
