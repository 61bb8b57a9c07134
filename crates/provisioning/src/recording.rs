use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

use async_trait::async_trait;
use shared::model::Params;

use crate::{ProvisioningBackend, RemoteCall, RemoteError, RemoteResponse};

#[derive(Default)]
struct RecordingState {
    calls: Vec<RemoteCall>,
    failures: HashMap<String, String>,
    responses: HashMap<String, RemoteResponse>,
}

/// In-memory backend for tests and local runs. Records every call and
/// answers with scripted responses or refusals.
#[derive(Clone, Default)]
pub struct RecordingBackend {
    state: Arc<Mutex<RecordingState>>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_on(self, action: &str, message: &str) -> Self {
        self.lock()
            .failures
            .insert(action.to_string(), message.to_string());
        self
    }

    pub fn respond_with(self, action: &str, response: RemoteResponse) -> Self {
        self.lock().responses.insert(action.to_string(), response);
        self
    }

    pub fn calls(&self) -> Vec<RemoteCall> {
        self.lock().calls.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RecordingState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl ProvisioningBackend for RecordingBackend {
    async fn perform(&self, action: &str, params: &Params) -> Result<RemoteResponse, RemoteError> {
        let mut state = self.lock();
        state.calls.push(RemoteCall {
            action: action.to_string(),
            params: params.clone(),
        });
        if let Some(message) = state.failures.get(action) {
            return Err(RemoteError::Rejected(message.clone()));
        }
        Ok(state
            .responses
            .get(action)
            .cloned()
            .unwrap_or_else(|| serde_json::json!({})))
    }
}
