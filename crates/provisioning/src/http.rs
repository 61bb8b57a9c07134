use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use shared::model::Params;
use tracing::{debug, warn};
use url::Url;

use crate::{ProvisioningBackend, RemoteError, RemoteResponse};

#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub base_url: String,
    pub token: Option<String>,
    pub timeout_secs: u64,
}

/// Calls `POST {base_url}/{action}` with the parameters as a JSON object.
///
/// A 2xx answer is success unless its JSON body carries an `_error` field,
/// which is how the provisioning API reports refused operations. Empty or
/// non-JSON 2xx bodies count as success with a null response.
#[derive(Clone)]
pub struct HttpBackend {
    http: Client,
    base_url: Url,
    token: Option<String>,
}

impl HttpBackend {
    pub fn new(config: &BackendConfig) -> Result<Self, RemoteError> {
        let mut base = config.base_url.trim().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()?;
        Ok(Self {
            http,
            base_url: Url::parse(&base)?,
            token: config.token.clone().filter(|t| !t.is_empty()),
        })
    }
}

#[async_trait]
impl ProvisioningBackend for HttpBackend {
    async fn perform(&self, action: &str, params: &Params) -> Result<RemoteResponse, RemoteError> {
        let url = self.base_url.join(action)?;
        let mut request = self.http.post(url).json(params);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        let raw = response.bytes().await?;
        let body = serde_json::from_slice::<Value>(&raw).unwrap_or_else(|_| {
            if !raw.is_empty() {
                debug!(action, %status, "provisioning backend answered without json");
            }
            Value::Null
        });

        if let Some(message) = refusal_message(&body) {
            warn!(action, %status, %message, "provisioning backend refused operation");
            return Err(RemoteError::Rejected(message));
        }
        if !status.is_success() {
            warn!(action, %status, "provisioning backend returned error status");
            return Err(RemoteError::Rejected(format!(
                "Provisioning backend answered {status}"
            )));
        }

        debug!(action, "provisioning backend accepted operation");
        Ok(body)
    }
}

fn refusal_message(body: &Value) -> Option<String> {
    match body.get("_error")? {
        Value::String(message) => Some(message.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}
