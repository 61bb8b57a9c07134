use provisioning::{ProvisioningBackend, RemoteError, RemoteResponse};
use shared::{
    model::{Entity, Operable, Params},
    protocol::Notification,
};
use storage::Repository;
use tracing::{info, warn};

use crate::{find_model, i18n::Translator, CrudError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestParam {
    pub name: &'static str,
    pub required: bool,
}

impl RequestParam {
    pub const fn required(name: &'static str) -> Self {
        Self {
            name,
            required: true,
        }
    }

    pub const fn optional(name: &'static str) -> Self {
        Self {
            name,
            required: false,
        }
    }
}

/// What a remote call receives besides the path id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamSpec {
    Id,
    IdWith(&'static [RequestParam]),
}

/// One remote operation exposed as a controller action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionSpec {
    /// Path segment, e.g. `power-off`.
    pub route: &'static str,
    /// Backend operation name, e.g. `PowerOff`.
    pub remote: &'static str,
    pub params: ParamSpec,
    pub success_message: &'static str,
    pub error_message: &'static str,
}

impl ActionSpec {
    pub fn request_params(&self) -> &'static [RequestParam] {
        match self.params {
            ParamSpec::Id => &[],
            ParamSpec::IdWith(params) => params,
        }
    }

    /// First required parameter that is absent or blank.
    pub fn missing_param(&self, request: &Params) -> Option<&'static str> {
        self.request_params()
            .iter()
            .filter(|param| param.required)
            .find(|param| {
                request
                    .get(param.name)
                    .map_or(true, |value| value.trim().is_empty())
            })
            .map(|param| param.name)
    }

    /// Builds the backend payload: `id` plus every declared parameter that
    /// carries a value. Undeclared request keys never reach the backend.
    pub fn remote_params(&self, id: i64, request: &Params) -> Params {
        let mut params = Params::new();
        params.insert("id".to_string(), id.to_string());
        for param in self.request_params() {
            if let Some(value) = request.get(param.name).map(|v| v.trim()) {
                if !value.is_empty() {
                    params.insert(param.name.to_string(), value.to_string());
                }
            }
        }
        params
    }
}

/// Result of one dispatched action. `response` is set only when the backend
/// accepted the operation.
#[derive(Debug, Clone)]
pub struct Dispatched<T> {
    pub record: T,
    pub notification: Notification,
    pub response: Option<RemoteResponse>,
}

impl<T> Dispatched<T> {
    pub fn succeeded(&self) -> bool {
        self.response.is_some()
    }

    pub fn into_outcome(self) -> Result<Notification, Notification> {
        if self.succeeded() {
            Ok(self.notification)
        } else {
            Err(self.notification)
        }
    }
}

/// Loads the record, checks it can be operated on and forwards the action.
///
/// Refusals and backend errors come back as an error notification, never as
/// `Err`. `Err` is reserved for requests that cannot be served at all.
pub async fn dispatch<R>(
    repo: &R,
    backend: &dyn ProvisioningBackend,
    translator: &Translator,
    spec: &ActionSpec,
    id: i64,
    request: &Params,
) -> Result<Dispatched<R::Record>, CrudError>
where
    R: Repository,
    R::Record: Operable,
{
    if let Some(name) = spec.missing_param(request) {
        return Err(CrudError::MissingParam(name));
    }
    let record = find_model(repo, id).await?;
    let title = record.display_name().to_string();

    if let Err(refusal) = record.check_operable() {
        warn!(
            kind = R::Record::KIND,
            id,
            action = spec.remote,
            reason = %refusal,
            "action refused"
        );
        return Ok(Dispatched {
            notification: Notification::error(Some(title), translator.t(&refusal.message)),
            record,
            response: None,
        });
    }

    let params = spec.remote_params(id, request);
    match backend.perform(spec.remote, &params).await {
        Ok(response) => {
            info!(kind = R::Record::KIND, id, action = spec.remote, "action queued");
            Ok(Dispatched {
                notification: Notification::success(title, translator.t(spec.success_message)),
                record,
                response: Some(response),
            })
        }
        Err(err) => {
            warn!(
                kind = R::Record::KIND,
                id,
                action = spec.remote,
                error = %err,
                "backend rejected action"
            );
            Ok(Dispatched {
                notification: Notification::error(
                    Some(translator.t(spec.error_message)),
                    remote_failure_text(translator, &err),
                ),
                record,
                response: None,
            })
        }
    }
}

/// What the user sees for a failed remote call. Only the backend's own
/// refusal text is passed through; transport details stay in the logs.
pub fn remote_failure_text(translator: &Translator, err: &RemoteError) -> String {
    match err {
        RemoteError::Rejected(message) => message.clone(),
        RemoteError::Transport(_) | RemoteError::Url(_) => {
            translator.t("Provisioning backend is unreachable")
        }
    }
}
