//! Domain-specific actions layered on the generic dispatcher.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use provisioning::ProvisioningBackend;
use shared::{
    domain::{split_nameservers, validate_nameservers, Contacts, Domain, DomainFlag, DomainState},
    error::ValidationErrors,
    model::{non_empty, Entity, Operable, Params},
    protocol::{NoteUpdated, Notification, RequestState, VncInfo},
};
use storage::{Domains, Repository};
use tracing::{info, warn};

use crate::{
    dispatch::{dispatch, remote_failure_text, ActionSpec, Dispatched, ParamSpec, RequestParam},
    find_model,
    i18n::Translator,
    CrudError,
};

/// How long a console stays reachable after `EnableVNC`.
pub const VNC_WINDOW_HOURS: i64 = 8;

pub const ENABLE_VNC: &str = "EnableVNC";

/// Local bookkeeping applied once the backend accepted an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    None,
    SetFlag(DomainFlag, bool),
    StoreNameservers,
    StoreContacts,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DomainAction {
    pub spec: ActionSpec,
    pub effect: Effect,
    /// Only reachable with POST.
    pub post_only: bool,
}

const fn action(
    route: &'static str,
    remote: &'static str,
    params: ParamSpec,
    success_message: &'static str,
    error_message: &'static str,
) -> ActionSpec {
    ActionSpec {
        route,
        remote,
        params,
        success_message,
        error_message,
    }
}

const CONTACT_PARAMS: &[RequestParam] = &[
    RequestParam::optional("registrant"),
    RequestParam::optional("admin"),
    RequestParam::optional("tech"),
    RequestParam::optional("billing"),
];

pub const DOMAIN_ACTIONS: &[DomainAction] = &[
    DomainAction {
        spec: action(
            "reboot",
            "Reboot",
            ParamSpec::Id,
            "Reboot task has been successfully added to queue",
            "Error while rebooting",
        ),
        effect: Effect::None,
        post_only: false,
    },
    DomainAction {
        spec: action(
            "reset",
            "Reset",
            ParamSpec::Id,
            "Reset task has been successfully added to queue",
            "Error while resetting",
        ),
        effect: Effect::None,
        post_only: false,
    },
    DomainAction {
        spec: action(
            "shutdown",
            "Shutdown",
            ParamSpec::Id,
            "Shutdown task has been successfully added to queue",
            "Error while shutting down",
        ),
        effect: Effect::None,
        post_only: false,
    },
    DomainAction {
        spec: action(
            "power-off",
            "PowerOff",
            ParamSpec::Id,
            "Power off task has been successfully added to queue",
            "Error while turning power off",
        ),
        effect: Effect::None,
        post_only: false,
    },
    DomainAction {
        spec: action(
            "power-on",
            "PowerOn",
            ParamSpec::Id,
            "Power on task has been successfully added to queue",
            "Error while turning power on",
        ),
        effect: Effect::None,
        post_only: false,
    },
    DomainAction {
        spec: action(
            "regen-root-password",
            "RegenRootPassword",
            ParamSpec::Id,
            "Password regenerating task has been successfully added to queue",
            "Error while password regeneration",
        ),
        effect: Effect::None,
        post_only: false,
    },
    DomainAction {
        spec: action(
            "reinstall",
            "Resetup",
            ParamSpec::IdWith(&[
                RequestParam::optional("osimage"),
                RequestParam::optional("panel"),
            ]),
            "Domain reinstalling task has been successfully added to queue",
            "Error while server re-installing",
        ),
        effect: Effect::None,
        post_only: false,
    },
    DomainAction {
        spec: action(
            "boot-live",
            "BootLive",
            ParamSpec::IdWith(&[RequestParam::required("osimage")]),
            "Live CD booting task has been successfully added to queue",
            "Error while booting live CD",
        ),
        effect: Effect::None,
        post_only: false,
    },
    DomainAction {
        spec: action(
            "enable-whois-protect",
            "EnableWhoisProtect",
            ParamSpec::Id,
            "WHOIS protection has been enabled",
            "Error while enabling WHOIS protection",
        ),
        effect: Effect::SetFlag(DomainFlag::WhoisProtected, true),
        post_only: true,
    },
    DomainAction {
        spec: action(
            "disable-whois-protect",
            "DisableWhoisProtect",
            ParamSpec::Id,
            "WHOIS protection has been disabled",
            "Error while disabling WHOIS protection",
        ),
        effect: Effect::SetFlag(DomainFlag::WhoisProtected, false),
        post_only: true,
    },
    DomainAction {
        spec: action(
            "enable-autorenewal",
            "EnableAutorenewal",
            ParamSpec::Id,
            "Autorenewal has been enabled",
            "Error while enabling autorenewal",
        ),
        effect: Effect::SetFlag(DomainFlag::Autorenewal, true),
        post_only: true,
    },
    DomainAction {
        spec: action(
            "disable-autorenewal",
            "DisableAutorenewal",
            ParamSpec::Id,
            "Autorenewal has been disabled",
            "Error while disabling autorenewal",
        ),
        effect: Effect::SetFlag(DomainFlag::Autorenewal, false),
        post_only: true,
    },
    DomainAction {
        spec: action(
            "enable-lock",
            "EnableLock",
            ParamSpec::Id,
            "Transfer lock has been enabled",
            "Error while enabling transfer lock",
        ),
        effect: Effect::SetFlag(DomainFlag::TransferLock, true),
        post_only: true,
    },
    DomainAction {
        spec: action(
            "disable-lock",
            "DisableLock",
            ParamSpec::Id,
            "Transfer lock has been disabled",
            "Error while disabling transfer lock",
        ),
        effect: Effect::SetFlag(DomainFlag::TransferLock, false),
        post_only: true,
    },
    DomainAction {
        spec: action(
            "set-nss",
            "SetNSs",
            ParamSpec::IdWith(&[RequestParam::required("nameservers")]),
            "Name servers have been changed",
            "Error while changing name servers",
        ),
        effect: Effect::StoreNameservers,
        post_only: true,
    },
    DomainAction {
        spec: action(
            "set-contacts",
            "SetContacts",
            ParamSpec::IdWith(CONTACT_PARAMS),
            "Contacts have been changed",
            "Error while changing contacts",
        ),
        effect: Effect::StoreContacts,
        post_only: true,
    },
];

/// Routes other than the table above that also require POST.
pub const POST_ONLY_ROUTES: &[&str] = &["set-note"];

pub fn find_action(route: &str) -> Option<&'static DomainAction> {
    DOMAIN_ACTIONS.iter().find(|a| a.spec.route == route)
}

pub fn is_post_only(route: &str) -> bool {
    POST_ONLY_ROUTES.contains(&route) || find_action(route).is_some_and(|a| a.post_only)
}

/// Runs one table action and, on success, records its effect locally.
///
/// Bad name servers and a failed local write after the backend accepted the
/// action are both reported through the notification, never as `Err`.
pub async fn perform_action(
    domains: &Domains,
    backend: &dyn ProvisioningBackend,
    translator: &Translator,
    action: &DomainAction,
    id: i64,
    request: &Params,
) -> Result<Dispatched<Domain>, CrudError> {
    let mut request = request.clone();
    if action.effect == Effect::StoreNameservers {
        if let Some(raw) = request.get("nameservers") {
            let nameservers = split_nameservers(raw);
            let errors = validate_nameservers(&nameservers);
            if !errors.is_empty() {
                let domain = find_model(domains, id).await?;
                warn!(id, fields = %errors, "name servers rejected");
                return Ok(Dispatched {
                    notification: Notification::error(
                        Some(domain.display_name().to_string()),
                        validation_text(translator, &errors),
                    ),
                    record: domain,
                    response: None,
                });
            }
            request.insert("nameservers".to_string(), nameservers.join(","));
        }
    }

    let mut dispatched = dispatch(domains, backend, translator, &action.spec, id, &request).await?;
    if !dispatched.succeeded() {
        return Ok(dispatched);
    }

    if let Err(err) = apply_effect(domains, action.effect, &mut dispatched.record, &request).await {
        warn!(
            id,
            action = action.spec.remote,
            error = %err,
            "action queued but local state was not recorded"
        );
        let note = translator.t("The local record could not be updated.");
        dispatched.notification.text = format!("{} {note}", dispatched.notification.text);
    }
    Ok(dispatched)
}

fn validation_text(translator: &Translator, errors: &ValidationErrors) -> String {
    errors
        .fields()
        .filter_map(|field| errors.get(field))
        .flatten()
        .map(|message| translator.t(message))
        .collect::<Vec<_>>()
        .join(" ")
}

async fn apply_effect(
    domains: &Domains,
    effect: Effect,
    domain: &mut Domain,
    request: &Params,
) -> anyhow::Result<()> {
    match effect {
        Effect::None => {}
        Effect::SetFlag(flag, value) => {
            domains.set_flag(domain.id, flag, value).await?;
            match flag {
                DomainFlag::Autorenewal => domain.autorenewal = value,
                DomainFlag::WhoisProtected => domain.whois_protected = value,
                DomainFlag::TransferLock => domain.transfer_lock = value,
            }
        }
        Effect::StoreNameservers => {
            let nameservers = request
                .get("nameservers")
                .map(|raw| split_nameservers(raw))
                .unwrap_or_default();
            domains.set_nameservers(domain.id, &nameservers).await?;
            domain.nameservers = nameservers;
        }
        Effect::StoreContacts => {
            let current = &domain.contacts;
            let pick = |key: &str, existing: &Option<String>| {
                request
                    .get(key)
                    .and_then(|value| non_empty(value))
                    .or_else(|| existing.clone())
            };
            let contacts = Contacts {
                registrant: pick("registrant", &current.registrant),
                admin: pick("admin", &current.admin),
                tech: pick("tech", &current.tech),
                billing: pick("billing", &current.billing),
            };
            domains.set_contacts(domain.id, &contacts).await?;
            domain.contacts = contacts;
        }
    }
    Ok(())
}

pub fn vnc_window_end(domain: &Domain) -> Option<DateTime<Utc>> {
    domain
        .vnc_enabled_at
        .map(|at| at + Duration::hours(VNC_WINDOW_HOURS))
}

pub fn vnc_window_open(domain: &Domain, now: DateTime<Utc>) -> bool {
    vnc_window_end(domain).is_some_and(|end| end > now)
}

/// Console details shown on the View page.
///
/// Connection details are only fetched while the window is open and the
/// domain can be operated on. A backend failure here leaves the console
/// marked unavailable rather than failing the page.
pub async fn vnc_info(
    backend: &dyn ProvisioningBackend,
    domain: &Domain,
    now: DateTime<Utc>,
) -> VncInfo {
    let mut info = VncInfo {
        end_time: vnc_window_end(domain),
        ..VncInfo::default()
    };
    if !vnc_window_open(domain, now) || !domain.is_operable() {
        return info;
    }
    match fetch_vnc_connection(backend, domain).await {
        Ok(connection) => {
            info.enabled = true;
            info.connection = connection;
        }
        Err(err) => warn!(id = domain.id.0, error = %err, "could not load vnc details"),
    }
    info
}

/// Opens the console window.
///
/// The inner `Err` is a notification to flash; the page still renders.
pub async fn enable_vnc(
    domains: &Domains,
    backend: &dyn ProvisioningBackend,
    translator: &Translator,
    id: i64,
    now: DateTime<Utc>,
) -> Result<(Domain, Result<VncInfo, Notification>), CrudError> {
    let mut domain = find_model(domains, id).await?;
    if let Err(refusal) = domain.check_operable() {
        let notification = Notification::error(
            Some(domain.display_name().to_string()),
            translator.t(&refusal.message),
        );
        return Ok((domain, Err(notification)));
    }

    let connection = match fetch_vnc_connection(backend, &domain).await {
        Ok(connection) => connection,
        Err(err) => {
            warn!(id, error = %err, "enabling vnc failed");
            let notification = Notification::error(
                Some(translator.t("Error while enabling VNC")),
                remote_failure_text(translator, &err),
            );
            return Ok((domain, Err(notification)));
        }
    };

    domains.mark_vnc_enabled(domain.id, now).await?;
    domain.vnc_enabled_at = Some(now);
    info!(id, "vnc enabled");
    let info = VncInfo {
        end_time: vnc_window_end(&domain),
        enabled: true,
        connection,
    };
    Ok((domain, Ok(info)))
}

async fn fetch_vnc_connection(
    backend: &dyn ProvisioningBackend,
    domain: &Domain,
) -> Result<serde_json::Map<String, serde_json::Value>, provisioning::RemoteError> {
    let mut params = Params::new();
    params.insert("id".to_string(), domain.id().to_string());
    let response = backend.perform(ENABLE_VNC, &params).await?;
    Ok(match response {
        serde_json::Value::Object(map) => map,
        _ => serde_json::Map::new(),
    })
}

/// Inline edit of the note. Everything else on the domain is kept.
pub async fn set_note(domains: &Domains, id: i64, note: &str) -> Result<NoteUpdated, CrudError> {
    let domain = find_model(domains, id).await?;
    let mut draft = domain.to_draft();
    draft.note = non_empty(note);
    if let Some(note) = &draft.note {
        if note.chars().count() > 255 {
            let mut errors = ValidationErrors::new();
            errors.add("note", "Note should contain at most 255 characters.");
            return Err(CrudError::Invalid(errors));
        }
    }
    let updated = domains
        .update(id, &draft)
        .await?
        .ok_or_else(|| CrudError::not_found::<Domain>(id))?;
    Ok(NoteUpdated {
        id: updated.id,
        note: updated.note,
    })
}

/// Parses `ids=1,2,3`, skipping anything that is not an integer.
pub fn parse_ids(raw: &str) -> Vec<i64> {
    raw.split(',')
        .filter_map(|id| id.trim().parse().ok())
        .collect()
}

/// The listed domains that still have a request in flight.
pub async fn requests_state(
    domains: &Domains,
    ids: &[i64],
) -> Result<BTreeMap<i64, RequestState>, CrudError> {
    let found = domains.find_by_ids(ids).await?;
    Ok(found
        .into_iter()
        .filter(|domain| domain.state == DomainState::Pending)
        .map(|domain| {
            (
                domain.id.0,
                RequestState {
                    id: domain.id,
                    name: domain.name,
                    state: domain.state,
                },
            )
        })
        .collect())
}

#[cfg(test)]
#[path = "tests/domain_tests.rs"]
mod tests;
