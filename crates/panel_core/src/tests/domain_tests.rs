use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use provisioning::RecordingBackend;
use serde_json::json;
use shared::domain::{Contacts, DomainDraft, DomainState};
use storage::Storage;

use super::*;

fn params(pairs: &[(&str, &str)]) -> Params {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

async fn setup() -> Domains {
    Storage::new("sqlite::memory:")
        .await
        .expect("storage")
        .domains()
}

async fn add_domain(domains: &Domains, name: &str, state: DomainState) -> Domain {
    domains
        .insert(&DomainDraft {
            name: name.into(),
            state,
            ..DomainDraft::default()
        })
        .await
        .expect("insert")
}

fn action_for(route: &str) -> &'static DomainAction {
    find_action(route).expect("known route")
}

#[test]
fn toggles_and_edits_are_post_only() {
    for route in [
        "set-note",
        "set-nss",
        "set-contacts",
        "enable-lock",
        "disable-whois-protect",
        "enable-autorenewal",
    ] {
        assert!(is_post_only(route), "{route}");
    }
    for route in ["reboot", "boot-live", "enable-vnc", "index"] {
        assert!(!is_post_only(route), "{route}");
    }
}

#[test]
fn every_route_is_unique() {
    let mut routes: Vec<_> = DOMAIN_ACTIONS.iter().map(|a| a.spec.route).collect();
    routes.sort_unstable();
    routes.dedup();
    assert_eq!(routes.len(), DOMAIN_ACTIONS.len());
}

#[tokio::test]
async fn reboot_calls_backend_with_the_id_only() {
    let domains = setup().await;
    let domain = add_domain(&domains, "example.com", DomainState::Ok).await;
    let backend = RecordingBackend::new();

    let dispatched = perform_action(
        &domains,
        &backend,
        &Translator::default(),
        action_for("reboot"),
        domain.id.0,
        &params(&[("force", "1")]),
    )
    .await
    .expect("reboot");

    assert!(dispatched.succeeded());
    assert_eq!(
        dispatched.notification.text,
        "Reboot task has been successfully added to queue"
    );
    let calls = backend.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].action, "Reboot");
    assert_eq!(calls[0].params, params(&[("id", &domain.id.0.to_string())]));
}

#[tokio::test]
async fn lock_toggle_is_persisted_after_success() {
    let domains = setup().await;
    let domain = add_domain(&domains, "example.com", DomainState::Ok).await;
    let backend = RecordingBackend::new();

    let dispatched = perform_action(
        &domains,
        &backend,
        &Translator::default(),
        action_for("enable-lock"),
        domain.id.0,
        &Params::new(),
    )
    .await
    .expect("enable lock");

    assert!(dispatched.record.transfer_lock);
    let stored = domains.find_by_id(domain.id.0).await.expect("load").expect("row");
    assert!(stored.transfer_lock);
}

#[tokio::test]
async fn rejected_toggle_leaves_the_row_alone() {
    let domains = setup().await;
    let domain = add_domain(&domains, "example.com", DomainState::Ok).await;
    let backend = RecordingBackend::new().fail_on("EnableAutorenewal", "registry timeout");

    let dispatched = perform_action(
        &domains,
        &backend,
        &Translator::default(),
        action_for("enable-autorenewal"),
        domain.id.0,
        &Params::new(),
    )
    .await
    .expect("dispatch");

    let notification = dispatched.into_outcome().expect_err("rejected");
    assert_eq!(notification.text, "registry timeout");
    let stored = domains.find_by_id(domain.id.0).await.expect("load").expect("row");
    assert!(!stored.autorenewal);
}

#[tokio::test]
async fn nameservers_are_normalised_forwarded_and_stored() {
    let domains = setup().await;
    let domain = add_domain(&domains, "example.com", DomainState::Ok).await;
    let backend = RecordingBackend::new();

    perform_action(
        &domains,
        &backend,
        &Translator::default(),
        action_for("set-nss"),
        domain.id.0,
        &params(&[("nameservers", "NS1.example.net ns2.example.net")]),
    )
    .await
    .expect("set nss");

    assert_eq!(
        backend.calls()[0].params.get("nameservers").map(String::as_str),
        Some("ns1.example.net,ns2.example.net")
    );
    let stored = domains.find_by_id(domain.id.0).await.expect("load").expect("row");
    assert_eq!(stored.nameservers, vec!["ns1.example.net", "ns2.example.net"]);
}

#[tokio::test]
async fn invalid_nameservers_are_flashed_without_a_backend_call() {
    let domains = setup().await;
    let domain = add_domain(&domains, "example.com", DomainState::Ok).await;
    let backend = RecordingBackend::new();

    let dispatched = perform_action(
        &domains,
        &backend,
        &Translator::default(),
        action_for("set-nss"),
        domain.id.0,
        &params(&[("nameservers", "ns1.example.net bad_host")]),
    )
    .await
    .expect("dispatch");

    let notification = dispatched.into_outcome().expect_err("invalid");
    assert_eq!(notification.title.as_deref(), Some("example.com"));
    assert!(notification.text.contains("bad_host"), "{}", notification.text);
    assert!(backend.calls().is_empty());
}

#[tokio::test]
async fn invalid_nameservers_on_unknown_domain_are_not_found() {
    let domains = setup().await;
    let err = perform_action(
        &domains,
        &RecordingBackend::new(),
        &Translator::default(),
        action_for("set-nss"),
        9999,
        &params(&[("nameservers", "not a host!!")]),
    )
    .await
    .expect_err("absent");
    assert!(matches!(err, CrudError::NotFound { kind: "domain", id: 9999 }));
}

/// Accepts every action, then shuts the pool so the local write fails.
struct ClosingBackend {
    storage: Storage,
}

#[async_trait]
impl ProvisioningBackend for ClosingBackend {
    async fn perform(
        &self,
        _action: &str,
        _params: &Params,
    ) -> Result<provisioning::RemoteResponse, provisioning::RemoteError> {
        self.storage.pool().close().await;
        Ok(json!({}))
    }
}

#[tokio::test]
async fn failed_local_write_still_reports_the_queued_action() {
    let storage = Storage::new("sqlite::memory:").await.expect("storage");
    let domains = storage.domains();
    let domain = add_domain(&domains, "example.com", DomainState::Ok).await;
    let backend = ClosingBackend { storage };

    let dispatched = perform_action(
        &domains,
        &backend,
        &Translator::default(),
        action_for("enable-lock"),
        domain.id.0,
        &Params::new(),
    )
    .await
    .expect("dispatch");

    let notification = dispatched.into_outcome().expect("queued");
    assert!(notification
        .text
        .starts_with("Transfer lock has been enabled"));
    assert!(notification
        .text
        .ends_with("The local record could not be updated."));
}

#[tokio::test]
async fn contacts_keep_handles_that_were_not_submitted() {
    let domains = setup().await;
    let domain = add_domain(&domains, "example.com", DomainState::Ok).await;
    domains
        .set_contacts(
            domain.id,
            &Contacts {
                registrant: Some("REG-1".into()),
                admin: Some("ADM-1".into()),
                tech: None,
                billing: None,
            },
        )
        .await
        .expect("seed contacts");

    let dispatched = perform_action(
        &domains,
        &RecordingBackend::new(),
        &Translator::default(),
        action_for("set-contacts"),
        domain.id.0,
        &params(&[("admin", "ADM-2"), ("tech", "TECH-1")]),
    )
    .await
    .expect("set contacts");

    assert_eq!(
        dispatched.record.contacts,
        Contacts {
            registrant: Some("REG-1".into()),
            admin: Some("ADM-2".into()),
            tech: Some("TECH-1".into()),
            billing: None,
        }
    );
}

#[tokio::test]
async fn vnc_window_closes_after_eight_hours() {
    let domains = setup().await;
    let mut domain = add_domain(&domains, "example.com", DomainState::Ok).await;
    let enabled_at = Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap();
    domain.vnc_enabled_at = Some(enabled_at);

    assert!(vnc_window_open(&domain, enabled_at + Duration::hours(8) - Duration::seconds(1)));
    assert!(!vnc_window_open(&domain, enabled_at + Duration::hours(8)));

    domain.vnc_enabled_at = None;
    assert!(!vnc_window_open(&domain, enabled_at));
}

#[tokio::test]
async fn vnc_info_fetches_details_only_while_open_and_operable() {
    let domains = setup().await;
    let mut domain = add_domain(&domains, "example.com", DomainState::Ok).await;
    let now = Utc::now();
    domain.vnc_enabled_at = Some(now - Duration::hours(1));
    let backend =
        RecordingBackend::new().respond_with(ENABLE_VNC, json!({"vnc_ip": "10.0.0.5", "vnc_port": 5901}));

    let info = vnc_info(&backend, &domain, now).await;
    assert!(info.enabled);
    assert_eq!(info.connection.get("vnc_port"), Some(&json!(5901)));
    assert_eq!(info.end_time, Some(now + Duration::hours(7)));

    domain.state = DomainState::Pending;
    let info = vnc_info(&backend, &domain, now).await;
    assert!(!info.enabled);
    assert_eq!(backend.calls().len(), 1);
}

#[tokio::test]
async fn enable_vnc_records_the_window_start() {
    let domains = setup().await;
    let domain = add_domain(&domains, "example.com", DomainState::Ok).await;
    let now = Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap();
    let backend = RecordingBackend::new().respond_with(ENABLE_VNC, json!({"vnc_port": 5902}));

    let (updated, info) = enable_vnc(&domains, &backend, &Translator::default(), domain.id.0, now)
        .await
        .expect("enable vnc");

    let info = info.expect("enabled");
    assert!(info.enabled);
    assert_eq!(info.end_time, Some(now + Duration::hours(8)));
    assert_eq!(updated.vnc_enabled_at, Some(now));
    let stored = domains.find_by_id(domain.id.0).await.expect("load").expect("row");
    assert_eq!(stored.vnc_enabled_at, Some(now));
}

#[tokio::test]
async fn enable_vnc_on_locked_domain_is_refused() {
    let domains = setup().await;
    let domain = add_domain(&domains, "example.com", DomainState::Locked).await;
    let backend = RecordingBackend::new();

    let (_, info) = enable_vnc(&domains, &backend, &Translator::default(), domain.id.0, Utc::now())
        .await
        .expect("enable vnc");

    let notification = info.expect_err("refused");
    assert_eq!(notification.title.as_deref(), Some("example.com"));
    assert_eq!(notification.text, "The domain is locked");
    assert!(backend.calls().is_empty());
}

#[tokio::test]
async fn set_note_changes_only_the_note() {
    let domains = setup().await;
    let domain = add_domain(&domains, "example.com", DomainState::Locked).await;

    let updated = set_note(&domains, domain.id.0, "  call before renewal ")
        .await
        .expect("set note");
    assert_eq!(updated.note.as_deref(), Some("call before renewal"));

    let stored = domains.find_by_id(domain.id.0).await.expect("load").expect("row");
    assert_eq!(stored.state, DomainState::Locked);

    let err = set_note(&domains, domain.id.0, &"x".repeat(300))
        .await
        .expect_err("too long");
    assert!(matches!(err, CrudError::Invalid(_)));
}

#[tokio::test]
async fn requests_state_lists_only_pending_domains() {
    let domains = setup().await;
    let pending = add_domain(&domains, "pending.com", DomainState::Pending).await;
    let ok = add_domain(&domains, "ok.com", DomainState::Ok).await;

    let states = requests_state(&domains, &[pending.id.0, ok.id.0, 404])
        .await
        .expect("requests state");

    assert_eq!(states.len(), 1);
    let state = &states[&pending.id.0];
    assert_eq!(state.name, "pending.com");
    assert_eq!(state.state, DomainState::Pending);
}

#[test]
fn ids_parameter_skips_garbage() {
    assert_eq!(parse_ids("1, 2,x,,3"), vec![1, 2, 3]);
    assert!(parse_ids("").is_empty());
}
