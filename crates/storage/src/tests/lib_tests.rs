use super::*;
use chrono::{Duration, Utc};
use shared::{
    content::ThreadDraft,
    domain::{Contacts, DomainDraft, DomainFlag, DomainId, DomainState},
    model::Entity,
};

fn domain_draft(name: &str) -> DomainDraft {
    DomainDraft {
        name: name.to_string(),
        nameservers: vec!["ns1.example.net".into(), "ns2.example.net".into()],
        ..DomainDraft::default()
    }
}

#[tokio::test]
async fn health_check_succeeds_for_live_pool() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage.health_check().await.expect("health check");
}

#[tokio::test]
async fn creates_database_file_when_missing() {
    let temp_root = tempfile::tempdir().expect("tempdir");
    let db_path = temp_root.path().join("nested").join("panel.db");
    let database_url = format!("sqlite://{}", db_path.to_string_lossy().replace('\\', "/"));

    let storage = Storage::new(&database_url).await.expect("db");
    drop(storage);

    assert!(
        db_path.exists(),
        "database file should exist: {}",
        db_path.display()
    );
}

#[tokio::test]
async fn inserts_and_loads_domain() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let domains = storage.domains();
    let created = domains
        .insert(&domain_draft("example.com"))
        .await
        .expect("insert");

    let loaded = domains
        .find_by_id(created.id.0)
        .await
        .expect("load")
        .expect("some domain");
    assert_eq!(loaded, created);
    assert_eq!(loaded.nameservers.len(), 2);
    assert_eq!(loaded.state, DomainState::Ok);
}

#[tokio::test]
async fn duplicate_domain_name_is_a_conflict() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let domains = storage.domains();
    domains
        .insert(&domain_draft("example.com"))
        .await
        .expect("first insert");

    let err = domains
        .insert(&domain_draft("example.com"))
        .await
        .expect_err("duplicate");
    let conflict = err.downcast_ref::<Conflict>().expect("conflict error");
    assert_eq!(conflict.field, "name");
}

#[tokio::test]
async fn update_and_delete_report_missing_rows() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let domains = storage.domains();
    let updated = domains
        .update(404, &domain_draft("missing.com"))
        .await
        .expect("update");
    assert!(updated.is_none());
    assert!(!domains.delete(404).await.expect("delete"));
}

#[tokio::test]
async fn unchanged_update_leaves_row_identical() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let domains = storage.domains();
    let created = domains
        .insert(&domain_draft("example.org"))
        .await
        .expect("insert");

    let updated = domains
        .update(created.id.0, &created.to_draft())
        .await
        .expect("update")
        .expect("row");
    assert_eq!(updated, created);
}

#[tokio::test]
async fn filters_counts_and_pages_domains() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let domains = storage.domains();
    for name in ["alpha.com", "beta.com", "alpha.net", "gamma.org"] {
        domains.insert(&domain_draft(name)).await.expect("insert");
    }

    let query = Query::new()
        .and_filter_like("name", Some("alpha"))
        .order_by("name", Direction::Asc);
    assert_eq!(domains.count(&query).await.expect("count"), 2);
    let rows = domains.find_all(&query).await.expect("rows");
    let names: Vec<_> = rows.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(names, vec!["alpha.com", "alpha.net"]);

    let second_page = Query::new()
        .order_by("id", Direction::Asc)
        .limit(2)
        .offset(2);
    let rows = domains.find_all(&second_page).await.expect("rows");
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].name, "alpha.net");
}

#[tokio::test]
async fn like_filter_treats_percent_literally() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let domains = storage.domains();
    domains.insert(&domain_draft("plain.com")).await.expect("insert");

    let query = Query::new().and_filter_like("name", Some("%"));
    assert_eq!(domains.count(&query).await.expect("count"), 0);
}

#[tokio::test]
async fn flag_contact_and_vnc_updates_persist() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let domains = storage.domains();
    let created = domains
        .insert(&domain_draft("flags.com"))
        .await
        .expect("insert");
    let id = created.id;
    let now = Utc::now();

    assert!(domains
        .set_flag(id, DomainFlag::TransferLock, true)
        .await
        .expect("flag"));
    assert!(domains
        .set_contacts(
            id,
            &Contacts {
                registrant: Some("REG-1".into()),
                ..Contacts::default()
            },
        )
        .await
        .expect("contacts"));
    assert!(domains.mark_vnc_enabled(id, now).await.expect("vnc"));
    assert!(!domains
        .set_flag(DomainId(999), DomainFlag::Autorenewal, true)
        .await
        .expect("missing flag"));

    let loaded = domains.find_by_id(id.0).await.expect("load").expect("row");
    assert!(loaded.transfer_lock);
    assert_eq!(loaded.contacts.registrant.as_deref(), Some("REG-1"));
    assert_eq!(loaded.vnc_enabled_at, Some(now));
}

#[tokio::test]
async fn find_by_ids_returns_only_listed_domains() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let domains = storage.domains();
    let a = domains.insert(&domain_draft("a.com")).await.expect("a");
    let _b = domains.insert(&domain_draft("b.com")).await.expect("b");
    let c = domains.insert(&domain_draft("c.com")).await.expect("c");

    let found = domains
        .find_by_ids(&[a.id.0, c.id.0])
        .await
        .expect("find");
    assert_eq!(found.len(), 2);
    assert!(domains.find_by_ids(&[]).await.expect("empty").is_empty());
}

#[tokio::test]
async fn thread_created_at_window_filters() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let threads = storage.threads();
    threads
        .insert(&ThreadDraft {
            subject: "Disk quota".into(),
            author_id: Some(3),
            ..ThreadDraft::default()
        })
        .await
        .expect("insert");

    let past = Utc::now() - Duration::hours(1);
    let future = Utc::now() + Duration::hours(1);
    let inside = Query::new()
        .and_filter_gte("created_at", Some(past))
        .and_filter_lte("created_at", Some(future));
    assert_eq!(threads.count(&inside).await.expect("count"), 1);

    let after = Query::new().and_filter_gte("created_at", Some(future));
    assert_eq!(threads.count(&after).await.expect("count"), 0);
}

#[tokio::test]
async fn registers_and_loads_files() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let files = storage.files();
    let file_id = files
        .register(NewFile {
            object_id: Some(42),
            object_name: Some("thread"),
            filename: "log.txt",
            mime_type: None,
            path: "thread/42/log.txt",
            size_bytes: 12,
        })
        .await
        .expect("register");

    let stored = files.load(file_id).await.expect("load").expect("row");
    assert_eq!(stored.object_id, Some(42));
    assert_eq!(stored.path, "thread/42/log.txt");
    assert_eq!(stored.size_bytes, 12);
}
