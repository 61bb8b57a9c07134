use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::domain::{
    split_nameservers, Contacts, Domain, DomainDraft, DomainFlag, DomainId, DomainState,
};
use sqlx::{sqlite::SqliteRow, Pool, Row, Sqlite};

use crate::{
    query::{count_rows, fetch_rows, Query},
    repository::{map_unique, Repository},
};

macro_rules! domain_columns {
    () => {
        "id, name, state, note, nameservers, registrant, admin_contact, tech_contact, \
         billing_contact, autorenewal, whois_protected, transfer_lock, expires, \
         vnc_enabled_at, created_at"
    };
}

const TABLE: &str = "domains";
const COLUMNS: &str = domain_columns!();

#[derive(Clone)]
pub struct Domains {
    pool: Pool<Sqlite>,
}

impl Domains {
    pub(crate) fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    pub async fn find_by_name(&self, name: &str) -> Result<Option<Domain>> {
        let row = sqlx::query(concat!(
            "SELECT ",
            domain_columns!(),
            " FROM domains WHERE name = ?"
        ))
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(domain_from_row).transpose()
    }

    pub async fn set_state(&self, id: DomainId, state: DomainState) -> Result<bool> {
        let done = sqlx::query("UPDATE domains SET state = ? WHERE id = ?")
            .bind(state.as_str())
            .bind(id.0)
            .execute(&self.pool)
            .await?;
        Ok(done.rows_affected() > 0)
    }

    pub async fn set_flag(&self, id: DomainId, flag: DomainFlag, value: bool) -> Result<bool> {
        let sql = format!("UPDATE domains SET {} = ? WHERE id = ?", flag.column());
        let done = sqlx::query(&sql)
            .bind(value)
            .bind(id.0)
            .execute(&self.pool)
            .await?;
        Ok(done.rows_affected() > 0)
    }

    pub async fn set_nameservers(&self, id: DomainId, nameservers: &[String]) -> Result<bool> {
        let done = sqlx::query("UPDATE domains SET nameservers = ? WHERE id = ?")
            .bind(nameservers.join(","))
            .bind(id.0)
            .execute(&self.pool)
            .await?;
        Ok(done.rows_affected() > 0)
    }

    pub async fn set_contacts(&self, id: DomainId, contacts: &Contacts) -> Result<bool> {
        let done = sqlx::query(
            "UPDATE domains
             SET registrant = ?, admin_contact = ?, tech_contact = ?, billing_contact = ?
             WHERE id = ?",
        )
        .bind(contacts.registrant.as_deref())
        .bind(contacts.admin.as_deref())
        .bind(contacts.tech.as_deref())
        .bind(contacts.billing.as_deref())
        .bind(id.0)
        .execute(&self.pool)
        .await?;
        Ok(done.rows_affected() > 0)
    }

    pub async fn mark_vnc_enabled(&self, id: DomainId, at: DateTime<Utc>) -> Result<bool> {
        let done = sqlx::query("UPDATE domains SET vnc_enabled_at = ? WHERE id = ?")
            .bind(at)
            .bind(id.0)
            .execute(&self.pool)
            .await?;
        Ok(done.rows_affected() > 0)
    }

    pub async fn find_by_ids(&self, ids: &[i64]) -> Result<Vec<Domain>> {
        let query = Query::new().and_where_in("id", ids.to_vec());
        self.find_all(&query).await
    }
}

#[async_trait]
impl Repository for Domains {
    type Record = Domain;

    async fn find_by_id(&self, id: i64) -> Result<Option<Domain>> {
        let row = sqlx::query(concat!(
            "SELECT ",
            domain_columns!(),
            " FROM domains WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(domain_from_row).transpose()
    }

    async fn find_all(&self, query: &Query) -> Result<Vec<Domain>> {
        fetch_rows(&self.pool, TABLE, COLUMNS, query, domain_from_row).await
    }

    async fn count(&self, query: &Query) -> Result<u64> {
        count_rows(&self.pool, TABLE, query).await
    }

    async fn insert(&self, draft: &DomainDraft) -> Result<Domain> {
        let row = sqlx::query(concat!(
            "INSERT INTO domains (name, state, note, nameservers, registrant, admin_contact,
                                  tech_contact, billing_contact, autorenewal, whois_protected,
                                  transfer_lock, expires, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             RETURNING ",
            domain_columns!()
        ))
        .bind(&draft.name)
        .bind(draft.state.as_str())
        .bind(draft.note.as_deref())
        .bind(draft.nameservers.join(","))
        .bind(draft.contacts.registrant.as_deref())
        .bind(draft.contacts.admin.as_deref())
        .bind(draft.contacts.tech.as_deref())
        .bind(draft.contacts.billing.as_deref())
        .bind(draft.autorenewal)
        .bind(draft.whois_protected)
        .bind(draft.transfer_lock)
        .bind(draft.expires)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_unique(e, "name"))?;
        domain_from_row(&row)
    }

    async fn update(&self, id: i64, draft: &DomainDraft) -> Result<Option<Domain>> {
        let row = sqlx::query(concat!(
            "UPDATE domains
             SET name = ?, state = ?, note = ?, nameservers = ?, registrant = ?,
                 admin_contact = ?, tech_contact = ?, billing_contact = ?, autorenewal = ?,
                 whois_protected = ?, transfer_lock = ?, expires = ?
             WHERE id = ?
             RETURNING ",
            domain_columns!()
        ))
        .bind(&draft.name)
        .bind(draft.state.as_str())
        .bind(draft.note.as_deref())
        .bind(draft.nameservers.join(","))
        .bind(draft.contacts.registrant.as_deref())
        .bind(draft.contacts.admin.as_deref())
        .bind(draft.contacts.tech.as_deref())
        .bind(draft.contacts.billing.as_deref())
        .bind(draft.autorenewal)
        .bind(draft.whois_protected)
        .bind(draft.transfer_lock)
        .bind(draft.expires)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_unique(e, "name"))?;
        row.as_ref().map(domain_from_row).transpose()
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let done = sqlx::query("DELETE FROM domains WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(done.rows_affected() > 0)
    }
}

fn domain_from_row(row: &SqliteRow) -> Result<Domain> {
    let state: String = row.try_get("state")?;
    let nameservers: String = row.try_get("nameservers")?;
    Ok(Domain {
        id: DomainId(row.try_get("id")?),
        name: row.try_get("name")?,
        state: state
            .parse()
            .map_err(|e: String| anyhow!("corrupt domains.state: {e}"))?,
        note: row.try_get("note")?,
        nameservers: split_nameservers(&nameservers),
        contacts: Contacts {
            registrant: row.try_get("registrant")?,
            admin: row.try_get("admin_contact")?,
            tech: row.try_get("tech_contact")?,
            billing: row.try_get("billing_contact")?,
        },
        autorenewal: row.try_get("autorenewal")?,
        whois_protected: row.try_get("whois_protected")?,
        transfer_lock: row.try_get("transfer_lock")?,
        expires: row.try_get("expires")?,
        vnc_enabled_at: row.try_get("vnc_enabled_at")?,
        created_at: row.try_get("created_at")?,
    })
}
