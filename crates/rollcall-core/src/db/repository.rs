//! Local guest store

use libsql::{Connection, Value};
use tokio::sync::watch;

use crate::error::Result;
use crate::models::{GuestId, GuestRecord};

/// Durable local CRUD the sync engine and mutation gateway depend on.
///
/// Each individual `upsert`/`delete` must be atomic; no cross-call guarantees.
#[allow(async_fn_in_trait)]
pub trait LocalStore {
    /// All live guests (tombstones excluded), ordered by name
    async fn get_all(&self) -> Result<Vec<GuestRecord>>;

    /// Every stored guest, tombstones included
    async fn get_all_including_deleted(&self) -> Result<Vec<GuestRecord>>;

    /// Look up a guest by id, tombstoned or not
    async fn get_by_id(&self, id: &GuestId) -> Result<Option<GuestRecord>>;

    /// Insert or replace the row keyed by `record.id`
    async fn upsert(&self, record: &GuestRecord) -> Result<()>;

    /// Physically remove a row; returns whether one existed
    async fn delete(&self, id: &GuestId) -> Result<bool>;

    /// Remove every row
    async fn clear(&self) -> Result<()>;

    /// Revision counter bumped after every write
    fn changes(&self) -> watch::Receiver<u64>;
}

const SELECT_COLUMNS: &str = "SELECT id, name, email, phone_number, company_name, attending, has_lanyard, has_gift, has_food_coupon, remarks, payment_mode, amount, category, deleted FROM guests";

/// libSQL implementation of `LocalStore`
pub struct LibSqlGuestStore<'a> {
    conn: &'a Connection,
    revision: watch::Sender<u64>,
}

impl<'a> LibSqlGuestStore<'a> {
    /// Create a new store with the given connection
    pub fn new(conn: &'a Connection) -> Self {
        let (revision, _) = watch::channel(0);
        Self { conn, revision }
    }

    fn bump_revision(&self) {
        self.revision.send_modify(|revision| *revision += 1);
    }

    async fn query_guests(&self, sql: &str) -> Result<Vec<GuestRecord>> {
        let mut rows = self.conn.query(sql, ()).await?;
        let mut guests = Vec::new();
        while let Some(row) = rows.next().await? {
            guests.push(Self::parse_guest(&row)?);
        }
        Ok(guests)
    }

    /// Parse a guest from a database row
    fn parse_guest(row: &libsql::Row) -> Result<GuestRecord> {
        Ok(GuestRecord {
            id: GuestId::from_raw(row.get::<String>(0)?),
            name: row.get(1)?,
            email: row.get(2)?,
            phone_number: row.get(3)?,
            company_name: row.get(4)?,
            attending: row.get::<i32>(5)? != 0,
            has_lanyard: row.get::<i32>(6)? != 0,
            has_gift: row.get::<i32>(7)? != 0,
            has_food_coupon: row.get::<i32>(8)? != 0,
            remarks: row.get(9)?,
            payment_mode: row.get(10)?,
            amount: row.get(11)?,
            category: row.get(12)?,
            deleted: row.get::<i32>(13)? != 0,
        })
    }
}

fn text(value: &str) -> Value {
    Value::Text(value.to_string())
}

fn optional_text(value: Option<&String>) -> Value {
    value.map_or(Value::Null, |value| Value::Text(value.clone()))
}

fn flag(value: bool) -> Value {
    Value::Integer(i64::from(value))
}

impl LocalStore for LibSqlGuestStore<'_> {
    async fn get_all(&self) -> Result<Vec<GuestRecord>> {
        self.query_guests(&format!(
            "{SELECT_COLUMNS} WHERE deleted = 0 ORDER BY name COLLATE NOCASE, id"
        ))
        .await
    }

    async fn get_all_including_deleted(&self) -> Result<Vec<GuestRecord>> {
        self.query_guests(&format!("{SELECT_COLUMNS} ORDER BY id"))
            .await
    }

    async fn get_by_id(&self, id: &GuestId) -> Result<Option<GuestRecord>> {
        let mut rows = self
            .conn
            .query(&format!("{SELECT_COLUMNS} WHERE id = ? LIMIT 1"), [id.as_str()])
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Self::parse_guest(&row)?)),
            None => Ok(None),
        }
    }

    async fn upsert(&self, record: &GuestRecord) -> Result<()> {
        let params = vec![
            text(record.id.as_str()),
            text(&record.name),
            text(&record.email),
            text(&record.phone_number),
            text(&record.company_name),
            flag(record.attending),
            flag(record.has_lanyard),
            flag(record.has_gift),
            flag(record.has_food_coupon),
            optional_text(record.remarks.as_ref()),
            optional_text(record.payment_mode.as_ref()),
            optional_text(record.amount.as_ref()),
            optional_text(record.category.as_ref()),
            flag(record.deleted),
        ];

        self.conn
            .execute(
                "INSERT OR REPLACE INTO guests (
                    id, name, email, phone_number, company_name,
                    attending, has_lanyard, has_gift, has_food_coupon,
                    remarks, payment_mode, amount, category, deleted
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                params,
            )
            .await?;

        self.bump_revision();
        Ok(())
    }

    async fn delete(&self, id: &GuestId) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM guests WHERE id = ?", [id.as_str()])
            .await?;

        if rows > 0 {
            self.bump_revision();
        }
        Ok(rows > 0)
    }

    async fn clear(&self) -> Result<()> {
        self.conn.execute("DELETE FROM guests", ()).await?;
        self.bump_revision();
        Ok(())
    }

    fn changes(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use pretty_assertions::assert_eq;

    async fn setup() -> Database {
        Database::open_in_memory().await.unwrap()
    }

    fn alice() -> GuestRecord {
        let mut guest = GuestRecord::new("Alice", "a@x.com", "555-1", "Acme");
        guest.remarks = Some("vegetarian".into());
        guest.amount = Some("1500".into());
        guest.payment_mode = Some("UPI".into());
        guest.has_gift = true;
        guest
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_upsert_and_get() {
        let db = setup().await;
        let store = LibSqlGuestStore::new(db.connection());

        let guest = alice();
        store.upsert(&guest).await.unwrap();

        let fetched = store.get_by_id(&guest.id).await.unwrap().unwrap();
        assert!(fetched.fields_match(&guest));
        assert_eq!(fetched.remarks.as_deref(), Some("vegetarian"));
        assert_eq!(fetched.category, None);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_upsert_replaces_existing_row() {
        let db = setup().await;
        let store = LibSqlGuestStore::new(db.connection());

        let guest = alice();
        store.upsert(&guest).await.unwrap();

        let mut edited = guest.clone();
        edited.attending = true;
        edited.remarks = None;
        store.upsert(&edited).await.unwrap();

        let all = store.get_all_including_deleted().await.unwrap();
        assert_eq!(all.len(), 1);
        assert!(all[0].fields_match(&edited));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_get_all_excludes_tombstones_and_sorts_by_name() {
        let db = setup().await;
        let store = LibSqlGuestStore::new(db.connection());

        store
            .upsert(&GuestRecord::new("zoe", "", "", ""))
            .await
            .unwrap();
        store
            .upsert(&GuestRecord::new("Bob", "", "", ""))
            .await
            .unwrap();
        store.upsert(&alice().tombstoned()).await.unwrap();

        let live = store.get_all().await.unwrap();
        let names: Vec<_> = live.iter().map(|guest| guest.name.as_str()).collect();
        assert_eq!(names, vec!["Bob", "zoe"]);

        let everything = store.get_all_including_deleted().await.unwrap();
        assert_eq!(everything.len(), 3);

        // Tombstones remain reachable by id
        let tombstone = store.get_by_id(&alice().id).await.unwrap().unwrap();
        assert!(tombstone.deleted);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_delete_and_clear() {
        let db = setup().await;
        let store = LibSqlGuestStore::new(db.connection());

        store.upsert(&alice()).await.unwrap();
        store
            .upsert(&GuestRecord::new("Bob", "", "", ""))
            .await
            .unwrap();

        assert!(store.delete(&alice().id).await.unwrap());
        assert!(!store.delete(&alice().id).await.unwrap());
        assert!(store.get_by_id(&alice().id).await.unwrap().is_none());

        store.clear().await.unwrap();
        assert!(store.get_all_including_deleted().await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_changes_tracks_writes() {
        let db = setup().await;
        let store = LibSqlGuestStore::new(db.connection());
        let changes = store.changes();
        assert_eq!(*changes.borrow(), 0);

        store.upsert(&alice()).await.unwrap();
        assert_eq!(*changes.borrow(), 1);

        // Deleting a missing row is not a change
        store
            .delete(&GuestId::from_raw("nobody"))
            .await
            .unwrap();
        assert_eq!(*changes.borrow(), 1);

        store.clear().await.unwrap();
        assert_eq!(*changes.borrow(), 2);
    }
}
