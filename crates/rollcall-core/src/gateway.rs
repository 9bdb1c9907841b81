//! Guest mutations.
//!
//! Every mutation commits to the local store first and then mirrors the full
//! record to the remote collection. A failed remote write stays local; the next
//! sync pushes it again.

use std::fmt;

use crate::db::LocalStore;
use crate::error::{Error, Result};
use crate::models::GuestRecord;
use crate::remote::RemoteStore;

/// What happened to the remote half of a mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteWrite {
    Committed,
    Failed(String),
}

/// A mutation that reached the local store.
#[derive(Debug, Clone)]
pub struct Mutation {
    /// The record as stored locally (normalized id)
    pub record: GuestRecord,
    pub remote: RemoteWrite,
}

impl Mutation {
    pub const fn is_synced(&self) -> bool {
        matches!(self.remote, RemoteWrite::Committed)
    }

    /// Short status line for users.
    pub fn status(&self) -> String {
        match &self.remote {
            RemoteWrite::Committed => format!("Saved {}", self.record.name),
            RemoteWrite::Failed(reason) => {
                format!("Saved {} locally; remote write failed: {reason}", self.record.name)
            }
        }
    }
}

impl fmt::Display for Mutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.status())
    }
}

/// Entry point for add, update and delete.
pub struct MutationGateway<'a, L, R> {
    local: &'a L,
    remote: &'a R,
}

impl<'a, L: LocalStore, R: RemoteStore> MutationGateway<'a, L, R> {
    pub fn new(local: &'a L, remote: &'a R) -> Self {
        Self { local, remote }
    }

    /// Create a guest. Fails with `Conflict` when the id is already stored,
    /// tombstone or not.
    pub async fn add(&self, guest: &GuestRecord) -> Result<Mutation> {
        guest.validate()?;
        let record = GuestRecord {
            deleted: false,
            ..guest.normalized()
        };

        if self.local.get_by_id(&record.id).await?.is_some() {
            return Err(Error::Conflict(record.name));
        }

        tracing::debug!("Adding guest {}", record.id);
        self.write(record).await
    }

    /// Overwrite a guest with the given fields.
    pub async fn update(&self, guest: &GuestRecord) -> Result<Mutation> {
        guest.validate()?;
        tracing::debug!("Updating guest {}", guest.normalized().id);
        self.write(guest.normalized()).await
    }

    /// Mark a guest deleted. The row stays as a tombstone until a sync
    /// observes it remotely.
    pub async fn delete(&self, guest: &GuestRecord) -> Result<Mutation> {
        guest.validate()?;
        let record = guest.normalized().tombstoned();
        tracing::debug!("Deleting guest {}", record.id);
        self.write(record).await
    }

    async fn write(&self, record: GuestRecord) -> Result<Mutation> {
        self.local.upsert(&record).await?;

        let remote = match self.remote.upsert(&record).await {
            Ok(()) => RemoteWrite::Committed,
            Err(error) => {
                tracing::warn!("Remote write for {} failed: {error}", record.id);
                RemoteWrite::Failed(error.to_string())
            }
        };
        Ok(Mutation { record, remote })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Database, LibSqlGuestStore};
    use crate::models::GuestId;
    use crate::remote::MemoryCollection;
    use pretty_assertions::assert_eq;

    async fn setup() -> Database {
        Database::open_in_memory().await.unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn add_then_get_returns_same_fields() {
        let db = setup().await;
        let local = LibSqlGuestStore::new(db.connection());
        let remote = MemoryCollection::new();
        let gateway = MutationGateway::new(&local, &remote);

        let mut guest = GuestRecord::new("Alice Smith", "a@x.com", "555-1", "Acme")
            .with_category("Speaker");
        guest.has_gift = true;
        guest.remarks = Some("vegetarian".into());

        let mutation = gateway.add(&guest).await.unwrap();
        assert!(mutation.is_synced());
        assert_eq!(mutation.record.id.as_str(), "alice smith");

        let stored = local
            .get_by_id(&GuestId::from_raw("alice smith"))
            .await
            .unwrap()
            .unwrap();
        assert!(stored.fields_match(&guest));
        assert!(!stored.deleted);
        assert!(remote.document(&stored.id).unwrap().fields_match(&stored));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn add_normalizes_id_from_name() {
        let db = setup().await;
        let local = LibSqlGuestStore::new(db.connection());
        let remote = MemoryCollection::new();
        let gateway = MutationGateway::new(&local, &remote);

        let mut guest = GuestRecord::new("  Bob ", "", "", "");
        guest.id = GuestId::from_raw("something-else");
        guest.deleted = true;

        let mutation = gateway.add(&guest).await.unwrap();
        assert_eq!(mutation.record.id.as_str(), "bob");
        assert!(!mutation.record.deleted);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn blank_name_is_rejected_without_io() {
        let db = setup().await;
        let local = LibSqlGuestStore::new(db.connection());
        let remote = MemoryCollection::new();
        remote.set_offline(true);
        let gateway = MutationGateway::new(&local, &remote);

        let guest = GuestRecord::new("   ", "a@x.com", "", "");
        assert!(matches!(
            gateway.add(&guest).await,
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            gateway.update(&guest).await,
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            gateway.delete(&guest).await,
            Err(Error::Validation(_))
        ));
        assert!(local.get_all_including_deleted().await.unwrap().is_empty());
        assert_eq!(remote.commit_count(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn duplicate_add_conflicts_even_against_tombstone() {
        let db = setup().await;
        let local = LibSqlGuestStore::new(db.connection());
        let remote = MemoryCollection::new();
        let gateway = MutationGateway::new(&local, &remote);

        let guest = GuestRecord::new("alice", "", "", "");
        gateway.add(&guest).await.unwrap();
        assert!(matches!(gateway.add(&guest).await, Err(Error::Conflict(_))));

        gateway.delete(&guest).await.unwrap();
        let result = gateway.add(&GuestRecord::new("ALICE", "", "", "")).await;
        assert!(matches!(result, Err(Error::Conflict(_))));
        assert_eq!(remote.commit_count(), 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn delete_only_tombstones() {
        let db = setup().await;
        let local = LibSqlGuestStore::new(db.connection());
        let remote = MemoryCollection::new();
        let gateway = MutationGateway::new(&local, &remote);

        let guest = GuestRecord::new("alice", "a@x.com", "", "");
        gateway.add(&guest).await.unwrap();
        gateway.delete(&guest).await.unwrap();

        let id = GuestId::from_raw("alice");
        let stored = local.get_by_id(&id).await.unwrap().unwrap();
        assert!(stored.deleted);
        assert_eq!(stored.email, "a@x.com");
        assert!(local.get_all().await.unwrap().is_empty());
        assert!(remote.document(&id).unwrap().deleted);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn update_overwrites_fields() {
        let db = setup().await;
        let local = LibSqlGuestStore::new(db.connection());
        let remote = MemoryCollection::new();
        let gateway = MutationGateway::new(&local, &remote);

        let guest = GuestRecord::new("alice", "", "", "");
        gateway.add(&guest).await.unwrap();

        let mut checked_in = guest.clone();
        checked_in.attending = true;
        checked_in.has_lanyard = true;
        gateway.update(&checked_in).await.unwrap();

        let stored = local.get_by_id(&guest.id).await.unwrap().unwrap();
        assert!(stored.attending);
        assert!(stored.has_lanyard);
        assert!(remote.document(&guest.id).unwrap().attending);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn remote_failure_keeps_local_write() {
        let db = setup().await;
        let local = LibSqlGuestStore::new(db.connection());
        let remote = MemoryCollection::new();
        remote.set_offline(true);
        let gateway = MutationGateway::new(&local, &remote);

        let mutation = gateway
            .add(&GuestRecord::new("alice", "", "", ""))
            .await
            .unwrap();
        assert!(!mutation.is_synced());
        assert!(mutation.status().contains("remote write failed"));
        assert!(local
            .get_by_id(&GuestId::from_raw("alice"))
            .await
            .unwrap()
            .is_some());
        assert!(remote.is_empty());
    }
}
