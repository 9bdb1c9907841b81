//! Guest sync engine.
//!
//! Reconciles the local store with the shared remote collection in two ways:
//!
//! - [`SyncEngine::sync_guests`]: one-shot snapshot, push, then reconcile.
//!   Local records win for ids that are live on both sides; remote tombstones
//!   win over live local rows, and remote-only records fill gaps.
//! - [`SyncEngine::run_realtime`]: standing subscription where every change
//!   delivered by the remote overwrites the local row.
//!
//! The engine keeps no state between runs, so every run is idempotent.

use std::collections::HashSet;
use std::fmt;
use std::future::Future;

use tokio::sync::watch;

use crate::db::LocalStore;
use crate::error::Result;
use crate::models::{GuestId, GuestRecord};
use crate::remote::RemoteStore;

/// Outcome of a one-shot sync as shown to users.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncStatus {
    Synced,
    Syncing,
    SyncFailed(String),
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Synced => f.write_str("Synced"),
            Self::Syncing => f.write_str("Syncing..."),
            Self::SyncFailed(reason) => write!(f, "Sync Failed: {reason}"),
        }
    }
}

/// Outcome of a collection wipe as shown to users.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResetStatus {
    Resetting,
    ResetSuccessful,
    ResetFailed(String),
}

impl fmt::Display for ResetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Resetting => f.write_str("Resetting..."),
            Self::ResetSuccessful => f.write_str("Reset Successful"),
            Self::ResetFailed(reason) => write!(f, "Reset Failed: {reason}"),
        }
    }
}

/// Counts from one `sync_guests` run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Local records written to the remote collection
    pub pushed: usize,
    /// Remote records missing locally and inserted
    pub inserted: usize,
    /// Local rows removed because the remote holds a tombstone
    pub purged: usize,
    /// Remote records left alone because a local copy exists
    pub unchanged: usize,
}

/// Counts from applying one realtime batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyReport {
    pub inserted: usize,
    pub updated: usize,
    pub purged: usize,
    /// Blank ids and tombstones for rows that do not exist locally
    pub ignored: usize,
}

/// Orchestrates reconciliation between a local store and a remote collection.
pub struct SyncEngine<'a, L, R> {
    local: &'a L,
    remote: &'a R,
    status: watch::Sender<SyncStatus>,
}

impl<'a, L: LocalStore, R: RemoteStore> SyncEngine<'a, L, R> {
    pub fn new(local: &'a L, remote: &'a R) -> Self {
        let (status, _) = watch::channel(SyncStatus::Synced);
        Self {
            local,
            remote,
            status,
        }
    }

    /// Observe `SyncStatus` transitions made by [`SyncEngine::sync`].
    pub fn status(&self) -> watch::Receiver<SyncStatus> {
        self.status.subscribe()
    }

    /// Read the remote snapshot, push local records, then purge tombstones
    /// and fill gaps from that snapshot.
    ///
    /// A live local row whose remote document is a tombstone is not pushed;
    /// it is purged instead. Local tombstones are purged once pushed. A failed
    /// push leaves the local store untouched.
    pub async fn sync_guests(&self) -> Result<SyncReport> {
        let remote_records: Vec<GuestRecord> = self
            .remote
            .fetch_all()
            .await?
            .into_iter()
            .filter(|record| !record.id.is_blank())
            .collect();
        tracing::debug!("Fetched {} remote guests", remote_records.len());

        let tombstoned: HashSet<&GuestId> = remote_records
            .iter()
            .filter(|record| record.deleted)
            .map(|record| &record.id)
            .collect();
        let local_records: Vec<GuestRecord> = self
            .local
            .get_all_including_deleted()
            .await?
            .into_iter()
            .filter(|record| !record.id.is_blank())
            .collect();

        let mut report = SyncReport {
            pushed: self.push(&local_records, &tombstoned).await?,
            ..SyncReport::default()
        };
        self.reconcile(&local_records, &remote_records, &tombstoned, &mut report)
            .await?;

        tracing::info!(
            "Guest sync complete: pushed {}, inserted {}, purged {}, unchanged {}",
            report.pushed,
            report.inserted,
            report.purged,
            report.unchanged
        );
        Ok(report)
    }

    async fn push(
        &self,
        local: &[GuestRecord],
        tombstoned: &HashSet<&GuestId>,
    ) -> Result<usize> {
        let records: Vec<GuestRecord> = local
            .iter()
            .filter(|record| record.deleted || !tombstoned.contains(&record.id))
            .cloned()
            .collect();

        if records.is_empty() {
            tracing::debug!("Nothing to push");
            return Ok(0);
        }

        self.remote.batch_upsert(&records).await?;
        tracing::debug!("Pushed {} local guests", records.len());
        Ok(records.len())
    }

    async fn reconcile(
        &self,
        local: &[GuestRecord],
        remote: &[GuestRecord],
        tombstoned: &HashSet<&GuestId>,
        report: &mut SyncReport,
    ) -> Result<()> {
        for record in local {
            if (record.deleted || tombstoned.contains(&record.id))
                && self.local.delete(&record.id).await?
            {
                report.purged += 1;
            }
        }

        let known: HashSet<&GuestId> = local.iter().map(|record| &record.id).collect();
        for record in remote.iter().filter(|record| !record.deleted) {
            if known.contains(&record.id) {
                report.unchanged += 1;
            } else {
                self.local.upsert(record).await?;
                report.inserted += 1;
            }
        }
        Ok(())
    }

    /// Run `sync_guests` and publish the status transitions.
    pub async fn sync(&self) -> SyncStatus {
        self.status.send_replace(SyncStatus::Syncing);
        let status = match self.sync_guests().await {
            Ok(_) => SyncStatus::Synced,
            Err(error) => {
                tracing::warn!("Guest sync failed: {error}");
                SyncStatus::SyncFailed(error.to_string())
            }
        };
        self.status.send_replace(status.clone());
        status
    }

    /// Apply remote-originated changes one record at a time, in order.
    pub async fn apply_remote_changes(&self, batch: &[GuestRecord]) -> Result<ApplyReport> {
        let mut report = ApplyReport::default();

        for record in batch {
            if record.id.is_blank() {
                report.ignored += 1;
                continue;
            }

            let exists = self.local.get_by_id(&record.id).await?.is_some();
            match (record.deleted, exists) {
                (true, true) => {
                    self.local.delete(&record.id).await?;
                    report.purged += 1;
                }
                (true, false) => report.ignored += 1,
                (false, false) => {
                    self.local.upsert(record).await?;
                    report.inserted += 1;
                }
                (false, true) => {
                    self.local.upsert(record).await?;
                    report.updated += 1;
                }
            }
        }
        Ok(report)
    }

    /// Apply remote changes as they arrive until `shutdown` resolves.
    ///
    /// Returns `Ok` on shutdown or when the remote closes the stream, and the
    /// listener error otherwise. The subscription is released on every exit.
    pub async fn run_realtime<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let mut subscription = self.remote.subscribe().await?;
        tracing::info!("Realtime guest sync started");
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                () = &mut shutdown => {
                    tracing::info!("Realtime guest sync stopped");
                    return Ok(());
                }
                batch = subscription.next_batch() => match batch {
                    Some(Ok(records)) => {
                        let report = self.apply_remote_changes(&records).await?;
                        tracing::debug!(
                            "Applied remote changes: inserted {}, updated {}, purged {}",
                            report.inserted,
                            report.updated,
                            report.purged
                        );
                    }
                    Some(Err(error)) => {
                        tracing::warn!("Remote listener failed: {error}");
                        return Err(error);
                    }
                    None => {
                        tracing::info!("Remote listener closed");
                        return Ok(());
                    }
                },
            }
        }
    }

    /// Delete every remote document, then clear the local store.
    ///
    /// The local store is only cleared after the remote commit succeeded.
    pub async fn reset_all(&self) -> Result<()> {
        let ids: Vec<GuestId> = self
            .remote
            .fetch_all()
            .await?
            .into_iter()
            .map(|record| record.id)
            .filter(|id| !id.is_blank())
            .collect();

        if !ids.is_empty() {
            self.remote.batch_delete(&ids).await?;
        }
        self.local.clear().await?;

        tracing::info!("Cleared {} remote guests and the local store", ids.len());
        Ok(())
    }

    /// Run `reset_all` and report a status.
    pub async fn reset(&self) -> ResetStatus {
        match self.reset_all().await {
            Ok(()) => ResetStatus::ResetSuccessful,
            Err(error) => {
                tracing::warn!("Guest reset failed: {error}");
                ResetStatus::ResetFailed(error.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Database, LibSqlGuestStore};
    use crate::error::Error;
    use crate::remote::MemoryCollection;
    use pretty_assertions::assert_eq;
    use std::time::Duration;
    use tokio::sync::oneshot;

    async fn setup() -> Database {
        Database::open_in_memory().await.unwrap()
    }

    fn alice() -> GuestRecord {
        GuestRecord::new("alice", "a@x.com", "555-1", "Acme")
    }

    fn id(raw: &str) -> GuestId {
        GuestId::from_raw(raw)
    }

    async fn snapshot<L: LocalStore>(store: &L) -> Vec<GuestRecord> {
        store.get_all_including_deleted().await.unwrap()
    }

    fn same_records(left: &[GuestRecord], right: &[GuestRecord]) -> bool {
        left.len() == right.len()
            && left
                .iter()
                .zip(right)
                .all(|(left, right)| left.fields_match(right))
    }

    /// Poll until `predicate` holds for the local row (or its absence).
    async fn eventually<L, P>(store: &L, guest: &GuestId, predicate: P)
    where
        L: LocalStore,
        P: Fn(Option<&GuestRecord>) -> bool,
    {
        for _ in 0..400 {
            let record = store.get_by_id(guest).await.unwrap();
            if predicate(record.as_ref()) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition on {guest} never held");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn push_uploads_every_local_record_including_tombstones() {
        let db = setup().await;
        let local = LibSqlGuestStore::new(db.connection());
        let remote = MemoryCollection::new();
        let engine = SyncEngine::new(&local, &remote);

        local.upsert(&alice()).await.unwrap();
        local
            .upsert(&GuestRecord::new("bob", "", "", "").tombstoned())
            .await
            .unwrap();

        let report = engine.sync_guests().await.unwrap();
        assert_eq!(report.pushed, 2);
        assert_eq!(remote.len(), 2);
        assert!(remote.document(&id("bob")).unwrap().deleted);
        assert_eq!(remote.commit_count(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn second_sync_changes_nothing() {
        let db = setup().await;
        let local = LibSqlGuestStore::new(db.connection());
        let remote = MemoryCollection::new();
        let engine = SyncEngine::new(&local, &remote);

        local.upsert(&alice()).await.unwrap();
        local
            .upsert(&GuestRecord::new("bob", "", "", "").tombstoned())
            .await
            .unwrap();
        remote
            .upsert(&GuestRecord::new("carol", "c@x.com", "", ""))
            .await
            .unwrap();

        engine.sync_guests().await.unwrap();
        let local_after_first = snapshot(&local).await;
        let remote_after_first = remote.fetch_all().await.unwrap();

        let second = engine.sync_guests().await.unwrap();
        assert_eq!(second.inserted, 0);
        assert_eq!(second.purged, 0);
        assert!(same_records(&local_after_first, &snapshot(&local).await));
        assert!(same_records(
            &remote_after_first,
            &remote.fetch_all().await.unwrap()
        ));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn local_tombstone_reaches_remote_as_tombstone() {
        let db = setup().await;
        let local = LibSqlGuestStore::new(db.connection());
        let remote = MemoryCollection::new();
        let engine = SyncEngine::new(&local, &remote);

        local.upsert(&alice()).await.unwrap();
        engine.sync_guests().await.unwrap();

        local.upsert(&alice().tombstoned()).await.unwrap();
        engine.sync_guests().await.unwrap();

        let document = remote.document(&id("alice")).unwrap();
        assert!(document.deleted);
        // Purged locally once the tombstone was observed remotely
        assert!(local.get_by_id(&id("alice")).await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn remote_tombstone_purges_live_local_copy() {
        let db = setup().await;
        let local = LibSqlGuestStore::new(db.connection());
        let remote = MemoryCollection::new();
        let engine = SyncEngine::new(&local, &remote);

        remote.upsert(&alice().tombstoned()).await.unwrap();
        local.upsert(&alice()).await.unwrap();

        let report = engine.sync_guests().await.unwrap();
        assert_eq!(report.pushed, 0);
        assert_eq!(report.purged, 1);
        assert!(local.get_by_id(&id("alice")).await.unwrap().is_none());
        assert!(remote.document(&id("alice")).unwrap().deleted);

        let again = engine.sync_guests().await.unwrap();
        assert_eq!(again, SyncReport::default());
        assert!(remote.document(&id("alice")).unwrap().deleted);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn sync_fills_gaps_without_touching_existing_rows() {
        let db = setup().await;
        let local = LibSqlGuestStore::new(db.connection());
        let remote = MemoryCollection::new();
        let engine = SyncEngine::new(&local, &remote);

        let mut remote_carol = GuestRecord::new("carol", "c@x.com", "555-3", "Initech");
        remote_carol.has_gift = true;
        remote_carol.category = Some("VIP".into());
        let mut remote_alice = alice();
        remote_alice.email = "remote@x.com".into();
        remote
            .batch_upsert(&[remote_carol.clone(), remote_alice])
            .await
            .unwrap();

        let mut local_alice = alice();
        local_alice.attending = true;
        local.upsert(&local_alice).await.unwrap();

        let report = engine.sync_guests().await.unwrap();
        assert_eq!(report.inserted, 1);
        assert_eq!(report.unchanged, 1);

        let carol = local.get_by_id(&id("carol")).await.unwrap().unwrap();
        assert!(carol.fields_match(&remote_carol));
        let alice_row = local.get_by_id(&id("alice")).await.unwrap().unwrap();
        assert!(alice_row.fields_match(&local_alice));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn push_wins_for_existing_local_records() {
        let db = setup().await;
        let local = LibSqlGuestStore::new(db.connection());
        let remote = MemoryCollection::new();
        let engine = SyncEngine::new(&local, &remote);

        let mut remote_alice = alice();
        remote_alice.company_name = "Globex".into();
        remote.upsert(&remote_alice).await.unwrap();
        local.upsert(&alice()).await.unwrap();

        engine.sync_guests().await.unwrap();

        assert_eq!(remote.document(&id("alice")).unwrap().company_name, "Acme");
        let local_alice = local.get_by_id(&id("alice")).await.unwrap().unwrap();
        assert_eq!(local_alice.company_name, "Acme");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn failed_push_leaves_local_store_untouched() {
        let db = setup().await;
        let local = LibSqlGuestStore::new(db.connection());
        let remote = MemoryCollection::new();
        let engine = SyncEngine::new(&local, &remote);

        local.upsert(&alice()).await.unwrap();
        let before = snapshot(&local).await;
        remote.set_reject_commits(true);

        let result = engine.sync_guests().await;
        assert!(matches!(result, Err(Error::BatchCommitFailed(_))));
        assert!(same_records(&before, &snapshot(&local).await));
        assert!(remote.is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn sync_reports_status_transitions() {
        let db = setup().await;
        let local = LibSqlGuestStore::new(db.connection());
        let remote = MemoryCollection::new();
        let engine = SyncEngine::new(&local, &remote);
        let status = engine.status();

        local.upsert(&alice()).await.unwrap();
        assert_eq!(engine.sync().await, SyncStatus::Synced);
        assert_eq!(*status.borrow(), SyncStatus::Synced);

        remote.set_offline(true);
        let failed = engine.sync().await;
        assert!(matches!(failed, SyncStatus::SyncFailed(_)));
        assert!(failed.to_string().starts_with("Sync Failed: Remote unavailable"));
        assert_eq!(*status.borrow(), failed);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn apply_remote_changes_overwrites_every_field() {
        let db = setup().await;
        let local = LibSqlGuestStore::new(db.connection());
        let remote = MemoryCollection::new();
        let engine = SyncEngine::new(&local, &remote);

        let mut local_alice = alice();
        local_alice.remarks = Some("local note".into());
        local.upsert(&local_alice).await.unwrap();

        let mut incoming = alice();
        incoming.email = "new@x.com".into();
        incoming.attending = true;
        incoming.has_food_coupon = true;
        incoming.payment_mode = Some("Cash".into());

        let report = engine
            .apply_remote_changes(&[incoming.clone()])
            .await
            .unwrap();
        assert_eq!(report.updated, 1);

        let stored = local.get_by_id(&id("alice")).await.unwrap().unwrap();
        assert!(stored.fields_match(&incoming));
        assert_eq!(stored.remarks, None);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn apply_remote_changes_in_delivery_order() {
        let db = setup().await;
        let local = LibSqlGuestStore::new(db.connection());
        let remote = MemoryCollection::new();
        let engine = SyncEngine::new(&local, &remote);

        let mut first = alice();
        first.amount = Some("100".into());
        let mut second = alice();
        second.amount = Some("200".into());
        let tombstone = GuestRecord::new("bob", "", "", "").tombstoned();

        let report = engine
            .apply_remote_changes(&[first, second, tombstone])
            .await
            .unwrap();
        assert_eq!(
            report,
            ApplyReport {
                inserted: 1,
                updated: 1,
                purged: 0,
                ignored: 1,
            }
        );

        let stored = local.get_by_id(&id("alice")).await.unwrap().unwrap();
        assert_eq!(stored.amount.as_deref(), Some("200"));
        assert!(local.get_by_id(&id("bob")).await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn realtime_applies_live_changes_until_shutdown() {
        let db = setup().await;
        let local = LibSqlGuestStore::new(db.connection());
        let remote = MemoryCollection::new();
        remote.upsert(&alice()).await.unwrap();
        let engine = SyncEngine::new(&local, &remote);
        let (stop, stopped) = oneshot::channel::<()>();

        let realtime = engine.run_realtime(async {
            let _ = stopped.await;
        });
        let driver = async {
            // Initial snapshot inserts alice
            eventually(&local, &id("alice"), |row| row.is_some()).await;
            assert_eq!(remote.listener_count(), 1);

            let mut edited = alice();
            edited.has_lanyard = true;
            remote.upsert(&edited).await.unwrap();
            eventually(&local, &id("alice"), |row| {
                row.is_some_and(|guest| guest.has_lanyard)
            })
            .await;

            remote.upsert(&alice().tombstoned()).await.unwrap();
            eventually(&local, &id("alice"), |row| row.is_none()).await;

            let _ = stop.send(());
        };

        let (result, ()) = tokio::join!(realtime, driver);
        result.unwrap();
        assert_eq!(remote.listener_count(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn realtime_releases_listener_on_error() {
        let db = setup().await;
        let local = LibSqlGuestStore::new(db.connection());
        let remote = MemoryCollection::new();
        let engine = SyncEngine::new(&local, &remote);

        let realtime = engine.run_realtime(std::future::pending());
        let driver = async {
            for _ in 0..400 {
                if remote.listener_count() == 1 {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            remote.fail_listeners("connection reset");
        };

        let (result, ()) = tokio::join!(realtime, driver);
        assert!(matches!(result, Err(Error::RemoteUnavailable(_))));
        assert_eq!(remote.listener_count(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn realtime_fails_fast_when_remote_is_offline() {
        let db = setup().await;
        let local = LibSqlGuestStore::new(db.connection());
        let remote = MemoryCollection::new();
        remote.set_offline(true);
        let engine = SyncEngine::new(&local, &remote);

        let result = engine.run_realtime(std::future::pending()).await;
        assert!(result.is_err());
        assert_eq!(remote.listener_count(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn reset_all_empties_both_replicas() {
        let db = setup().await;
        let local = LibSqlGuestStore::new(db.connection());
        let remote = MemoryCollection::new();
        let engine = SyncEngine::new(&local, &remote);

        local.upsert(&alice()).await.unwrap();
        engine.sync_guests().await.unwrap();
        remote
            .upsert(&GuestRecord::new("bob", "", "", ""))
            .await
            .unwrap();

        assert_eq!(engine.reset().await, ResetStatus::ResetSuccessful);
        assert!(remote.is_empty());
        assert!(snapshot(&local).await.is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn reset_all_keeps_local_rows_when_remote_clear_fails() {
        let db = setup().await;
        let local = LibSqlGuestStore::new(db.connection());
        let remote = MemoryCollection::new();
        let engine = SyncEngine::new(&local, &remote);

        local.upsert(&alice()).await.unwrap();
        engine.sync_guests().await.unwrap();
        let before = snapshot(&local).await;

        remote.set_reject_commits(true);
        let status = engine.reset().await;
        assert!(matches!(status, ResetStatus::ResetFailed(_)));
        assert!(same_records(&before, &snapshot(&local).await));
        assert_eq!(remote.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn deleted_guest_propagates_to_second_device() {
        let remote = MemoryCollection::new();
        let phone_db = setup().await;
        let phone = LibSqlGuestStore::new(phone_db.connection());
        let tablet_db = setup().await;
        let tablet = LibSqlGuestStore::new(tablet_db.connection());
        let phone_sync = SyncEngine::new(&phone, &remote);
        let tablet_sync = SyncEngine::new(&tablet, &remote);

        phone.upsert(&alice()).await.unwrap();
        phone_sync.sync_guests().await.unwrap();
        assert_eq!(remote.len(), 1);
        assert!(!remote.document(&id("alice")).unwrap().deleted);

        tablet_sync.sync_guests().await.unwrap();
        assert!(tablet.get_by_id(&id("alice")).await.unwrap().is_some());

        phone.upsert(&alice().tombstoned()).await.unwrap();
        phone_sync.sync_guests().await.unwrap();
        let document = remote.document(&id("alice")).unwrap();
        assert!(document.deleted);
        assert_eq!(remote.len(), 1);

        let report = tablet_sync.sync_guests().await.unwrap();
        assert_eq!(report.purged, 1);
        assert_eq!(report.pushed, 0);
        assert!(tablet.get_by_id(&id("alice")).await.unwrap().is_none());
        assert!(remote.document(&id("alice")).unwrap().deleted);

        phone_sync.sync_guests().await.unwrap();
        assert!(phone.get_by_id(&id("alice")).await.unwrap().is_none());
        assert!(remote.document(&id("alice")).unwrap().deleted);
    }
}
