//! Remote document collection layer
//!
//! The cloud replica is a flat collection of guest documents keyed by
//! [`GuestId`]. Batches are all-or-nothing; change notifications arrive
//! through a [`Subscription`] that releases its listener when dropped.

mod firestore;
mod memory;

pub use firestore::FirestoreCollection;
pub use memory::MemoryCollection;

use std::fmt;

use tokio::sync::mpsc;

use crate::error::Result;
use crate::models::{GuestId, GuestRecord};

/// Networked document collection the sync engine reconciles against.
#[allow(async_fn_in_trait)]
pub trait RemoteStore {
    /// Every document in the collection, tombstones included
    async fn fetch_all(&self) -> Result<Vec<GuestRecord>>;

    /// Set a single document to the full record
    async fn upsert(&self, record: &GuestRecord) -> Result<()> {
        self.batch_upsert(std::slice::from_ref(record)).await
    }

    /// Set every record in one atomic commit
    async fn batch_upsert(&self, records: &[GuestRecord]) -> Result<()>;

    /// Remove every listed document in one atomic commit
    async fn batch_delete(&self, ids: &[GuestId]) -> Result<()>;

    /// Start listening for changed documents
    async fn subscribe(&self) -> Result<Subscription>;
}

/// One delivery from a change listener: changed records or a listener error.
pub type ChangeBatch = Result<Vec<GuestRecord>>;

type ReleaseFn = Box<dyn FnOnce() + Send>;

/// Handle to a live change listener.
///
/// Dropping the handle (or calling [`Subscription::unsubscribe`]) releases the
/// listener exactly once.
pub struct Subscription {
    receiver: mpsc::UnboundedReceiver<ChangeBatch>,
    release: Option<ReleaseFn>,
}

impl Subscription {
    /// Wrap a delivery channel and the action that tears the listener down.
    pub fn new(
        receiver: mpsc::UnboundedReceiver<ChangeBatch>,
        release: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            receiver,
            release: Some(Box::new(release)),
        }
    }

    /// Wait for the next batch; `None` once the listener has shut down.
    pub async fn next_batch(&mut self) -> Option<ChangeBatch> {
        self.receiver.recv().await
    }

    /// Release the listener now.
    pub fn unsubscribe(mut self) {
        self.release_listener();
    }

    fn release_listener(&mut self) {
        if let Some(release) = self.release.take() {
            self.receiver.close();
            release();
            tracing::debug!("Released remote change listener");
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release_listener();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Subscription")
            .field("released", &self.release.is_none())
            .finish()
    }
}
