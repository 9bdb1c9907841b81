//! In-process remote collection.
//!
//! Behaves like the cloud collection (atomic batches, initial snapshot followed
//! by changed documents) and can be told to fail, which makes it the test
//! double for every multi-device scenario.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;

use super::{ChangeBatch, RemoteStore, Subscription};
use crate::error::{Error, Result};
use crate::models::{GuestId, GuestRecord};

/// Shared in-memory collection; clones observe the same documents.
#[derive(Clone, Default)]
pub struct MemoryCollection {
    state: Arc<Mutex<MemoryState>>,
}

#[derive(Default)]
struct MemoryState {
    documents: BTreeMap<GuestId, GuestRecord>,
    listeners: BTreeMap<u64, mpsc::UnboundedSender<ChangeBatch>>,
    next_listener_id: u64,
    offline: bool,
    reject_commits: bool,
    commits: usize,
}

impl MemoryState {
    fn ensure_online(&self) -> Result<()> {
        if self.offline {
            return Err(Error::RemoteUnavailable(
                "memory collection is offline".into(),
            ));
        }
        Ok(())
    }

    fn ensure_commit_allowed(&self) -> Result<()> {
        self.ensure_online()?;
        if self.reject_commits {
            return Err(Error::BatchCommitFailed(
                "memory collection rejected the batch".into(),
            ));
        }
        Ok(())
    }

    fn notify(&mut self, batch: &[GuestRecord]) {
        if batch.is_empty() {
            return;
        }
        self.listeners
            .retain(|_, listener| listener.send(Ok(batch.to_vec())).is_ok());
    }
}

impl MemoryCollection {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make every call fail with `RemoteUnavailable`.
    pub fn set_offline(&self, offline: bool) {
        self.lock().offline = offline;
    }

    /// Make batch commits fail with `BatchCommitFailed`.
    pub fn set_reject_commits(&self, reject: bool) {
        self.lock().reject_commits = reject;
    }

    /// Deliver an error to every active listener.
    pub fn fail_listeners(&self, message: &str) {
        let mut state = self.lock();
        state.listeners.retain(|_, listener| {
            listener
                .send(Err(Error::RemoteUnavailable(message.to_string())))
                .is_ok()
        });
    }

    pub fn document(&self, id: &GuestId) -> Option<GuestRecord> {
        self.lock().documents.get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().documents.is_empty()
    }

    pub fn listener_count(&self) -> usize {
        self.lock().listeners.len()
    }

    /// Number of successful batch commits so far.
    pub fn commit_count(&self) -> usize {
        self.lock().commits
    }
}

impl RemoteStore for MemoryCollection {
    async fn fetch_all(&self) -> Result<Vec<GuestRecord>> {
        let state = self.lock();
        state.ensure_online()?;
        Ok(state.documents.values().cloned().collect())
    }

    async fn batch_upsert(&self, records: &[GuestRecord]) -> Result<()> {
        let mut state = self.lock();
        state.ensure_commit_allowed()?;

        let mut changed = Vec::new();
        for record in records {
            let unchanged = state
                .documents
                .get(&record.id)
                .is_some_and(|existing| existing.fields_match(record));
            if !unchanged {
                state.documents.insert(record.id.clone(), record.clone());
                changed.push(record.clone());
            }
        }
        state.commits += 1;
        state.notify(&changed);
        Ok(())
    }

    async fn batch_delete(&self, ids: &[GuestId]) -> Result<()> {
        let mut state = self.lock();
        state.ensure_commit_allowed()?;

        for id in ids {
            state.documents.remove(id);
        }
        state.commits += 1;
        Ok(())
    }

    async fn subscribe(&self) -> Result<Subscription> {
        let mut state = self.lock();
        state.ensure_online()?;

        let (sender, receiver) = mpsc::unbounded_channel();
        let snapshot: Vec<GuestRecord> = state.documents.values().cloned().collect();
        // A closed receiver is impossible here; the handle is returned below
        let _ = sender.send(Ok(snapshot));

        let listener_id = state.next_listener_id;
        state.next_listener_id += 1;
        state.listeners.insert(listener_id, sender);
        drop(state);

        let registry = Arc::clone(&self.state);
        Ok(Subscription::new(receiver, move || {
            registry
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .listeners
                .remove(&listener_id);
        }))
    }
}
