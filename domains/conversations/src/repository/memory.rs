//! In-memory thread store for tests

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use sunday_common::{Error, Result};
use uuid::Uuid;

use crate::domain::entities::ChatThread;
use crate::repository::ThreadStore;

/// Map-backed [`ThreadStore`] with a write counter and an optional failure
/// mode for exercising best-effort persistence.
#[derive(Clone, Default)]
pub struct InMemoryThreadStore {
    entries: Arc<Mutex<HashMap<(Uuid, Uuid), ChatThread>>>,
    put_count: Arc<AtomicUsize>,
    failing_puts: Arc<std::sync::atomic::AtomicBool>,
}

impl InMemoryThreadStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `put` fail
    pub fn fail_puts(&self) {
        self.failing_puts.store(true, Ordering::SeqCst);
    }

    pub fn put_count(&self) -> usize {
        self.put_count.load(Ordering::SeqCst)
    }

    pub fn stored(&self, user_id: Uuid, thread_id: Uuid) -> Option<ChatThread> {
        self.entries
            .lock()
            .unwrap()
            .get(&(user_id, thread_id))
            .cloned()
    }
}

#[async_trait::async_trait]
impl ThreadStore for InMemoryThreadStore {
    async fn get(&self, user_id: Uuid, thread_id: Uuid) -> Result<Option<ChatThread>> {
        Ok(self
            .entries
            .lock()
            .unwrap()
            .get(&(user_id, thread_id))
            .cloned())
    }

    async fn put(&self, user_id: Uuid, thread_id: Uuid, thread: &ChatThread) -> Result<()> {
        self.put_count.fetch_add(1, Ordering::SeqCst);
        if self.failing_puts.load(Ordering::SeqCst) {
            return Err(Error::Unexpected(anyhow!("simulated store failure")));
        }
        self.entries
            .lock()
            .unwrap()
            .insert((user_id, thread_id), thread.clone());
        Ok(())
    }
}
