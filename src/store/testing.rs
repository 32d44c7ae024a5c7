//! Mock storage for testing
//!
//! Lets store tests run without SQLite and inject write failures.

use super::traits::{ConversationStorage, StorageError};
use crate::db::Conversation;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

/// In-memory storage with a switch to make writes fail
#[derive(Default)]
pub struct InMemoryStorage {
    records: Mutex<HashMap<String, Conversation>>,
    fail_writes: AtomicBool,
    writes: AtomicUsize,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage pre-populated with records, as if written by a previous run
    pub fn with_records(records: impl IntoIterator<Item = Conversation>) -> Self {
        let storage = Self::new();
        storage
            .records
            .lock()
            .unwrap()
            .extend(records.into_iter().map(|c| (c.id.clone(), c)));
        storage
    }

    /// Make every subsequent write fail (or succeed again)
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// The persisted copy of a conversation
    pub fn saved(&self, id: &str) -> Option<Conversation> {
        self.records.lock().unwrap().get(id).cloned()
    }

    /// Number of successful writes
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn check_writable(&self) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("disk full".to_string()));
        }
        Ok(())
    }
}

impl ConversationStorage for InMemoryStorage {
    fn load_all(&self) -> Result<Vec<Conversation>, StorageError> {
        Ok(self.records.lock().unwrap().values().cloned().collect())
    }

    fn save(&self, conversation: &Conversation) -> Result<(), StorageError> {
        self.check_writable()?;
        self.records
            .lock()
            .unwrap()
            .insert(conversation.id.clone(), conversation.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn save_all(&self, conversations: &[Conversation]) -> Result<(), StorageError> {
        self.check_writable()?;
        let mut records = self.records.lock().unwrap();
        for conv in conversations {
            records.insert(conv.id.clone(), conv.clone());
        }
        self.writes.fetch_add(conversations.len(), Ordering::SeqCst);
        Ok(())
    }
}
