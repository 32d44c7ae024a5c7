//! Persistence seam for the conversation store
//!
//! The store only needs three operations from its backing storage, so tests
//! can swap in an in-memory implementation.

use crate::db::{Conversation, Database, DbError};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Durable storage for whole conversation records
pub trait ConversationStorage: Send + Sync {
    /// Load every persisted conversation
    fn load_all(&self) -> Result<Vec<Conversation>, StorageError>;

    /// Point-write a single conversation keyed by its id
    fn save(&self, conversation: &Conversation) -> Result<(), StorageError>;

    /// Write a batch of conversations atomically
    fn save_all(&self, conversations: &[Conversation]) -> Result<(), StorageError>;
}

impl<T: ConversationStorage + ?Sized> ConversationStorage for Arc<T> {
    fn load_all(&self) -> Result<Vec<Conversation>, StorageError> {
        (**self).load_all()
    }

    fn save(&self, conversation: &Conversation) -> Result<(), StorageError> {
        (**self).save(conversation)
    }

    fn save_all(&self, conversations: &[Conversation]) -> Result<(), StorageError> {
        (**self).save_all(conversations)
    }
}

// ============================================================================
// Production implementation
// ============================================================================

/// Stores conversations as JSON documents in the key-value table
#[derive(Clone)]
pub struct DatabaseStorage {
    db: Database,
    namespace: String,
}

impl DatabaseStorage {
    pub fn new(db: Database, namespace: impl Into<String>) -> Self {
        Self {
            db,
            namespace: namespace.into(),
        }
    }
}

impl ConversationStorage for DatabaseStorage {
    fn load_all(&self) -> Result<Vec<Conversation>, StorageError> {
        let entries = self.db.get_all(&self.namespace)?;
        let mut conversations = Vec::with_capacity(entries.len());

        for entry in entries {
            match serde_json::from_str::<Conversation>(&entry.value) {
                Ok(conv) => conversations.push(conv),
                Err(e) => {
                    tracing::warn!(
                        namespace = %self.namespace,
                        key = %entry.key,
                        error = %e,
                        "Skipping unreadable conversation record"
                    );
                }
            }
        }

        Ok(conversations)
    }

    fn save(&self, conversation: &Conversation) -> Result<(), StorageError> {
        let value = serde_json::to_string(conversation).map_err(DbError::from)?;
        self.db.put(&self.namespace, &conversation.id, &value)?;
        Ok(())
    }

    fn save_all(&self, conversations: &[Conversation]) -> Result<(), StorageError> {
        let entries = conversations
            .iter()
            .map(|c| Ok((c.id.clone(), serde_json::to_string(c)?)))
            .collect::<Result<Vec<_>, serde_json::Error>>()
            .map_err(DbError::from)?;
        self.db.put_all(&self.namespace, &entries)?;
        Ok(())
    }
}
