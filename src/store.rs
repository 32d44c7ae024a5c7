//! Conversation store
//!
//! Owns every conversation record in memory, serializes operations per
//! conversation and persists each accepted change before committing it.

pub mod traits;

#[cfg(test)]
pub mod testing;

pub use traits::*;

use crate::db::{Conversation, Message, MessageSender};
use crate::deal::{Participant, PostRef, ValidationError};
use crate::state_machine::{transition, DealState, DealStatus, Effect, Event, TransitionError};
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use thiserror::Error;
use tokio::sync::broadcast;

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Production store backed by SQLite
pub type ProductionStore = ConversationStore<DatabaseStorage>;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Conversation not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl StoreError {
    /// Stable machine-readable error kind
    pub fn kind(&self) -> &'static str {
        match self {
            StoreError::NotFound(_) => "not_found",
            StoreError::Transition(TransitionError::Permission(_)) => "permission",
            StoreError::Transition(TransitionError::InvalidState { .. }) => "invalid_state",
            StoreError::Transition(TransitionError::Validation(_)) | StoreError::Validation(_) => {
                "validation"
            }
            StoreError::Transition(TransitionError::ConversationClosed) => "conversation_closed",
            StoreError::Storage(_) => "storage",
        }
    }
}

/// Events published after a change has been committed
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DealEvent {
    MessageAppended {
        conversation_id: String,
        message: Message,
    },
    StatusChanged {
        conversation_id: String,
        from: DealStatus,
        to: DealStatus,
        state: DealState,
    },
    Notification {
        conversation_id: String,
        recipient: String,
        event_type: String,
        data: Value,
    },
}

impl DealEvent {
    pub fn conversation_id(&self) -> &str {
        match self {
            DealEvent::MessageAppended {
                conversation_id, ..
            }
            | DealEvent::StatusChanged {
                conversation_id, ..
            }
            | DealEvent::Notification {
                conversation_id, ..
            } => conversation_id,
        }
    }

    /// SSE event name
    pub fn event_type(&self) -> &'static str {
        match self {
            DealEvent::MessageAppended { .. } => "message",
            DealEvent::StatusChanged { .. } => "status",
            DealEvent::Notification { .. } => "notification",
        }
    }
}

pub struct ConversationStore<S: ConversationStorage> {
    storage: S,
    conversations: RwLock<HashMap<String, Arc<Mutex<Conversation>>>>,
    events_tx: broadcast::Sender<DealEvent>,
}

impl<S: ConversationStorage> ConversationStore<S> {
    /// Build the store from everything the storage already holds
    pub fn hydrate(storage: S) -> Result<Self, StoreError> {
        let loaded = storage.load_all()?;
        tracing::info!(count = loaded.len(), "Hydrated conversations");

        let conversations = loaded
            .into_iter()
            .map(|c| (c.id.clone(), Arc::new(Mutex::new(c))))
            .collect();
        let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Ok(Self {
            storage,
            conversations: RwLock::new(conversations),
            events_tx,
        })
    }

    /// Receive every event published after this call
    pub fn subscribe(&self) -> broadcast::Receiver<DealEvent> {
        self.events_tx.subscribe()
    }

    // ==================== Reads ====================

    pub fn get_conversation(&self, id: &str) -> Result<Conversation, StoreError> {
        let entry = self.entry(id)?;
        let conv = lock(&entry).clone();
        Ok(conv)
    }

    /// Conversations the user takes part in, most recently updated first
    pub fn list_conversations_for(&self, user_id: &str) -> Vec<Conversation> {
        let entries: Vec<_> = self
            .conversations
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();

        let mut result: Vec<Conversation> = entries
            .iter()
            .filter_map(|entry| {
                let conv = lock(entry);
                conv.is_participant(user_id).then(|| conv.clone())
            })
            .collect();
        result.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then_with(|| a.id.cmp(&b.id)));
        result
    }

    // ==================== Writes ====================

    pub fn start_conversation(
        &self,
        post: PostRef,
        initiator: Participant,
        counterpart: Participant,
    ) -> Result<Conversation, StoreError> {
        let id = uuid::Uuid::new_v4().to_string();
        let conv = Conversation::start(&id, post, initiator, counterpart, Utc::now())?;

        self.storage.save(&conv)?;
        self.conversations
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.clone(), Arc::new(Mutex::new(conv.clone())));

        tracing::info!(
            conv_id = %id,
            post_id = %conv.post.id,
            actor = %conv.participants[0].id,
            "Started conversation"
        );
        Ok(conv)
    }

    pub fn add_message(
        &self,
        conversation_id: &str,
        sender: &Participant,
        text: impl Into<String>,
    ) -> Result<Conversation, StoreError> {
        let event = Event::PostMessage {
            message_id: uuid::Uuid::new_v4().to_string(),
            text: text.into(),
            at: Utc::now(),
        };
        self.apply(conversation_id, sender, event)
    }

    pub fn send_proposal(
        &self,
        conversation_id: &str,
        caller: &Participant,
        amount: i64,
        note: Option<String>,
    ) -> Result<Conversation, StoreError> {
        let event = Event::SendProposal {
            amount,
            note,
            at: Utc::now(),
        };
        self.apply(conversation_id, caller, event)
    }

    pub fn approve_proposal(
        &self,
        conversation_id: &str,
        caller: &Participant,
    ) -> Result<Conversation, StoreError> {
        self.apply(conversation_id, caller, Event::ApproveProposal)
    }

    pub fn reject_proposal(
        &self,
        conversation_id: &str,
        caller: &Participant,
        reason: Option<String>,
    ) -> Result<Conversation, StoreError> {
        self.apply(conversation_id, caller, Event::RejectProposal { reason })
    }

    pub fn create_contract(
        &self,
        conversation_id: &str,
        caller: &Participant,
        final_amount: i64,
    ) -> Result<Conversation, StoreError> {
        let event = Event::CreateContract {
            final_amount,
            at: Utc::now(),
        };
        self.apply(conversation_id, caller, event)
    }

    pub fn mark_complete(
        &self,
        conversation_id: &str,
        caller: &Participant,
    ) -> Result<Conversation, StoreError> {
        self.apply(conversation_id, caller, Event::MarkComplete)
    }

    pub fn close_conversation(
        &self,
        conversation_id: &str,
        caller: &Participant,
    ) -> Result<Conversation, StoreError> {
        self.apply(conversation_id, caller, Event::CloseConversation)
    }

    /// Write every in-memory record back to storage in one batch
    pub fn flush(&self) -> Result<usize, StoreError> {
        let entries: Vec<_> = self
            .conversations
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        let snapshot: Vec<Conversation> = entries.iter().map(|e| lock(e).clone()).collect();

        self.storage.save_all(&snapshot)?;
        Ok(snapshot.len())
    }

    // ==================== Internals ====================

    fn entry(&self, id: &str) -> Result<Arc<Mutex<Conversation>>, StoreError> {
        self.conversations
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    /// Validate, persist, commit, then publish. The conversation lock is held
    /// from validation through commit.
    fn apply(
        &self,
        conversation_id: &str,
        actor: &Participant,
        event: Event,
    ) -> Result<Conversation, StoreError> {
        let entry = self.entry(conversation_id)?;
        let mut current = lock(&entry);
        let action = event.action();

        let result = match transition(&current.state, &current.context(), actor, event) {
            Ok(result) => result,
            Err(e) => {
                tracing::info!(
                    conv_id = %conversation_id,
                    actor = %actor.id,
                    action,
                    status = %current.status(),
                    error = %e,
                    "Rejected operation"
                );
                return Err(e.into());
            }
        };

        let from = current.status();
        let mut updated = current.clone();
        updated.state = result.new_state;
        updated.updated_at = Utc::now();

        let mut events = Vec::new();
        let mut persist = false;
        for effect in result.effects {
            match effect {
                Effect::AppendMessage {
                    message_id,
                    text,
                    at,
                } => {
                    let message = Message {
                        message_id,
                        conversation_id: updated.id.clone(),
                        sequence_id: updated.next_sequence_id(),
                        sender: MessageSender::from(actor),
                        text,
                        created_at: at,
                    };
                    updated.messages.push(message.clone());
                    events.push(DealEvent::MessageAppended {
                        conversation_id: updated.id.clone(),
                        message,
                    });
                }
                Effect::PersistConversation => persist = true,
                Effect::NotifyParticipant {
                    recipient,
                    event_type,
                    data,
                } => events.push(DealEvent::Notification {
                    conversation_id: updated.id.clone(),
                    recipient,
                    event_type,
                    data,
                }),
            }
        }

        let to = updated.status();
        if from != to {
            events.insert(
                0,
                DealEvent::StatusChanged {
                    conversation_id: updated.id.clone(),
                    from,
                    to,
                    state: updated.state.clone(),
                },
            );
        }

        if persist {
            if let Err(e) = self.storage.save(&updated) {
                tracing::error!(
                    conv_id = %conversation_id,
                    action,
                    error = %e,
                    "Failed to persist conversation"
                );
                return Err(e.into());
            }
        }

        *current = updated.clone();
        drop(current);

        tracing::info!(
            conv_id = %conversation_id,
            actor = %actor.id,
            action,
            from = %from,
            to = %to,
            "Applied operation"
        );

        for event in events {
            // No subscribers is fine
            let _ = self.events_tx.send(event);
        }

        Ok(updated)
    }
}

fn lock(entry: &Mutex<Conversation>) -> MutexGuard<'_, Conversation> {
    entry.lock().unwrap_or_else(PoisonError::into_inner)
}
