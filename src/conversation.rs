//! Session-keyed conversation store.
//!
//! Each conversation lives behind its own async mutex so a chat turn can hold
//! it across the provider round-trip without blocking other sessions.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: Role,
    pub text: String,
}

impl ConversationMessage {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
        }
    }
}

/// Persona-priming system message for a new conversation.
pub fn priming_text(persona: &str, situation: &str) -> String {
    format!(
        "You are a teenager with the personality: {persona}. \
         Your role is to help a parent practice conversations with their child based on the situation they have described. \
         Stay in character as '{persona}' throughout the conversation. \
         React naturally based on your assigned persona's emotions, thoughts, and communication style. \
         Your goal is to simulate a realistic interaction to help the parent better understand how to communicate with their child. \
         Let the parent lead the conversation, and only respond as the teenager. \
         Make sure you are open to change. \
         Here is the context of the situation provided by the parent: {situation}"
    )
}

#[derive(Debug, Clone, Serialize)]
pub struct Conversation {
    pub session_id: String,
    pub classification: String,
    pub situation: String,
    #[serde(skip)]
    pub model_id: String,
    pub messages: Vec<ConversationMessage>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Set once the session is ended; holders of an older handle must not write.
    #[serde(skip)]
    ended: bool,
}

impl Conversation {
    fn new(session_id: String, classification: &str, situation: &str, model_id: &str) -> Self {
        let now = Utc::now();
        Self {
            session_id,
            classification: classification.to_string(),
            situation: situation.to_string(),
            model_id: model_id.to_string(),
            messages: vec![ConversationMessage::new(
                Role::System,
                priming_text(classification, situation),
            )],
            created_at: now,
            updated_at: now,
            ended: false,
        }
    }

    /// Append one message. The priming message is the only system message a
    /// conversation may hold.
    pub fn append(&mut self, role: Role, text: impl Into<String>) -> Result<(), AppError> {
        if role == Role::System {
            return Err(AppError::Validation(
                "a conversation holds exactly one system message".into(),
            ));
        }
        self.messages.push(ConversationMessage::new(role, text));
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn snapshot(&self) -> Vec<ConversationMessage> {
        self.messages.clone()
    }

    /// Plain-text rendering, one `role: text` line per message.
    pub fn transcript(&self) -> String {
        self.messages
            .iter()
            .map(|m| {
                let role = match m.role {
                    Role::System => "system",
                    Role::User => "user",
                    Role::Assistant => "assistant",
                };
                format!("{role}: {}", m.text)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

type SharedConversation = Arc<Mutex<Conversation>>;

#[derive(Clone, Default)]
pub struct ConversationStore {
    sessions: Arc<RwLock<HashMap<String, SharedConversation>>>,
}

fn not_found(session_id: &str) -> AppError {
    AppError::NotFound(format!("Conversation not found: {session_id}"))
}

fn entry(
    sessions: &HashMap<String, SharedConversation>,
    session_id: &str,
) -> Result<SharedConversation, AppError> {
    sessions.get(session_id).cloned().ok_or_else(|| not_found(session_id))
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new conversation primed for `classification` and `situation`.
    pub async fn start(&self, classification: &str, situation: &str, model_id: &str) -> Conversation {
        let session_id = uuid::Uuid::new_v4().to_string();
        let conversation = Conversation::new(session_id.clone(), classification, situation, model_id);
        let snapshot = conversation.clone();

        self.sessions
            .write()
            .await
            .insert(session_id.clone(), Arc::new(Mutex::new(conversation)));

        tracing::info!(session_id = %session_id, persona = %classification, "Conversation started");
        snapshot
    }

    /// Exclusive handle on one conversation. Held for the duration of a turn.
    pub async fn lock(&self, session_id: &str) -> Result<OwnedMutexGuard<Conversation>, AppError> {
        let shared = entry(&*self.sessions.read().await, session_id)?;
        let guard = shared.lock_owned().await;
        if guard.ended {
            return Err(not_found(session_id));
        }
        Ok(guard)
    }

    pub async fn append(&self, session_id: &str, role: Role, text: &str) -> Result<(), AppError> {
        self.lock(session_id).await?.append(role, text)
    }

    pub async fn snapshot(&self, session_id: &str) -> Result<Vec<ConversationMessage>, AppError> {
        Ok(self.lock(session_id).await?.snapshot())
    }

    pub async fn get(&self, session_id: &str) -> Result<Conversation, AppError> {
        Ok(self.lock(session_id).await?.clone())
    }

    /// Drop a conversation. Later requests for the id get `NotFound`.
    ///
    /// Waits for an in-flight turn to finish first, so a turn that was already
    /// running when the session ended still lands before removal.
    pub async fn end(&self, session_id: &str) -> Result<(), AppError> {
        let shared = entry(&*self.sessions.read().await, session_id)?;
        let mut conversation = shared.lock_owned().await;
        if conversation.ended {
            return Err(not_found(session_id));
        }
        conversation.ended = true;
        self.sessions.write().await.remove(session_id);
        tracing::info!(
            session_id = %session_id,
            messages = conversation.messages.len(),
            "Conversation ended"
        );
        Ok(())
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
