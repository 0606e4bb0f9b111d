pub mod cohere;

use async_trait::async_trait;
use futures_util::stream::BoxStream;

use crate::classification::ClassificationCandidate;
use crate::conversation::ConversationMessage;
use crate::error::AppError;

pub use cohere::CohereClient;

// =============================================================================
// Request / event types
// =============================================================================

/// Provider-side policy for shortening history that exceeds the context window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PromptTruncation {
    #[default]
    Auto,
}

impl PromptTruncation {
    pub fn as_str(&self) -> &'static str {
        match self {
            PromptTruncation::Auto => "AUTO",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub model: String,
    pub message: String,
    pub temperature: f32,
    /// Prior turns, oldest first. Does not include `message`.
    pub history: Vec<ConversationMessage>,
    pub truncation: PromptTruncation,
}

/// One event from a streamed chat completion.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// A fragment of generated text.
    TextGeneration(String),
    StreamEnd { finish_reason: Option<String> },
    /// Any other event type (stream-start, citations, ...). Carries the type name.
    Other(String),
}

pub type ChatEventStream = BoxStream<'static, Result<StreamEvent, AppError>>;

// =============================================================================
// ModelProvider trait
// =============================================================================

/// The three capabilities the routes consume from the hosted model service.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Synchronous chat completion; returns the assistant's text.
    async fn chat(&self, request: ChatRequest) -> Result<String, AppError>;

    /// Streamed chat completion. Events arrive in generation order.
    async fn chat_stream(&self, request: ChatRequest) -> Result<ChatEventStream, AppError>;

    /// Classify each input with the given model.
    async fn classify(
        &self,
        model: &str,
        inputs: Vec<String>,
    ) -> Result<Vec<ClassificationCandidate>, AppError>;
}
