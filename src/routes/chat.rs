use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use super::reject_body;
use crate::conversation::Role;
use crate::error::AppError;
use crate::persona::unknown_persona_message;
use crate::provider::{ChatRequest, PromptTruncation};
use crate::validation::require_non_empty;
use crate::AppState;

#[derive(Debug, Clone, Deserialize)]
pub struct ChatInput {
    pub classification: String,
    pub situation: String,
    pub user_input: String,
    /// Continue this conversation; when absent a new one is started.
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatOutput {
    pub bot_response: String,
    pub session_id: String,
}

/// POST /chat: one parent/teenager turn.
///
/// The persona and situation are fixed when the conversation starts; later
/// turns keep the original priming message and model.
pub async fn chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatInput>, JsonRejection>,
) -> Result<Json<ChatOutput>, AppError> {
    let Json(input) = payload.map_err(reject_body)?;
    require_non_empty("user_input", &input.user_input)?;

    let model_id = state
        .personas
        .lookup(&input.classification)
        .ok_or_else(|| AppError::Validation(unknown_persona_message(&input.classification)))?;

    let (session_id, started_here) = match input.session_id {
        Some(id) => (id, false),
        None => {
            let convo = state
                .conversations
                .start(&input.classification, &input.situation, model_id)
                .await;
            (convo.session_id, true)
        }
    };

    let mut conversation = state.conversations.lock(&session_id).await?;
    if conversation.classification != input.classification {
        tracing::debug!(
            session_id = %session_id,
            bound = %conversation.classification,
            requested = %input.classification,
            "Keeping persona bound at conversation start"
        );
    }

    let request = ChatRequest {
        model: conversation.model_id.clone(),
        message: input.user_input.clone(),
        temperature: state.models.temperature,
        history: conversation.snapshot(),
        truncation: PromptTruncation::Auto,
    };

    let bot_response = match state.provider.chat(request).await {
        Ok(text) => text,
        Err(e) => {
            drop(conversation);
            if started_here {
                // Don't leave an empty conversation behind for a turn that never happened.
                if let Err(end_err) = state.conversations.end(&session_id).await {
                    tracing::warn!(
                        session_id = %session_id,
                        "Failed to discard conversation after failed turn: {}",
                        end_err
                    );
                }
            }
            return Err(e);
        }
    };

    // User and assistant messages land together, so a failed turn leaves no trace.
    conversation.append(Role::User, input.user_input)?;
    conversation.append(Role::Assistant, bot_response.clone())?;

    tracing::info!(
        session_id = %session_id,
        messages = conversation.messages.len(),
        "Chat turn completed"
    );

    Ok(Json(ChatOutput {
        bot_response,
        session_id,
    }))
}
