use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use super::reject_body;
use crate::conversation::Conversation;
use crate::error::AppError;
use crate::persona::unknown_persona_message;
use crate::AppState;

#[derive(Debug, Clone, Deserialize)]
pub struct StartInput {
    pub classification: String,
    pub situation: String,
}

#[derive(Debug, Serialize)]
pub struct StartOutput {
    pub session_id: String,
    pub classification: String,
    pub model_id: String,
}

/// POST /conversations
pub async fn start_conversation(
    State(state): State<AppState>,
    payload: Result<Json<StartInput>, JsonRejection>,
) -> Result<(StatusCode, Json<StartOutput>), AppError> {
    let Json(input) = payload.map_err(reject_body)?;
    let model_id = state
        .personas
        .lookup(&input.classification)
        .ok_or_else(|| AppError::Validation(unknown_persona_message(&input.classification)))?;

    let convo = state
        .conversations
        .start(&input.classification, &input.situation, model_id)
        .await;

    Ok((
        StatusCode::CREATED,
        Json(StartOutput {
            session_id: convo.session_id,
            classification: convo.classification,
            model_id: convo.model_id,
        }),
    ))
}

/// GET /conversations/{session_id}
pub async fn get_conversation(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<Conversation>, AppError> {
    Ok(Json(state.conversations.get(&session_id).await?))
}

/// DELETE /conversations/{session_id}
pub async fn end_conversation(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.conversations.end(&session_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
