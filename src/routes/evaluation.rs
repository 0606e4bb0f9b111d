use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use super::reject_body;
use crate::classification::{confident_winner, rating_for_label};
use crate::error::AppError;
use crate::validation::require_present;
use crate::AppState;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EvaluationInput {
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct EvaluationOutput {
    pub conversation_rating: &'static str,
    pub confidence: f64,
}

/// POST /evaluation: rate how well the parent handled the conversation.
pub async fn evaluation(
    State(state): State<AppState>,
    payload: Result<Json<EvaluationInput>, JsonRejection>,
) -> Result<Json<EvaluationOutput>, AppError> {
    let Json(input) = payload.map_err(reject_body)?;
    let session_id = require_present("session_id", input.session_id.as_deref())?;

    let transcript = state.conversations.get(session_id).await?.transcript();
    let candidates = state
        .provider
        .classify(&state.models.evaluation, vec![transcript])
        .await?;

    let winner = confident_winner(candidates)?;
    let conversation_rating = rating_for_label(&winner.label).ok_or_else(|| {
        AppError::Provider(format!("unexpected rating label: {}", winner.label))
    })?;

    tracing::info!(
        session_id = %session_id,
        rating = conversation_rating,
        confidence = winner.confidence,
        "Conversation evaluated"
    );

    Ok(Json(EvaluationOutput {
        conversation_rating,
        confidence: winner.confidence,
    }))
}
