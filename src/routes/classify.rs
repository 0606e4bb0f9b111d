use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use super::reject_body;
use crate::classification::confident_winner;
use crate::error::AppError;
use crate::persona::unknown_persona_message;
use crate::validation::require_present;
use crate::AppState;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClassifyInput {
    #[serde(default)]
    pub paragraph: String,
}

#[derive(Debug, Serialize)]
pub struct ClassifyOutput {
    pub classification: String,
    pub confidence: f64,
    pub persona_model_id: String,
}

/// POST /classify: pick the persona that best matches a parent's description.
pub async fn classify(
    State(state): State<AppState>,
    payload: Result<Json<ClassifyInput>, JsonRejection>,
) -> Result<Json<ClassifyOutput>, AppError> {
    let Json(input) = payload.map_err(reject_body)?;
    let paragraph = require_present("paragraph", Some(&input.paragraph))?;

    let candidates = state
        .provider
        .classify(&state.models.classify, vec![paragraph.to_string()])
        .await?;
    let winner = confident_winner(candidates)?;

    let persona_model_id = state
        .personas
        .lookup(&winner.label)
        .ok_or_else(|| AppError::NotFound(unknown_persona_message(&winner.label)))?
        .to_string();

    tracing::info!(
        persona = %winner.label,
        confidence = winner.confidence,
        "Situation classified"
    );

    Ok(Json(ClassifyOutput {
        classification: winner.label,
        confidence: winner.confidence,
        persona_model_id,
    }))
}
