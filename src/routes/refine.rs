use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::Json;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::provider::{ChatRequest, PromptTruncation, StreamEvent};
use crate::validation::require_present;
use crate::AppState;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RefineParams {
    pub situation: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RefineOutput {
    pub profile_intro: String,
}

fn refine_prompt(situation: &str) -> String {
    format!("BASED ON THIS INFORMATION: {situation} ...")
}

/// GET /refined?situation=...: stream a profile intro and return it whole.
pub async fn refine(
    State(state): State<AppState>,
    params: Result<Query<RefineParams>, QueryRejection>,
) -> Result<Json<RefineOutput>, AppError> {
    let Query(params) = params.map_err(|e| AppError::Validation(e.body_text()))?;
    require_present("situation", params.situation.as_deref())?;
    let situation = params.situation.unwrap_or_default();

    let request = ChatRequest {
        model: state.models.refine.clone(),
        message: refine_prompt(&situation),
        temperature: state.models.temperature,
        history: Vec::new(),
        truncation: PromptTruncation::Auto,
    };

    let mut stream = state.provider.chat_stream(request).await?;
    let mut profile_intro = String::new();
    while let Some(event) = stream.next().await {
        match event? {
            StreamEvent::TextGeneration(text) => profile_intro.push_str(&text),
            StreamEvent::StreamEnd { finish_reason } => {
                tracing::debug!(?finish_reason, "Refine stream ended");
            }
            StreamEvent::Other(_) => {}
        }
    }

    if profile_intro.is_empty() {
        return Err(AppError::Internal("No response generated".into()));
    }

    Ok(Json(RefineOutput { profile_intro }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_REFINE_MODEL;
    use crate::routes::testing::*;
    use axum::http::StatusCode;

    async fn run(state: &AppState, situation: Option<&str>) -> Result<RefineOutput, AppError> {
        let params = RefineParams {
            situation: situation.map(str::to_string),
        };
        refine(State(state.clone()), Ok(Query(params)))
            .await
            .map(|Json(out)| out)
    }

    #[tokio::test]
    async fn test_concatenates_text_events_in_order() {
        let provider = ScriptedProvider::new();
        provider.push_stream(Ok(vec![
            Ok(StreamEvent::Other("stream-start".into())),
            Ok(StreamEvent::TextGeneration("Adam is ".into())),
            Ok(StreamEvent::Other("citation-generation".into())),
            Ok(StreamEvent::TextGeneration("sixteen.".into())),
            Ok(StreamEvent::StreamEnd {
                finish_reason: Some("COMPLETE".into()),
            }),
        ]));
        let state = test_state(provider.clone());

        let out = run(&state, Some("my son came home late")).await.unwrap();
        assert_eq!(out.profile_intro, "Adam is sixteen.");

        match &provider.calls()[..] {
            [Call::ChatStream(req)] => {
                assert_eq!(req.model, DEFAULT_REFINE_MODEL);
                assert_eq!(req.message, "BASED ON THIS INFORMATION: my son came home late ...");
                assert!(req.history.is_empty());
            }
            other => panic!("unexpected calls: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_situation_is_embedded_as_sent() {
        let provider = ScriptedProvider::new();
        provider.push_stream(Ok(vec![Ok(StreamEvent::TextGeneration("ok".into()))]));
        let state = test_state(provider.clone());

        run(&state, Some("  out past curfew\n")).await.unwrap();
        match &provider.calls()[..] {
            [Call::ChatStream(req)] => {
                assert_eq!(req.message, "BASED ON THIS INFORMATION:   out past curfew\n ...");
            }
            other => panic!("unexpected calls: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_situation_skips_provider() {
        let provider = ScriptedProvider::new();
        let state = test_state(provider.clone());

        let err = run(&state, None).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "No situation provided");

        let err = run(&state, Some("  ")).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert!(provider.calls().is_empty());
    }

    #[tokio::test]
    async fn test_empty_generation_is_500() {
        let provider = ScriptedProvider::new();
        provider.push_stream(Ok(vec![
            Ok(StreamEvent::Other("stream-start".into())),
            Ok(StreamEvent::StreamEnd {
                finish_reason: Some("COMPLETE".into()),
            }),
        ]));
        let state = test_state(provider);

        let err = run(&state, Some("anything")).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), "No response generated");
    }

    #[tokio::test]
    async fn test_stream_error_is_500() {
        let provider = ScriptedProvider::new();
        provider.push_stream(Ok(vec![
            Ok(StreamEvent::TextGeneration("partial".into())),
            Err(AppError::Provider("stream error: connection reset".into())),
        ]));
        provider.push_stream(Err(AppError::Provider("provider returned 401".into())));
        let state = test_state(provider);

        let err = run(&state, Some("a")).await.unwrap_err();
        assert_eq!(err.to_string(), "stream error: connection reset");
        let err = run(&state, Some("a")).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
