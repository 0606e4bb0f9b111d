//! HTTP surface. Every handler returns `Result<_, AppError>` so failures share
//! one response shape.

pub mod chat;
pub mod classify;
pub mod conversations;
pub mod evaluation;
pub mod refine;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::error::AppError;
use crate::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/chat", post(chat::chat))
        .route("/evaluation", post(evaluation::evaluation))
        .route("/classify", post(classify::classify))
        .route("/refined", get(refine::refine))
        .route("/conversations", post(conversations::start_conversation))
        .route(
            "/conversations/{session_id}",
            get(conversations::get_conversation).delete(conversations::end_conversation),
        )
        .route("/personas", get(list_personas))
        .route("/health", get(health))
        .with_state(state)
}

/// Malformed or incomplete JSON bodies are client errors.
pub(crate) fn reject_body(rejection: JsonRejection) -> AppError {
    AppError::Validation(rejection.body_text())
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok", "service": "persona-practice" }))
}

async fn list_personas(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({ "personas": state.personas.names() }))
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode};
    use axum::response::Response;
    use tower::ServiceExt;

    fn app() -> Router {
        router(test_state(ScriptedProvider::new()))
    }

    fn request(method: Method, uri: &str, body: Option<&str>) -> Request<Body> {
        let builder = Request::builder().method(method).uri(uri);
        match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn json_body(res: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_list_personas() {
        let res = app()
            .oneshot(request(Method::GET, "/personas", None))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(
            json_body(res).await,
            serde_json::json!({
                "personas": ["Angry Adam", "Happy Hannah", "Judgmental Judy", "Quiet Quintin"]
            })
        );
    }

    #[tokio::test]
    async fn test_health() {
        let res = app()
            .oneshot(request(Method::GET, "/health", None))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(json_body(res).await["status"], "ok");
    }

    #[tokio::test]
    async fn test_malformed_chat_body_is_validation_error() {
        let res = app()
            .oneshot(request(Method::POST, "/chat", Some("{\"classification\": ")))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let body = json_body(res).await;
        assert_eq!(body["kind"], "validation");
        assert!(body["error"].as_str().is_some_and(|e| !e.is_empty()));
    }

    #[tokio::test]
    async fn test_chat_missing_field_is_validation_error() {
        let res = app()
            .oneshot(request(Method::POST, "/chat", Some(r#"{"classification":"Angry Adam"}"#)))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(res).await["kind"], "validation");
    }

    #[tokio::test]
    async fn test_evaluation_without_body_is_400() {
        let res = app()
            .oneshot(request(Method::POST, "/evaluation", None))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(res).await["kind"], "validation");

        let res = app()
            .oneshot(request(Method::POST, "/evaluation", Some("{}")))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(res).await["error"], "No session_id provided");
    }

    #[tokio::test]
    async fn test_refined_without_situation_is_400() {
        let res = app()
            .oneshot(request(Method::GET, "/refined", None))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            json_body(res).await,
            serde_json::json!({ "error": "No situation provided", "kind": "validation" })
        );
    }

    #[tokio::test]
    async fn test_conversation_routes_round_trip() {
        let app = app();

        let res = app
            .clone()
            .oneshot(request(
                Method::POST,
                "/conversations",
                Some(r#"{"classification":"Happy Hannah","situation":"prom night"}"#),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::CREATED);
        let started = json_body(res).await;
        let id = started["session_id"].as_str().unwrap().to_string();
        assert_eq!(started["model_id"], "5340c40f-9e3b-4d16-8d4c-9a1d4495e905-ft");
        let path = format!("/conversations/{id}");

        let res = app.clone().oneshot(request(Method::GET, &path, None)).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let convo = json_body(res).await;
        assert_eq!(convo["session_id"], id.as_str());
        assert_eq!(convo["messages"][0]["role"], "system");

        let res = app.clone().oneshot(request(Method::DELETE, &path, None)).await.unwrap();
        assert_eq!(res.status(), StatusCode::NO_CONTENT);

        for method in [Method::GET, Method::DELETE] {
            let res = app.clone().oneshot(request(method, &path, None)).await.unwrap();
            assert_eq!(res.status(), StatusCode::NOT_FOUND);
            assert_eq!(json_body(res).await["kind"], "not_found");
        }
    }

    #[tokio::test]
    async fn test_wrong_method_is_rejected() {
        let res = app()
            .oneshot(request(Method::GET, "/chat", None))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}
