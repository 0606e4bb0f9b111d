use std::time::Duration;

use async_trait::async_trait;
use futures_util::{Stream, StreamExt};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::{ChatEventStream, ChatRequest, ModelProvider, StreamEvent};
use crate::classification::ClassificationCandidate;
use crate::conversation::{ConversationMessage, Role};
use crate::error::AppError;

// ============================================================================
// Helper
// ============================================================================

/// Convert any displayable error into `AppError::Provider`.
fn provider_err(e: impl std::fmt::Display) -> AppError {
    AppError::Provider(e.to_string())
}

fn cohere_role(role: Role) -> &'static str {
    match role {
        Role::System => "SYSTEM",
        Role::User => "USER",
        Role::Assistant => "CHATBOT",
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Serialize)]
struct HistoryEntry<'a> {
    role: &'static str,
    message: &'a str,
}

impl<'a> From<&'a ConversationMessage> for HistoryEntry<'a> {
    fn from(m: &'a ConversationMessage) -> Self {
        Self {
            role: cohere_role(m.role),
            message: &m.text,
        }
    }
}

#[derive(Serialize)]
struct ChatBody<'a> {
    model: &'a str,
    message: &'a str,
    temperature: f32,
    chat_history: Vec<HistoryEntry<'a>>,
    prompt_truncation: &'static str,
    stream: bool,
}

impl<'a> ChatBody<'a> {
    fn new(request: &'a ChatRequest, stream: bool) -> Self {
        Self {
            model: &request.model,
            message: &request.message,
            temperature: request.temperature,
            chat_history: request.history.iter().map(HistoryEntry::from).collect(),
            prompt_truncation: request.truncation.as_str(),
            stream,
        }
    }
}

#[derive(Deserialize)]
struct ChatResponseBody {
    text: String,
}

#[derive(Serialize)]
struct ClassifyBody<'a> {
    model: &'a str,
    inputs: &'a [String],
}

#[derive(Deserialize)]
struct ClassifyResponseBody {
    classifications: Vec<RawClassification>,
}

#[derive(Deserialize)]
struct RawClassification {
    #[serde(default)]
    prediction: String,
    confidence: f64,
}

#[derive(Deserialize)]
struct RawStreamEvent {
    event_type: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    finish_reason: Option<String>,
    /// Present on error payloads instead of `event_type`.
    #[serde(default)]
    message: Option<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

// ============================================================================
// Stream decoding
// ============================================================================

/// Parse one newline-delimited JSON line of a chat stream.
/// Blank lines yield `Ok(None)`.
pub(crate) fn parse_stream_line(line: &[u8]) -> Result<Option<StreamEvent>, AppError> {
    let line = line.trim_ascii();
    if line.is_empty() {
        return Ok(None);
    }

    let raw: RawStreamEvent = serde_json::from_slice(line)
        .map_err(|e| provider_err(format!("malformed stream event: {e}")))?;

    let event = match raw.event_type.as_deref() {
        Some("text-generation") => StreamEvent::TextGeneration(raw.text.unwrap_or_default()),
        Some("stream-end") => StreamEvent::StreamEnd {
            finish_reason: raw.finish_reason,
        },
        Some(other) => StreamEvent::Other(other.to_string()),
        None => {
            return Err(provider_err(
                raw.message
                    .unwrap_or_else(|| "stream event without event_type".to_string()),
            ))
        }
    };
    Ok(Some(event))
}

/// Turn a chunked byte body into a stream of decoded events. Chunk boundaries
/// need not align with lines. The first error ends the stream.
pub(crate) fn decode_event_stream<S, B, E>(body: S) -> ChatEventStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    let initial = (Box::pin(body), Vec::<u8>::new(), false);

    futures_util::stream::unfold(initial, |(mut body, mut buf, mut done)| async move {
        loop {
            if let Some(pos) = buf.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = buf.drain(..=pos).collect();
                match parse_stream_line(&line) {
                    Ok(None) => continue,
                    Ok(Some(event)) => return Some((Ok(event), (body, buf, done))),
                    Err(e) => {
                        buf.clear();
                        return Some((Err(e), (body, buf, true)));
                    }
                }
            }

            if done {
                // Trailing line without a newline.
                let rest = std::mem::take(&mut buf);
                return match parse_stream_line(&rest) {
                    Ok(None) => None,
                    Ok(Some(event)) => Some((Ok(event), (body, buf, true))),
                    Err(e) => Some((Err(e), (body, buf, true))),
                };
            }

            match body.next().await {
                Some(Ok(chunk)) => buf.extend_from_slice(chunk.as_ref()),
                Some(Err(e)) => {
                    buf.clear();
                    return Some((Err(provider_err(format!("stream error: {e}"))), (body, buf, true)));
                }
                None => done = true,
            }
        }
    })
    .boxed()
}

// ============================================================================
// CohereClient
// ============================================================================

/// HTTP client for the Cohere v1 chat and classify endpoints.
pub struct CohereClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl CohereClient {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    // --------------------------------------------------------------------
    // Private HTTP helpers
    // --------------------------------------------------------------------

    fn authed(&self, path: &str) -> reqwest::RequestBuilder {
        self.http
            .post(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.api_key)
    }

    /// Send a request and fail with the provider's own message on non-2xx.
    async fn send(&self, req: reqwest::RequestBuilder) -> Result<reqwest::Response, AppError> {
        let response = req.send().await.map_err(provider_err)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .map(|b| b.message)
            .unwrap_or(body);
        tracing::warn!(status = %status, "Provider request failed: {}", message);
        Err(AppError::Provider(format!("provider returned {status}: {message}")))
    }

    async fn send_json<T: DeserializeOwned>(&self, req: reqwest::RequestBuilder) -> Result<T, AppError> {
        self.send(req).await?.json().await.map_err(provider_err)
    }
}

#[async_trait]
impl ModelProvider for CohereClient {
    /// `POST /v1/chat`
    async fn chat(&self, request: ChatRequest) -> Result<String, AppError> {
        tracing::debug!(model = %request.model, history = request.history.len(), "chat");
        let req = self.authed("/v1/chat").json(&ChatBody::new(&request, false));
        let body: ChatResponseBody = self.send_json(req).await?;
        Ok(body.text)
    }

    /// `POST /v1/chat` with `stream: true`; the body is newline-delimited JSON.
    async fn chat_stream(&self, request: ChatRequest) -> Result<ChatEventStream, AppError> {
        tracing::debug!(model = %request.model, "chat_stream");
        let req = self.authed("/v1/chat").json(&ChatBody::new(&request, true));
        let response = self.send(req).await?;
        Ok(decode_event_stream(response.bytes_stream()))
    }

    /// `POST /v1/classify`
    async fn classify(
        &self,
        model: &str,
        inputs: Vec<String>,
    ) -> Result<Vec<ClassificationCandidate>, AppError> {
        tracing::debug!(model = %model, inputs = inputs.len(), "classify");
        let req = self.authed("/v1/classify").json(&ClassifyBody {
            model,
            inputs: &inputs,
        });
        let body: ClassifyResponseBody = self.send_json(req).await?;
        Ok(body
            .classifications
            .into_iter()
            .map(|c| ClassificationCandidate {
                label: c.prediction,
                confidence: c.confidence,
            })
            .collect())
    }
}
