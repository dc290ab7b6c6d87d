//! Minimal streaming client for the Anthropic Messages API.
//!
//! This crate covers exactly what an interactive narration loop needs:
//! - a system prompt plus a short text conversation, including an assistant
//!   prefill the model continues from
//! - per-request model, token limit and temperature
//! - incremental consumption of the response, either as typed stream events
//!   or as a plain stream of text chunks
//!
//! There is no non-streaming path and no tool use.

use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use thiserror::Error;
use tokio_stream::Stream;

const API_BASE: &str = "https://api.anthropic.com/v1";
const API_VERSION: &str = "2023-06-01";
const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

/// Errors that can occur when using the client.
#[derive(Debug, Error)]
pub enum Error {
    #[error("API key not configured")]
    NoApiKey,

    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Stream error from provider: {0}")]
    Stream(String),

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// A stream of typed events from one Messages API response.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, Error>> + Send>>;

/// A stream of response text chunks in arrival order. Finite, not
/// restartable.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String, Error>> + Send>>;

/// Anthropic API client.
#[derive(Clone)]
pub struct Claude {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl Claude {
    /// Create a client with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(120))
                .connect_timeout(std::time::Duration::from_secs(30))
                .build()
                .expect("Failed to build HTTP client"),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    /// Create a client from the `ANTHROPIC_API_KEY` environment variable.
    pub fn from_env() -> Result<Self, Error> {
        let api_key = std::env::var("ANTHROPIC_API_KEY").map_err(|_| Error::NoApiKey)?;
        Ok(Self::new(api_key))
    }

    /// Set the model used when a request does not name one.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Send a request and stream back typed response events.
    pub async fn stream(&self, request: Request) -> Result<EventStream, Error> {
        let api_request = self.build_api_request(&request);
        let headers = self.build_headers()?;

        let response = self
            .client
            .post(format!("{API_BASE}/messages"))
            .headers(headers)
            .json(&api_request)
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Api {
                status,
                message: body,
            });
        }

        // SSE events may be split across network chunks; scan carries the
        // unconsumed tail between reads.
        let stream = response
            .bytes_stream()
            .scan(String::new(), |buffer, result| {
                let events = match result {
                    Ok(bytes) => {
                        buffer.push_str(&String::from_utf8_lossy(&bytes));
                        drain_sse_buffer(buffer)
                    }
                    Err(e) => vec![Err(Error::Network(e.to_string()))],
                };
                futures::future::ready(Some(events))
            })
            .flat_map(futures::stream::iter);

        Ok(Box::pin(stream))
    }

    /// Send a request and stream back only the response text.
    ///
    /// Control events are dropped. An in-stream error event from the
    /// provider surfaces as [`Error::Stream`].
    pub async fn stream_text(&self, request: Request) -> Result<TextStream, Error> {
        Ok(filter_text(self.stream(request).await?))
    }

    fn build_headers(&self) -> Result<HeaderMap, Error> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(&self.api_key)
                .map_err(|e| Error::Config(format!("Invalid API key: {e}")))?,
        );
        headers.insert("anthropic-version", HeaderValue::from_static(API_VERSION));
        Ok(headers)
    }

    fn build_api_request(&self, request: &Request) -> ApiRequest {
        ApiRequest {
            model: request.model.clone().unwrap_or_else(|| self.model.clone()),
            max_tokens: request.max_tokens,
            system: request.system.clone(),
            messages: request
                .messages
                .iter()
                .map(|m| ApiMessage {
                    role: match m.role {
                        Role::User => "user".to_string(),
                        Role::Assistant => "assistant".to_string(),
                    },
                    content: m.content.clone(),
                })
                .collect(),
            temperature: request.temperature,
            stream: true,
        }
    }
}

// ============================================================================
// Public request types
// ============================================================================

/// A completion request.
#[derive(Debug, Clone)]
pub struct Request {
    pub model: Option<String>,
    pub max_tokens: usize,
    pub system: Option<String>,
    pub messages: Vec<Message>,
    pub temperature: Option<f32>,
}

impl Request {
    /// Create a request with the given messages.
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            model: None,
            max_tokens: 1024,
            system: None,
            messages,
            temperature: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// A text message in the conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    /// Create a user message.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: text.into(),
        }
    }

    /// Create an assistant message. Sent as the last message of a request,
    /// this acts as a prefill the model continues from.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: text.into(),
        }
    }
}

/// The role of a message sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

// ============================================================================
// Streaming types
// ============================================================================

/// Events from a streaming response.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    MessageStart { id: String, model: String },
    ContentBlockStart { index: usize },
    TextDelta { index: usize, text: String },
    ContentBlockStop { index: usize },
    MessageDelta { stop_reason: Option<StopReason> },
    MessageStop,
    Ping,
    Error { message: String },
}

/// Why the model stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    EndTurn,
    MaxTokens,
    StopSequence,
}

// ============================================================================
// Internal API types
// ============================================================================

#[derive(Debug, Serialize)]
struct ApiRequest {
    model: String,
    max_tokens: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<ApiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ApiStreamEvent {
    MessageStart {
        message: ApiMessageStart,
    },
    ContentBlockStart {
        index: usize,
    },
    ContentBlockDelta {
        index: usize,
        delta: ApiDelta,
    },
    ContentBlockStop {
        index: usize,
    },
    MessageDelta {
        delta: ApiMessageDelta,
    },
    MessageStop,
    Ping,
    Error {
        error: ApiError,
    },
}

#[derive(Debug, Deserialize)]
struct ApiMessageStart {
    id: String,
    model: String,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[allow(clippy::enum_variant_names)]
enum ApiDelta {
    TextDelta { text: String },
    ThinkingDelta { thinking: String },
}

#[derive(Debug, Deserialize)]
struct ApiMessageDelta {
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

/// Reduce an event stream to its text chunks.
fn filter_text(events: EventStream) -> TextStream {
    let text = events.filter_map(|event| {
        let mapped = match event {
            Ok(StreamEvent::TextDelta { text, .. }) => Some(Ok(text)),
            Ok(StreamEvent::Error { message }) => Some(Err(Error::Stream(message))),
            Ok(_) => None,
            Err(e) => Some(Err(e)),
        };
        futures::future::ready(mapped)
    });
    Box::pin(text)
}

/// Drain complete SSE events from the front of `buffer`.
///
/// Events are newline-delimited `data:` lines. Complete lines are parsed and
/// removed; an incomplete trailing line stays in the buffer until the next
/// network chunk arrives.
fn drain_sse_buffer(buffer: &mut String) -> Vec<Result<StreamEvent, Error>> {
    let mut events = Vec::new();

    loop {
        let Some(newline_pos) = buffer.find('\n') else {
            break;
        };

        let line = &buffer[..newline_pos];

        if let Some(json_str) = line.strip_prefix("data: ") {
            if json_str == "[DONE]" {
                events.push(Ok(StreamEvent::MessageStop));
            } else if !json_str.is_empty() {
                match serde_json::from_str::<ApiStreamEvent>(json_str) {
                    Ok(event) => events.push(Ok(convert_stream_event(event))),
                    Err(e) => {
                        // A truncated JSON payload means the server split the
                        // event mid-line; leave it for the next chunk.
                        if e.is_eof() {
                            break;
                        }
                        events.push(Err(Error::Parse(format!("SSE parse error: {e}"))));
                    }
                }
            }
        }
        // `event:` lines, blank separators and other SSE metadata fall through.

        buffer.drain(..=newline_pos);
    }

    events
}

fn convert_stream_event(event: ApiStreamEvent) -> StreamEvent {
    match event {
        ApiStreamEvent::MessageStart { message } => StreamEvent::MessageStart {
            id: message.id,
            model: message.model,
        },
        ApiStreamEvent::ContentBlockStart { index } => StreamEvent::ContentBlockStart { index },
        ApiStreamEvent::ContentBlockDelta { index, delta } => match delta {
            ApiDelta::TextDelta { text } => StreamEvent::TextDelta { index, text },
            ApiDelta::ThinkingDelta { thinking } => StreamEvent::TextDelta {
                index,
                text: thinking,
            },
        },
        ApiStreamEvent::ContentBlockStop { index } => StreamEvent::ContentBlockStop { index },
        ApiStreamEvent::MessageDelta { delta } => StreamEvent::MessageDelta {
            stop_reason: delta.stop_reason.map(|s| match s.as_str() {
                "max_tokens" => StopReason::MaxTokens,
                "stop_sequence" => StopReason::StopSequence,
                _ => StopReason::EndTurn,
            }),
        },
        ApiStreamEvent::MessageStop => StreamEvent::MessageStop,
        ApiStreamEvent::Ping => StreamEvent::Ping,
        ApiStreamEvent::Error { error } => StreamEvent::Error {
            message: error.message,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = Claude::new("test-key");
        assert_eq!(client.model, DEFAULT_MODEL);
    }

    #[test]
    fn test_client_with_model() {
        let client = Claude::new("test-key").with_model("claude-opus-4-20250514");
        assert_eq!(client.model, "claude-opus-4-20250514");
    }

    #[test]
    fn test_from_env_requires_key() {
        // No other test in this crate reads the variable.
        std::env::remove_var("ANTHROPIC_API_KEY");
        assert!(matches!(Claude::from_env(), Err(Error::NoApiKey)));
    }

    #[test]
    fn test_request_builder() {
        let request = Request::new(vec![Message::user("Hello")])
            .with_system("You are a narrator")
            .with_max_tokens(600)
            .with_temperature(0.7);

        assert_eq!(request.max_tokens, 600);
        assert_eq!(request.system.as_deref(), Some("You are a narrator"));
        assert_eq!(request.temperature, Some(0.7));
    }

    #[test]
    fn test_message_creation() {
        let user_msg = Message::user("Hello");
        assert!(matches!(user_msg.role, Role::User));
        assert_eq!(user_msg.content, "Hello");

        let prefill = Message::assistant("Narrator:");
        assert!(matches!(prefill.role, Role::Assistant));
    }

    #[test]
    fn test_api_request_keeps_prefill_order() {
        let client = Claude::new("test-key");
        let request = Request::new(vec![
            Message::user("Look around."),
            Message::assistant("Narrator:\n<Narration>"),
        ])
        .with_temperature(0.7);

        let api_request = client.build_api_request(&request);
        let value = serde_json::to_value(&api_request).unwrap();

        assert_eq!(value["stream"], true);
        assert_eq!(value["messages"][0]["role"], "user");
        assert_eq!(value["messages"][1]["role"], "assistant");
        assert_eq!(value["messages"][1]["content"], "Narrator:\n<Narration>");
    }

    #[test]
    fn test_api_request_omits_unset_fields() {
        let client = Claude::new("test-key");
        let request = Request::new(vec![Message::user("hi")]);
        let value = serde_json::to_value(client.build_api_request(&request)).unwrap();

        assert!(value.get("system").is_none());
        assert!(value.get("temperature").is_none());
        assert_eq!(value["model"], DEFAULT_MODEL);
    }

    #[test]
    fn test_drain_complete_events() {
        let mut buffer = String::from(
            "event: content_block_delta\n\
             data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"You enter\"}}\n\n\
             data: {\"type\":\"message_stop\"}\n\n",
        );

        let events = drain_sse_buffer(&mut buffer);
        assert_eq!(events.len(), 2);
        assert!(matches!(
            &events[0],
            Ok(StreamEvent::TextDelta { text, .. }) if text == "You enter"
        ));
        assert!(matches!(events[1], Ok(StreamEvent::MessageStop)));
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_drain_waits_for_split_event() {
        let mut buffer = String::from(
            "data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"te",
        );

        let events = drain_sse_buffer(&mut buffer);
        assert!(events.is_empty());
        assert!(!buffer.is_empty());

        buffer.push_str("xt\":\" the tavern\"}}\n");
        let events = drain_sse_buffer(&mut buffer);
        assert_eq!(events.len(), 1);
        assert!(matches!(
            &events[0],
            Ok(StreamEvent::TextDelta { text, .. }) if text == " the tavern"
        ));
    }

    #[test]
    fn test_drain_handles_done_marker() {
        let mut buffer = String::from("data: [DONE]\n");
        let events = drain_sse_buffer(&mut buffer);
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], Ok(StreamEvent::MessageStop)));
    }

    #[test]
    fn test_drain_surfaces_error_events() {
        let mut buffer = String::from(
            "data: {\"type\":\"error\",\"error\":{\"type\":\"overloaded_error\",\"message\":\"Overloaded\"}}\n",
        );
        let events = drain_sse_buffer(&mut buffer);
        assert_eq!(events.len(), 1);
        assert!(matches!(
            &events[0],
            Ok(StreamEvent::Error { message }) if message == "Overloaded"
        ));
    }

    #[test]
    fn test_drain_parses_stop_reason() {
        let mut buffer = String::from(
            "data: {\"type\":\"message_delta\",\"delta\":{\"stop_reason\":\"max_tokens\",\"stop_sequence\":null},\"usage\":{\"output_tokens\":600}}\n",
        );
        let events = drain_sse_buffer(&mut buffer);
        assert_eq!(events.len(), 1);
        assert!(matches!(
            events[0],
            Ok(StreamEvent::MessageDelta {
                stop_reason: Some(StopReason::MaxTokens)
            })
        ));
    }

    #[tokio::test]
    async fn test_filter_text_drops_control_events() {
        let events: Vec<Result<StreamEvent, Error>> = vec![
            Ok(StreamEvent::MessageStart {
                id: "msg_1".to_string(),
                model: DEFAULT_MODEL.to_string(),
            }),
            Ok(StreamEvent::ContentBlockStart { index: 0 }),
            Ok(StreamEvent::TextDelta {
                index: 0,
                text: "You ".to_string(),
            }),
            Ok(StreamEvent::Ping),
            Ok(StreamEvent::TextDelta {
                index: 0,
                text: "enter.".to_string(),
            }),
            Ok(StreamEvent::ContentBlockStop { index: 0 }),
            Ok(StreamEvent::MessageStop),
        ];

        let mut text = filter_text(Box::pin(futures::stream::iter(events)));
        let mut collected = String::new();
        while let Some(chunk) = text.next().await {
            collected.push_str(&chunk.unwrap());
        }
        assert_eq!(collected, "You enter.");
    }

    #[tokio::test]
    async fn test_filter_text_surfaces_stream_errors() {
        let events: Vec<Result<StreamEvent, Error>> = vec![
            Ok(StreamEvent::TextDelta {
                index: 0,
                text: "partial".to_string(),
            }),
            Ok(StreamEvent::Error {
                message: "Overloaded".to_string(),
            }),
        ];

        let mut text = filter_text(Box::pin(futures::stream::iter(events)));
        assert_eq!(text.next().await.unwrap().unwrap(), "partial");
        assert!(matches!(
            text.next().await.unwrap(),
            Err(Error::Stream(message)) if message == "Overloaded"
        ));
    }
}
