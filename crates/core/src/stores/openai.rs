use crate::chat::DONE_SENTINEL;
use crate::traits::{CompletionService, DeltaStream};
use crate::{ChatError, ChatMessage, CompletionDelta, CompletionOptions};
use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::{future, Stream, StreamExt};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::fmt::Display;
use tracing::debug;
use url::Url;

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

pub struct OpenAiCompletionService {
    client: Client,
    endpoint: Url,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiCompletionService {
    pub fn new(api_key: impl Into<String>, base_url: &str) -> Result<Self, ChatError> {
        let mut base = Url::parse(base_url)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        Ok(Self {
            client: Client::new(),
            endpoint: base.join("chat/completions")?,
            api_key: api_key.into(),
        })
    }

    async fn post(&self, body: Value) -> Result<reqwest::Response, ChatError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(ChatError::Upstream(
                upstream_error_message(&text).unwrap_or_else(|| format!("{status}: {text}")),
            ));
        }

        Ok(response)
    }
}

#[async_trait]
impl CompletionService for OpenAiCompletionService {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        options: &CompletionOptions,
    ) -> Result<String, ChatError> {
        let response = self
            .post(json!({
                "model": options.model,
                "messages": messages,
                "max_tokens": options.max_tokens,
            }))
            .await?;

        let body = response.bytes().await?;
        let parsed: Value = serde_json::from_slice(&body)?;
        parsed
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ChatError::Upstream("completion response had no content".to_string()))
    }

    async fn complete_stream(
        &self,
        messages: &[ChatMessage],
        options: &CompletionOptions,
    ) -> Result<DeltaStream, ChatError> {
        let response = self
            .post(json!({
                "model": options.model,
                "messages": messages,
                "max_tokens": options.max_tokens,
                "stream": true,
            }))
            .await?;

        debug!(model = %options.model, messages = messages.len(), "completion stream opened");
        Ok(delta_stream(response.bytes_stream()))
    }
}

/// Turns a server-sent-event body into completion deltas, ending at `[DONE]`.
fn delta_stream<S, B, E>(body: S) -> DeltaStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Display + Send + 'static,
{
    body.eventsource()
        .take_while(|event| {
            future::ready(!matches!(event, Ok(event) if event.data.trim() == DONE_SENTINEL))
        })
        .map(|event| match event {
            Ok(event) => parse_chunk(&event.data),
            Err(error) => Err(ChatError::Upstream(error.to_string())),
        })
        .boxed()
}

fn parse_chunk(data: &str) -> Result<CompletionDelta, ChatError> {
    if let Some(message) = upstream_error_message(data) {
        return Err(ChatError::Upstream(message));
    }

    let chunk: StreamChunk = serde_json::from_str(data)?;
    Ok(chunk
        .choices
        .into_iter()
        .next()
        .map(|choice| CompletionDelta {
            text: choice.delta.content,
            stop_reason: choice.finish_reason,
        })
        .unwrap_or_default())
}

fn upstream_error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    let error = value.get("error")?;
    error
        .pointer("/message")
        .and_then(Value::as_str)
        .or_else(|| error.as_str())
        .map(str::to_string)
}
