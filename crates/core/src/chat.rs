use crate::traits::CompletionService;
use crate::{ChatError, ChatMessage, CompletionOptions, ContentPart, MessageContent, Role};
use async_stream::stream;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use futures::stream::BoxStream;
use futures::StreamExt;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, warn};

pub const DONE_SENTINEL: &str = "[DONE]";
const SINGLE_SHOT_IMAGE_MIME: &str = "image/png";

// Browsers and CLI encoders disagree on padding, so accept either.
const IMAGE_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// One unit forwarded to the caller of a streaming chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayEvent {
    Token(String),
    Done,
    Error(String),
}

impl RelayEvent {
    pub fn data(&self) -> String {
        match self {
            RelayEvent::Token(text) => text.clone(),
            RelayEvent::Done => DONE_SENTINEL.to_string(),
            RelayEvent::Error(message) => json!({ "error": message }).to_string(),
        }
    }

    pub fn to_frame(&self) -> String {
        format!("data: {}\n\n", self.data())
    }
}

pub type RelayStream = BoxStream<'static, RelayEvent>;

/// Shapes a conversation for the completion service.
///
/// User messages with part lists go through untouched. Every other message is
/// reduced to plain text, keeping only the first part when it has parts.
pub fn normalize_messages(messages: Vec<ChatMessage>) -> Vec<ChatMessage> {
    messages
        .into_iter()
        .map(|message| match (message.role, message.content) {
            (Role::User, MessageContent::Parts(parts)) => ChatMessage::with_parts(Role::User, parts),
            (role, MessageContent::Text(text)) => ChatMessage::new(role, text),
            (role, MessageContent::Parts(parts)) => {
                let first = parts
                    .first()
                    .and_then(ContentPart::as_text)
                    .unwrap_or_default();
                ChatMessage::new(role, first)
            }
        })
        .collect()
}

pub struct ChatRelay {
    service: Arc<dyn CompletionService>,
    options: CompletionOptions,
}

impl ChatRelay {
    pub fn new(service: Arc<dyn CompletionService>, options: CompletionOptions) -> Self {
        Self { service, options }
    }

    pub async fn chat(&self, message: &str, images: &[String]) -> Result<String, ChatError> {
        let mut parts = Vec::with_capacity(images.len() + 1);
        parts.push(ContentPart::text(message));
        for (position, image) in images.iter().enumerate() {
            let compact: String = image.chars().filter(|c| !c.is_ascii_whitespace()).collect();
            if IMAGE_BASE64.decode(&compact).is_err() {
                return Err(ChatError::BadRequest(format!(
                    "Image {position} is not valid base64"
                )));
            }
            parts.push(ContentPart::image_data(SINGLE_SHOT_IMAGE_MIME, &compact));
        }

        let messages = vec![ChatMessage::with_parts(Role::User, parts)];
        let response = self.service.complete(&messages, &self.options).await?;
        debug!(images = images.len(), chars = response.len(), "chat completed");
        Ok(response)
    }

    /// Opens a one-shot relay over the completion stream.
    ///
    /// Nothing is requested upstream until the returned stream is polled, and
    /// dropping it stops pulling further chunks. The stream yields tokens in
    /// arrival order and always ends with exactly one terminal event.
    pub fn chat_stream(&self, messages: Vec<ChatMessage>) -> Result<RelayStream, ChatError> {
        if messages.is_empty() {
            return Err(ChatError::BadRequest("No messages provided".to_string()));
        }

        let service = Arc::clone(&self.service);
        let options = self.options.clone();
        let messages = normalize_messages(messages);

        let relay = stream! {
            let mut upstream = match service.complete_stream(&messages, &options).await {
                Ok(upstream) => upstream,
                Err(error) => {
                    warn!(%error, "chat stream failed to open");
                    yield RelayEvent::Error(error.to_string());
                    return;
                }
            };

            let mut tokens = 0usize;
            while let Some(item) = upstream.next().await {
                match item {
                    Ok(delta) => {
                        if let Some(text) = delta.text.filter(|text| !text.is_empty()) {
                            tokens += 1;
                            yield RelayEvent::Token(text);
                        }
                        if let Some(reason) = delta.stop_reason {
                            debug!(tokens, %reason, "chat stream finished");
                            yield RelayEvent::Done;
                            return;
                        }
                    }
                    Err(error) => {
                        warn!(tokens, %error, "chat stream interrupted");
                        yield RelayEvent::Error(error.to_string());
                        return;
                    }
                }
            }

            debug!(tokens, "chat stream ended without stop reason");
            yield RelayEvent::Done;
        };

        Ok(Box::pin(relay))
    }
}
