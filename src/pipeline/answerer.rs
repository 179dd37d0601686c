//! Grounded answer generation.
use std::sync::Arc;

use tracing::debug;

use crate::models::Answer;
use crate::openai::{ChatMessage, ChatModel, Choice, ModelError};

/// Returned when the model produced no usable content.
pub const FALLBACK_ANSWER: &str = "I'm sorry, I couldn't generate a response.";

/// Default hard ceiling on generated tokens.
pub const MAX_OUTPUT_TOKENS: u32 = 4096;

/// Build the chat exchange for one request.
///
/// System instruction, then the user's text. When images are present, the
/// first `max_images` of them follow as a separate user turn.
pub fn build_messages(
    system_prompt: &str,
    user_message: &str,
    images: &[String],
    max_images: usize,
) -> Vec<ChatMessage> {
    let mut messages = vec![
        ChatMessage::system(system_prompt),
        ChatMessage::user(user_message),
    ];
    let forwarded = &images[..images.len().min(max_images)];
    if !forwarded.is_empty() {
        messages.push(ChatMessage::user_images(forwarded.iter().map(String::as_str)));
    }
    messages
}

/// First choice's content, or the fallback text.
pub fn extract_answer(choices: &[Choice]) -> Answer {
    let text = choices
        .first()
        .and_then(Choice::text)
        .unwrap_or(FALLBACK_ANSWER);
    Answer {
        text: text.to_string(),
    }
}

pub struct Answerer {
    model: Arc<dyn ChatModel>,
    max_output_tokens: u32,
    max_images_to_model: usize,
}

impl Answerer {
    pub fn new(model: Arc<dyn ChatModel>, max_output_tokens: u32, max_images_to_model: usize) -> Self {
        Self {
            model,
            max_output_tokens,
            max_images_to_model,
        }
    }

    pub async fn answer(
        &self,
        system_prompt: &str,
        user_message: &str,
        images: &[String],
    ) -> Result<Answer, ModelError> {
        let messages = build_messages(system_prompt, user_message, images, self.max_images_to_model);
        debug!(
            "sending {} messages ({} of {} images)",
            messages.len(),
            images.len().min(self.max_images_to_model),
            images.len()
        );
        let choices = self.model.complete(&messages, self.max_output_tokens).await?;
        Ok(extract_answer(&choices))
    }
}
