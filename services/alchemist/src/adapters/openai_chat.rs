//! services/alchemist/src/adapters/openai_chat.rs
//!
//! This module contains the chat session for OpenAI-compatible chat-completion
//! backends. It implements the `ChatSession` port from the `core` crate.
//!
//! The backend is stateless, so the full history is kept here. Each request
//! carries the setup prefix plus only the most recent messages.

use async_trait::async_trait;
use book_alchemist_core::{
    domain::ChatMessage,
    ports::{ChatSession, PortResult},
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::api_error;

const PROVIDER: &str = "OpenAI";

/// System prompt, acknowledgement request and acknowledgement.
const SETUP_LEN: usize = 3;

/// Default bound on the recent messages sent per request.
pub const DEFAULT_WINDOW: usize = 20;

//=========================================================================================
// Wire Types
//=========================================================================================

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<&'a ChatMessage>,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: Option<ReplyMessage>,
}

#[derive(Deserialize)]
struct ReplyMessage {
    content: Option<String>,
}

//=========================================================================================
// The Session
//=========================================================================================

pub struct OpenAiChatSession {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    window: usize,
    history: Vec<ChatMessage>,
}

impl OpenAiChatSession {
    /// Creates a session whose history starts with the three setup messages.
    pub fn new(
        http: reqwest::Client,
        base_url: &str,
        model: String,
        api_key: String,
        window: usize,
        setup: Vec<ChatMessage>,
    ) -> Self {
        Self {
            http,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            api_key,
            model,
            window,
            history: setup,
        }
    }

    /// Everything said so far, including messages no longer sent.
    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    async fn complete(&self) -> PortResult<String> {
        let request = CompletionRequest {
            model: &self.model,
            messages: outgoing_messages(&self.history, self.window),
        };
        debug!(sent = request.messages.len(), kept = self.history.len(), "Sending chat completion.");

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| api_error::from_transport(PROVIDER, e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| api_error::from_transport(PROVIDER, e))?;
        if !status.is_success() {
            return Err(api_error::from_response(PROVIDER, status, &body));
        }

        let parsed: CompletionResponse =
            serde_json::from_str(&body).map_err(|_| api_error::malformed(PROVIDER))?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|message| message.content)
            .ok_or_else(|| api_error::malformed(PROVIDER))
    }
}

#[async_trait]
impl ChatSession for OpenAiChatSession {
    /// A failed call drops the pending user turn again, so retrying never
    /// sends two user turns in a row.
    async fn send_message(&mut self, message: &str) -> PortResult<String> {
        self.history.push(ChatMessage::user(message));
        match self.complete().await {
            Ok(reply) => {
                self.history.push(ChatMessage::assistant(reply.clone()));
                Ok(reply)
            }
            Err(e) => {
                // Keep user/assistant alternation intact for the retry.
                self.history.pop();
                Err(e)
            }
        }
    }
}

/// The setup prefix followed by at most `window` of the latest messages.
pub(crate) fn outgoing_messages(history: &[ChatMessage], window: usize) -> Vec<&ChatMessage> {
    let split = SETUP_LEN.min(history.len());
    let (setup, conversation) = history.split_at(split);
    if conversation.len() > window {
        setup
            .iter()
            .chain(&conversation[conversation.len() - window..])
            .collect()
    } else {
        history.iter().collect()
    }
}
