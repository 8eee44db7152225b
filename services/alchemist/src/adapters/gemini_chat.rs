//! services/alchemist/src/adapters/gemini_chat.rs
//!
//! This module contains the chat session for the Gemini `generateContent` API.
//! It implements the `ChatSession` port from the `core` crate.
//!
//! The session plays the role of Gemini's chat object: every turn carries the
//! whole conversation, and nothing is ever trimmed.

use async_trait::async_trait;
use book_alchemist_core::{
    domain::{ChatMessage, ChatRole},
    ports::{ChatSession, PortResult},
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::api_error;

const PROVIDER: &str = "Gemini";

//=========================================================================================
// Wire Types
//=========================================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Content {
    role: String,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

impl Content {
    fn text(role: &str, text: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            parts: vec![Part { text: Some(text.into()) }],
        }
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: &'a [Content],
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<Content>,
}

//=========================================================================================
// The Session
//=========================================================================================

pub struct GeminiChatSession {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    contents: Vec<Content>,
}

impl GeminiChatSession {
    /// Creates a session primed with the seed exchange.
    pub fn new(
        http: reqwest::Client,
        base_url: &str,
        model: &str,
        api_key: String,
        history: Vec<ChatMessage>,
    ) -> Self {
        let model_path = if model.starts_with("models/") {
            model.to_string()
        } else {
            format!("models/{}", model)
        };
        Self {
            http,
            endpoint: format!(
                "{}/{}:generateContent",
                base_url.trim_end_matches('/'),
                model_path
            ),
            api_key,
            contents: history
                .into_iter()
                .map(|message| Content::text(role_of(message.role), message.content))
                .collect(),
        }
    }

    /// Number of turns the conversation holds, seed included.
    pub fn turns(&self) -> usize {
        self.contents.len()
    }

    async fn generate(&self) -> PortResult<String> {
        debug!(turns = self.contents.len(), "Sending generateContent.");
        let response = self
            .http
            .post(&self.endpoint)
            .header("x-goog-api-key", &self.api_key)
            .json(&GenerateRequest { contents: &self.contents })
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

        let parsed: GenerateResponse =
            serde_json::from_str(&body).map_err(|_| api_error::malformed(PROVIDER))?;
        let texts: Vec<String> = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .map(|content| content.parts.into_iter().filter_map(|part| part.text).collect())
            .unwrap_or_default();
        if texts.is_empty() {
            return Err(api_error::malformed(PROVIDER));
        }
        Ok(texts.concat())
    }
}

/// Gemini only knows `user` and `model` turns.
fn role_of(role: ChatRole) -> &'static str {
    match role {
        ChatRole::Assistant => "model",
        ChatRole::User | ChatRole::System => "user",
    }
}

#[async_trait]
impl ChatSession for GeminiChatSession {
    async fn send_message(&mut self, message: &str) -> PortResult<String> {
        self.contents.push(Content::text("user", message));
        match self.generate().await {
            Ok(reply) => {
                self.contents.push(Content::text("model", reply.clone()));
                Ok(reply)
            }
            Err(e) => {
                self.contents.pop();
                Err(e)
            }
        }
    }
}
