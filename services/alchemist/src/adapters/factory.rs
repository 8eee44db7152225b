//! services/alchemist/src/adapters/factory.rs
//!
//! Opens the chat session matching the configured provider.

use book_alchemist_core::{
    domain::{AiProvider, ApiConfig},
    ports::{ChatSession, ChatSessionFactory, PortError, PortResult},
    prompt::ConversationSeed,
};
use std::sync::Arc;

use super::{gemini_chat::GeminiChatSession, openai_chat::OpenAiChatSession};
use crate::config::Config;
use crate::error::AppError;

/// Implements `ChatSessionFactory` over one shared HTTP client.
#[derive(Clone)]
pub struct ProviderSessionFactory {
    http: reqwest::Client,
    config: Arc<Config>,
}

impl ProviderSessionFactory {
    pub fn new(config: Arc<Config>) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { http, config })
    }
}

impl ChatSessionFactory for ProviderSessionFactory {
    fn open(&self, api: &ApiConfig, seed: ConversationSeed) -> PortResult<Box<dyn ChatSession>> {
        let key = api.key.trim();
        if key.is_empty() {
            return Err(PortError::Unexpected(
                "No API key provided for the chat session".to_string(),
            ));
        }

        let session: Box<dyn ChatSession> = match api.provider {
            AiProvider::Gemini => Box::new(GeminiChatSession::new(
                self.http.clone(),
                &self.config.gemini_base_url,
                &self.config.gemini_model,
                key.to_string(),
                seed.session_history(),
            )),
            AiProvider::OpenAi => Box::new(OpenAiChatSession::new(
                self.http.clone(),
                &self.config.openai_base_url,
                self.config.openai_model.clone(),
                key.to_string(),
                self.config.conversation_window,
                seed.setup_messages(),
            )),
        };
        Ok(session)
    }
}
