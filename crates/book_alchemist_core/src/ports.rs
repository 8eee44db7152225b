//! crates/book_alchemist_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the
//! generation core to run against real LLM backends and a real store, or
//! against fakes in tests.

use async_trait::async_trait;
use std::time::Duration;
use uuid::Uuid;

use crate::domain::{ApiConfig, Project};
use crate::prompt::ConversationSeed;

/// The continuation turn sent when no explicit message is given ("next page").
pub const CONTINUE_TOKEN: &str = "next";

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (network, files).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    /// The request never produced a usable HTTP exchange (unreachable, timeout,
    /// or an error body that could not be decoded).
    #[error("Transport error: {0}")]
    Transport(String),
    /// The provider answered, but with an error or with a payload we cannot use.
    #[error("{provider} API error: {message}")]
    Provider { provider: String, message: String },
    /// A provider error signalling throttling (HTTP 429 / RESOURCE_EXHAUSTED).
    #[error("{provider} rate limit (429): {message}")]
    RateLimited { provider: String, message: String },
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

impl PortError {
    /// Whether the failure indicates throttling and is worth waiting out.
    pub fn is_rate_limit(&self) -> bool {
        if matches!(self, PortError::RateLimited { .. }) {
            return true;
        }
        let text = self.to_string();
        text.contains("429") || text.contains("RESOURCE_EXHAUSTED")
    }
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// A conversation with an LLM backend. Turns are strictly sequential, which
/// `&mut self` enforces.
#[async_trait]
pub trait ChatSession: Send {
    /// Sends one user turn and returns the raw text of the model's reply.
    async fn send_message(&mut self, message: &str) -> PortResult<String>;

    /// Asks for the next page.
    async fn continue_story(&mut self) -> PortResult<String> {
        self.send_message(CONTINUE_TOKEN).await
    }
}

/// Opens a fresh session for the configured backend, seeded with the prompt.
pub trait ChatSessionFactory: Send + Sync {
    fn open(&self, config: &ApiConfig, seed: ConversationSeed) -> PortResult<Box<dyn ChatSession>>;
}

/// The persisted projects as seen by the generation controller.
#[async_trait]
pub trait ProjectStore: Send + Sync {
    /// The currently active project, if any.
    async fn active_project(&self) -> PortResult<Option<Project>>;

    async fn api_config(&self) -> PortResult<Option<ApiConfig>>;

    /// Clears the pages of the project.
    async fn reset_pages(&self, project_id: Uuid) -> PortResult<()>;

    /// Appends one batch of pages to the project as a single change.
    async fn append_pages(&self, project_id: Uuid, pages: &[String]) -> PortResult<()>;

    async fn set_step(&self, project_id: Uuid, step: u8) -> PortResult<()>;

    /// Whether the given project is still the active one.
    async fn is_active(&self, project_id: Uuid) -> PortResult<bool> {
        Ok(self
            .active_project()
            .await?
            .is_some_and(|project| project.id == project_id))
    }
}

/// Suspends the caller. Injected so backoff and pacing can be observed in tests.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// The real clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
