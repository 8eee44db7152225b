//! services/alchemist/src/adapters/api_error.rs
//!
//! Maps failed HTTP exchanges with an LLM backend onto `PortError`.

use book_alchemist_core::ports::PortError;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;

/// Both OpenAI and Gemini wrap failures in `{"error": {...}}`.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    /// Gemini's canonical status, e.g. `RESOURCE_EXHAUSTED`.
    status: Option<String>,
    /// A string for OpenAI, a number for Gemini.
    code: Option<Value>,
}

/// Converts a non-success response into the matching error.
///
/// A body that cannot be decoded yields a transport failure carrying the status.
pub(crate) fn from_response(provider: &str, status: StatusCode, body: &str) -> PortError {
    let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(body) else {
        return PortError::Transport(format!("{} request failed with HTTP {}", provider, status));
    };
    let error = envelope.error;
    let message = error
        .message
        .filter(|m| !m.trim().is_empty())
        .or_else(|| status.canonical_reason().map(str::to_string))
        .unwrap_or_else(|| status.to_string());

    let exhausted = error.status.as_deref() == Some("RESOURCE_EXHAUSTED")
        || matches!(&error.code, Some(Value::String(code)) if code == "rate_limit_exceeded");
    if status == StatusCode::TOO_MANY_REQUESTS || exhausted {
        PortError::RateLimited {
            provider: provider.to_string(),
            message,
        }
    } else {
        PortError::Provider {
            provider: provider.to_string(),
            message,
        }
    }
}

/// Maps a `reqwest` failure that happened before any response was decoded.
pub(crate) fn from_transport(provider: &str, error: reqwest::Error) -> PortError {
    let kind = if error.is_timeout() { "timed out" } else { "failed" };
    PortError::Transport(format!("{} request {}: {}", provider, kind, error.without_url()))
}

pub(crate) fn malformed(provider: &str) -> PortError {
    PortError::Provider {
        provider: provider.to_string(),
        message: "malformed response".to_string(),
    }
}
