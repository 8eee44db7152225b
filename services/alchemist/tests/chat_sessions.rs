//! Exercises both HTTP chat sessions and the factory against a mock server.

use alchemist_lib::adapters::{GeminiChatSession, OpenAiChatSession, ProviderSessionFactory};
use alchemist_lib::config::Config;
use book_alchemist_core::{
    AiProvider, ApiConfig, ChatSession, ChatSessionFactory, ConversationSeed, PortError,
};
use serde_json::{json, Value};
use std::sync::Arc;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn seed() -> ConversationSeed {
    ConversationSeed {
        instructions: "Schreibe ein Buch über einen Lichtfuchs.".to_string(),
    }
}

fn openai_reply(text: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "choices": [{ "index": 0, "message": { "role": "assistant", "content": text } }]
    }))
}

fn gemini_reply(parts: &[&str]) -> ResponseTemplate {
    let parts: Vec<Value> = parts.iter().map(|t| json!({ "text": t })).collect();
    ResponseTemplate::new(200).set_body_json(json!({
        "candidates": [{ "content": { "role": "model", "parts": parts } }]
    }))
}

async fn request_bodies(server: &MockServer) -> Vec<Value> {
    server
        .received_requests()
        .await
        .expect("request recording is enabled")
        .iter()
        .map(|r| r.body_json::<Value>().expect("json body"))
        .collect()
}

fn openai_session(server: &MockServer, window: usize) -> OpenAiChatSession {
    OpenAiChatSession::new(
        reqwest::Client::new(),
        &server.uri(),
        "gpt-test".to_string(),
        "sk-test".to_string(),
        window,
        seed().setup_messages(),
    )
}

fn gemini_session(server: &MockServer) -> GeminiChatSession {
    GeminiChatSession::new(
        reqwest::Client::new(),
        &server.uri(),
        "gemini-test",
        "g-key".to_string(),
        seed().session_history(),
    )
}

//=========================================================================================
// OpenAI
//=========================================================================================

#[tokio::test]
async fn openai_sends_setup_and_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .respond_with(openai_reply("Cover --- Seite 1"))
        .expect(1)
        .mount(&server)
        .await;

    let mut session = openai_session(&server, 20);
    let reply = session.send_message("Beginne.").await.unwrap();

    assert_eq!(reply, "Cover --- Seite 1");
    let body = &request_bodies(&server).await[0];
    assert_eq!(body["model"], "gpt-test");
    let messages = body["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 4);
    assert_eq!(messages[0]["role"], "system");
    assert_eq!(messages[3]["content"], "Beginne.");
    assert_eq!(session.history().len(), 5);
}

#[tokio::test]
async fn openai_trims_to_setup_plus_window() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(openai_reply("Seite"))
        .mount(&server)
        .await;

    let mut session = openai_session(&server, 2);
    for _ in 0..3 {
        session.continue_story().await.unwrap();
    }

    let bodies = request_bodies(&server).await;
    let last = bodies.last().unwrap()["messages"].as_array().unwrap().clone();
    // Three setup messages, then the latest assistant reply and the new "next".
    assert_eq!(last.len(), 5);
    assert_eq!(last[0]["role"], "system");
    assert_eq!(last[3]["role"], "assistant");
    assert_eq!(last[4]["content"], "next");
    assert_eq!(session.history().len(), 9);
}

#[tokio::test]
async fn openai_rate_limit_is_classified_and_rolled_back() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "error": { "message": "Rate limit reached", "type": "requests", "code": "rate_limit_exceeded" }
        })))
        .mount(&server)
        .await;

    let mut session = openai_session(&server, 20);
    let error = session.send_message("next").await.unwrap_err();

    assert!(error.is_rate_limit());
    assert!(matches!(error, PortError::RateLimited { ref message, .. } if message == "Rate limit reached"));
    assert_eq!(session.history().len(), 3);
}

#[tokio::test]
async fn openai_retry_after_a_failure_resends_a_single_user_turn() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "error": { "message": "Rate limit reached", "code": "rate_limit_exceeded" }
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(openai_reply("Seite 2"))
        .mount(&server)
        .await;

    let mut session = openai_session(&server, 20);
    assert!(session.continue_story().await.is_err());
    assert_eq!(session.continue_story().await.unwrap(), "Seite 2");

    let bodies = request_bodies(&server).await;
    let retried = bodies[1]["messages"].as_array().unwrap();
    let roles: Vec<&str> = retried.iter().map(|m| m["role"].as_str().unwrap()).collect();
    assert_eq!(roles, vec!["system", "user", "assistant", "user"]);
    assert_eq!(session.history().len(), 5);
}

#[tokio::test]
async fn openai_error_message_is_surfaced() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": { "message": "Incorrect API key provided", "code": "invalid_api_key" }
        })))
        .mount(&server)
        .await;

    let error = openai_session(&server, 20).send_message("next").await.unwrap_err();

    assert!(!error.is_rate_limit());
    assert!(error.to_string().contains("Incorrect API key provided"));
}

#[tokio::test]
async fn openai_missing_content_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
        .mount(&server)
        .await;

    let mut session = openai_session(&server, 20);
    let error = session.send_message("next").await.unwrap_err();

    assert!(matches!(error, PortError::Provider { ref message, .. } if message == "malformed response"));
    assert_eq!(session.history().len(), 3);
}

//=========================================================================================
// Gemini
//=========================================================================================

#[tokio::test]
async fn gemini_sends_full_history_with_key_header() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/models/gemini-test:generateContent"))
        .and(header("x-goog-api-key", "g-key"))
        .respond_with(gemini_reply(&["Seite eins", " --- Seite zwei"]))
        .mount(&server)
        .await;

    let mut session = gemini_session(&server);
    let first = session.send_message("Beginne.").await.unwrap();
    session.continue_story().await.unwrap();

    assert_eq!(first, "Seite eins --- Seite zwei");
    assert_eq!(session.turns(), 6);

    let bodies = request_bodies(&server).await;
    let contents = bodies[1]["contents"].as_array().unwrap();
    assert_eq!(contents.len(), 5);
    assert_eq!(contents[0]["role"], "user");
    assert_eq!(contents[1]["role"], "model");
    assert_eq!(contents[4]["parts"][0]["text"], "next");
    let url = server.received_requests().await.unwrap()[0].url.to_string();
    assert!(!url.contains("g-key"));
}

#[tokio::test]
async fn gemini_resource_exhausted_is_a_rate_limit() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "error": { "code": 429, "message": "Resource has been exhausted", "status": "RESOURCE_EXHAUSTED" }
        })))
        .mount(&server)
        .await;

    let mut session = gemini_session(&server);
    let error = session.send_message("next").await.unwrap_err();

    assert!(matches!(error, PortError::RateLimited { .. }));
    assert_eq!(session.turns(), 2);
}

#[tokio::test]
async fn gemini_without_text_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "candidates": [] })))
        .mount(&server)
        .await;

    let error = gemini_session(&server).send_message("next").await.unwrap_err();

    assert!(matches!(error, PortError::Provider { .. }));
}

#[tokio::test]
async fn undecodable_error_body_reports_the_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream down"))
        .mount(&server)
        .await;

    let error = gemini_session(&server).send_message("next").await.unwrap_err();

    match error {
        PortError::Transport(message) => assert!(message.contains("503")),
        other => panic!("unexpected error: {other:?}"),
    }
}

//=========================================================================================
// Factory
//=========================================================================================

fn config_for(server: &MockServer) -> Arc<Config> {
    let uri = server.uri();
    Arc::new(
        Config::from_lookup(|name| match name {
            "GEMINI_BASE_URL" | "OPENAI_BASE_URL" => Some(uri.clone()),
            "GEMINI_MODEL" => Some("gemini-test".to_string()),
            _ => None,
        })
        .unwrap(),
    )
}

#[tokio::test]
async fn factory_rejects_an_empty_key() {
    let server = MockServer::start().await;
    let factory = ProviderSessionFactory::new(config_for(&server)).unwrap();
    let api = ApiConfig { provider: AiProvider::OpenAi, key: "   ".to_string() };

    let result = factory.open(&api, seed());

    assert!(matches!(result.err(), Some(PortError::Unexpected(_))));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn factory_opens_the_configured_provider() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/models/gemini-test:generateContent"))
        .respond_with(gemini_reply(&["Gemini spricht"]))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(openai_reply("OpenAI spricht"))
        .mount(&server)
        .await;
    let factory = ProviderSessionFactory::new(config_for(&server)).unwrap();

    let gemini = ApiConfig { provider: AiProvider::Gemini, key: "g".to_string() };
    let openai = ApiConfig { provider: AiProvider::OpenAi, key: "o".to_string() };

    let mut session = factory.open(&gemini, seed()).unwrap();
    assert_eq!(session.send_message("hallo").await.unwrap(), "Gemini spricht");
    let mut session = factory.open(&openai, seed()).unwrap();
    assert_eq!(session.send_message("hallo").await.unwrap(), "OpenAI spricht");
}
