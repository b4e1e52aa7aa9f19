//! Integration tests for the Ollama provider against a mock server

use serde_json::json;
use wiremock::{
    matchers::{body_partial_json, method, path},
    Mock, MockServer, ResponseTemplate,
};

use genie_engine::llm::ollama::OllamaProvider;
use genie_engine::llm::{LLMError, LLMProvider, Message};

#[tokio::test]
async fn test_ollama_chat_completion() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(json!({"model": "llama3.1:8b", "stream": false})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": {"role": "assistant", "content": "  The check-in is at 2 PM.\n"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = OllamaProvider::new(server.uri(), "llama3.1:8b");
    assert_eq!(provider.name(), "ollama");
    assert!(provider.is_local());

    let reply = provider
        .generate(&[
            Message::system("You answer calendar questions."),
            Message::user("When is the check-in?"),
        ])
        .await
        .unwrap();
    assert_eq!(reply, "The check-in is at 2 PM.");
}

#[tokio::test]
async fn test_ollama_malformed_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let provider = OllamaProvider::new(server.uri(), "llama3.1:8b");
    let err = provider.generate(&[Message::user("hi")]).await.unwrap_err();
    assert!(matches!(err, LLMError::ParseError(_)));
}

#[tokio::test]
async fn test_ollama_health_check() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"models": []})))
        .mount(&server)
        .await;

    assert!(OllamaProvider::new(server.uri(), "llama3.1:8b").check_health().await);
    // nothing listens on port 9
    assert!(!OllamaProvider::new("http://127.0.0.1:9", "llama3.1:8b").check_health().await);
}

#[tokio::test]
async fn test_ollama_connection_refused() {
    let provider = OllamaProvider::new("http://127.0.0.1:9", "llama3.1:8b");
    let err = provider.generate(&[Message::user("hi")]).await.unwrap_err();
    assert!(matches!(
        err,
        LLMError::ProviderUnavailable(_) | LLMError::NetworkError(_)
    ));
}
