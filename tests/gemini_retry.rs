//! Gemini client tests against a scripted local stand-in for the provider.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::response::IntoResponse;
use axum::Router;
use serde_json::{json, Value};

use rephrase::llm::{
    GeminiClient, GeminiConfig, GenerationClient, GenerationParams, LlmError, RetryConfig,
};

const BACKOFF: Duration = Duration::from_millis(20);

#[derive(Debug, Clone)]
struct Recorded {
    path: String,
    api_key: Option<String>,
    body: Value,
}

/// Replays canned responses in order and records every request.
#[derive(Default)]
struct Provider {
    script: Mutex<VecDeque<(u16, String)>>,
    requests: Mutex<Vec<Recorded>>,
}

impl Provider {
    fn attempts(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

async fn scripted(
    State(provider): State<Arc<Provider>>,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> impl IntoResponse {
    provider.requests.lock().unwrap().push(Recorded {
        path: uri.path().to_string(),
        api_key: headers
            .get("x-goog-api-key")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        body: serde_json::from_str(&body).unwrap_or(Value::Null),
    });

    let next = provider.script.lock().unwrap().pop_front();
    let (status, body) = next.unwrap_or((500, "script exhausted".to_string()));
    (StatusCode::from_u16(status).unwrap(), body)
}

fn text_reply(text: &str, finish_reason: &str) -> (u16, String) {
    let body = json!({
        "candidates": [{
            "content": {"parts": [{"text": text}], "role": "model"},
            "finishReason": finish_reason
        }]
    });
    (200, body.to_string())
}

fn busy() -> (u16, String) {
    let body = json!({"error": {"code": 503, "message": "The model is overloaded."}});
    (503, body.to_string())
}

async fn start_provider(script: Vec<(u16, String)>) -> (String, Arc<Provider>) {
    let provider = Arc::new(Provider {
        script: Mutex::new(script.into()),
        requests: Mutex::new(Vec::new()),
    });

    let app = Router::new()
        .fallback(scripted)
        .with_state(Arc::clone(&provider));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}", addr), provider)
}

fn client(base_url: &str, backoff: Duration) -> GeminiClient {
    let mut config = GeminiConfig::new("test-key");
    config.base_url = base_url.to_string();
    config.model = "gemini-test".to_string();
    config.retry = RetryConfig {
        max_attempts: 4,
        initial_backoff: backoff,
    };
    GeminiClient::new(config).unwrap()
}

fn params() -> GenerationParams {
    GenerationParams::new("Rewrite: hello world", 4096, 0.7)
}

#[tokio::test]
async fn succeeds_on_fourth_attempt_after_three_busy_responses() {
    let (url, provider) = start_provider(vec![
        busy(),
        busy(),
        busy(),
        text_reply("Greetings, everyone.", "STOP"),
    ])
    .await;
    let client = client(&url, BACKOFF);

    let start = Instant::now();
    let text = client.generate(&params()).await.unwrap();

    assert_eq!(text, "Greetings, everyone.");
    assert_eq!(provider.attempts(), 4);
    // 1 + 2 + 4 backoff units.
    assert!(start.elapsed() >= BACKOFF * 7, "elapsed {:?}", start.elapsed());
}

#[tokio::test]
async fn gives_up_after_four_busy_responses() {
    let (url, provider) = start_provider(vec![busy(), busy(), busy(), busy(), busy()]).await;
    let client = client(&url, BACKOFF);

    let err = client.generate(&params()).await.unwrap_err();

    assert!(matches!(err, LlmError::Overloaded { status: 503, .. }), "{:?}", err);
    assert_eq!(provider.attempts(), 4);
    tokio::time::sleep(BACKOFF * 10).await;
    assert_eq!(provider.attempts(), 4, "made a fifth attempt");
}

#[tokio::test]
async fn rate_limit_is_retried() {
    let (url, provider) =
        start_provider(vec![(429, "{}".to_string()), text_reply("ok", "STOP")]).await;
    let client = client(&url, BACKOFF);

    assert_eq!(client.generate(&params()).await.unwrap(), "ok");
    assert_eq!(provider.attempts(), 2);
}

#[tokio::test]
async fn other_errors_are_not_retried() {
    let (url, provider) = start_provider(vec![
        (400, r#"{"error":{"message":"API key not valid"}}"#.to_string()),
        text_reply("never reached", "STOP"),
    ])
    .await;
    let client = client(&url, BACKOFF);

    let err = client.generate(&params()).await.unwrap_err();

    match err {
        LlmError::Remote { status, body } => {
            assert_eq!(status, 400);
            assert!(body.contains("API key not valid"));
        }
        other => panic!("expected Remote, got {:?}", other),
    }
    assert_eq!(provider.attempts(), 1);
}

#[tokio::test]
async fn content_wins_over_safety_stop() {
    let (url, _) = start_provider(vec![text_reply("partial rewrite", "SAFETY")]).await;
    let client = client(&url, BACKOFF);

    assert_eq!(client.generate(&params()).await.unwrap(), "partial rewrite");
}

#[tokio::test]
async fn safety_stop_without_content_fails() {
    let body = json!({"candidates": [{"finishReason": "SAFETY"}]}).to_string();
    let (url, provider) = start_provider(vec![(200, body)]).await;
    let client = client(&url, BACKOFF);

    let err = client.generate(&params()).await.unwrap_err();

    assert!(matches!(err, LlmError::StoppedAbnormally(ref r) if r == "SAFETY"), "{:?}", err);
    assert_eq!(provider.attempts(), 1);
}

#[tokio::test]
async fn undecodable_success_body_is_invalid_response() {
    let (url, provider) = start_provider(vec![(200, "<html>proxy error</html>".to_string())]).await;
    let client = client(&url, BACKOFF);

    let err = client.generate(&params()).await.unwrap_err();

    assert!(matches!(err, LlmError::InvalidResponse(_)), "{:?}", err);
    assert_eq!(provider.attempts(), 1);
}

#[tokio::test]
async fn sends_expected_envelope() {
    let (url, provider) = start_provider(vec![text_reply("ok", "STOP")]).await;
    let client = client(&url, BACKOFF);

    client.generate(&params()).await.unwrap();

    let recorded = provider.requests.lock().unwrap()[0].clone();
    assert_eq!(recorded.path, "/v1beta/models/gemini-test:generateContent");
    assert_eq!(recorded.api_key.as_deref(), Some("test-key"));
    assert_eq!(
        recorded.body["contents"][0]["parts"][0]["text"],
        "Rewrite: hello world"
    );
    assert_eq!(recorded.body["generationConfig"]["maxOutputTokens"], 4096);
    let settings = recorded.body["safetySettings"].as_array().unwrap();
    assert_eq!(settings.len(), 4);
    assert!(settings.iter().all(|s| s["threshold"] == "BLOCK_NONE"));
}

#[tokio::test]
async fn network_failures_are_retried_then_reported() {
    // Grab a free port, then close it so connections are refused.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = client(&format!("http://{}", addr), Duration::from_millis(1));
    let err = client.generate(&params()).await.unwrap_err();

    assert!(matches!(err, LlmError::Network(_)), "{:?}", err);
    assert!(!err.to_string().contains("test-key"));
}
