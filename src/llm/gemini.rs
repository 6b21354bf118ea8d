//! Gemini `generateContent` client with automatic retry for transient errors.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::error::{classify_http_status, LlmError, RetryConfig, StatusClass};
use super::{GenerationClient, GenerationParams};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash-latest";

/// Upper bound on a single attempt, connect to last body byte.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(90);

/// Harm categories sent with `BLOCK_NONE`, so provider defaults do not veto
/// whole task categories (e.g. rewriting text that quotes hate speech).
const PERMISSIVE_CATEGORIES: [&str; 4] = [
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
];

/// Finish reasons that mean the model ended on its own terms.
const NORMAL_FINISH_REASONS: [&str; 2] = ["STOP", "MAX_TOKENS"];

/// Reported when a candidate carries no finish reason at all.
const UNSPECIFIED_FINISH_REASON: &str = "FINISH_REASON_UNSPECIFIED";

/// Connection settings for [`GeminiClient`].
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    /// Scheme and host, without a trailing slash.
    pub base_url: String,
    pub request_timeout: Duration,
    pub retry: RetryConfig,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: REQUEST_TIMEOUT,
            retry: RetryConfig::default(),
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }
}

/// Gemini API client with automatic retry for transient errors.
pub struct GeminiClient {
    client: Client,
    endpoint: String,
    config: GeminiConfig,
}

impl GeminiClient {
    /// Create a client. Fails only if the TLS backend cannot be initialized.
    pub fn new(config: GeminiConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self {
            client,
            endpoint: config.endpoint(),
            config,
        })
    }

    /// Execute a single request without retry.
    async fn execute_request(&self, request: &GenerateContentRequest) -> Result<String, LlmError> {
        let response = match self
            .client
            .post(&self.endpoint)
            .header("x-goog-api-key", &self.config.api_key)
            .json(request)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                let e = e.without_url();
                if e.is_timeout() {
                    return Err(LlmError::Network(format!("Request timeout: {}", e)));
                } else if e.is_connect() {
                    return Err(LlmError::Network(format!("Connection failed: {}", e)));
                } else {
                    return Err(LlmError::Network(format!("Request failed: {}", e)));
                }
            }
        };

        let status = response.status().as_u16();
        let body = match response.text().await {
            Ok(body) => body,
            // A body cut off mid-stream is a transport failure like any other.
            Err(e) => {
                return Err(LlmError::Network(format!(
                    "Failed to read response body: {}",
                    e.without_url()
                )))
            }
        };

        if classify_http_status(status) != StatusClass::Success {
            return Err(LlmError::from_status(status, body));
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&body)
            .map_err(|e| LlmError::InvalidResponse(format!("{}, body: {}", e, body)))?;

        unwrap_response(parsed)
    }

    /// Execute a request with automatic retry for transient errors.
    async fn execute_with_retry(&self, request: &GenerateContentRequest) -> Result<String, LlmError> {
        let start = Instant::now();
        let retry = &self.config.retry;
        let mut attempt: u32 = 1;

        loop {
            match self.execute_request(request).await {
                Ok(text) => {
                    if attempt > 1 {
                        tracing::info!(
                            "Generation succeeded on attempt {} (total time: {:?})",
                            attempt,
                            start.elapsed()
                        );
                    }
                    return Ok(text);
                }
                Err(error) if retry.should_retry(&error, attempt) => {
                    let delay = retry.backoff_for(attempt);
                    tracing::warn!(
                        attempt = attempt,
                        delay = ?delay,
                        "Generation attempt failed, retrying: {}",
                        error
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(error) => {
                    if error.is_transient() {
                        tracing::error!(
                            "Generation failed after {} attempts (total time: {:?}): {}",
                            attempt,
                            start.elapsed(),
                            error
                        );
                    } else {
                        tracing::error!("Generation failed (non-retryable): {}", error);
                    }
                    return Err(error);
                }
            }
        }
    }
}

#[async_trait]
impl GenerationClient for GeminiClient {
    async fn generate(&self, params: &GenerationParams) -> Result<String, LlmError> {
        let request = GenerateContentRequest::new(params);

        tracing::debug!(
            model = %self.config.model,
            max_output_tokens = params.max_output_tokens,
            temperature = params.temperature,
            "Sending request to Gemini"
        );

        self.execute_with_retry(&request).await
    }
}

/// Pull the text out of a decoded response.
///
/// Text on the first candidate wins even when the finish reason is abnormal;
/// the finish reason only decides which error to report when there is none.
fn unwrap_response(response: GenerateContentResponse) -> Result<String, LlmError> {
    let Some(candidate) = response.candidates.into_iter().next() else {
        return match response.prompt_feedback.and_then(|f| f.block_reason) {
            Some(reason) => Err(LlmError::StoppedAbnormally(reason)),
            None => Err(LlmError::EmptyResponse),
        };
    };

    let finish_reason = candidate
        .finish_reason
        .filter(|r| !r.is_empty())
        .unwrap_or_else(|| UNSPECIFIED_FINISH_REASON.to_string());
    tracing::debug!(finish_reason = %finish_reason, "Gemini finish reason");

    let text: String = candidate
        .content
        .map(|c| c.parts)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|p| p.text)
        .collect();

    if !text.is_empty() {
        return Ok(text);
    }

    if is_abnormal_finish(&finish_reason) {
        return Err(LlmError::StoppedAbnormally(finish_reason));
    }
    Err(LlmError::EmptyResponse)
}

/// Anything but a normal stop or the length limit, including a missing or
/// unspecified reason.
fn is_abnormal_finish(reason: &str) -> bool {
    !NORMAL_FINISH_REASONS.contains(&reason)
}

/// Gemini API request format.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<RequestContent>,
    generation_config: GenerationConfig,
    safety_settings: Vec<SafetySetting>,
}

impl GenerateContentRequest {
    fn new(params: &GenerationParams) -> Self {
        Self {
            contents: vec![RequestContent {
                role: "user",
                parts: vec![RequestPart {
                    text: params.prompt.clone(),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: params.temperature,
                max_output_tokens: params.max_output_tokens,
            },
            safety_settings: PERMISSIVE_CATEGORIES
                .into_iter()
                .map(|category| SafetySetting {
                    category,
                    threshold: "BLOCK_NONE",
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
struct RequestContent {
    role: &'static str,
    parts: Vec<RequestPart>,
}

#[derive(Debug, Serialize)]
struct RequestPart {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Serialize)]
struct SafetySetting {
    category: &'static str,
    threshold: &'static str,
}

/// Gemini API response format.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<ResponseContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn decode(value: serde_json::Value) -> GenerateContentResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_request_envelope_shape() {
        let params = GenerationParams::new("rewrite this", 4096, 0.7);
        let body = serde_json::to_value(GenerateContentRequest::new(&params)).unwrap();

        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["contents"][0]["parts"][0]["text"], "rewrite this");
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 4096);
        assert!((body["generationConfig"]["temperature"].as_f64().unwrap() - 0.7).abs() < 1e-6);

        let settings = body["safetySettings"].as_array().unwrap();
        assert_eq!(settings.len(), 4);
        assert!(settings.iter().all(|s| s["threshold"] == "BLOCK_NONE"));
    }

    #[test]
    fn test_content_wins_over_abnormal_finish() {
        let response = decode(json!({
            "candidates": [{
                "content": {"parts": [{"text": "partial answer"}], "role": "model"},
                "finishReason": "SAFETY"
            }]
        }));
        assert_eq!(unwrap_response(response).unwrap(), "partial answer");
    }

    #[test]
    fn test_abnormal_finish_without_content() {
        let response = decode(json!({
            "candidates": [{"finishReason": "SAFETY"}]
        }));
        match unwrap_response(response) {
            Err(LlmError::StoppedAbnormally(reason)) => assert_eq!(reason, "SAFETY"),
            other => panic!("expected StoppedAbnormally, got {:?}", other),
        }
    }

    #[test]
    fn test_normal_finish_without_content_is_empty() {
        for reason in ["STOP", "MAX_TOKENS"] {
            let response = decode(json!({
                "candidates": [{"content": {"parts": []}, "finishReason": reason}]
            }));
            assert!(matches!(unwrap_response(response), Err(LlmError::EmptyResponse)));
        }
    }

    #[test]
    fn test_missing_or_unspecified_finish_without_content() {
        for candidate in [
            json!({"content": {"parts": []}}),
            json!({"content": {"parts": []}, "finishReason": ""}),
            json!({"finishReason": "FINISH_REASON_UNSPECIFIED"}),
        ] {
            let response = decode(json!({"candidates": [candidate]}));
            match unwrap_response(response) {
                Err(LlmError::StoppedAbnormally(reason)) => {
                    assert_eq!(reason, "FINISH_REASON_UNSPECIFIED")
                }
                other => panic!("expected StoppedAbnormally, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_no_candidates() {
        let response = decode(json!({}));
        assert!(matches!(unwrap_response(response), Err(LlmError::EmptyResponse)));

        let response = decode(json!({"promptFeedback": {"blockReason": "OTHER"}}));
        match unwrap_response(response) {
            Err(LlmError::StoppedAbnormally(reason)) => assert_eq!(reason, "OTHER"),
            other => panic!("expected StoppedAbnormally, got {:?}", other),
        }
    }

    #[test]
    fn test_multiple_parts_are_joined() {
        let response = decode(json!({
            "candidates": [{
                "content": {"parts": [{"text": "Greetings, "}, {"text": "everyone."}]},
                "finishReason": "STOP"
            }]
        }));
        assert_eq!(unwrap_response(response).unwrap(), "Greetings, everyone.");
    }

    #[test]
    fn test_endpoint_format() {
        let mut config = GeminiConfig::new("key");
        config.base_url = "http://127.0.0.1:9999/".to_string();
        config.model = "gemini-test".to_string();
        assert_eq!(
            config.endpoint(),
            "http://127.0.0.1:9999/v1beta/models/gemini-test:generateContent"
        );
    }
}
