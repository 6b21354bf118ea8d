//! Generation client module for interacting with the language model.
//!
//! This module provides a trait-based abstraction over the generation
//! provider, with Gemini as the primary implementation, plus the parser
//! used for replies that are expected to carry structured JSON.

mod error;
mod gemini;
pub mod structured;

pub use error::{classify_http_status, LlmError, RetryConfig, StatusClass};
pub use gemini::{GeminiClient, GeminiConfig, DEFAULT_BASE_URL, DEFAULT_MODEL, REQUEST_TIMEOUT};
pub use structured::{parse_structured, strip_code_fence, ParseError};

use async_trait::async_trait;

/// Highest sampling temperature the provider accepts.
pub const MAX_TEMPERATURE: f32 = 2.0;

/// Parameters for one generation call.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationParams {
    pub prompt: String,
    /// Always at least 1.
    pub max_output_tokens: u32,
    /// Always within `0.0..=MAX_TEMPERATURE`.
    pub temperature: f32,
}

impl GenerationParams {
    pub fn new(prompt: impl Into<String>, max_output_tokens: u32, temperature: f32) -> Self {
        let temperature = if temperature.is_nan() {
            0.0
        } else {
            temperature.clamp(0.0, MAX_TEMPERATURE)
        };
        Self {
            prompt: prompt.into(),
            max_output_tokens: max_output_tokens.max(1),
            temperature,
        }
    }
}

/// Trait for generation clients.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// Run one generation and return the model's text.
    async fn generate(&self, params: &GenerationParams) -> Result<String, LlmError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_are_clamped() {
        let params = GenerationParams::new("p", 0, 3.5);
        assert_eq!(params.max_output_tokens, 1);
        assert_eq!(params.temperature, MAX_TEMPERATURE);

        let params = GenerationParams::new("p", 4096, -1.0);
        assert_eq!(params.max_output_tokens, 4096);
        assert_eq!(params.temperature, 0.0);

        let params = GenerationParams::new("p", 10, f32::NAN);
        assert_eq!(params.temperature, 0.0);
    }
}
