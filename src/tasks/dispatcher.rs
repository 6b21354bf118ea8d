//! Request validation and routing to the generation pipeline.

use std::sync::Arc;

use thiserror::Error;

use super::{
    prompts, DetectionResult, PlagiarismResult, RawDetectionResult, ResearchResult, TaskKind,
    TaskRequest, TaskResult,
};
use crate::llm::{parse_structured, GenerationClient, LlmError, ParseError};
use crate::stats::UsageCounter;

/// Longest input accepted for every task except research, in words.
pub const MAX_WORDS: usize = 200;

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("Input text exceeds the {}-word limit.", MAX_WORDS)]
    TextTooLong { words: usize },

    #[error("Research topic cannot be empty")]
    EmptyTopic,

    #[error("Invalid action specified: {0:?}")]
    UnknownTaskKind(String),

    #[error(transparent)]
    Generation(#[from] LlmError),

    #[error(transparent)]
    Parse(#[from] ParseError),
}

impl TaskError {
    /// Whether the caller sent something invalid, as opposed to a failure
    /// further down the pipeline.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            TaskError::TextTooLong { .. } | TaskError::EmptyTopic | TaskError::UnknownTaskKind(_)
        )
    }
}

/// Whitespace-delimited token count.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Validates requests and runs them through prompt, generation and parsing.
#[derive(Clone)]
pub struct Dispatcher {
    client: Arc<dyn GenerationClient>,
    counter: Arc<UsageCounter>,
}

impl Dispatcher {
    pub fn new(client: Arc<dyn GenerationClient>, counter: Arc<UsageCounter>) -> Self {
        Self { client, counter }
    }

    /// Check a request without side effects and resolve its kind.
    pub fn validate(request: &TaskRequest) -> Result<TaskKind, TaskError> {
        let is_research = request.action == TaskKind::Research.as_str();

        if !is_research {
            let words = word_count(&request.text);
            if words > MAX_WORDS {
                return Err(TaskError::TextTooLong { words });
            }
        } else if request.text.trim().is_empty() {
            return Err(TaskError::EmptyTopic);
        }

        request.action.parse()
    }

    /// Run one task end to end. The usage counter is bumped only once the
    /// request has passed validation, before any generation happens.
    pub async fn dispatch(&self, request: TaskRequest) -> Result<TaskResult, TaskError> {
        let kind = Self::validate(&request)?;
        self.counter.increment(kind);

        tracing::debug!(
            kind = %kind,
            words = word_count(&request.text),
            "Dispatching task"
        );

        let result = match kind {
            TaskKind::Humanize => {
                let params = prompts::humanize(
                    &request.text,
                    request.tone.as_deref(),
                    request.complexity.as_deref(),
                    request.dialect.as_deref(),
                    request.freeze_keywords.as_deref(),
                );
                let text = self.client.generate(&params).await?;
                TaskResult::Humanize(text)
            }
            TaskKind::Detect => {
                let raw = self.client.generate(&prompts::detect(&request.text)).await?;
                let decoded: RawDetectionResult = parse_logged(kind, &raw)?;
                TaskResult::Detect(DetectionResult::from(decoded))
            }
            TaskKind::Plagiarize => {
                let raw = self
                    .client
                    .generate(&prompts::plagiarize(&request.text))
                    .await?;
                let decoded: PlagiarismResult = parse_logged(kind, &raw)?;
                TaskResult::Plagiarize(decoded.normalized())
            }
            TaskKind::Research => {
                let topic = request.text.trim();
                let raw = self.client.generate(&prompts::research(topic)).await?;
                let mut decoded: ResearchResult = parse_logged(kind, &raw)?;
                if decoded.topic.trim().is_empty() {
                    decoded.topic = topic.to_string();
                }
                TaskResult::Research(decoded)
            }
        };

        Ok(result)
    }
}

/// Decode a structured reply, logging the raw text when it does not fit.
fn parse_logged<T: serde::de::DeserializeOwned>(kind: TaskKind, raw: &str) -> Result<T, ParseError> {
    parse_structured(raw).map_err(|e| {
        tracing::error!(kind = %kind, raw = %e.raw(), "Failed to decode structured reply: {}", e);
        e
    })
}
