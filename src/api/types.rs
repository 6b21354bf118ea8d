//! Response bodies.

use serde::{Deserialize, Serialize};

use crate::tasks::{DetectionResult, PlagiarismResult, ResearchResult, TaskResult};

/// `result_type` of an error body.
pub const ERROR_RESULT_TYPE: &str = "error";

/// Body of every `/api/process` response. `result_type` says which one of
/// the optional fields is populated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessResponse {
    pub result_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detection_result: Option<DetectionResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plagiarism_result: Option<PlagiarismResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub research_result: Option<ResearchResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProcessResponse {
    fn empty(result_type: &str) -> Self {
        Self {
            result_type: result_type.to_string(),
            text: None,
            detection_result: None,
            plagiarism_result: None,
            research_result: None,
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::empty(ERROR_RESULT_TYPE)
        }
    }
}

impl From<TaskResult> for ProcessResponse {
    fn from(result: TaskResult) -> Self {
        let mut response = Self::empty(result.kind().as_str());
        match result {
            TaskResult::Humanize(text) => response.text = Some(text),
            TaskResult::Detect(d) => response.detection_result = Some(d),
            TaskResult::Plagiarize(p) => response.plagiarism_result = Some(p),
            TaskResult::Research(r) => response.research_result = Some(r),
        }
        response
    }
}

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    /// Connected live-stats clients.
    pub listeners: usize,
}
