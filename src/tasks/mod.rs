//! Task module - the four text operations and their result shapes.
//!
//! - `prompts`: pure builders turning a request into generation parameters
//! - `dispatcher`: validation, counting, generation and result decoding

pub mod dispatcher;
pub mod prompts;

pub use dispatcher::{word_count, Dispatcher, TaskError, MAX_WORDS};

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One of the supported operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    /// Rewrite text in a requested tone.
    Humanize,
    /// Estimate how likely the text is machine-written.
    Detect,
    /// Look for passages resembling known published material.
    Plagiarize,
    /// Produce a structured briefing on a topic.
    Research,
}

impl TaskKind {
    pub const ALL: [TaskKind; 4] = [
        TaskKind::Humanize,
        TaskKind::Detect,
        TaskKind::Plagiarize,
        TaskKind::Research,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Humanize => "humanize",
            TaskKind::Detect => "detect",
            TaskKind::Plagiarize => "plagiarize",
            TaskKind::Research => "research",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskKind {
    type Err = TaskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| TaskError::UnknownTaskKind(s.to_string()))
    }
}

/// An inbound task as submitted by a client. `action` is kept as a raw
/// string until validation so unknown actions can be reported verbatim.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskRequest {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub tone: Option<String>,
    #[serde(default)]
    pub complexity: Option<String>,
    #[serde(default)]
    pub dialect: Option<String>,
    /// Comma-separated terms that must survive a rewrite verbatim.
    #[serde(default)]
    pub freeze_keywords: Option<String>,
}

/// Outcome of a detection task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    /// 0 = certainly human, 100 = certainly machine-written.
    pub overall_score: u8,
    #[serde(default)]
    pub analysis: String,
    #[serde(default)]
    pub red_flags: Vec<String>,
}

/// One passage that resembles known material.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlagiarismMatch {
    #[serde(default)]
    pub snippet: String,
    #[serde(default)]
    pub source_description: String,
    #[serde(default)]
    pub confidence: f64,
}

/// Outcome of a similarity audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlagiarismResult {
    #[serde(default)]
    pub similarity_found: bool,
    #[serde(default)]
    pub overall_confidence: f64,
    #[serde(default)]
    pub matches: Vec<PlagiarismMatch>,
}

/// Outcome of a research task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchResult {
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub executive_summary: String,
    #[serde(default)]
    pub historical_context: String,
    #[serde(default)]
    pub core_concepts: Vec<String>,
    #[serde(default)]
    pub critiques: Vec<String>,
    #[serde(default)]
    pub applications: Vec<String>,
}

/// Result of one task, one variant per [`TaskKind`].
#[derive(Debug, Clone, PartialEq)]
pub enum TaskResult {
    Humanize(String),
    Detect(DetectionResult),
    Plagiarize(PlagiarismResult),
    Research(ResearchResult),
}

impl TaskResult {
    pub fn kind(&self) -> TaskKind {
        match self {
            TaskResult::Humanize(_) => TaskKind::Humanize,
            TaskResult::Detect(_) => TaskKind::Detect,
            TaskResult::Plagiarize(_) => TaskKind::Plagiarize,
            TaskResult::Research(_) => TaskKind::Research,
        }
    }
}

/// Model-reported confidences are not trusted to stay in range.
fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

impl PlagiarismResult {
    pub(crate) fn normalized(mut self) -> Self {
        self.overall_confidence = clamp_unit(self.overall_confidence);
        for m in &mut self.matches {
            m.confidence = clamp_unit(m.confidence);
        }
        self
    }
}

/// Wire form of [`DetectionResult`]; the model may answer with a float or an
/// out-of-range integer.
#[derive(Debug, Deserialize)]
pub(crate) struct RawDetectionResult {
    overall_score: f64,
    #[serde(default)]
    analysis: String,
    #[serde(default)]
    red_flags: Vec<String>,
}

impl From<RawDetectionResult> for DetectionResult {
    fn from(raw: RawDetectionResult) -> Self {
        let score = if raw.overall_score.is_nan() {
            0.0
        } else {
            raw.overall_score.round().clamp(0.0, 100.0)
        };
        DetectionResult {
            overall_score: score as u8,
            analysis: raw.analysis,
            red_flags: raw.red_flags,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_round_trips_through_name() {
        for kind in TaskKind::ALL {
            assert_eq!(kind.as_str().parse::<TaskKind>().unwrap(), kind);
        }
        assert!(matches!(
            "summarize".parse::<TaskKind>(),
            Err(TaskError::UnknownTaskKind(a)) if a == "summarize"
        ));
    }

    #[test]
    fn test_detection_score_is_clamped() {
        let raw: RawDetectionResult =
            serde_json::from_str(r#"{"overall_score": 140.2, "analysis": "x"}"#).unwrap();
        let result = DetectionResult::from(raw);
        assert_eq!(result.overall_score, 100);
        assert!(result.red_flags.is_empty());

        let raw: RawDetectionResult = serde_json::from_str(r#"{"overall_score": 41.6}"#).unwrap();
        assert_eq!(DetectionResult::from(raw).overall_score, 42);
    }

    #[test]
    fn test_plagiarism_confidence_is_clamped() {
        let result = PlagiarismResult {
            similarity_found: true,
            overall_confidence: 1.7,
            matches: vec![PlagiarismMatch {
                snippet: "s".into(),
                source_description: "d".into(),
                confidence: -0.2,
            }],
        }
        .normalized();
        assert_eq!(result.overall_confidence, 1.0);
        assert_eq!(result.matches[0].confidence, 0.0);
    }
}
