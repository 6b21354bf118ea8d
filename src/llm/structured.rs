//! Decoding of model replies that are expected to be JSON.
//!
//! Models often wrap JSON in a Markdown code fence even when told not to, so
//! the fence is stripped before decoding.

use serde::de::DeserializeOwned;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    /// The reply did not decode into the expected shape. `raw` is the reply
    /// exactly as received.
    #[error("malformed structured response: {source}")]
    Malformed {
        raw: String,
        #[source]
        source: serde_json::Error,
    },
}

impl ParseError {
    pub fn raw(&self) -> &str {
        match self {
            ParseError::Malformed { raw, .. } => raw,
        }
    }
}

/// Strip a surrounding triple-backtick fence, optionally tagged `json`.
///
/// Text that is not fenced is returned trimmed and otherwise untouched.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(inner) = rest.strip_suffix("```") else {
        return trimmed;
    };

    // Drop the language tag. Only `json` (any case) or no tag is accepted as
    // a tag; anything else on the opening line is content.
    let inner = match inner.get(..4) {
        Some(tag) if tag.eq_ignore_ascii_case("json") => &inner[4..],
        _ => inner,
    };
    inner.trim()
}

/// Decode `raw` as `T`, tolerating a surrounding code fence.
pub fn parse_structured<T: DeserializeOwned>(raw: &str) -> Result<T, ParseError> {
    serde_json::from_str(strip_code_fence(raw)).map_err(|source| ParseError::Malformed {
        raw: raw.to_string(),
        source,
    })
}
