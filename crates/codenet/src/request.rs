//! Analysis request envelope decoded from `POST /analyze` bodies.

use serde::Deserialize;

/// One code-analysis request, created by the bridge and consumed once by the dispatcher.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisRequest {
    pub filename: String,
    pub content: String,
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("request body is empty")]
    EmptyBody,
    #[error("invalid JSON body: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Deserialize)]
struct RawRequest {
    #[serde(default)]
    filename: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    metadata: Option<serde_json::Map<String, serde_json::Value>>,
}

impl AnalysisRequest {
    pub fn new(filename: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            content: content.into(),
            metadata: serde_json::Map::new(),
        }
    }

    /// Decode a request body.
    ///
    /// The body must be a JSON object. Absent `filename`/`content` become empty
    /// strings and an absent or `null` `metadata` becomes an empty map; values of
    /// the wrong type are rejected.
    pub fn decode(body: &[u8]) -> Result<Self, DecodeError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Err(DecodeError::EmptyBody);
        }

        let raw: RawRequest = serde_json::from_slice(body)?;
        Ok(Self {
            filename: raw.filename.unwrap_or_default(),
            content: raw.content.unwrap_or_default(),
            metadata: raw.metadata.unwrap_or_default(),
        })
    }
}
