//! Caption/translation event records carried on the data channel.
//!
//! Payloads are single JSON objects:
//! `{"contentId":"1","contentType":2,"content":"你好","contentEng":"Hello","time":1676448103104}`.
//! Decoding is tolerant: blank payloads are "no event", and anything else that
//! does not parse yields a [`DecodeError`] for the caller to log and drop.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::error::Category;

/// Kind of caption carried by an event.
///
/// Unknown codes pass through untouched; the overlay decides how to draw them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum ContentType {
    /// Speech-to-text of the remote party (wire code 1).
    Transcription,
    /// Live translation (wire code 2).
    Translation,
    Other(i64),
}

impl ContentType {
    #[must_use]
    pub fn code(self) -> i64 {
        match self {
            Self::Transcription => 1,
            Self::Translation => 2,
            Self::Other(code) => code,
        }
    }
}

impl From<i64> for ContentType {
    fn from(code: i64) -> Self {
        match code {
            1 => Self::Transcription,
            2 => Self::Translation,
            other => Self::Other(other),
        }
    }
}

impl From<ContentType> for i64 {
    fn from(content_type: ContentType) -> Self {
        content_type.code()
    }
}

/// One decoded caption update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslateEvent {
    #[serde(rename = "contentId")]
    pub content_id: String,
    #[serde(rename = "contentType")]
    pub content_type: ContentType,
    /// Text in the speaker's language.
    pub content: String,
    /// Text in the target language; transcription-only events may omit it or send null.
    #[serde(rename = "contentEng", default, deserialize_with = "null_as_empty")]
    pub content_english: String,
    #[serde(rename = "time")]
    pub timestamp_millis: i64,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Payload is not well-formed JSON.
    InvalidJson(String),
    /// Payload is JSON but not a caption record (wrong shape, missing or mistyped field).
    InvalidRecord(String),
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidJson(err) => write!(f, "invalid caption payload json: {err}"),
            Self::InvalidRecord(err) => write!(f, "invalid caption record: {err}"),
        }
    }
}

impl std::error::Error for DecodeError {}

impl From<serde_json::Error> for DecodeError {
    fn from(err: serde_json::Error) -> Self {
        match err.classify() {
            Category::Data => Self::InvalidRecord(err.to_string()),
            Category::Syntax | Category::Eof | Category::Io => Self::InvalidJson(err.to_string()),
        }
    }
}

/// Decode one channel payload.
///
/// Returns `Ok(None)` for empty or whitespace-only text.
pub fn decode(text: &str) -> Result<Option<TranslateEvent>, DecodeError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let event = serde_json::from_str::<TranslateEvent>(trimmed)?;
    Ok(Some(event))
}

/// Encode an event in the channel wire shape.
pub fn encode(event: &TranslateEvent) -> String {
    // A struct of strings and integers always serializes.
    serde_json::to_string(event).unwrap_or_default()
}
