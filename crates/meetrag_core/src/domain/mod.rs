use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{AppError, ErrorKind};

/// Per-meeting analysis record produced by the transcription/analysis pipeline.
///
/// Notes:
/// - Every field is always present after decoding. Missing keys and JSON `null`
///   decode to the empty string or empty list so incomplete records stay indexable.
/// - A value of the wrong JSON shape is a `MalformedRecord` error, never coerced.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MeetingAnalysis {
    #[serde(default, deserialize_with = "null_as_default")]
    pub transcript: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub summary: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub key_points: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub action_items: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub participants: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub follow_up: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub dates: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub emails: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub resources: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub next_steps: String,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl MeetingAnalysis {
    pub fn from_json_slice(bytes: &[u8]) -> Result<Self, AppError> {
        let value: serde_json::Value = serde_json::from_slice(bytes).map_err(|e| {
            AppError::new(
                ErrorKind::MalformedRecord,
                "MEETING_RECORD_INVALID_JSON",
                "Meeting analysis is not valid JSON",
            )
            .with_details(e.to_string())
        })?;
        Self::from_value(value)
    }

    pub fn from_value(value: serde_json::Value) -> Result<Self, AppError> {
        if !value.is_object() {
            return Err(AppError::new(
                ErrorKind::MalformedRecord,
                "MEETING_RECORD_NOT_OBJECT",
                "Meeting analysis must be a JSON object",
            )
            .with_details(format!("found={}", json_type_name(&value))));
        }
        serde_json::from_value(value).map_err(|e| {
            AppError::new(
                ErrorKind::MalformedRecord,
                "MEETING_RECORD_SHAPE_INVALID",
                "Meeting analysis has a field of the wrong shape",
            )
            .with_details(e.to_string())
        })
    }
}

fn json_type_name(v: &serde_json::Value) -> &'static str {
    match v {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

/// One completed question/answer exchange.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Turn {
    pub question: String,
    pub answer: String,
}

/// Answer returned to callers. `sources` keeps retrieval-rank order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QaResult {
    pub answer: String,
    pub sources: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MeetingState {
    Unloaded,
    Loading,
    Ready,
}
