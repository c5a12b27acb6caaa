use lesson_core::model::QuestionDraft;
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::error::ProviderError;

/// One question as providers emit it.
#[derive(Debug, Deserialize)]
struct WireQuestion {
    #[serde(alias = "text")]
    question: String,
    choices: Vec<String>,
    difficulty_percentage: i64,
}

impl From<WireQuestion> for QuestionDraft {
    fn from(wire: WireQuestion) -> Self {
        QuestionDraft {
            text: wire.question,
            choices: wire.choices,
            difficulty_percentage: wire.difficulty_percentage,
        }
    }
}

/// Parses provider output into question drafts.
///
/// Accepts `{"questions": [...]}` or a bare array, also when wrapped in
/// prose or a fenced block. Items that do not deserialize are skipped with a
/// warning; content validation happens later on the drafts.
///
/// # Errors
///
/// Returns `ProviderError::Malformed` when no JSON question list is found.
pub fn parse_questions(content: &str) -> Result<Vec<QuestionDraft>, ProviderError> {
    let value = extract_json(content)
        .ok_or_else(|| ProviderError::Malformed("no JSON document in response".into()))?;

    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("questions") {
            Some(Value::Array(items)) => items,
            _ => {
                return Err(ProviderError::Malformed(
                    "missing `questions` array".into(),
                ));
            }
        },
        other => {
            return Err(ProviderError::Malformed(format!(
                "unexpected JSON value: {other}"
            )));
        }
    };

    let mut drafts = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        match serde_json::from_value::<WireQuestion>(item) {
            Ok(wire) => drafts.push(wire.into()),
            Err(e) => warn!(index, error = %e, "skipping malformed generated question"),
        }
    }
    Ok(drafts)
}

fn extract_json(content: &str) -> Option<Value> {
    let trimmed = content.trim();
    if let Ok(value) = serde_json::from_str(trimmed) {
        return Some(value);
    }

    let mut spans: Vec<(usize, usize)> = [('{', '}'), ('[', ']')]
        .into_iter()
        .filter_map(|(open, close)| Some((trimmed.find(open)?, trimmed.rfind(close)?)))
        .filter(|(start, end)| start < end)
        .collect();
    spans.sort_unstable();

    spans
        .into_iter()
        .find_map(|(start, end)| serde_json::from_str(&trimmed[start..=end]).ok())
}
