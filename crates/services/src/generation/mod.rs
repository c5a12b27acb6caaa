//! Question generation: provider contracts, primary/secondary fallback, and
//! source splitting.

mod chat;
mod parse;

use std::sync::Arc;

use async_trait::async_trait;
use lesson_core::model::{CandidateQuestion, QuestionDraft};
use tracing::{debug, info, warn};

use crate::error::{GenerationError, ProviderError};

pub use chat::{ChatProviderConfig, ChatQuestionProvider, HttpTextSource};
pub use parse::parse_questions;

/// Default word budget for one generation request.
pub const DEFAULT_WORDS_PER_PART: usize = 1000;

/// Produces question drafts from a piece of source text.
///
/// Drafts carry the conceptually correct answer at `choices[0]`.
#[async_trait]
pub trait QuestionProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(&self, source_text: &str) -> Result<Vec<QuestionDraft>, ProviderError>;
}

/// Resolves a document identifier to its extracted text.
#[async_trait]
pub trait TextSource: Send + Sync {
    async fn fetch_text(&self, document_id: &str) -> Result<String, ProviderError>;
}

/// Splits `text` on whitespace into parts of at most `max_words` words,
/// each re-joined with single spaces. A zero budget is treated as one.
#[must_use]
pub fn split_by_word_count(text: &str, max_words: usize) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    words
        .chunks(max_words.max(1))
        .map(|part| part.join(" "))
        .collect()
}

/// Runs the primary provider over every part of the source and falls back to
/// the secondary when the primary yields no valid question.
#[derive(Clone)]
pub struct GenerationPipeline {
    primary: Arc<dyn QuestionProvider>,
    secondary: Arc<dyn QuestionProvider>,
    words_per_part: usize,
}

impl GenerationPipeline {
    #[must_use]
    pub fn new(primary: Arc<dyn QuestionProvider>, secondary: Arc<dyn QuestionProvider>) -> Self {
        Self {
            primary,
            secondary,
            words_per_part: DEFAULT_WORDS_PER_PART,
        }
    }

    #[must_use]
    pub fn with_words_per_part(mut self, words_per_part: usize) -> Self {
        self.words_per_part = words_per_part.max(1);
        self
    }

    /// Generates validated candidates for `source_text`, in part order.
    ///
    /// # Errors
    ///
    /// Returns `GenerationError::EmptySource` for blank input, or
    /// `GenerationError::Exhausted` with both providers' reasons when neither
    /// yields a valid question.
    pub async fn generate(
        &self,
        source_text: &str,
    ) -> Result<Vec<CandidateQuestion>, GenerationError> {
        let parts = split_by_word_count(source_text, self.words_per_part);
        if parts.is_empty() {
            return Err(GenerationError::EmptySource);
        }

        let primary = match run_provider(self.primary.as_ref(), &parts).await {
            Ok(candidates) => return Ok(candidates),
            Err(e) => e,
        };
        warn!(
            provider = self.primary.name(),
            error = %primary,
            "primary provider failed, falling back to secondary"
        );

        match run_provider(self.secondary.as_ref(), &parts).await {
            Ok(candidates) => Ok(candidates),
            Err(secondary) => Err(GenerationError::Exhausted { primary, secondary }),
        }
    }
}

async fn run_provider(
    provider: &dyn QuestionProvider,
    parts: &[String],
) -> Result<Vec<CandidateQuestion>, ProviderError> {
    let mut candidates = Vec::new();
    let mut last_error = None;

    for (index, part) in parts.iter().enumerate() {
        let drafts = match provider.generate(part).await {
            Ok(drafts) => drafts,
            Err(ProviderError::Disabled) => return Err(ProviderError::Disabled),
            Err(e) => {
                warn!(provider = provider.name(), part = index, error = %e, "part generation failed");
                last_error = Some(e);
                continue;
            }
        };

        let received = drafts.len();
        for draft in drafts {
            match draft.validate() {
                Ok(candidate) => candidates.push(candidate),
                Err(e) => warn!(
                    provider = provider.name(),
                    part = index,
                    error = %e,
                    "skipping invalid generated question"
                ),
            }
        }
        debug!(provider = provider.name(), part = index, received, "generated part");
    }

    if candidates.is_empty() {
        return Err(last_error.unwrap_or(ProviderError::NoQuestions));
    }
    info!(
        provider = provider.name(),
        parts = parts.len(),
        questions = candidates.len(),
        "generated questions"
    );
    Ok(candidates)
}
