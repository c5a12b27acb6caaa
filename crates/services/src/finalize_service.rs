use std::sync::Arc;

use lesson_core::lessons::{BlendedScorer, DifficultyScorer, plan_followup_lessons};
use lesson_core::model::{BankId, Lesson, LessonNumber};
use storage::repository::{BankRepository, LessonRepository, StorageError};
use tracing::info;

use crate::error::FinalizeError;
use crate::locks::BankLocks;

/// Rebuilds a bank's follow-up lessons from current difficulty scores.
pub struct FinalizeService {
    banks: Arc<dyn BankRepository>,
    lessons: Arc<dyn LessonRepository>,
    locks: Arc<BankLocks>,
    scorer: Arc<dyn DifficultyScorer>,
}

impl FinalizeService {
    #[must_use]
    pub fn new(
        banks: Arc<dyn BankRepository>,
        lessons: Arc<dyn LessonRepository>,
        locks: Arc<BankLocks>,
    ) -> Self {
        Self {
            banks,
            lessons,
            locks,
            scorer: Arc::new(BlendedScorer),
        }
    }

    /// Override the difficulty scorer.
    #[must_use]
    pub fn with_scorer(mut self, scorer: Arc<dyn DifficultyScorer>) -> Self {
        self.scorer = scorer;
        self
    }

    /// Scores every non-diagnostic question, sorts easiest first, and
    /// replaces lessons 1.. with the re-chunked result. Lesson 0 is left
    /// untouched. Holds the bank exclusively for the whole run, so pending
    /// attempts land before scoring.
    ///
    /// Repeated calls with unchanged stats store identical lessons.
    ///
    /// # Errors
    ///
    /// - `FinalizeError::BankNotFound` for an unknown bank.
    /// - `FinalizeError::Bank` if the bank is still `generated`.
    /// - `FinalizeError::DiagnosticMissing` if lesson 0 is absent.
    pub async fn finalize(&self, bank_id: BankId) -> Result<Vec<Lesson>, FinalizeError> {
        let lock = self.locks.bank(bank_id);
        let _guard = lock.write().await;

        let bank = self.banks.get_bank(bank_id).await.map_err(|e| match e {
            StorageError::NotFound => FinalizeError::BankNotFound(bank_id),
            other => other.into(),
        })?;
        bank.ensure_finalizable()?;

        let diagnostic = self
            .lessons
            .get_lesson(bank_id, LessonNumber::DIAGNOSTIC)
            .await
            .map_err(|e| match e {
                StorageError::NotFound => FinalizeError::DiagnosticMissing(bank_id),
                other => other.into(),
            })?;

        let lessons = plan_followup_lessons(&bank, &diagnostic, self.scorer.as_ref());
        self.lessons
            .replace_followup_lessons(bank_id, &lessons)
            .await?;

        info!(
            bank = %bank_id,
            ranked = lessons.iter().map(Lesson::len).sum::<usize>(),
            lessons = lessons.len(),
            "bank finalized"
        );
        Ok(lessons)
    }
}
