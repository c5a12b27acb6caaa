use std::sync::Arc;

use lesson_core::model::{AttemptStats, BankId, LessonNumber, LessonProgress, Question};
use storage::repository::{AttemptPersistence, BankRepository, LessonRepository, StorageError};
use tracing::debug;

use crate::error::ProgressError;
use crate::locks::BankLocks;

/// Records learner attempts and reports per-lesson progress.
pub struct ProgressService {
    banks: Arc<dyn BankRepository>,
    lessons: Arc<dyn LessonRepository>,
    attempts: Arc<dyn AttemptPersistence>,
    locks: Arc<BankLocks>,
}

impl ProgressService {
    #[must_use]
    pub fn new(
        banks: Arc<dyn BankRepository>,
        lessons: Arc<dyn LessonRepository>,
        attempts: Arc<dyn AttemptPersistence>,
        locks: Arc<BankLocks>,
    ) -> Self {
        Self {
            banks,
            lessons,
            attempts,
            locks,
        }
    }

    /// Overwrites the absolute attempt counts of one lesson question and
    /// returns the updated question.
    ///
    /// Rejected rather than queued while the bank is being finalized or
    /// regenerated; attempts on the same lesson are applied one at a time.
    ///
    /// # Errors
    ///
    /// - `ProgressError::Question` if `correct_tries > tries`.
    /// - `ProgressError::FinalizeInProgress` while a whole-bank rewrite runs.
    /// - `ProgressError::LessonNotFound` for an unknown lesson.
    /// - `ProgressError::Lesson` if `question_index` is out of range; nothing
    ///   is written.
    pub async fn record_attempt(
        &self,
        bank_id: BankId,
        number: LessonNumber,
        question_index: usize,
        tries: u32,
        correct_tries: u32,
    ) -> Result<Question, ProgressError> {
        let stats = AttemptStats::new(tries, correct_tries)?;

        let _bank = self
            .locks
            .try_share_bank(bank_id)
            .map_err(|_| ProgressError::FinalizeInProgress(bank_id))?;
        let _lesson = self.locks.lock_lesson(bank_id, number).await;

        let mut lesson = self
            .lessons
            .get_lesson(bank_id, number)
            .await
            .map_err(|e| match e {
                StorageError::NotFound => ProgressError::LessonNotFound {
                    bank: bank_id,
                    number,
                },
                other => other.into(),
            })?;

        let updated = lesson.record_attempt(question_index, stats)?.clone();
        self.attempts.apply_attempt(&lesson, question_index).await?;

        debug!(
            bank = %bank_id,
            lesson = %number,
            question = %updated.id(),
            tries,
            correct_tries,
            "attempt recorded"
        );
        Ok(updated)
    }

    /// Progress of every lesson of the bank, ordered by lesson number.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::BankNotFound` for an unknown bank.
    pub async fn lesson_progress(
        &self,
        bank_id: BankId,
    ) -> Result<Vec<LessonProgress>, ProgressError> {
        self.banks.get_bank(bank_id).await.map_err(|e| match e {
            StorageError::NotFound => ProgressError::BankNotFound(bank_id),
            other => other.into(),
        })?;

        let lessons = self.lessons.list_lessons(bank_id).await?;
        Ok(lessons.iter().map(|lesson| lesson.progress()).collect())
    }
}
