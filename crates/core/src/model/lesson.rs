use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{BankId, LessonNumber};
use crate::model::question::{AttemptStats, Question};

/// Maximum number of questions in one lesson.
pub const LESSON_SIZE: usize = 15;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum LessonError {
    #[error("question index {index} out of range for lesson of {len}")]
    OutOfRange { index: usize, len: usize },

    #[error("lesson cannot hold more than 15 questions, got {len}")]
    TooLarge { len: usize },
}

//
// ─── LESSON ────────────────────────────────────────────────────────────────────
//

/// An ordered chunk of up to [`LESSON_SIZE`] questions.
///
/// Holds its own copies of the questions; attempts are recorded against the
/// copy addressed by `(bank_id, number, index)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lesson {
    bank_id: BankId,
    number: LessonNumber,
    questions: Vec<Question>,
}

impl Lesson {
    /// # Errors
    ///
    /// Returns `LessonError::TooLarge` above [`LESSON_SIZE`] questions.
    pub fn new(
        bank_id: BankId,
        number: LessonNumber,
        questions: Vec<Question>,
    ) -> Result<Self, LessonError> {
        if questions.len() > LESSON_SIZE {
            return Err(LessonError::TooLarge {
                len: questions.len(),
            });
        }
        Ok(Self {
            bank_id,
            number,
            questions,
        })
    }

    /// Builds a lesson from a chunk already bounded by [`LESSON_SIZE`].
    pub(crate) fn from_chunk(
        bank_id: BankId,
        number: LessonNumber,
        questions: Vec<Question>,
    ) -> Self {
        debug_assert!(questions.len() <= LESSON_SIZE);
        Self {
            bank_id,
            number,
            questions,
        }
    }

    #[must_use]
    pub fn bank_id(&self) -> BankId {
        self.bank_id
    }

    #[must_use]
    pub fn number(&self) -> LessonNumber {
        self.number
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    /// Overwrites the stats of the question at `index`.
    ///
    /// # Errors
    ///
    /// Returns `LessonError::OutOfRange` if `index >= len`; the lesson is
    /// left untouched.
    pub fn record_attempt(
        &mut self,
        index: usize,
        stats: AttemptStats,
    ) -> Result<&Question, LessonError> {
        let len = self.questions.len();
        let question = self
            .questions
            .get_mut(index)
            .ok_or(LessonError::OutOfRange { index, len })?;
        question.set_stats(stats);
        Ok(question)
    }

    /// Average accuracy over attempted questions, scaled to a percentage.
    ///
    /// Lessons with no attempted questions (or no questions) report 0.
    #[must_use]
    pub fn progress_percent(&self) -> f64 {
        let accuracies: Vec<f64> = self
            .questions
            .iter()
            .filter_map(|q| q.stats().accuracy())
            .collect();
        if accuracies.is_empty() {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let count = accuracies.len() as f64;
        accuracies.iter().sum::<f64>() / count * 100.0
    }

    #[must_use]
    pub fn progress(&self) -> LessonProgress {
        LessonProgress {
            lesson_number: self.number,
            percent: self.progress_percent(),
        }
    }
}

/// Completion summary of one lesson.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LessonProgress {
    pub lesson_number: LessonNumber,
    pub percent: f64,
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ids::QuestionId;
    use crate::model::question::QuestionDraft;

    fn question(id: u32) -> Question {
        QuestionDraft {
            text: format!("Q{id}"),
            choices: vec!["a".into(), "b".into(), "c".into(), "d".into()],
            difficulty_percentage: 10,
        }
        .validate()
        .unwrap()
        .place(QuestionId::new(id), 1)
        .unwrap()
    }

    fn lesson(n: u32) -> Lesson {
        Lesson::new(
            BankId::new(1),
            LessonNumber::DIAGNOSTIC,
            (0..n).map(question).collect(),
        )
        .unwrap()
    }

    #[test]
    fn lesson_rejects_more_than_fifteen() {
        let err = Lesson::new(
            BankId::new(1),
            LessonNumber::new(1),
            (0..16).map(question).collect(),
        )
        .unwrap_err();
        assert_eq!(err, LessonError::TooLarge { len: 16 });
    }

    #[test]
    fn record_attempt_out_of_range_leaves_lesson_unchanged() {
        let mut l = lesson(15);
        let before = l.clone();
        let err = l
            .record_attempt(20, AttemptStats::new(1, 1).unwrap())
            .unwrap_err();
        assert_eq!(err, LessonError::OutOfRange { index: 20, len: 15 });
        assert_eq!(l, before);
    }

    #[test]
    fn record_attempt_overwrites_absolute_counts() {
        let mut l = lesson(3);
        l.record_attempt(1, AttemptStats::new(2, 1).unwrap()).unwrap();
        let q = l
            .record_attempt(1, AttemptStats::new(4, 3).unwrap())
            .unwrap();
        assert_eq!(q.stats().tries(), 4);
        assert_eq!(q.stats().correct_tries(), 3);
        assert_eq!(q.user_difficulty(), 0.25);
    }

    #[test]
    fn progress_averages_attempted_questions_only() {
        let mut l = lesson(4);
        assert_eq!(l.progress_percent(), 0.0);

        l.record_attempt(0, AttemptStats::new(2, 2).unwrap()).unwrap();
        l.record_attempt(1, AttemptStats::new(2, 1).unwrap()).unwrap();
        assert!((l.progress_percent() - 75.0).abs() < f64::EPSILON);
    }

    #[test]
    fn empty_lesson_reports_zero_progress() {
        let l = lesson(0);
        assert_eq!(l.progress().percent, 0.0);
        assert_eq!(l.progress().lesson_number, LessonNumber::DIAGNOSTIC);
    }
}
