use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::QuestionId;

/// Every question carries exactly this many answer choices.
pub const CHOICE_COUNT: usize = 4;

/// Upper bound of the objective difficulty percentage.
pub const MAX_DIFFICULTY: u8 = 100;

/// User difficulty reported for a question nobody has attempted yet.
pub const UNATTEMPTED_USER_DIFFICULTY: f64 = 0.5;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("question text cannot be empty")]
    EmptyText,

    #[error("expected 4 choices, found {found}")]
    WrongChoiceCount { found: usize },

    #[error("choice {index} cannot be empty")]
    EmptyChoice { index: usize },

    #[error("objective difficulty must be in 0..=100, got {provided}")]
    DifficultyOutOfRange { provided: i64 },

    #[error("correct index must be in 0..=3, got {provided}")]
    CorrectIndexOutOfRange { provided: usize },

    #[error("correct tries ({correct_tries}) cannot exceed tries ({tries})")]
    CorrectExceedsTries { tries: u32, correct_tries: u32 },
}

//
// ─── DIFFICULTY ────────────────────────────────────────────────────────────────
//

/// Difficulty band used for stratified sampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tertile {
    /// 0..=33
    Easy,
    /// 34..=66
    Medium,
    /// 67..=100
    Hard,
}

impl Tertile {
    pub const ALL: [Tertile; 3] = [Tertile::Easy, Tertile::Medium, Tertile::Hard];
}

/// Externally supplied difficulty estimate, an integer percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct ObjectiveDifficulty(u8);

impl ObjectiveDifficulty {
    /// # Errors
    ///
    /// Returns `QuestionError::DifficultyOutOfRange` outside 0..=100.
    pub fn new(percent: i64) -> Result<Self, QuestionError> {
        u8::try_from(percent)
            .ok()
            .filter(|p| *p <= MAX_DIFFICULTY)
            .map(Self)
            .ok_or(QuestionError::DifficultyOutOfRange { provided: percent })
    }

    #[must_use]
    pub fn percent(&self) -> u8 {
        self.0
    }

    #[must_use]
    pub fn tertile(&self) -> Tertile {
        match self.0 {
            0..=33 => Tertile::Easy,
            34..=66 => Tertile::Medium,
            _ => Tertile::Hard,
        }
    }
}

impl TryFrom<i64> for ObjectiveDifficulty {
    type Error = QuestionError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ObjectiveDifficulty> for i64 {
    fn from(value: ObjectiveDifficulty) -> Self {
        i64::from(value.0)
    }
}

//
// ─── ATTEMPT STATS ─────────────────────────────────────────────────────────────
//

/// Absolute attempt counts for one question.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptStats {
    tries: u32,
    correct_tries: u32,
}

impl AttemptStats {
    /// # Errors
    ///
    /// Returns `QuestionError::CorrectExceedsTries` if `correct_tries > tries`.
    pub fn new(tries: u32, correct_tries: u32) -> Result<Self, QuestionError> {
        if correct_tries > tries {
            return Err(QuestionError::CorrectExceedsTries {
                tries,
                correct_tries,
            });
        }
        Ok(Self {
            tries,
            correct_tries,
        })
    }

    #[must_use]
    pub fn tries(&self) -> u32 {
        self.tries
    }

    #[must_use]
    pub fn correct_tries(&self) -> u32 {
        self.correct_tries
    }

    #[must_use]
    pub fn is_attempted(&self) -> bool {
        self.tries > 0
    }

    /// Fraction of correct tries, `None` when never attempted.
    #[must_use]
    pub fn accuracy(&self) -> Option<f64> {
        self.is_attempted()
            .then(|| f64::from(self.correct_tries) / f64::from(self.tries))
    }

    /// Observed error rate in [0, 1]; 0.5 when never attempted.
    #[must_use]
    pub fn user_difficulty(&self) -> f64 {
        self.accuracy()
            .map_or(UNATTEMPTED_USER_DIFFICULTY, |accuracy| 1.0 - accuracy)
    }
}

//
// ─── CANDIDATES ────────────────────────────────────────────────────────────────
//

/// Raw question as produced by a generator, before validation.
///
/// The conceptually correct answer is expected at `choices[0]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionDraft {
    pub text: String,
    pub choices: Vec<String>,
    pub difficulty_percentage: i64,
}

impl QuestionDraft {
    /// # Errors
    ///
    /// Returns `QuestionError` for empty text, a choice count other than four,
    /// empty choices, or a difficulty outside 0..=100.
    pub fn validate(self) -> Result<CandidateQuestion, QuestionError> {
        let text = self.text.trim();
        if text.is_empty() {
            return Err(QuestionError::EmptyText);
        }

        let found = self.choices.len();
        let choices: [String; CHOICE_COUNT] = self
            .choices
            .try_into()
            .map_err(|_| QuestionError::WrongChoiceCount { found })?;
        if let Some(index) = choices.iter().position(|c| c.trim().is_empty()) {
            return Err(QuestionError::EmptyChoice { index });
        }

        Ok(CandidateQuestion {
            text: text.to_owned(),
            choices,
            objective_difficulty: ObjectiveDifficulty::new(self.difficulty_percentage)?,
        })
    }
}

/// Validated generator output, correct answer still at index 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateQuestion {
    pub text: String,
    pub choices: [String; CHOICE_COUNT],
    pub objective_difficulty: ObjectiveDifficulty,
}

impl CandidateQuestion {
    /// Moves the correct answer (index 0) to `correct_index` and assigns an id.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError::CorrectIndexOutOfRange` if `correct_index >= 4`.
    pub fn place(self, id: QuestionId, correct_index: usize) -> Result<Question, QuestionError> {
        if correct_index >= CHOICE_COUNT {
            return Err(QuestionError::CorrectIndexOutOfRange {
                provided: correct_index,
            });
        }
        Ok(self.relocate(id, correct_index))
    }

    /// Swaps `choices[0]` with `choices[slot]`; `slot` must be below `CHOICE_COUNT`.
    pub(crate) fn relocate(self, id: QuestionId, slot: usize) -> Question {
        let mut choices = self.choices;
        choices.swap(0, slot);
        Question {
            id,
            text: self.text,
            choices,
            correct_index: slot,
            objective_difficulty: self.objective_difficulty,
            stats: AttemptStats::default(),
            combined_difficulty: None,
        }
    }
}

//
// ─── QUESTION ──────────────────────────────────────────────────────────────────
//

/// A placed multiple-choice question with its performance stats.
///
/// Serializes with the derived `user_difficulty` next to `stats`; the field
/// is ignored when deserializing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "QuestionRecord")]
pub struct Question {
    id: QuestionId,
    text: String,
    choices: [String; CHOICE_COUNT],
    correct_index: usize,
    objective_difficulty: ObjectiveDifficulty,
    stats: AttemptStats,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    combined_difficulty: Option<f64>,
}

impl Question {
    /// Rebuilds a question from persisted fields.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` if the text or a choice is empty or the
    /// correct index is out of range.
    pub fn from_persisted(
        id: QuestionId,
        text: String,
        choices: [String; CHOICE_COUNT],
        correct_index: usize,
        objective_difficulty: ObjectiveDifficulty,
        stats: AttemptStats,
        combined_difficulty: Option<f64>,
    ) -> Result<Self, QuestionError> {
        if text.trim().is_empty() {
            return Err(QuestionError::EmptyText);
        }
        if let Some(index) = choices.iter().position(|c| c.trim().is_empty()) {
            return Err(QuestionError::EmptyChoice { index });
        }
        if correct_index >= CHOICE_COUNT {
            return Err(QuestionError::CorrectIndexOutOfRange {
                provided: correct_index,
            });
        }
        Ok(Self {
            id,
            text,
            choices,
            correct_index,
            objective_difficulty,
            stats,
            combined_difficulty,
        })
    }

    #[must_use]
    pub fn id(&self) -> QuestionId {
        self.id
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn choices(&self) -> &[String; CHOICE_COUNT] {
        &self.choices
    }

    #[must_use]
    pub fn correct_index(&self) -> usize {
        self.correct_index
    }

    #[must_use]
    pub fn correct_choice(&self) -> &str {
        &self.choices[self.correct_index]
    }

    #[must_use]
    pub fn objective_difficulty(&self) -> ObjectiveDifficulty {
        self.objective_difficulty
    }

    #[must_use]
    pub fn stats(&self) -> AttemptStats {
        self.stats
    }

    #[must_use]
    pub fn user_difficulty(&self) -> f64 {
        self.stats.user_difficulty()
    }

    /// Blended difficulty, present once the question has been re-ranked.
    #[must_use]
    pub fn combined_difficulty(&self) -> Option<f64> {
        self.combined_difficulty
    }

    /// Overwrites the attempt counts with absolute values.
    pub fn set_stats(&mut self, stats: AttemptStats) {
        self.stats = stats;
    }

    pub fn set_combined_difficulty(&mut self, combined: f64) {
        self.combined_difficulty = Some(combined);
    }
}

/// Serialized shape of a [`Question`].
#[derive(Serialize)]
struct QuestionRecord {
    id: QuestionId,
    text: String,
    choices: [String; CHOICE_COUNT],
    correct_index: usize,
    objective_difficulty: ObjectiveDifficulty,
    stats: AttemptStats,
    user_difficulty: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    combined_difficulty: Option<f64>,
}

impl From<Question> for QuestionRecord {
    fn from(question: Question) -> Self {
        let user_difficulty = question.user_difficulty();
        Self {
            id: question.id,
            text: question.text,
            choices: question.choices,
            correct_index: question.correct_index,
            objective_difficulty: question.objective_difficulty,
            stats: question.stats,
            user_difficulty,
            combined_difficulty: question.combined_difficulty,
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(choices: &[&str], difficulty: i64) -> QuestionDraft {
        QuestionDraft {
            text: "What is the capital of France?".into(),
            choices: choices.iter().map(|c| (*c).to_owned()).collect(),
            difficulty_percentage: difficulty,
        }
    }

    #[test]
    fn difficulty_tertiles_follow_boundaries() {
        let t = |p| ObjectiveDifficulty::new(p).unwrap().tertile();
        assert_eq!(t(0), Tertile::Easy);
        assert_eq!(t(33), Tertile::Easy);
        assert_eq!(t(34), Tertile::Medium);
        assert_eq!(t(66), Tertile::Medium);
        assert_eq!(t(67), Tertile::Hard);
        assert_eq!(t(100), Tertile::Hard);
    }

    #[test]
    fn difficulty_rejects_out_of_range() {
        assert!(matches!(
            ObjectiveDifficulty::new(101),
            Err(QuestionError::DifficultyOutOfRange { provided: 101 })
        ));
        assert!(ObjectiveDifficulty::new(-1).is_err());
    }

    #[test]
    fn stats_reject_more_correct_than_tries() {
        let err = AttemptStats::new(2, 3).unwrap_err();
        assert_eq!(
            err,
            QuestionError::CorrectExceedsTries {
                tries: 2,
                correct_tries: 3
            }
        );
    }

    #[test]
    fn user_difficulty_defaults_to_half() {
        assert_eq!(AttemptStats::default().user_difficulty(), 0.5);
        assert_eq!(AttemptStats::new(4, 1).unwrap().user_difficulty(), 0.75);
        assert_eq!(AttemptStats::new(3, 3).unwrap().user_difficulty(), 0.0);
    }

    #[test]
    fn draft_requires_four_non_empty_choices() {
        let err = draft(&["a", "b", "c"], 10).validate().unwrap_err();
        assert_eq!(err, QuestionError::WrongChoiceCount { found: 3 });

        let err = draft(&["a", "b", " ", "d"], 10).validate().unwrap_err();
        assert_eq!(err, QuestionError::EmptyChoice { index: 2 });
    }

    #[test]
    fn draft_rejects_blank_text() {
        let mut d = draft(&["a", "b", "c", "d"], 10);
        d.text = "  ".into();
        assert_eq!(d.validate().unwrap_err(), QuestionError::EmptyText);
    }

    #[test]
    fn placing_moves_correct_text_to_index() {
        let candidate = draft(&["Paris", "Rome", "Berlin", "Madrid"], 20)
            .validate()
            .unwrap();
        let question = candidate.place(QuestionId::new(0), 2).unwrap();

        assert_eq!(question.correct_index(), 2);
        assert_eq!(question.correct_choice(), "Paris");
        assert_eq!(question.choices()[0], "Berlin");
        assert_eq!(question.combined_difficulty(), None);
    }

    #[test]
    fn placing_rejects_invalid_index() {
        let candidate = draft(&["a", "b", "c", "d"], 20).validate().unwrap();
        assert!(matches!(
            candidate.place(QuestionId::new(0), 4),
            Err(QuestionError::CorrectIndexOutOfRange { provided: 4 })
        ));
    }

    #[test]
    fn question_serializes_difficulty_as_integer() {
        let question = draft(&["a", "b", "c", "d"], 42)
            .validate()
            .unwrap()
            .place(QuestionId::new(3), 0)
            .unwrap();
        let json = serde_json::to_value(&question).unwrap();
        assert_eq!(json["objective_difficulty"], 42);
        assert_eq!(json["user_difficulty"], 0.5);
        assert!(json.get("combined_difficulty").is_none());
    }

    #[test]
    fn serialized_question_carries_user_difficulty() {
        let mut question = draft(&["a", "b", "c", "d"], 50)
            .validate()
            .unwrap()
            .place(QuestionId::new(0), 1)
            .unwrap();
        question.set_stats(AttemptStats::new(4, 1).unwrap());
        question.set_combined_difficulty(59.0);

        let json = serde_json::to_value(&question).unwrap();
        assert_eq!(json["stats"]["tries"], 4);
        assert_eq!(json["user_difficulty"], 0.75);
        assert_eq!(json["combined_difficulty"], 59.0);

        let back: Question = serde_json::from_value(json).unwrap();
        assert_eq!(back, question);
    }
}
