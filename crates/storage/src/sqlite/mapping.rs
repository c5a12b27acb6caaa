use lesson_core::model::{
    AttemptStats, BankId, BankState, CHOICE_COUNT, LessonNumber, ObjectiveDifficulty, Question,
    QuestionId,
};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn(e: sqlx::Error) -> StorageError {
    StorageError::Connection(e.to_string())
}

fn i64_to_u32(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} out of range: {v}")))
}

fn usize_to_i64(field: &'static str, v: usize) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

pub(crate) fn bank_id_to_sql(id: BankId) -> String {
    id.to_hex()
}

pub(crate) fn bank_id_from_sql(s: &str) -> Result<BankId, StorageError> {
    s.parse().map_err(ser)
}

pub(crate) fn lesson_number_to_sql(number: LessonNumber) -> i64 {
    i64::from(number.value())
}

pub(crate) fn lesson_number_from_sql(v: i64) -> Result<LessonNumber, StorageError> {
    Ok(LessonNumber::new(i64_to_u32("lesson_number", v)?))
}

pub(crate) fn position_to_sql(position: usize) -> Result<i64, StorageError> {
    usize_to_i64("position", position)
}

pub(crate) fn parse_bank_state(s: &str) -> Result<BankState, StorageError> {
    BankState::parse(s).ok_or_else(|| StorageError::Serialization(format!("invalid state: {s}")))
}

/// Column values shared by `bank_questions` and `lesson_questions`.
pub(crate) struct QuestionColumns {
    pub question_id: i64,
    pub text: String,
    pub choices: String,
    pub correct_index: i64,
    pub objective_difficulty: i64,
    pub tries: i64,
    pub correct_tries: i64,
    pub user_difficulty: f64,
    pub combined_difficulty: Option<f64>,
}

impl QuestionColumns {
    pub(crate) fn from_question(question: &Question) -> Result<Self, StorageError> {
        Ok(Self {
            question_id: i64::from(question.id().value()),
            text: question.text().to_owned(),
            choices: serde_json::to_string(question.choices()).map_err(ser)?,
            correct_index: usize_to_i64("correct_index", question.correct_index())?,
            objective_difficulty: i64::from(question.objective_difficulty()),
            tries: i64::from(question.stats().tries()),
            correct_tries: i64::from(question.stats().correct_tries()),
            user_difficulty: question.user_difficulty(),
            combined_difficulty: question.combined_difficulty(),
        })
    }
}

/// Maps a row carrying the question columns, `combined_difficulty` included.
///
/// `user_difficulty` is not read back; it follows from the counts.
pub(crate) fn map_question_row(row: &SqliteRow) -> Result<Question, StorageError> {
    let choices_json: String = row.try_get("choices").map_err(ser)?;
    let choices: [String; CHOICE_COUNT] = serde_json::from_str(&choices_json).map_err(ser)?;

    let correct_index = usize::try_from(row.try_get::<i64, _>("correct_index").map_err(ser)?)
        .map_err(|_| StorageError::Serialization("correct_index sign overflow".into()))?;

    let objective =
        ObjectiveDifficulty::new(row.try_get::<i64, _>("objective_difficulty").map_err(ser)?)
            .map_err(ser)?;

    let stats = AttemptStats::new(
        i64_to_u32("tries", row.try_get::<i64, _>("tries").map_err(ser)?)?,
        i64_to_u32("correct_tries", row.try_get::<i64, _>("correct_tries").map_err(ser)?)?,
    )
    .map_err(ser)?;

    let combined: Option<f64> = row.try_get("combined_difficulty").map_err(ser)?;

    Question::from_persisted(
        QuestionId::new(i64_to_u32(
            "question_id",
            row.try_get::<i64, _>("question_id").map_err(ser)?,
        )?),
        row.try_get::<String, _>("text").map_err(ser)?,
        choices,
        correct_index,
        objective,
        stats,
        combined,
    )
    .map_err(ser)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bank_id_text_round_trip() {
        let id = BankId::from_document("notes.pdf");
        assert_eq!(bank_id_from_sql(&bank_id_to_sql(id)).unwrap(), id);
        assert!(bank_id_from_sql("xyz").is_err());
    }

    #[test]
    fn unknown_state_is_a_serialization_error() {
        assert!(matches!(
            parse_bank_state("archived"),
            Err(StorageError::Serialization(_))
        ));
        assert_eq!(
            parse_bank_state("diagnostic_ready").unwrap(),
            BankState::DiagnosticReady
        );
    }
}
