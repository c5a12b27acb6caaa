use std::collections::BTreeMap;

use chrono::Utc;
use lesson_core::model::{BankId, Lesson, LessonNumber, Question};
use sqlx::{Row, SqliteConnection};

use super::SqliteRepository;
use super::mapping::{
    QuestionColumns, bank_id_to_sql, conn, lesson_number_from_sql, lesson_number_to_sql,
    map_question_row, position_to_sql, ser,
};
use crate::repository::{AttemptPersistence, LessonRepository, StorageError};

const LESSON_QUESTION_COLUMNS: &str = r"
    lesson_number, question_id, text, choices, correct_index, objective_difficulty,
    tries, correct_tries, combined_difficulty
";

async fn ensure_bank(db: &mut SqliteConnection, bank_id: &str) -> Result<(), StorageError> {
    sqlx::query("SELECT 1 FROM banks WHERE id = ?1")
        .bind(bank_id)
        .fetch_optional(db)
        .await
        .map_err(conn)?
        .map(|_| ())
        .ok_or(StorageError::NotFound)
}

async fn insert_lesson(
    db: &mut SqliteConnection,
    bank_id: &str,
    lesson: &Lesson,
) -> Result<(), StorageError> {
    let number = lesson_number_to_sql(lesson.number());
    sqlx::query(
        r"
        INSERT INTO lessons (bank_id, lesson_number, generated_at)
        VALUES (?1, ?2, ?3)
        ",
    )
    .bind(bank_id)
    .bind(number)
    .bind(Utc::now())
    .execute(&mut *db)
    .await
    .map_err(conn)?;

    for (position, question) in lesson.questions().iter().enumerate() {
        let cols = QuestionColumns::from_question(question)?;
        sqlx::query(
            r"
            INSERT INTO lesson_questions (
                bank_id, lesson_number, position, question_id, text, choices,
                correct_index, objective_difficulty, tries, correct_tries, user_difficulty,
                combined_difficulty
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            ",
        )
        .bind(bank_id)
        .bind(number)
        .bind(position_to_sql(position)?)
        .bind(cols.question_id)
        .bind(cols.text)
        .bind(cols.choices)
        .bind(cols.correct_index)
        .bind(cols.objective_difficulty)
        .bind(cols.tries)
        .bind(cols.correct_tries)
        .bind(cols.user_difficulty)
        .bind(cols.combined_difficulty)
        .execute(&mut *db)
        .await
        .map_err(conn)?;
    }
    Ok(())
}

/// Replaces lesson 0 and moves a `generated` bank to `diagnostic_ready`.
pub(super) async fn write_diagnostic(
    db: &mut SqliteConnection,
    bank_id: &str,
    lesson: &Lesson,
) -> Result<(), StorageError> {
    sqlx::query("DELETE FROM lessons WHERE bank_id = ?1 AND lesson_number = 0")
        .bind(bank_id)
        .execute(&mut *db)
        .await
        .map_err(conn)?;
    insert_lesson(&mut *db, bank_id, lesson).await?;
    sqlx::query(
        r"
        UPDATE banks SET state = 'diagnostic_ready'
        WHERE id = ?1 AND state = 'generated'
        ",
    )
    .bind(bank_id)
    .execute(&mut *db)
    .await
    .map_err(conn)?;
    Ok(())
}

#[async_trait::async_trait]
impl LessonRepository for SqliteRepository {
    async fn save_diagnostic(&self, lesson: &Lesson) -> Result<(), StorageError> {
        if !lesson.number().is_diagnostic() {
            return Err(StorageError::Conflict);
        }
        let id = bank_id_to_sql(lesson.bank_id());
        let mut tx = self.pool.begin().await.map_err(conn)?;
        ensure_bank(&mut *tx, &id).await?;
        write_diagnostic(&mut *tx, &id, lesson).await?;
        tx.commit().await.map_err(conn)?;
        Ok(())
    }

    async fn get_lesson(
        &self,
        bank_id: BankId,
        number: LessonNumber,
    ) -> Result<Lesson, StorageError> {
        let id = bank_id_to_sql(bank_id);
        let n = lesson_number_to_sql(number);

        sqlx::query("SELECT 1 FROM lessons WHERE bank_id = ?1 AND lesson_number = ?2")
            .bind(&id)
            .bind(n)
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?
            .ok_or(StorageError::NotFound)?;

        let rows = sqlx::query(&format!(
            "SELECT {LESSON_QUESTION_COLUMNS} FROM lesson_questions
             WHERE bank_id = ?1 AND lesson_number = ?2
             ORDER BY position ASC"
        ))
        .bind(&id)
        .bind(n)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut questions = Vec::with_capacity(rows.len());
        for row in &rows {
            questions.push(map_question_row(row)?);
        }
        Lesson::new(bank_id, number, questions).map_err(ser)
    }

    async fn list_lessons(&self, bank_id: BankId) -> Result<Vec<Lesson>, StorageError> {
        let id = bank_id_to_sql(bank_id);

        let numbers = sqlx::query(
            "SELECT lesson_number FROM lessons WHERE bank_id = ?1 ORDER BY lesson_number ASC",
        )
        .bind(&id)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut grouped: BTreeMap<LessonNumber, Vec<Question>> = BTreeMap::new();
        for row in &numbers {
            let n = lesson_number_from_sql(row.try_get("lesson_number").map_err(ser)?)?;
            grouped.insert(n, Vec::new());
        }

        let rows = sqlx::query(&format!(
            "SELECT {LESSON_QUESTION_COLUMNS} FROM lesson_questions
             WHERE bank_id = ?1
             ORDER BY lesson_number ASC, position ASC"
        ))
        .bind(&id)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        for row in &rows {
            let n = lesson_number_from_sql(row.try_get("lesson_number").map_err(ser)?)?;
            grouped
                .get_mut(&n)
                .ok_or_else(|| StorageError::Serialization(format!("orphan lesson row {n}")))?
                .push(map_question_row(row)?);
        }

        grouped
            .into_iter()
            .map(|(number, questions)| Lesson::new(bank_id, number, questions).map_err(ser))
            .collect()
    }

    async fn replace_followup_lessons(
        &self,
        bank_id: BankId,
        lessons: &[Lesson],
    ) -> Result<(), StorageError> {
        if lessons
            .iter()
            .any(|l| l.bank_id() != bank_id || l.number().is_diagnostic())
        {
            return Err(StorageError::Conflict);
        }
        let id = bank_id_to_sql(bank_id);
        let mut tx = self.pool.begin().await.map_err(conn)?;
        ensure_bank(&mut *tx, &id).await?;

        let dropped = sqlx::query("DELETE FROM lessons WHERE bank_id = ?1 AND lesson_number >= 1")
            .bind(&id)
            .execute(&mut *tx)
            .await
            .map_err(conn)?
            .rows_affected();
        for lesson in lessons {
            insert_lesson(&mut *tx, &id, lesson).await?;
        }
        sqlx::query("UPDATE banks SET state = 'finalized' WHERE id = ?1")
            .bind(&id)
            .execute(&mut *tx)
            .await
            .map_err(conn)?;

        tx.commit().await.map_err(conn)?;
        tracing::debug!(
            bank = %bank_id,
            dropped,
            stored = lessons.len(),
            "replaced follow-up lessons"
        );
        Ok(())
    }
}

#[async_trait::async_trait]
impl AttemptPersistence for SqliteRepository {
    async fn apply_attempt(&self, lesson: &Lesson, index: usize) -> Result<(), StorageError> {
        let question = lesson.questions().get(index).ok_or(StorageError::NotFound)?;
        let cols = QuestionColumns::from_question(question)?;
        let id = bank_id_to_sql(lesson.bank_id());
        let mut tx = self.pool.begin().await.map_err(conn)?;

        let lesson_rows = sqlx::query(
            r"
            UPDATE lesson_questions SET tries = ?1, correct_tries = ?2, user_difficulty = ?3
            WHERE bank_id = ?4 AND lesson_number = ?5 AND position = ?6 AND question_id = ?7
            ",
        )
        .bind(cols.tries)
        .bind(cols.correct_tries)
        .bind(cols.user_difficulty)
        .bind(&id)
        .bind(lesson_number_to_sql(lesson.number()))
        .bind(position_to_sql(index)?)
        .bind(cols.question_id)
        .execute(&mut *tx)
        .await
        .map_err(conn)?
        .rows_affected();
        if lesson_rows == 0 {
            return Err(StorageError::NotFound);
        }

        let bank_rows = sqlx::query(
            r"
            UPDATE bank_questions SET tries = ?1, correct_tries = ?2, user_difficulty = ?3
            WHERE bank_id = ?4 AND question_id = ?5
            ",
        )
        .bind(cols.tries)
        .bind(cols.correct_tries)
        .bind(cols.user_difficulty)
        .bind(&id)
        .bind(cols.question_id)
        .execute(&mut *tx)
        .await
        .map_err(conn)?
        .rows_affected();
        if bank_rows == 0 {
            return Err(StorageError::NotFound);
        }

        tx.commit().await.map_err(conn)?;
        Ok(())
    }
}
