use lesson_core::model::{Bank, BankId, Lesson};
use sqlx::{Row, SqliteConnection};

use super::SqliteRepository;
use super::lesson_repo::write_diagnostic;
use super::mapping::{
    QuestionColumns, bank_id_from_sql, bank_id_to_sql, conn, map_question_row, parse_bank_state,
    ser,
};
use crate::repository::{BankRepository, StorageError};

async fn insert_bank_question(
    db: &mut SqliteConnection,
    bank_id: &str,
    cols: QuestionColumns,
) -> Result<(), StorageError> {
    sqlx::query(
        r"
        INSERT INTO bank_questions (
            bank_id, question_id, text, choices, correct_index,
            objective_difficulty, tries, correct_tries, user_difficulty
        )
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        ",
    )
    .bind(bank_id)
    .bind(cols.question_id)
    .bind(cols.text)
    .bind(cols.choices)
    .bind(cols.correct_index)
    .bind(cols.objective_difficulty)
    .bind(cols.tries)
    .bind(cols.correct_tries)
    .bind(cols.user_difficulty)
    .execute(db)
    .await
    .map_err(conn)?;
    Ok(())
}

/// Upserts the bank row and replaces its questions, dropping its lessons.
///
/// Only a bank for the same document may be overwritten.
async fn write_bank(db: &mut SqliteConnection, bank: &Bank) -> Result<(), StorageError> {
    let id = bank_id_to_sql(bank.id());
    let res = sqlx::query(
        r"
        INSERT INTO banks (id, document_id, state, created_at)
        VALUES (?1, ?2, ?3, ?4)
        ON CONFLICT(id) DO UPDATE SET
            state = excluded.state,
            created_at = excluded.created_at
        WHERE banks.document_id = excluded.document_id
        ",
    )
    .bind(&id)
    .bind(bank.document_id())
    .bind(bank.state().as_str())
    .bind(bank.created_at())
    .execute(&mut *db)
    .await
    .map_err(conn)?;

    if res.rows_affected() == 0 {
        tracing::warn!(bank = %bank.id(), document = bank.document_id(), "bank id collision");
        return Err(StorageError::Conflict);
    }

    sqlx::query("DELETE FROM lessons WHERE bank_id = ?1")
        .bind(&id)
        .execute(&mut *db)
        .await
        .map_err(conn)?;
    sqlx::query("DELETE FROM bank_questions WHERE bank_id = ?1")
        .bind(&id)
        .execute(&mut *db)
        .await
        .map_err(conn)?;

    for question in bank.questions() {
        insert_bank_question(&mut *db, &id, QuestionColumns::from_question(question)?).await?;
    }
    Ok(())
}

#[async_trait::async_trait]
impl BankRepository for SqliteRepository {
    async fn put_bank(&self, bank: &Bank) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await.map_err(conn)?;
        write_bank(&mut *tx, bank).await?;
        tx.commit().await.map_err(conn)?;
        tracing::debug!(bank = %bank.id(), questions = bank.len(), "stored bank");
        Ok(())
    }

    async fn put_generated_bank(
        &self,
        bank: &Bank,
        diagnostic: &Lesson,
    ) -> Result<(), StorageError> {
        if diagnostic.bank_id() != bank.id() || !diagnostic.number().is_diagnostic() {
            return Err(StorageError::Conflict);
        }
        let mut tx = self.pool.begin().await.map_err(conn)?;
        write_bank(&mut *tx, bank).await?;
        write_diagnostic(&mut *tx, &bank_id_to_sql(bank.id()), diagnostic).await?;
        tx.commit().await.map_err(conn)?;
        tracing::debug!(
            bank = %bank.id(),
            questions = bank.len(),
            diagnostic = diagnostic.len(),
            "stored generated bank"
        );
        Ok(())
    }

    async fn get_bank(&self, id: BankId) -> Result<Bank, StorageError> {
        let key = bank_id_to_sql(id);
        let row = sqlx::query(
            r"
            SELECT id, document_id, state, created_at
            FROM banks WHERE id = ?1
            ",
        )
        .bind(&key)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?
        .ok_or(StorageError::NotFound)?;

        let rows = sqlx::query(
            r"
            SELECT question_id, text, choices, correct_index, objective_difficulty,
                   tries, correct_tries, NULL AS combined_difficulty
            FROM bank_questions
            WHERE bank_id = ?1
            ORDER BY question_id ASC
            ",
        )
        .bind(&key)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut questions = Vec::with_capacity(rows.len());
        for row in &rows {
            questions.push(map_question_row(row)?);
        }

        let state: String = row.try_get("state").map_err(ser)?;
        Bank::from_persisted(
            bank_id_from_sql(&row.try_get::<String, _>("id").map_err(ser)?)?,
            row.try_get("document_id").map_err(ser)?,
            questions,
            parse_bank_state(&state)?,
            row.try_get("created_at").map_err(ser)?,
        )
        .map_err(ser)
    }
}
