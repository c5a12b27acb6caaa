use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

/// Runs the versioned schema migrations.
///
/// Version 1 creates banks, their master question copies, lessons, and the
/// per-lesson question copies. Version 2 stores the derived user difficulty
/// next to the attempt counts on both question tables.
#[allow(clippy::too_many_lines)]
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            ",
    )
    .execute(pool)
    .await?;

    // Version 1: full schema.
    if !is_applied(pool, 1).await? {
        let mut tx = pool.begin().await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS banks (
                    id TEXT PRIMARY KEY CHECK (length(id) = 8),
                    document_id TEXT NOT NULL,
                    state TEXT NOT NULL
                        CHECK (state IN ('generated', 'diagnostic_ready', 'finalized')),
                    created_at TEXT NOT NULL
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS bank_questions (
                    bank_id TEXT NOT NULL,
                    question_id INTEGER NOT NULL CHECK (question_id >= 0),
                    text TEXT NOT NULL,
                    choices TEXT NOT NULL,
                    correct_index INTEGER NOT NULL CHECK (correct_index BETWEEN 0 AND 3),
                    objective_difficulty INTEGER NOT NULL
                        CHECK (objective_difficulty BETWEEN 0 AND 100),
                    tries INTEGER NOT NULL CHECK (tries >= 0),
                    correct_tries INTEGER NOT NULL
                        CHECK (correct_tries >= 0 AND correct_tries <= tries),
                    PRIMARY KEY (bank_id, question_id),
                    FOREIGN KEY (bank_id) REFERENCES banks(id) ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS lessons (
                    bank_id TEXT NOT NULL,
                    lesson_number INTEGER NOT NULL CHECK (lesson_number >= 0),
                    generated_at TEXT NOT NULL,
                    PRIMARY KEY (bank_id, lesson_number),
                    FOREIGN KEY (bank_id) REFERENCES banks(id) ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS lesson_questions (
                    bank_id TEXT NOT NULL,
                    lesson_number INTEGER NOT NULL,
                    position INTEGER NOT NULL CHECK (position BETWEEN 0 AND 14),
                    question_id INTEGER NOT NULL,
                    text TEXT NOT NULL,
                    choices TEXT NOT NULL,
                    correct_index INTEGER NOT NULL CHECK (correct_index BETWEEN 0 AND 3),
                    objective_difficulty INTEGER NOT NULL
                        CHECK (objective_difficulty BETWEEN 0 AND 100),
                    tries INTEGER NOT NULL CHECK (tries >= 0),
                    correct_tries INTEGER NOT NULL
                        CHECK (correct_tries >= 0 AND correct_tries <= tries),
                    combined_difficulty REAL,
                    PRIMARY KEY (bank_id, lesson_number, position),
                    FOREIGN KEY (bank_id, lesson_number)
                        REFERENCES lessons(bank_id, lesson_number) ON DELETE CASCADE,
                    FOREIGN KEY (bank_id, question_id)
                        REFERENCES bank_questions(bank_id, question_id) ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_lesson_questions_bank_question
                    ON lesson_questions (bank_id, question_id);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                INSERT INTO schema_migrations (version, applied_at)
                VALUES (?1, ?2)
                ON CONFLICT(version) DO NOTHING
            ",
        )
        .bind(1_i64)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::info!(version = 1, "applied schema migration");
    }

    // Version 2: user_difficulty column, backfilled from the counts.
    if !is_applied(pool, 2).await? {
        let mut tx = pool.begin().await?;

        for table in ["bank_questions", "lesson_questions"] {
            sqlx::query(&format!(
                "ALTER TABLE {table} ADD COLUMN user_difficulty REAL NOT NULL DEFAULT 0.5
                     CHECK (user_difficulty BETWEEN 0.0 AND 1.0)"
            ))
            .execute(&mut *tx)
            .await?;
            sqlx::query(&format!(
                "UPDATE {table} SET user_difficulty = CASE
                     WHEN tries = 0 THEN 0.5
                     ELSE 1.0 - CAST(correct_tries AS REAL) / tries
                 END"
            ))
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query(
            r"
                INSERT INTO schema_migrations (version, applied_at)
                VALUES (?1, ?2)
                ON CONFLICT(version) DO NOTHING
            ",
        )
        .bind(2_i64)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::info!(version = 2, "applied schema migration");
    }

    Ok(())
}
