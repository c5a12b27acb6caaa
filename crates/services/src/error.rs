//! Shared error types for the services crate.

use thiserror::Error;

use lesson_core::model::{BankError, BankId, LessonError, LessonNumber, QuestionError};
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Failure of one question provider or of the text source.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProviderError {
    #[error("provider is not configured")]
    Disabled,
    #[error("provider returned an empty response")]
    EmptyResponse,
    #[error("provider returned no usable questions")]
    NoQuestions,
    #[error("provider request failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("malformed provider output: {0}")]
    Malformed(String),
}

/// Errors emitted by the generation pipeline.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GenerationError {
    #[error("source text is empty")]
    EmptySource,
    #[error("text source failed: {0}")]
    TextSource(#[source] ProviderError),
    #[error("question generation failed (primary: {primary}; secondary: {secondary})")]
    Exhausted {
        primary: ProviderError,
        secondary: ProviderError,
    },
}

/// Errors emitted by `BankService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BankServiceError {
    #[error("bank {0} not found")]
    BankNotFound(BankId),
    #[error("lesson {number} of bank {bank} not found")]
    LessonNotFound { bank: BankId, number: LessonNumber },
    #[error("bank id {0} is already held by another document")]
    IdCollision(BankId),
    #[error(transparent)]
    Generation(#[from] GenerationError),
    #[error(transparent)]
    Bank(#[from] BankError),
    #[error(transparent)]
    Lesson(#[from] LessonError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `ProgressService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressError {
    #[error("bank {0} not found")]
    BankNotFound(BankId),
    #[error("lesson {number} of bank {bank} not found")]
    LessonNotFound { bank: BankId, number: LessonNumber },
    #[error("bank {0} is being finalized or regenerated")]
    FinalizeInProgress(BankId),
    #[error(transparent)]
    Question(#[from] QuestionError),
    #[error(transparent)]
    Lesson(#[from] LessonError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `FinalizeService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FinalizeError {
    #[error("bank {0} not found")]
    BankNotFound(BankId),
    #[error("bank {0} has no diagnostic lesson")]
    DiagnosticMissing(BankId),
    #[error(transparent)]
    Bank(#[from] BankError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
}
