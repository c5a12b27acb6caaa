use thiserror::Error;

use crate::model::{BankError, LessonError, QuestionError};

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Question(#[from] QuestionError),
    #[error(transparent)]
    Lesson(#[from] LessonError),
    #[error(transparent)]
    Bank(#[from] BankError),
}
