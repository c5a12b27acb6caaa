mod bank;
mod ids;
mod lesson;
mod question;

pub use ids::{BANK_ID_HEX_LEN, BankId, LessonNumber, ParseIdError, QuestionId};

pub use bank::{Bank, BankError, BankState};
pub use lesson::{LESSON_SIZE, Lesson, LessonError, LessonProgress};
pub use question::{
    AttemptStats, CHOICE_COUNT, CandidateQuestion, MAX_DIFFICULTY, ObjectiveDifficulty, Question,
    QuestionDraft, QuestionError, Tertile, UNATTEMPTED_USER_DIFFICULTY,
};
