use crate::model::{BankId, LESSON_SIZE, Lesson, LessonNumber, Question};

/// Splits `questions` into consecutive lessons of [`LESSON_SIZE`], the last
/// one holding the remainder. Lessons are numbered from `first`.
#[must_use]
pub fn chunk(bank_id: BankId, questions: Vec<Question>, first: LessonNumber) -> Vec<Lesson> {
    let mut lessons = Vec::with_capacity(questions.len().div_ceil(LESSON_SIZE));
    let mut number = first;
    let mut rest = questions.into_iter().peekable();

    while rest.peek().is_some() {
        let slice: Vec<Question> = rest.by_ref().take(LESSON_SIZE).collect();
        lessons.push(Lesson::from_chunk(bank_id, number, slice));
        number = number.next();
    }

    lessons
}
