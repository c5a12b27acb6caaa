use rand::Rng;
use rand::seq::SliceRandom;

use crate::model::{LESSON_SIZE, Question, Tertile};

/// Target number of diagnostic questions drawn from each difficulty tertile.
pub const PER_TERTILE: usize = 5;

/// Builds the stratified diagnostic lesson (lesson 0).
///
/// Each tertile is shuffled and contributes up to [`PER_TERTILE`] questions.
/// Shortfalls are filled from a shuffled pool of everything left over, until
/// [`LESSON_SIZE`] is reached or the pool runs out. The result keeps shuffle
/// order, not difficulty order.
pub fn select_diagnostic<R: Rng + ?Sized>(questions: &[Question], rng: &mut R) -> Vec<Question> {
    let mut selected: Vec<&Question> = Vec::with_capacity(LESSON_SIZE);
    let mut leftover: Vec<&Question> = Vec::new();

    for tertile in Tertile::ALL {
        let mut bucket: Vec<&Question> = questions
            .iter()
            .filter(|q| q.objective_difficulty().tertile() == tertile)
            .collect();
        bucket.shuffle(rng);

        let take = bucket.len().min(PER_TERTILE);
        leftover.extend(bucket.drain(take..));
        selected.extend(bucket);
    }

    let missing = LESSON_SIZE.saturating_sub(selected.len());
    if missing > 0 {
        leftover.shuffle(rng);
        selected.extend(leftover.into_iter().take(missing));
    }

    selected.into_iter().cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{QuestionDraft, QuestionId};
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::collections::HashSet;

    fn bank(difficulties: &[i64]) -> Vec<Question> {
        (0_u32..)
            .zip(difficulties)
            .map(|(id, &d)| {
                QuestionDraft {
                    text: format!("Q{id}"),
                    choices: vec!["a".into(), "b".into(), "c".into(), "d".into()],
                    difficulty_percentage: d,
                }
                .validate()
                .unwrap()
                .place(QuestionId::new(id), 0)
                .unwrap()
            })
            .collect()
    }

    fn spread(easy: usize, medium: usize, hard: usize) -> Vec<i64> {
        let mut d = vec![20; easy];
        d.extend(vec![50; medium]);
        d.extend(vec![80; hard]);
        d
    }

    fn count(lesson: &[Question], tertile: Tertile) -> usize {
        lesson
            .iter()
            .filter(|q| q.objective_difficulty().tertile() == tertile)
            .count()
    }

    #[test]
    fn balanced_bank_yields_five_per_tertile() {
        let questions = bank(&spread(10, 12, 10));
        let mut rng = StdRng::seed_from_u64(42);
        let lesson = select_diagnostic(&questions, &mut rng);

        assert_eq!(lesson.len(), 15);
        assert_eq!(count(&lesson, Tertile::Easy), 5);
        assert_eq!(count(&lesson, Tertile::Medium), 5);
        assert_eq!(count(&lesson, Tertile::Hard), 5);
    }

    #[test]
    fn short_bucket_is_filled_from_leftovers() {
        let questions = bank(&spread(2, 10, 10));
        let mut rng = StdRng::seed_from_u64(1);
        let lesson = select_diagnostic(&questions, &mut rng);

        assert_eq!(lesson.len(), 15);
        assert_eq!(count(&lesson, Tertile::Easy), 2);
        assert_eq!(
            count(&lesson, Tertile::Medium) + count(&lesson, Tertile::Hard),
            13
        );
    }

    #[test]
    fn small_bank_is_taken_whole() {
        let questions = bank(&spread(3, 2, 4));
        let mut rng = StdRng::seed_from_u64(9);
        let lesson = select_diagnostic(&questions, &mut rng);
        assert_eq!(lesson.len(), 9);
    }

    #[test]
    fn selection_has_no_duplicates() {
        let questions = bank(&spread(1, 20, 0));
        let mut rng = StdRng::seed_from_u64(5);
        let lesson = select_diagnostic(&questions, &mut rng);

        let ids: HashSet<_> = lesson.iter().map(Question::id).collect();
        assert_eq!(ids.len(), lesson.len());
        assert_eq!(lesson.len(), 15);
    }

    #[test]
    fn empty_bank_yields_empty_lesson() {
        let mut rng = StdRng::seed_from_u64(0);
        assert!(select_diagnostic(&[], &mut rng).is_empty());
    }
}
