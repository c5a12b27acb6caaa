use std::collections::HashSet;

use crate::lessons::chunker::chunk;
use crate::model::{Bank, Lesson, LessonNumber, Question, QuestionId};

/// Largest shift user performance may apply, before doubling.
pub const MAX_SHIFT: f64 = 20.0;

/// Produces a blended 0–100 difficulty for a question.
pub trait DifficultyScorer: Send + Sync {
    fn score(&self, question: &Question) -> f64;
}

/// Shifts objective difficulty by observed user difficulty.
///
/// ```text
/// weight    = 0.125 (obj <= 33) | 0.375 (obj <= 66) | 0.5
/// influence = (user_difficulty - 0.5) * 2
/// combined  = clamp(obj + influence * weight * max_shift * 2, 0, 100)
/// ```
///
/// Harder questions let user performance move them further. An unattempted
/// question keeps its objective difficulty.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlendedScorer;

impl BlendedScorer {
    fn weight(objective: u8) -> f64 {
        match objective {
            0..=33 => 0.125,
            34..=66 => 0.375,
            _ => 0.5,
        }
    }
}

impl DifficultyScorer for BlendedScorer {
    fn score(&self, question: &Question) -> f64 {
        let objective = question.objective_difficulty().percent();
        let influence = (question.user_difficulty() - 0.5) * 2.0;
        let shift = influence * Self::weight(objective) * MAX_SHIFT * 2.0;
        (f64::from(objective) + shift).clamp(0.0, 100.0)
    }
}

/// Scores every bank question outside the diagnostic lesson, sorts them
/// easiest first, and chunks them into lessons numbered from 1.
///
/// Diagnostic questions are excluded by id. Equal scores fall back to id
/// order, so the same bank and stats always give the same partition.
#[must_use]
pub fn plan_followup_lessons(
    bank: &Bank,
    diagnostic: &Lesson,
    scorer: &dyn DifficultyScorer,
) -> Vec<Lesson> {
    let diagnostic_ids: HashSet<QuestionId> =
        diagnostic.questions().iter().map(Question::id).collect();

    let mut scored: Vec<(f64, Question)> = bank
        .questions()
        .iter()
        .filter(|q| !diagnostic_ids.contains(&q.id()))
        .map(|q| {
            let mut q = q.clone();
            let combined = scorer.score(&q);
            q.set_combined_difficulty(combined);
            (combined, q)
        })
        .collect();

    scored.sort_by(|(a, qa), (b, qb)| a.total_cmp(b).then_with(|| qa.id().cmp(&qb.id())));

    chunk(
        bank.id(),
        scored.into_iter().map(|(_, q)| q).collect(),
        LessonNumber::FIRST_FOLLOWUP,
    )
}
