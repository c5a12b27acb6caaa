//! Lesson-building algorithms: answer placement, diagnostic sampling,
//! chunking, and difficulty re-ranking. All pure; callers own persistence.

pub mod chunker;
pub mod diagnostic;
pub mod randomizer;
pub mod ranking;

pub use chunker::chunk;
pub use diagnostic::{PER_TERTILE, select_diagnostic};
pub use randomizer::{FAIRNESS_CAP, FairnessState, Placement, Randomized, randomize};
pub use ranking::{BlendedScorer, DifficultyScorer, MAX_SHIFT, plan_followup_lessons};
