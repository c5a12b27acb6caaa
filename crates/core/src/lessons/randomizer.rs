use rand::Rng;
use rand::seq::IndexedRandom;
use tracing::warn;

use crate::model::{CHOICE_COUNT, CandidateQuestion, Question, QuestionId};

/// Default number of times one slot may hold the correct answer in a batch.
pub const FAIRNESS_CAP: u32 = 4;

//
// ─── FAIRNESS STATE ────────────────────────────────────────────────────────────
//

/// Per-slot tallies of where correct answers were placed in a batch.
///
/// Threaded through [`randomize`] and returned with its output, so a caller
/// can inspect or continue the distribution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FairnessState {
    counts: [u32; CHOICE_COUNT],
    cap: u32,
    relaxed: u32,
}

impl Default for FairnessState {
    fn default() -> Self {
        Self::new(FAIRNESS_CAP)
    }
}

impl FairnessState {
    #[must_use]
    pub fn new(cap: u32) -> Self {
        Self {
            counts: [0; CHOICE_COUNT],
            cap,
            relaxed: 0,
        }
    }

    /// How many times each slot has been chosen.
    #[must_use]
    pub fn counts(&self) -> [u32; CHOICE_COUNT] {
        self.counts
    }

    #[must_use]
    pub fn cap(&self) -> u32 {
        self.cap
    }

    /// Number of placements made after every slot had reached the cap.
    #[must_use]
    pub fn relaxed(&self) -> u32 {
        self.relaxed
    }

    /// Chooses a slot: uniformly among slots below the cap, or, once all are
    /// capped, uniformly among the least-used slots.
    pub fn pick<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Placement {
        let below_cap: Vec<usize> = (0..CHOICE_COUNT)
            .filter(|&slot| self.counts[slot] < self.cap)
            .collect();

        let (candidates, within_cap) = if below_cap.is_empty() {
            let min = self.counts.iter().copied().min().unwrap_or(0);
            let least_used: Vec<usize> = (0..CHOICE_COUNT)
                .filter(|&slot| self.counts[slot] == min)
                .collect();
            (least_used, false)
        } else {
            (below_cap, true)
        };

        // Both candidate lists are non-empty: the least-used set always holds
        // the minimum slot.
        let slot = candidates.choose(rng).copied().unwrap_or(0);
        self.counts[slot] += 1;
        if !within_cap {
            self.relaxed += 1;
        }
        Placement { slot, within_cap }
    }
}

/// A slot chosen by [`FairnessState::pick`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub slot: usize,
    pub within_cap: bool,
}

//
// ─── RANDOMIZE ─────────────────────────────────────────────────────────────────
//

/// Output of [`randomize`]: placed questions plus the final tallies.
#[derive(Debug, Clone, PartialEq)]
pub struct Randomized {
    pub questions: Vec<Question>,
    pub fairness: FairnessState,
}

/// Moves each candidate's correct answer (index 0) to a fairly chosen slot.
///
/// Questions get ids matching their position in `candidates`. Never fails:
/// once every slot is capped the guarantee degrades to least-used placement
/// and each such placement is logged.
pub fn randomize<R: Rng + ?Sized>(
    candidates: Vec<CandidateQuestion>,
    mut fairness: FairnessState,
    rng: &mut R,
) -> Randomized {
    let mut questions = Vec::with_capacity(candidates.len());

    for (id, candidate) in (0_u32..).zip(candidates) {
        let placement = fairness.pick(rng);
        if !placement.within_cap {
            warn!(
                question = id,
                slot = placement.slot,
                cap = fairness.cap(),
                counts = ?fairness.counts(),
                "fairness cap exhausted; placing correct answer in least-used slot"
            );
        }
        questions.push(candidate.relocate(QuestionId::new(id), placement.slot));
    }

    Randomized {
        questions,
        fairness,
    }
}
