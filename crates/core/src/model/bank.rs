use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{BankId, QuestionId};
use crate::model::question::Question;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum BankError {
    #[error("bank {bank} is {state}, expected one of: {expected}")]
    InvalidState {
        bank: BankId,
        state: BankState,
        expected: &'static str,
    },

    #[error("bank cannot be empty")]
    Empty,

    #[error("question ids must follow bank order: position {position} holds {found}")]
    IdOutOfOrder { position: usize, found: QuestionId },
}

//
// ─── STATE ─────────────────────────────────────────────────────────────────────
//

/// Lifecycle of a bank.
///
/// `Generated` → `DiagnosticReady` once lesson 0 exists → `Finalized` once
/// lessons ≥ 1 exist. Finalize may run again from `Finalized`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BankState {
    Generated,
    DiagnosticReady,
    Finalized,
}

impl BankState {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            BankState::Generated => "generated",
            BankState::DiagnosticReady => "diagnostic_ready",
            BankState::Finalized => "finalized",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "generated" => Some(BankState::Generated),
            "diagnostic_ready" => Some(BankState::DiagnosticReady),
            "finalized" => Some(BankState::Finalized),
            _ => None,
        }
    }

    #[must_use]
    pub fn can_finalize(&self) -> bool {
        matches!(self, BankState::DiagnosticReady | BankState::Finalized)
    }
}

impl std::fmt::Display for BankState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

//
// ─── BANK ──────────────────────────────────────────────────────────────────────
//

/// The full generated question pool for one source document.
///
/// Membership is fixed at creation; only per-question stats change afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Bank {
    id: BankId,
    document_id: String,
    questions: Vec<Question>,
    state: BankState,
    created_at: DateTime<Utc>,
}

impl Bank {
    /// Creates a freshly generated bank for `document_id`.
    ///
    /// # Errors
    ///
    /// Returns `BankError::Empty` without questions, or
    /// `BankError::IdOutOfOrder` if question ids are not their positions.
    pub fn new(
        document_id: impl Into<String>,
        questions: Vec<Question>,
        created_at: DateTime<Utc>,
    ) -> Result<Self, BankError> {
        let document_id = document_id.into();
        Self::from_persisted(
            BankId::from_document(&document_id),
            document_id,
            questions,
            BankState::Generated,
            created_at,
        )
    }

    /// # Errors
    ///
    /// Same checks as [`Bank::new`].
    pub fn from_persisted(
        id: BankId,
        document_id: String,
        questions: Vec<Question>,
        state: BankState,
        created_at: DateTime<Utc>,
    ) -> Result<Self, BankError> {
        if questions.is_empty() {
            return Err(BankError::Empty);
        }
        for (position, question) in questions.iter().enumerate() {
            if usize::try_from(question.id().value()).ok() != Some(position) {
                return Err(BankError::IdOutOfOrder {
                    position,
                    found: question.id(),
                });
            }
        }
        Ok(Self {
            id,
            document_id,
            questions,
            state,
            created_at,
        })
    }

    #[must_use]
    pub fn id(&self) -> BankId {
        self.id
    }

    #[must_use]
    pub fn document_id(&self) -> &str {
        &self.document_id
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn question(&self, id: QuestionId) -> Option<&Question> {
        usize::try_from(id.value())
            .ok()
            .and_then(|idx| self.questions.get(idx))
    }

    pub fn question_mut(&mut self, id: QuestionId) -> Option<&mut Question> {
        usize::try_from(id.value())
            .ok()
            .and_then(|idx| self.questions.get_mut(idx))
    }

    #[must_use]
    pub fn state(&self) -> BankState {
        self.state
    }

    pub fn set_state(&mut self, state: BankState) {
        self.state = state;
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    /// Fails unless lesson 0 exists, i.e. finalize is allowed.
    ///
    /// # Errors
    ///
    /// Returns `BankError::InvalidState` while the bank is still `Generated`.
    pub fn ensure_finalizable(&self) -> Result<(), BankError> {
        if self.state.can_finalize() {
            Ok(())
        } else {
            Err(BankError::InvalidState {
                bank: self.id,
                state: self.state,
                expected: "diagnostic_ready, finalized",
            })
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::question::QuestionDraft;
    use crate::time::fixed_now;

    fn question(id: u32) -> Question {
        QuestionDraft {
            text: format!("Q{id}"),
            choices: vec!["a".into(), "b".into(), "c".into(), "d".into()],
            difficulty_percentage: 50,
        }
        .validate()
        .unwrap()
        .place(QuestionId::new(id), 0)
        .unwrap()
    }

    #[test]
    fn new_bank_is_generated_and_keyed_by_document() {
        let bank = Bank::new("doc.pdf", vec![question(0), question(1)], fixed_now()).unwrap();
        assert_eq!(bank.id(), BankId::from_document("doc.pdf"));
        assert_eq!(bank.state(), BankState::Generated);
        assert_eq!(bank.len(), 2);
        assert_eq!(bank.question(QuestionId::new(1)).unwrap().text(), "Q1");
    }

    #[test]
    fn bank_rejects_empty_and_misnumbered_questions() {
        assert_eq!(
            Bank::new("doc.pdf", Vec::new(), fixed_now()).unwrap_err(),
            BankError::Empty
        );
        let err = Bank::new("doc.pdf", vec![question(1)], fixed_now()).unwrap_err();
        assert!(matches!(err, BankError::IdOutOfOrder { position: 0, .. }));
    }

    #[test]
    fn finalize_requires_diagnostic() {
        let bank = Bank::new("doc.pdf", vec![question(0)], fixed_now()).unwrap();
        assert!(matches!(
            bank.ensure_finalizable(),
            Err(BankError::InvalidState {
                state: BankState::Generated,
                ..
            })
        ));

        let ready = Bank::from_persisted(
            bank.id(),
            "doc.pdf".into(),
            vec![question(0)],
            BankState::DiagnosticReady,
            fixed_now(),
        )
        .unwrap();
        assert!(ready.ensure_finalizable().is_ok());
    }

    #[test]
    fn state_string_round_trip() {
        for state in [
            BankState::Generated,
            BankState::DiagnosticReady,
            BankState::Finalized,
        ] {
            assert_eq!(BankState::parse(state.as_str()), Some(state));
        }
        assert_eq!(BankState::parse("archived"), None);
    }
}
