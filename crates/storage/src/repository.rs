use async_trait::async_trait;
use lesson_core::model::{Bank, BankId, BankState, Lesson, LessonNumber};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Repository contract for question banks.
#[async_trait]
pub trait BankRepository: Send + Sync {
    /// Persist a bank, replacing prior content stored under the same id.
    ///
    /// Replacing a bank drops every lesson built from its previous content.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the id is held by a bank generated
    /// from a different document (an id collision), or other storage errors.
    async fn put_bank(&self, bank: &Bank) -> Result<(), StorageError>;

    /// Persist a freshly generated bank together with its lesson 0, leaving
    /// the bank `diagnostic_ready`. Either both are stored or neither is.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` on an id collision or if `diagnostic`
    /// is not lesson 0 of `bank`, or other storage errors.
    async fn put_generated_bank(&self, bank: &Bank, diagnostic: &Lesson)
    -> Result<(), StorageError>;

    /// Fetch a bank with its ordered questions.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn get_bank(&self, id: BankId) -> Result<Bank, StorageError>;
}

/// Repository contract for lessons.
#[async_trait]
pub trait LessonRepository: Send + Sync {
    /// Store lesson 0 and move a `generated` bank to `diagnostic_ready`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the bank is missing,
    /// `StorageError::Conflict` if the lesson is not lesson 0.
    async fn save_diagnostic(&self, lesson: &Lesson) -> Result<(), StorageError>;

    /// Fetch one lesson.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the lesson does not exist.
    async fn get_lesson(&self, bank_id: BankId, number: LessonNumber)
    -> Result<Lesson, StorageError>;

    /// Every lesson of a bank, ordered by lesson number.
    ///
    /// # Errors
    ///
    /// Returns storage errors; an unknown bank yields an empty list.
    async fn list_lessons(&self, bank_id: BankId) -> Result<Vec<Lesson>, StorageError>;

    /// Atomically drop all lessons numbered 1 and above, store `lessons` in
    /// their place, and mark the bank `finalized`. Lesson 0 is never touched.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the bank is missing,
    /// `StorageError::Conflict` if a lesson is lesson 0 or belongs to another bank.
    async fn replace_followup_lessons(
        &self,
        bank_id: BankId,
        lessons: &[Lesson],
    ) -> Result<(), StorageError>;
}

/// Atomic persistence of a recorded attempt.
#[async_trait]
pub trait AttemptPersistence: Send + Sync {
    /// Write the stats of `lesson.questions()[index]` to that lesson's copy
    /// and to the bank's copy of the same question in one transaction.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the lesson, position, or bank
    /// question does not exist; nothing is written in that case.
    async fn apply_attempt(&self, lesson: &Lesson, index: usize) -> Result<(), StorageError>;
}

#[derive(Default)]
struct MemoryState {
    banks: HashMap<BankId, Bank>,
    lessons: BTreeMap<(BankId, LessonNumber), Lesson>,
}

impl MemoryState {
    fn drop_lessons(&mut self, bank_id: BankId, from: LessonNumber) {
        self.lessons
            .retain(|(bank, number), _| *bank != bank_id || *number < from);
    }
}

/// Simple in-memory repository implementation for testing and prototyping.
///
/// One lock guards banks and lessons together so multi-record writes are
/// atomic, matching the transactional `SQLite` backend.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, StorageError> {
        self.state
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))
    }
}

#[async_trait]
impl BankRepository for InMemoryRepository {
    async fn put_bank(&self, bank: &Bank) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        if let Some(existing) = guard.banks.get(&bank.id()) {
            if existing.document_id() != bank.document_id() {
                return Err(StorageError::Conflict);
            }
        }
        guard.drop_lessons(bank.id(), LessonNumber::DIAGNOSTIC);
        guard.banks.insert(bank.id(), bank.clone());
        Ok(())
    }

    async fn put_generated_bank(
        &self,
        bank: &Bank,
        diagnostic: &Lesson,
    ) -> Result<(), StorageError> {
        if diagnostic.bank_id() != bank.id() || !diagnostic.number().is_diagnostic() {
            return Err(StorageError::Conflict);
        }
        let mut guard = self.lock()?;
        if let Some(existing) = guard.banks.get(&bank.id()) {
            if existing.document_id() != bank.document_id() {
                return Err(StorageError::Conflict);
            }
        }
        let mut bank = bank.clone();
        bank.set_state(BankState::DiagnosticReady);

        guard.drop_lessons(bank.id(), LessonNumber::DIAGNOSTIC);
        guard
            .lessons
            .insert((bank.id(), LessonNumber::DIAGNOSTIC), diagnostic.clone());
        guard.banks.insert(bank.id(), bank);
        Ok(())
    }

    async fn get_bank(&self, id: BankId) -> Result<Bank, StorageError> {
        let guard = self.lock()?;
        guard.banks.get(&id).cloned().ok_or(StorageError::NotFound)
    }
}

#[async_trait]
impl LessonRepository for InMemoryRepository {
    async fn save_diagnostic(&self, lesson: &Lesson) -> Result<(), StorageError> {
        if !lesson.number().is_diagnostic() {
            return Err(StorageError::Conflict);
        }
        let mut guard = self.lock()?;
        let bank = guard
            .banks
            .get_mut(&lesson.bank_id())
            .ok_or(StorageError::NotFound)?;
        if bank.state() == BankState::Generated {
            bank.set_state(BankState::DiagnosticReady);
        }
        guard
            .lessons
            .insert((lesson.bank_id(), lesson.number()), lesson.clone());
        Ok(())
    }

    async fn get_lesson(
        &self,
        bank_id: BankId,
        number: LessonNumber,
    ) -> Result<Lesson, StorageError> {
        let guard = self.lock()?;
        guard
            .lessons
            .get(&(bank_id, number))
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    async fn list_lessons(&self, bank_id: BankId) -> Result<Vec<Lesson>, StorageError> {
        let guard = self.lock()?;
        Ok(guard
            .lessons
            .range((bank_id, LessonNumber::DIAGNOSTIC)..=(bank_id, LessonNumber::new(u32::MAX)))
            .map(|(_, lesson)| lesson.clone())
            .collect())
    }

    async fn replace_followup_lessons(
        &self,
        bank_id: BankId,
        lessons: &[Lesson],
    ) -> Result<(), StorageError> {
        if lessons
            .iter()
            .any(|l| l.bank_id() != bank_id || l.number().is_diagnostic())
        {
            return Err(StorageError::Conflict);
        }
        let mut guard = self.lock()?;
        let bank = guard.banks.get_mut(&bank_id).ok_or(StorageError::NotFound)?;
        bank.set_state(BankState::Finalized);

        guard.drop_lessons(bank_id, LessonNumber::FIRST_FOLLOWUP);
        for lesson in lessons {
            guard
                .lessons
                .insert((bank_id, lesson.number()), lesson.clone());
        }
        Ok(())
    }
}

#[async_trait]
impl AttemptPersistence for InMemoryRepository {
    async fn apply_attempt(&self, lesson: &Lesson, index: usize) -> Result<(), StorageError> {
        let question = lesson.questions().get(index).ok_or(StorageError::NotFound)?;
        let key = (lesson.bank_id(), lesson.number());

        let mut guard = self.lock()?;
        let MemoryState { banks, lessons } = &mut *guard;

        let stored = lessons.get_mut(&key).ok_or(StorageError::NotFound)?;
        let stored_question = stored
            .questions()
            .get(index)
            .filter(|q| q.id() == question.id())
            .ok_or(StorageError::NotFound)?;
        let bank_question = banks
            .get_mut(&lesson.bank_id())
            .and_then(|bank| bank.question_mut(stored_question.id()))
            .ok_or(StorageError::NotFound)?;

        bank_question.set_stats(question.stats());
        stored
            .record_attempt(index, question.stats())
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        Ok(())
    }
}

/// Aggregates repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub banks: Arc<dyn BankRepository>,
    pub lessons: Arc<dyn LessonRepository>,
    pub attempts: Arc<dyn AttemptPersistence>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let banks: Arc<dyn BankRepository> = Arc::new(repo.clone());
        let lessons: Arc<dyn LessonRepository> = Arc::new(repo.clone());
        let attempts: Arc<dyn AttemptPersistence> = Arc::new(repo);
        Self {
            banks,
            lessons,
            attempts,
        }
    }
}
