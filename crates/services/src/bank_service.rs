use std::sync::{Arc, Mutex, PoisonError};

use lesson_core::lessons::{FairnessState, randomize, select_diagnostic};
use lesson_core::model::{Bank, BankId, Lesson, LessonNumber};
use lesson_core::time::Clock;
use rand::SeedableRng;
use rand::rngs::StdRng;
use storage::repository::{BankRepository, LessonRepository, StorageError};
use tracing::info;

use crate::error::{BankServiceError, GenerationError};
use crate::generation::{GenerationPipeline, TextSource};
use crate::locks::BankLocks;

/// Creates banks from source documents and serves their lessons.
pub struct BankService {
    clock: Clock,
    pipeline: GenerationPipeline,
    text_source: Arc<dyn TextSource>,
    banks: Arc<dyn BankRepository>,
    lessons: Arc<dyn LessonRepository>,
    locks: Arc<BankLocks>,
    rng: Mutex<StdRng>,
}

impl BankService {
    #[must_use]
    pub fn new(
        clock: Clock,
        pipeline: GenerationPipeline,
        text_source: Arc<dyn TextSource>,
        banks: Arc<dyn BankRepository>,
        lessons: Arc<dyn LessonRepository>,
        locks: Arc<BankLocks>,
    ) -> Self {
        Self {
            clock,
            pipeline,
            text_source,
            banks,
            lessons,
            locks,
            rng: Mutex::new(StdRng::from_os_rng()),
        }
    }

    /// Replace the random source (usually for deterministic testing).
    #[must_use]
    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    /// Fetches the document text from the text source, then generates.
    ///
    /// # Errors
    ///
    /// Returns `GenerationError::TextSource` when the text cannot be fetched,
    /// otherwise the errors of [`BankService::generate_bank`].
    pub async fn generate_bank_for_document(
        &self,
        document_id: &str,
    ) -> Result<BankId, BankServiceError> {
        let text = self
            .text_source
            .fetch_text(document_id)
            .await
            .map_err(GenerationError::TextSource)?;
        self.generate_bank(document_id, &text).await
    }

    /// Generates, randomizes and stores a bank for `document_id`, then
    /// stores its diagnostic lesson.
    ///
    /// Regenerating an existing document replaces its bank and drops its
    /// lessons.
    ///
    /// # Errors
    ///
    /// Returns `BankServiceError::Generation` when both providers fail,
    /// `BankServiceError::IdCollision` when another document owns the id,
    /// or storage errors.
    pub async fn generate_bank(
        &self,
        document_id: &str,
        source_text: &str,
    ) -> Result<BankId, BankServiceError> {
        let candidates = self.pipeline.generate(source_text).await?;

        let (bank, diagnostic) = {
            let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
            let placed = randomize(candidates, FairnessState::default(), &mut *rng);
            let bank = Bank::new(document_id, placed.questions, self.clock.now())?;
            let diagnostic = select_diagnostic(bank.questions(), &mut *rng);
            (bank, diagnostic)
        };
        let bank_id = bank.id();
        let lesson0 = Lesson::new(bank_id, LessonNumber::DIAGNOSTIC, diagnostic)?;

        let lock = self.locks.bank(bank_id);
        let _guard = lock.write().await;

        self.banks
            .put_generated_bank(&bank, &lesson0)
            .await
            .map_err(|e| match e {
                StorageError::Conflict => BankServiceError::IdCollision(bank_id),
                other => other.into(),
            })?;

        info!(
            bank = %bank_id,
            document = document_id,
            questions = bank.len(),
            diagnostic = lesson0.len(),
            "bank generated"
        );
        Ok(bank_id)
    }

    /// # Errors
    ///
    /// Returns `BankServiceError::BankNotFound` for an unknown bank.
    pub async fn get_bank(&self, bank_id: BankId) -> Result<Bank, BankServiceError> {
        self.banks.get_bank(bank_id).await.map_err(|e| match e {
            StorageError::NotFound => BankServiceError::BankNotFound(bank_id),
            other => other.into(),
        })
    }

    /// Lesson 0 of a bank.
    ///
    /// # Errors
    ///
    /// Returns `BankServiceError::LessonNotFound` if it does not exist.
    pub async fn get_diagnostic_lesson(&self, bank_id: BankId) -> Result<Lesson, BankServiceError> {
        self.get_lesson(bank_id, LessonNumber::DIAGNOSTIC).await
    }

    /// # Errors
    ///
    /// Returns `BankServiceError::LessonNotFound` if the lesson does not exist.
    pub async fn get_lesson(
        &self,
        bank_id: BankId,
        number: LessonNumber,
    ) -> Result<Lesson, BankServiceError> {
        self.lessons
            .get_lesson(bank_id, number)
            .await
            .map_err(|e| match e {
                StorageError::NotFound => BankServiceError::LessonNotFound {
                    bank: bank_id,
                    number,
                },
                other => other.into(),
            })
    }
}
