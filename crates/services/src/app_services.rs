use std::sync::Arc;

use storage::repository::Storage;

use crate::Clock;
use crate::bank_service::BankService;
use crate::config::ServiceConfig;
use crate::error::AppServicesError;
use crate::finalize_service::FinalizeService;
use crate::generation::{ChatQuestionProvider, GenerationPipeline, HttpTextSource};
use crate::locks::BankLocks;
use crate::progress_service::ProgressService;

/// Assembles caller-facing services over one storage backend and one lock
/// registry.
#[derive(Clone)]
pub struct AppServices {
    banks: Arc<BankService>,
    progress: Arc<ProgressService>,
    finalize: Arc<FinalizeService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage at `config.db_url`.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails.
    pub async fn new_sqlite(config: &ServiceConfig, clock: Clock) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(&config.db_url).await?;
        Ok(Self::from_storage(&storage, config, clock))
    }

    /// Wire services over an existing storage backend, with chat providers
    /// and text source taken from `config`.
    #[must_use]
    pub fn from_storage(storage: &Storage, config: &ServiceConfig, clock: Clock) -> Self {
        let pipeline = GenerationPipeline::new(
            Arc::new(ChatQuestionProvider::new("primary", config.primary.clone())),
            Arc::new(ChatQuestionProvider::new(
                "secondary",
                config.secondary.clone(),
            )),
        )
        .with_words_per_part(config.words_per_part);
        let text_source = Arc::new(HttpTextSource::new(config.text_source_url.clone()));
        Self::with_pipeline(storage, pipeline, text_source, clock)
    }

    /// Wire services with a caller-supplied generation pipeline.
    #[must_use]
    pub fn with_pipeline(
        storage: &Storage,
        pipeline: GenerationPipeline,
        text_source: Arc<dyn crate::generation::TextSource>,
        clock: Clock,
    ) -> Self {
        let locks = Arc::new(BankLocks::new());

        let banks = Arc::new(BankService::new(
            clock,
            pipeline,
            text_source,
            Arc::clone(&storage.banks),
            Arc::clone(&storage.lessons),
            Arc::clone(&locks),
        ));
        let progress = Arc::new(ProgressService::new(
            Arc::clone(&storage.banks),
            Arc::clone(&storage.lessons),
            Arc::clone(&storage.attempts),
            Arc::clone(&locks),
        ));
        let finalize = Arc::new(FinalizeService::new(
            Arc::clone(&storage.banks),
            Arc::clone(&storage.lessons),
            locks,
        ));

        Self {
            banks,
            progress,
            finalize,
        }
    }

    #[must_use]
    pub fn banks(&self) -> Arc<BankService> {
        Arc::clone(&self.banks)
    }

    #[must_use]
    pub fn progress(&self) -> Arc<ProgressService> {
        Arc::clone(&self.progress)
    }

    #[must_use]
    pub fn finalize(&self) -> Arc<FinalizeService> {
        Arc::clone(&self.finalize)
    }
}
