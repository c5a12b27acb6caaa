#![forbid(unsafe_code)]

pub mod app_services;
pub mod bank_service;
pub mod config;
pub mod error;
pub mod finalize_service;
pub mod generation;
pub mod locks;
pub mod progress_service;

pub use lesson_core::Clock;

pub use app_services::AppServices;
pub use bank_service::BankService;
pub use config::ServiceConfig;
pub use error::{
    AppServicesError, BankServiceError, FinalizeError, GenerationError, ProgressError,
    ProviderError,
};
pub use finalize_service::FinalizeService;
pub use generation::{GenerationPipeline, QuestionProvider, TextSource};
pub use locks::BankLocks;
pub use progress_service::ProgressService;
