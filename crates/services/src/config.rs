use std::env;

use crate::generation::{ChatProviderConfig, DEFAULT_WORDS_PER_PART};

/// Default `SQLite` database location.
pub const DEFAULT_DB_URL: &str = "sqlite:lessons.sqlite3";

/// Runtime settings gathered from the environment.
#[derive(Clone, Debug)]
pub struct ServiceConfig {
    pub db_url: String,
    pub primary: Option<ChatProviderConfig>,
    pub secondary: Option<ChatProviderConfig>,
    pub text_source_url: Option<String>,
    pub words_per_part: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            db_url: DEFAULT_DB_URL.into(),
            primary: None,
            secondary: None,
            text_source_url: None,
            words_per_part: DEFAULT_WORDS_PER_PART,
        }
    }
}

impl ServiceConfig {
    /// Reads `LESSONS_*` variables, falling back to defaults for anything
    /// missing or unparsable.
    #[must_use]
    pub fn from_env() -> Self {
        let db_url = env::var("LESSONS_DB_URL")
            .ok()
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_DB_URL.into());
        let words_per_part = env::var("LESSONS_WORDS_PER_PART")
            .ok()
            .and_then(|raw| raw.trim().parse::<usize>().ok())
            .filter(|&n| n > 0)
            .unwrap_or(DEFAULT_WORDS_PER_PART);
        let text_source_url = env::var("LESSONS_TEXT_SOURCE_URL")
            .ok()
            .filter(|url| !url.trim().is_empty());

        Self {
            db_url,
            primary: ChatProviderConfig::from_env("PRIMARY"),
            secondary: ChatProviderConfig::from_env("SECONDARY"),
            text_source_url,
            words_per_part,
        }
    }

    /// Overrides the database URL, e.g. from a command-line flag.
    #[must_use]
    pub fn with_db_url(mut self, db_url: impl Into<String>) -> Self {
        self.db_url = db_url.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = ServiceConfig::default();
        assert_eq!(config.db_url, "sqlite:lessons.sqlite3");
        assert_eq!(config.words_per_part, 1000);
        assert!(config.primary.is_none());
        assert!(config.text_source_url.is_none());
    }

    #[test]
    fn db_url_override_wins() {
        let config = ServiceConfig::default().with_db_url("sqlite::memory:");
        assert_eq!(config.db_url, "sqlite::memory:");
    }
}
