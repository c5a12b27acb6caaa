use std::env;

use async_trait::async_trait;
use lesson_core::model::QuestionDraft;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::parse::parse_questions;
use super::{QuestionProvider, TextSource};
use crate::error::ProviderError;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const QUESTIONS_PER_PART: u32 = 10;

/// Connection settings for an OpenAI-compatible chat completions endpoint.
#[derive(Clone, Debug)]
pub struct ChatProviderConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
}

impl ChatProviderConfig {
    /// Reads `LESSONS_{role}_API_KEY`, `_BASE_URL` and `_MODEL`.
    ///
    /// Returns `None` without a non-blank API key.
    #[must_use]
    pub fn from_env(role: &str) -> Option<Self> {
        let api_key = env::var(format!("LESSONS_{role}_API_KEY")).ok()?;
        if api_key.trim().is_empty() {
            return None;
        }
        let base_url = env::var(format!("LESSONS_{role}_BASE_URL"))
            .unwrap_or_else(|_| DEFAULT_BASE_URL.into());
        let model =
            env::var(format!("LESSONS_{role}_MODEL")).unwrap_or_else(|_| DEFAULT_MODEL.into());
        Some(Self {
            base_url,
            api_key,
            model,
        })
    }
}

fn question_prompt(text: &str) -> String {
    format!(
        r#"You are a question generator. Given a source text, generate {QUESTIONS_PER_PART} multiple-choice questions in strict JSON format.
Each question must be an object like:
{{
  "question": "...",
  "choices": ["Option A", "Option B", "Option C", "Option D"],
  "difficulty_percentage": 50
}}
Place the correct answer at index 0 of "choices".
For "difficulty_percentage", give an integer from 0 (very easy) to 100 (very hard) rating the objective difficulty of the question based on the text.

Only return a valid JSON object with a "questions" key containing an array of question objects. No extra explanation or formatting.
Text:
{text}"#
    )
}

/// Question provider backed by a chat completions API.
#[derive(Clone)]
pub struct ChatQuestionProvider {
    name: &'static str,
    client: Client,
    config: Option<ChatProviderConfig>,
}

impl ChatQuestionProvider {
    #[must_use]
    pub fn new(name: &'static str, config: Option<ChatProviderConfig>) -> Self {
        Self {
            name,
            client: Client::new(),
            config,
        }
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.config.is_some()
    }

    async fn complete(&self, prompt: String) -> Result<String, ProviderError> {
        let config = self.config.as_ref().ok_or(ProviderError::Disabled)?;

        let url = format!(
            "{}/chat/completions",
            config.base_url.trim_end_matches('/')
        );
        let payload = ChatRequest {
            model: config.model.clone(),
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: 0.1,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        let response = self
            .client
            .post(url)
            .bearer_auth(&config.api_key)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ProviderError::HttpStatus(response.status()));
        }

        let body: ChatResponse = response.json().await?;
        body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(ProviderError::EmptyResponse)
    }
}

#[async_trait]
impl QuestionProvider for ChatQuestionProvider {
    fn name(&self) -> &str {
        self.name
    }

    async fn generate(&self, source_text: &str) -> Result<Vec<QuestionDraft>, ProviderError> {
        let content = self.complete(question_prompt(source_text)).await?;
        parse_questions(&content)
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Debug, Deserialize)]
struct ChatMessageResponse {
    content: Option<String>,
}

/// Text-extraction collaborator reached over HTTP.
///
/// Fetches `GET {base_url}/get_file_content?file=<document_id>` and takes the
/// body as the document's text.
#[derive(Clone)]
pub struct HttpTextSource {
    client: Client,
    base_url: Option<String>,
}

impl HttpTextSource {
    #[must_use]
    pub fn new(base_url: Option<String>) -> Self {
        Self {
            client: Client::new(),
            base_url,
        }
    }
}

#[async_trait]
impl TextSource for HttpTextSource {
    async fn fetch_text(&self, document_id: &str) -> Result<String, ProviderError> {
        let base = self.base_url.as_ref().ok_or(ProviderError::Disabled)?;
        let url = format!("{}/get_file_content", base.trim_end_matches('/'));

        let response = self
            .client
            .get(url)
            .query(&[("file", document_id)])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ProviderError::HttpStatus(response.status()));
        }
        Ok(response.text().await?)
    }
}
