//! Text generation through the Gemini `generateContent` API.

use crate::config::AiConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum AiError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Gemini API returned {status}: {body}")]
    Api {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("Gemini API returned no text")]
    EmptyResponse,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    system_instruction: Content<'a>,
    contents: Vec<Content<'a>>,
}

#[derive(Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Deserialize, Debug, Default)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize, Debug)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize, Debug)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize, Debug)]
struct CandidatePart {
    text: Option<String>,
}

impl GenerateResponse {
    /// Joins the text parts of the first candidate.
    fn into_text(self) -> Option<String> {
        let content = self.candidates.into_iter().next()?.content?;
        let text: String = content.parts.into_iter().filter_map(|p| p.text).collect();
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

/// The system instruction is sent exactly as resolved, even when it is only whitespace.
fn build_request<'a>(system_instruction: &'a str, prompt: &'a str) -> GenerateRequest<'a> {
    GenerateRequest {
        system_instruction: Content {
            role: None,
            parts: vec![Part {
                text: system_instruction,
            }],
        },
        contents: vec![Content {
            role: Some("user"),
            parts: vec![Part { text: prompt }],
        }],
    }
}

#[derive(Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl GeminiClient {
    pub fn new(config: &AiConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: format!(
                "{}/models/{}:generateContent",
                config.api_url.trim_end_matches('/'),
                config.model
            ),
            api_key: config.api_key.clone(),
        }
    }

    /// Generates a reply to `prompt`, steered by `system_instruction`.
    pub async fn generate(
        &self,
        system_instruction: &str,
        prompt: &str,
    ) -> Result<String, AiError> {
        let response = self
            .http
            .post(&self.endpoint)
            .query(&[("key", self.api_key.as_str())])
            .timeout(REQUEST_TIMEOUT)
            .json(&build_request(system_instruction, prompt))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AiError::Api { status, body });
        }

        let response: GenerateResponse = response.json().await?;
        tracing::debug!("Gemini returned {} candidates", response.candidates.len());
        response.into_text().ok_or(AiError::EmptyResponse)
    }
}
