//! Mock data generation through the Gemini `generateContent` API.

use async_trait::async_trait;
use displaydoc::Display;
use reqwest::Client;
use serde::Deserialize;
use serde::Serialize;
use subgraph_validator::Generator;
use subgraph_validator::error::BoxError;
use thiserror::Error;
use url::Url;

use crate::configuration::GeneratorConfig;

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Errors raised by the generation service.
#[derive(Debug, Error, Display)]
#[non_exhaustive]
pub enum GeneratorError {
    /// invalid generator endpoint: {0}
    InvalidEndpoint(url::ParseError),
    /// could not build the generator client: {0}
    Client(reqwest::Error),
    /// the generator response has no text
    EmptyResponse,
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct GenerateContentResponse {
    candidates: Vec<Candidate>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CandidateContent {
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ResponsePart {
    text: Option<String>,
}

impl GenerateContentResponse {
    /// Text of the first candidate, parts concatenated.
    fn into_text(self) -> Option<String> {
        let candidate = self.candidates.into_iter().next()?;
        let text: String = candidate
            .content
            .parts
            .into_iter()
            .filter_map(|part| part.text)
            .collect();
        (!text.is_empty()).then_some(text)
    }
}

/// Generates text with a Gemini model.
#[derive(Debug, Clone)]
pub struct GeminiGenerator {
    client: Client,
    url: Url,
    api_key: String,
}

impl GeminiGenerator {
    pub fn new(config: &GeneratorConfig, api_key: String) -> Result<Self, GeneratorError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(GeneratorError::Client)?;
        let url = config
            .endpoint
            .join(&format!("v1beta/models/{}:generateContent", config.model))
            .map_err(GeneratorError::InvalidEndpoint)?;
        Ok(Self {
            client,
            url,
            api_key,
        })
    }
}

#[async_trait]
impl Generator for GeminiGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, BoxError> {
        let request = GenerateContentRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![RequestPart { text: prompt }],
            }],
        };
        tracing::debug!(url = %self.url, "requesting generated content");
        let response: GenerateContentResponse = self
            .client
            .post(self.url.clone())
            .header(API_KEY_HEADER, &self.api_key)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        response
            .into_text()
            .ok_or_else(|| GeneratorError::EmptyResponse.into())
    }
}
