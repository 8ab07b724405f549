use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, thiserror::Error)]
pub enum TutorClientError {
    #[error("Tutor backend timed out")]
    Timeout,
    #[error("Tutor backend returned HTTP {0}")]
    Status(u16),
    #[error("Tutor backend request failed: {0}")]
    Network(String),
    #[error("Tutor backend returned no answer")]
    EmptyAnswer,
}

/// A web source the model grounded its answer on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroundingSource {
    pub title: String,
    pub uri: String,
}

/// A generated answer plus the sources it cites.
#[derive(Debug, Clone)]
pub struct TutorAnswer {
    pub text: String,
    pub sources: Vec<GroundingSource>,
}

/// One question as sent to the model: the typed text, an optional photo of
/// the exercise, and the per-user system instructions.
#[derive(Debug, Clone)]
pub struct TutorPrompt {
    pub system_instructions: String,
    pub question: String,
    pub image: Option<ImageAttachment>,
}

#[derive(Debug, Clone)]
pub struct ImageAttachment {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait TutorClient: Send + Sync {
    async fn generate_answer(&self, prompt: &TutorPrompt) -> Result<TutorAnswer, TutorClientError>;
}

// Wire format for the Gemini generateContent endpoint.

#[derive(Serialize)]
struct GenerateRequest {
    #[serde(rename = "systemInstruction")]
    system_instruction: Content,
    contents: Vec<Content>,
    tools: Vec<Tool>,
}

#[derive(Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Serialize)]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(rename = "inlineData", skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

#[derive(Serialize)]
struct InlineData {
    #[serde(rename = "mimeType")]
    mime_type: String,
    data: String,
}

#[derive(Serialize)]
struct Tool {
    #[serde(rename = "googleSearch")]
    google_search: serde_json::Value,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<ResponseContent>,
    #[serde(rename = "groundingMetadata", default)]
    grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct GroundingMetadata {
    #[serde(rename = "groundingChunks", default)]
    grounding_chunks: Vec<GroundingChunk>,
}

#[derive(Deserialize)]
struct GroundingChunk {
    #[serde(default)]
    web: Option<WebSource>,
}

#[derive(Deserialize)]
struct WebSource {
    #[serde(default)]
    uri: Option<String>,
    #[serde(default)]
    title: Option<String>,
}

/// Gemini-backed implementation with web search grounding enabled.
pub struct GeminiClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl GeminiClient {
    pub fn new(
        base_url: String,
        api_key: String,
        model: String,
        timeout_secs: u64,
    ) -> Result<Self, anyhow::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model,
        })
    }
}

#[async_trait]
impl TutorClient for GeminiClient {
    async fn generate_answer(&self, prompt: &TutorPrompt) -> Result<TutorAnswer, TutorClientError> {
        let mut parts = vec![Part {
            text: Some(prompt.question.clone()),
            inline_data: None,
        }];
        if let Some(ref image) = prompt.image {
            parts.push(Part {
                text: None,
                inline_data: Some(InlineData {
                    mime_type: image.mime_type.clone(),
                    data: base64::engine::general_purpose::STANDARD.encode(&image.bytes),
                }),
            });
        }

        let body = GenerateRequest {
            system_instruction: Content {
                parts: vec![Part {
                    text: Some(prompt.system_instructions.clone()),
                    inline_data: None,
                }],
            },
            contents: vec![Content { parts }],
            tools: vec![Tool {
                google_search: serde_json::json!({}),
            }],
        };

        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );
        debug!(model = %self.model, has_image = prompt.image.is_some(), "calling tutor backend");

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TutorClientError::Timeout
                } else {
                    TutorClientError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "tutor backend returned an error");
            return Err(TutorClientError::Status(status.as_u16()));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| TutorClientError::Network(e.to_string()))?;

        let candidate = parsed
            .candidates
            .into_iter()
            .next()
            .ok_or(TutorClientError::EmptyAnswer)?;

        let text = candidate
            .content
            .map(|c| {
                c.parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();
        if text.trim().is_empty() {
            return Err(TutorClientError::EmptyAnswer);
        }

        let sources = candidate
            .grounding_metadata
            .map(|m| {
                m.grounding_chunks
                    .into_iter()
                    .filter_map(|chunk| chunk.web)
                    .filter_map(|web| {
                        web.uri.map(|uri| GroundingSource {
                            title: web.title.unwrap_or_else(|| uri.clone()),
                            uri,
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(TutorAnswer { text, sources })
    }
}
