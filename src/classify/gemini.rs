//! Gemini `generateContent` classifier.
//!
//! One request per frame: the fixed instruction text plus the frame as an
//! inline base64 JPEG. The reply text is handed to `reply::parse_reply`.

use anyhow::{anyhow, Context, Result};
use base64::Engine;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use super::backend::Classifier;
use super::reply::{parse_reply, CLASSIFICATION_PROMPT};
use super::result::ClassificationResult;
use crate::error::{PipelineError, StageResult};
use crate::frame::{Frame, DEFAULT_JPEG_QUALITY};

pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";

/// Error bodies are truncated to this many characters in messages.
const MAX_ERROR_BODY_CHARS: usize = 300;

#[derive(Clone, Debug)]
pub struct GeminiConfig {
    pub endpoint: String,
    pub model: String,
    pub api_key: String,
    pub timeout: Duration,
    /// JPEG quality of the frame sent to the model.
    pub jpeg_quality: u8,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key: String::new(),
            timeout: Duration::from_secs(30),
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

pub struct GeminiClassifier {
    agent: ureq::Agent,
    url: String,
    api_key: String,
    jpeg_quality: u8,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default, rename = "promptFeedback")]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
    #[serde(default, rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PromptFeedback {
    #[serde(rename = "blockReason")]
    block_reason: Option<String>,
}

impl GeminiClassifier {
    pub fn new(config: GeminiConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(anyhow!("gemini api key is empty"));
        }
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            config.endpoint.trim_end_matches('/'),
            config.model
        );
        let agent = ureq::AgentBuilder::new().timeout(config.timeout).build();
        Ok(Self {
            agent,
            url,
            api_key: config.api_key,
            jpeg_quality: config.jpeg_quality,
        })
    }

    fn request_reply(&self, frame: &Frame) -> Result<String> {
        let jpeg = frame.to_jpeg(self.jpeg_quality)?;
        let body = request_body(&jpeg);
        let response = match self
            .agent
            .post(&self.url)
            .set("x-goog-api-key", &self.api_key)
            .send_json(body)
        {
            Ok(response) => response,
            Err(ureq::Error::Status(code, response)) => {
                let detail = response.into_string().unwrap_or_default();
                return Err(anyhow!(
                    "model returned http status {}: {}",
                    code,
                    truncate(&detail, MAX_ERROR_BODY_CHARS)
                ));
            }
            Err(e) => return Err(anyhow::Error::new(e).context("model unreachable")),
        };
        let parsed: GenerateContentResponse =
            response.into_json().context("decode model response")?;
        reply_text(parsed)
    }
}

impl Classifier for GeminiClassifier {
    fn name(&self) -> &'static str {
        "gemini"
    }

    fn classify(&mut self, frame: &Frame) -> StageResult<ClassificationResult> {
        self.request_reply(frame)
            .and_then(|text| {
                log::debug!("model reply: {}", truncate(&text, MAX_ERROR_BODY_CHARS));
                parse_reply(&text)
            })
            .map_err(PipelineError::Classification)
    }
}

fn request_body(jpeg: &[u8]) -> serde_json::Value {
    let encoded = base64::engine::general_purpose::STANDARD.encode(jpeg);
    json!({
        "contents": [{
            "role": "user",
            "parts": [
                { "text": CLASSIFICATION_PROMPT },
                { "inline_data": { "mime_type": "image/jpeg", "data": encoded } }
            ]
        }],
        "generationConfig": {
            "temperature": 0.0,
            "responseMimeType": "application/json"
        }
    })
}

/// Concatenate the text parts of the first candidate.
fn reply_text(response: GenerateContentResponse) -> Result<String> {
    if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(anyhow!("model blocked the request: {}", reason));
    }
    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("model returned no candidates"))?;
    let text: String = candidate
        .content
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|part| part.text)
                .collect()
        })
        .unwrap_or_default();
    if text.trim().is_empty() {
        return Err(anyhow!(
            "model returned no text (finish reason: {})",
            candidate.finish_reason.as_deref().unwrap_or("unknown")
        ));
    }
    Ok(text)
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
