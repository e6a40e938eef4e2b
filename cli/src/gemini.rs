use anyhow::{Context, Result, bail};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use nutritrack_core::ai::{AiError, Generated, GenerationRequest};

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Client for the Gemini `generateContent` endpoint.
pub struct GeminiClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
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

impl GeminiClient {
    pub fn new(api_key: String, model: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(format!(
                "nutritrack/{} (meal tracker)",
                env!("CARGO_PKG_VERSION")
            ))
            .timeout(std::time::Duration::from_secs(60))
            .connect_timeout(std::time::Duration::from_secs(5))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            api_key,
            model,
            base_url: API_BASE.to_string(),
        })
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Send the request and return the raw JSON text the model produced.
    pub async fn generate_text(&self, request: &GenerationRequest) -> Result<String> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        debug!(kind = ?request.kind, model = %self.model, "sending generation request");
        let resp = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request_body(request))
            .send()
            .await
            .context("Failed to reach Gemini API")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            bail!("Gemini API returned {status}: {body}");
        }

        let data: GenerateResponse = resp
            .json()
            .await
            .context("Failed to parse Gemini response")?;
        response_text(data)
    }

    /// Run a request end to end, collapsing every failure into its generic
    /// [`AiError`].
    pub async fn generate(&self, request: &GenerationRequest) -> Result<Generated, AiError> {
        request.complete(self.generate_text(request).await)
    }
}

fn request_body(request: &GenerationRequest) -> Value {
    json!({
        "contents": [{ "parts": [{ "text": request.prompt }] }],
        "generationConfig": {
            "responseMimeType": "application/json",
            "responseSchema": request.schema,
            "temperature": request.temperature,
        }
    })
}

fn response_text(data: GenerateResponse) -> Result<String> {
    let text: String = data
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|p| p.text)
                .collect()
        })
        .unwrap_or_default();
    if text.trim().is_empty() {
        bail!("Gemini response contained no text");
    }
    Ok(text)
}
