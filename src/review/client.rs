use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use reqwest::Client;
use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use serde::Deserialize;
use serde_json::{Value, json};

/// One structured-output generation call.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub schema: Value,
    pub temperature: f32,
}

/// Something that can turn a prompt into model text.
///
/// `Ok(None)` means the call succeeded but produced no text.
#[allow(async_fn_in_trait)]
pub trait ReviewTransport {
    async fn generate(&self, api_key: &str, request: &GenerationRequest) -> Result<Option<String>>;
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
    text: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,

    #[serde(default)]
    status: Option<String>,
}

impl GenerateContentResponse {
    /// Text of the first candidate, `None` if it was filtered or empty.
    fn text(self) -> Option<String> {
        let text: String = self
            .candidates
            .into_iter()
            .next()?
            .content?
            .parts
            .into_iter()
            .filter_map(|part| part.text)
            .collect();

        (!text.is_empty()).then_some(text)
    }
}

/// The request body `generateContent` expects for JSON-constrained output.
pub fn request_body(request: &GenerationRequest) -> Value {
    json!({
        "contents": [
            { "role": "user", "parts": [{ "text": request.prompt }] }
        ],
        "generationConfig": {
            "responseMimeType": "application/json",
            "responseSchema": request.schema,
            "temperature": request.temperature
        }
    })
}

/// Turns a non-success response body into a readable message.
fn error_message(status: reqwest::StatusCode, body: &str) -> String {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => match envelope.error.status {
            Some(code) => format!("Gemini API returned {status} ({code}): {}", envelope.error.message),
            None => format!("Gemini API returned {status}: {}", envelope.error.message),
        },
        Err(_) => format!("Gemini API returned {status}: {}", body.trim()),
    }
}

/////*============== GEMINI CLIENT ==============*/
pub struct GeminiClient {
    client: Client,
    api_base: String,
    model: String,
}

impl GeminiClient {
    pub fn new(api_base: &str, model: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Could not build the HTTP client.")?;

        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            model: model.to_string(),
        })
    }

    pub fn endpoint(&self) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.api_base, self.model)
    }
}

impl ReviewTransport for GeminiClient {
    async fn generate(&self, api_key: &str, request: &GenerationRequest) -> Result<Option<String>> {
        let headers = HeaderMap::from_iter([
            (header::CONTENT_TYPE, HeaderValue::from_static("application/json")),
            (HeaderName::from_static("x-goog-api-key"),
                HeaderValue::from_str(api_key).context("API key contains characters that can't be sent")?),
        ]);

        log::debug!("[generate] POST {}", self.endpoint());
        let response = self.client
            .post(self.endpoint())
            .headers(headers)
            .json(&request_body(request))
            .send()
            .await
            .context("Could not reach the Gemini API")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!(error_message(status, &body)));
        }

        let parsed = response
            .json::<GenerateContentResponse>()
            .await
            .context("Couldn't deserialize the Gemini response.")?;

        Ok(parsed.text())
    }
}
