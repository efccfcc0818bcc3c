pub mod client;

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::models::{Problem, Review, SubmissionWithReview};
use crate::store::submissions::SubmissionLedger;

pub use client::{GeminiClient, GenerationRequest, ReviewTransport};

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_TEMPERATURE: f32 = 0.3;

// Substrings the Gemini API uses when a key is wrong, expired, or blocked.
static INVALID_KEY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)api[ _]key[ _]not[ _]valid|api_key_invalid|api key expired|api_key_service_blocked|are blocked|permission[ _]denied|unregistered callers")
        .expect("invalid key pattern does not compile")
});

/// Every way a review can fail. Each message tells the user what to do next.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum ReviewError {
    #[error("No Gemini API key is set. Add one with `key <api-key>` and submit again.")]
    MissingCredential,

    #[error("The review service returned an empty response, possibly because of safety filtering. Adjust your code and submit again.")]
    EmptyResponse,

    #[error("Your Gemini API key is invalid or has been blocked. Update it with `key <api-key>` and submit again.")]
    InvalidCredential,

    #[error("Could not get a review from the Gemini API ({0}). Check your connection and submit again.")]
    TransportOrParseFailure(String),
}

/// What the reviewer needs to know about a submission.
#[derive(Debug, Clone, Copy)]
pub struct ReviewRequest<'a> {
    pub problem_title: &'a str,
    pub problem_description: &'a str,
    pub code: &'a str,
}

impl<'a> ReviewRequest<'a> {
    pub fn new(problem: &'a Problem, code: &'a str) -> Self {
        Self {
            problem_title: &problem.title,
            problem_description: &problem.description,
            code,
        }
    }
}

/// Supplies the API key for a review, asking the user for one if necessary.
#[allow(async_fn_in_trait)]
pub trait CredentialProvider {
    async fn credential(&mut self) -> Option<String>;
}

/// The review exactly as the model returns it, before range checks.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReviewPayload {
    score: i64,
    feedback: String,
    strengths: Vec<String>,
    areas_for_improvement: Vec<String>,
}

impl TryFrom<ReviewPayload> for Review {
    type Error = ReviewError;

    fn try_from(payload: ReviewPayload) -> Result<Self, ReviewError> {
        let score = u8::try_from(payload.score)
            .ok()
            .filter(|score| *score <= 100)
            .ok_or_else(|| ReviewError::TransportOrParseFailure(
                format!("score {} is outside 0-100", payload.score)))?;

        Ok(Review {
            score,
            feedback: payload.feedback,
            strengths: payload.strengths,
            areas_for_improvement: payload.areas_for_improvement,
        })
    }
}

/// The JSON schema the model's answer is constrained to.
pub fn review_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "score": {
                "type": "INTEGER",
                "description": "A score from 0 to 100 representing the quality of the Go code."
            },
            "feedback": {
                "type": "STRING",
                "description": "A concise, one-paragraph summary of the overall assessment of the code."
            },
            "strengths": {
                "type": "ARRAY",
                "items": { "type": "STRING" },
                "description": "Specific positive points and what the code does well."
            },
            "areasForImprovement": {
                "type": "ARRAY",
                "items": { "type": "STRING" },
                "description": "Specific, actionable areas for improvement."
            }
        },
        "required": ["score", "feedback", "strengths", "areasForImprovement"]
    })
}

pub fn build_prompt(request: &ReviewRequest<'_>) -> String {
    format!(
r#"You are an expert Senior/Staff Backend Engineer at a top tech company, specializing in Go (Golang). You are conducting a machine coding interview.

Review the following Go code submission for the problem titled "{title}".

Problem Description:
---
{description}
---

Candidate's Code Submission:
---
```go
{code}
```
---

Provide a detailed and constructive review covering:
1. **Correctness & Completeness:** Does the code solve the problem as described? Are there bugs or logical errors? Are edge cases handled?
2. **Concurrency:** (If applicable) Is concurrency handled correctly and safely? Are goroutines, channels, and synchronization primitives used idiomatically and free of race conditions?
3. **Code Structure & Design:** Is the code well organized? Are structs, interfaces, and packages used appropriately?
4. **Idiomatic Go:** Does the code follow standard Go conventions (gofmt style, error handling, naming, exported identifiers)?
5. **Efficiency & Performance:** Are there obvious bottlenecks? Are the algorithms and data structures a good fit?
6. **Readability & Maintainability:** Is the code clean, commented where necessary, and easy to follow?

Respond with the review as structured JSON."#,
        title = request.problem_title,
        description = request.problem_description,
        code = request.code,
    )
}

/// Parses and validates the model's answer text.
pub fn parse_review(text: &str) -> Result<Review, ReviewError> {
    let text = strip_code_fence(text.trim());
    let payload: ReviewPayload = serde_json::from_str(text)
        .map_err(|err| ReviewError::TransportOrParseFailure(format!("malformed review: {err}")))?;

    Review::try_from(payload)
}

/// Unwraps a ```json ... ``` block if the model added one anyway.
fn strip_code_fence(text: &str) -> &str {
    let Some(inner) = text.strip_prefix("```") else { return text };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}

/// Maps a transport failure onto the user-facing taxonomy.
pub fn classify_transport_error(err: &anyhow::Error) -> ReviewError {
    let message = format!("{err:#}");
    if INVALID_KEY_PATTERN.is_match(&message) {
        ReviewError::InvalidCredential
    } else {
        ReviewError::TransportOrParseFailure(message)
    }
}

/////*============== REVIEW CLIENT ==============*/
pub struct ReviewClient<T> {
    transport: T,
    temperature: f32,
}

impl<T: ReviewTransport> ReviewClient<T> {
    pub fn new(transport: T, temperature: f32) -> Self {
        Self { transport, temperature }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Requests a review. A missing or blank key fails before any network call.
    pub async fn review(&self, request: &ReviewRequest<'_>, api_key: Option<&str>) -> Result<Review, ReviewError> {
        let api_key = api_key
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or(ReviewError::MissingCredential)?;

        let generation = GenerationRequest {
            prompt: build_prompt(request),
            schema: review_schema(),
            temperature: self.temperature,
        };

        log::info!("[review] Requesting review for \"{}\"", request.problem_title);
        let text = match self.transport.generate(api_key, &generation).await {
            Ok(Some(text)) if !text.trim().is_empty() => text,
            Ok(_) => {
                log::error!("[review] Empty response for \"{}\"", request.problem_title);
                return Err(ReviewError::EmptyResponse);
            }
            Err(err) => {
                log::error!("[review] Transport error: {err:#}");
                return Err(classify_transport_error(&err));
            }
        };

        parse_review(&text).inspect_err(|err| log::error!("[review] {err}"))
    }
}

/// Reviews `code` and records it in the ledger. Nothing is recorded on failure.
pub async fn review_and_record<T, C>(
    client: &ReviewClient<T>,
    ledger: &SubmissionLedger,
    credentials: &mut C,
    problem: &Problem,
    code: &str,
) -> Result<SubmissionWithReview, ReviewError>
where
    T: ReviewTransport,
    C: CredentialProvider,
{
    let api_key = credentials.credential().await;
    let review = client
        .review(&ReviewRequest::new(problem, code), api_key.as_deref())
        .await?;

    Ok(ledger.append(&problem.id, code, review))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::catalog;
    use crate::store::tests::temp_store;
    use anyhow::anyhow;
    use std::sync::Mutex;

    /// Hands back a canned outcome and remembers every request.
    pub(crate) struct FakeTransport {
        outcome: Box<dyn Fn() -> anyhow::Result<Option<String>> + Send + Sync>,
        pub(crate) calls: Mutex<Vec<(String, GenerationRequest)>>,
    }

    impl FakeTransport {
        pub(crate) fn new(outcome: impl Fn() -> anyhow::Result<Option<String>> + Send + Sync + 'static) -> Self {
            Self { outcome: Box::new(outcome), calls: Mutex::new(Vec::new()) }
        }

        pub(crate) fn replying(text: &str) -> Self {
            let text = text.to_string();
            Self::new(move || Ok(Some(text.clone())))
        }

        pub(crate) fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    impl ReviewTransport for FakeTransport {
        async fn generate(&self, api_key: &str, request: &GenerationRequest) -> anyhow::Result<Option<String>> {
            self.calls.lock().unwrap().push((api_key.to_string(), request.clone()));
            (self.outcome)()
        }
    }

    pub(crate) struct FixedKey(pub(crate) Option<String>);

    impl CredentialProvider for FixedKey {
        async fn credential(&mut self) -> Option<String> {
            self.0.clone()
        }
    }

    const GOOD_REVIEW: &str = r#"{"score": 82, "feedback": "Clean and mostly correct.", "strengths": ["a"], "areasForImprovement": ["b"]}"#;

    fn request() -> ReviewRequest<'static> {
        ReviewRequest::new(catalog::problem("in-memory-kv").unwrap(), "package main\n\nfunc main() {}")
    }

    #[tokio::test]
    async fn missing_key_fails_without_calling_out() {
        let client = ReviewClient::new(FakeTransport::replying(GOOD_REVIEW), DEFAULT_TEMPERATURE);

        assert_eq!(client.review(&request(), None).await, Err(ReviewError::MissingCredential));
        assert_eq!(client.review(&request(), Some("  ")).await, Err(ReviewError::MissingCredential));
        assert_eq!(client.transport().call_count(), 0);
    }

    #[tokio::test]
    async fn good_response_becomes_a_review() {
        let client = ReviewClient::new(FakeTransport::replying(GOOD_REVIEW), DEFAULT_TEMPERATURE);
        let review = client.review(&request(), Some(" key-123 ")).await.unwrap();

        assert_eq!(review.score, 82);
        assert_eq!(review.strengths, vec!["a"]);
        assert_eq!(review.areas_for_improvement, vec!["b"]);

        let calls = client.transport().calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "key-123");
        assert!(calls[0].1.prompt.contains("In-Memory Key-Value Store"));
        assert!(calls[0].1.prompt.contains("func main() {}"));
        assert_eq!(calls[0].1.schema, review_schema());
    }

    #[tokio::test]
    async fn empty_text_is_its_own_failure() {
        for outcome in [None, Some("   ".to_string())] {
            let client = ReviewClient::new(FakeTransport::new(move || Ok(outcome.clone())), DEFAULT_TEMPERATURE);
            assert_eq!(client.review(&request(), Some("k")).await, Err(ReviewError::EmptyResponse));
        }
    }

    #[tokio::test]
    async fn rejected_key_is_reported_as_invalid_credential() {
        let transport = FakeTransport::new(|| {
            Err(anyhow!("Gemini API returned 400 Bad Request: API key not valid. Please pass a valid API key."))
        });
        let client = ReviewClient::new(transport, DEFAULT_TEMPERATURE);
        assert_eq!(client.review(&request(), Some("nope")).await, Err(ReviewError::InvalidCredential));
    }

    #[tokio::test]
    async fn other_transport_errors_are_generic() {
        let client = ReviewClient::new(FakeTransport::new(|| Err(anyhow!("connection reset by peer"))), DEFAULT_TEMPERATURE);
        match client.review(&request(), Some("k")).await {
            Err(ReviewError::TransportOrParseFailure(detail)) => assert!(detail.contains("connection reset")),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn classification_recognizes_known_key_errors() {
        for message in [
            "API key not valid. Please pass a valid API key.",
            "reason: API_KEY_INVALID",
            "API key expired. Please renew the API key.",
            "Requests from this client application are blocked.",
            "PERMISSION_DENIED: Permission denied: Consumer has been suspended",
        ] {
            assert_eq!(classify_transport_error(&anyhow!(message.to_string())), ReviewError::InvalidCredential, "{message}");
        }
        assert!(matches!(
            classify_transport_error(&anyhow!("503 Service Unavailable")),
            ReviewError::TransportOrParseFailure(_)
        ));
    }

    #[test]
    fn parse_rejects_out_of_range_and_incomplete_payloads() {
        for text in [
            r#"{"score": 101, "feedback": "f", "strengths": [], "areasForImprovement": []}"#,
            r#"{"score": -1, "feedback": "f", "strengths": [], "areasForImprovement": []}"#,
            r#"{"score": 80.5, "feedback": "f", "strengths": [], "areasForImprovement": []}"#,
            r#"{"score": 80, "strengths": [], "areasForImprovement": []}"#,
            r#"{"score": 80, "feedback": "f", "strengths": "a", "areasForImprovement": []}"#,
            "not json at all",
        ] {
            assert!(matches!(parse_review(text), Err(ReviewError::TransportOrParseFailure(_))), "{text}");
        }
    }

    #[test]
    fn parse_accepts_boundaries_and_fenced_json() {
        let zero = r#"{"score": 0, "feedback": "f", "strengths": [], "areasForImprovement": []}"#;
        assert_eq!(parse_review(zero).unwrap().score, 0);

        let fenced = format!("```json\n{GOOD_REVIEW}\n```");
        assert_eq!(parse_review(&fenced).unwrap().score, 82);
    }

    #[test]
    fn prompt_asks_for_all_six_dimensions() {
        let prompt = build_prompt(&request());
        for dimension in [
            "Correctness & Completeness",
            "Concurrency",
            "Code Structure & Design",
            "Idiomatic Go",
            "Efficiency & Performance",
            "Readability & Maintainability",
        ] {
            assert!(prompt.contains(dimension), "{dimension}");
        }
    }

    #[test]
    fn schema_requires_every_field() {
        let schema = review_schema();
        let required: Vec<_> = schema["required"].as_array().unwrap().iter().filter_map(Value::as_str).collect();
        assert_eq!(required, vec!["score", "feedback", "strengths", "areasForImprovement"]);
        assert_eq!(schema["properties"]["score"]["type"], "INTEGER");
    }

    #[tokio::test]
    async fn failed_review_records_nothing() {
        let (store, _dir) = temp_store();
        let ledger = SubmissionLedger::new(&store);
        let problem = catalog::problem("worker-pool").unwrap();
        let client = ReviewClient::new(FakeTransport::new(|| Err(anyhow!("API_KEY_INVALID"))), DEFAULT_TEMPERATURE);

        let result = review_and_record(&client, &ledger, &mut FixedKey(Some("bad".into())), problem, "code").await;
        assert_eq!(result, Err(ReviewError::InvalidCredential));
        assert!(ledger.list(&problem.id).is_empty());

        let result = review_and_record(&client, &ledger, &mut FixedKey(None), problem, "code").await;
        assert_eq!(result, Err(ReviewError::MissingCredential));
        assert_eq!(client.transport().call_count(), 1);
    }

    #[tokio::test]
    async fn successful_review_is_recorded() {
        let (store, _dir) = temp_store();
        let ledger = SubmissionLedger::new(&store);
        let problem = catalog::problem("worker-pool").unwrap();
        let client = ReviewClient::new(FakeTransport::replying(GOOD_REVIEW), DEFAULT_TEMPERATURE);

        let recorded = review_and_record(&client, &ledger, &mut FixedKey(Some("k".into())), problem, "my code")
            .await
            .unwrap();

        assert_eq!(recorded.submission.code, "my code");
        assert_eq!(ledger.list(&problem.id), vec![recorded]);
    }
}
