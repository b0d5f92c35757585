//! Nightmare interpretation — text generation backends and the client that
//! turns any backend failure into a user-safe reply.
//!
//! Provides a `TextGenerator` trait with implementations for:
//! - **Gemini** — direct calls to the Gemini `generateContent` API (server side)
//! - **Remote** — calls the Monggle `/api/interpret` boundary (client side)
//!
//! `InterpretationClient` wraps either one. It validates input locally, calls
//! the backend exactly once and never returns an error to its caller.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::GenerationConfig;
use crate::prompt::{InterpretPrompt, CARE_LABEL, KEYWORDS_LABEL, MEANING_LABEL};
use crate::wire::{ErrorBody, InterpretRequest, InterpretResponse};

/// Reply shown for every failed interpretation.
pub const FALLBACK_TEXT: &str = "The connection isn't great right now. Tell me about it again a little later.";

/// Reply shown when the boundary answered successfully but with no text.
pub const NO_RESULT_TEXT: &str = "There is no interpretation for this one.";

/// Gemini reads the API key from this header.
const API_KEY_HEADER: &str = "x-goog-api-key";

// ============================================================================
// TextGenerator trait
// ============================================================================

/// Abstraction over whatever produces interpretation text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &InterpretPrompt) -> Result<String, InterpretError>;

    /// Backend name for logging.
    fn name(&self) -> &str;
}

// ============================================================================
// Error types
// ============================================================================

#[derive(Error, Debug)]
pub enum InterpretError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("Missing API key")]
    MissingApiKey,
}

// ============================================================================
// Gemini API structs (private)
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<GeminiContent<'a>>,
    system_instruction: GeminiContent<'a>,
    generation_config: GenerationParams,
}

#[derive(Debug, Serialize)]
struct GeminiContent<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Debug, Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct GenerationParams {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorResponse {
    error: Option<GeminiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    code: u16,
    message: String,
}

// ============================================================================
// GeminiGenerator
// ============================================================================

/// Calls Gemini `generateContent` with the interpretation prompt.
#[derive(Clone)]
pub struct GeminiGenerator {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiGenerator {
    pub fn new(api_key: String, config: &GenerationConfig) -> Result<Self, InterpretError> {
        if api_key.trim().is_empty() {
            return Err(InterpretError::MissingApiKey);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            api_key,
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl TextGenerator for GeminiGenerator {
    async fn generate(&self, prompt: &InterpretPrompt) -> Result<String, InterpretError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);

        let request = GenerateRequest {
            contents: vec![GeminiContent {
                role: Some("user"),
                parts: vec![GeminiPart {
                    text: &prompt.contents,
                }],
            }],
            system_instruction: GeminiContent {
                role: None,
                parts: vec![GeminiPart {
                    text: prompt.system_instruction,
                }],
            },
            generation_config: GenerationParams {
                temperature: prompt.temperature,
            },
        };

        // Key goes in a header so it never shows up in a logged request URL.
        let response = self
            .client
            .post(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            let error_detail = serde_json::from_str::<GeminiErrorResponse>(&error_body)
                .ok()
                .and_then(|e| e.error);

            let (code, message) = error_detail
                .map(|e| (e.code, e.message))
                .unwrap_or((status.as_u16(), error_body));

            tracing::error!(code = code, message = %message, "Gemini API error");

            return Err(InterpretError::Api { code, message });
        }

        let body: GenerateResponse = response.json().await?;

        // No candidate is a successful empty reply; callers decide how to show it.
        let text: String = body
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        Ok(text)
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

// ============================================================================
// RemoteInterpreter
// ============================================================================

/// Calls the Monggle HTTP boundary; the server rebuilds the prompt from the
/// user's text so the provider credential never leaves it.
#[derive(Debug, Clone)]
pub struct RemoteInterpreter {
    client: Client,
    endpoint: String,
}

impl RemoteInterpreter {
    pub fn new(server_url: &str, timeout: Duration) -> Result<Self, InterpretError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/api/interpret", server_url.trim_end_matches('/')),
        })
    }
}

#[async_trait]
impl TextGenerator for RemoteInterpreter {
    async fn generate(&self, prompt: &InterpretPrompt) -> Result<String, InterpretError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&InterpretRequest::new(prompt.user_text.clone()))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&error_body)
                .map(|e| e.error)
                .unwrap_or(error_body);
            return Err(InterpretError::Api {
                code: status.as_u16(),
                message,
            });
        }

        let body: InterpretResponse = response.json().await?;
        Ok(body.text.unwrap_or_default())
    }

    fn name(&self) -> &str {
        "remote"
    }
}

// ============================================================================
// InterpretationClient
// ============================================================================

/// What an interpretation attempt produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterpretOutcome {
    /// The backend's reply, unmodified.
    Interpreted(String),
    /// Empty input; nothing was sent.
    Rejected,
    /// The backend failed; `text` is the fixed fallback reply.
    Fallback { text: String, reason: String },
}

impl InterpretOutcome {
    /// Text to display, `None` when the input was rejected.
    pub fn text(&self) -> Option<&str> {
        match self {
            InterpretOutcome::Interpreted(text) | InterpretOutcome::Fallback { text, .. } => {
                Some(text.as_str())
            }
            InterpretOutcome::Rejected => None,
        }
    }

    pub fn into_text(self) -> Option<String> {
        match self {
            InterpretOutcome::Interpreted(text) | InterpretOutcome::Fallback { text, .. } => Some(text),
            InterpretOutcome::Rejected => None,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, InterpretOutcome::Fallback { .. })
    }
}

#[derive(Clone)]
pub struct InterpretationClient {
    generator: Arc<dyn TextGenerator>,
    temperature: f32,
}

impl InterpretationClient {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            generator,
            temperature: crate::prompt::DEFAULT_TEMPERATURE,
        }
    }

    pub fn from_generator<G: TextGenerator + 'static>(generator: G) -> Self {
        Self::new(Arc::new(generator))
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub async fn interpret(&self, text: &str) -> InterpretOutcome {
        if text.trim().is_empty() {
            tracing::debug!("Rejecting empty interpretation request");
            return InterpretOutcome::Rejected;
        }

        let prompt = InterpretPrompt::new(text).with_temperature(self.temperature);

        match self.generator.generate(&prompt).await {
            Ok(reply) if reply.trim().is_empty() => {
                InterpretOutcome::Interpreted(NO_RESULT_TEXT.to_string())
            }
            Ok(reply) => InterpretOutcome::Interpreted(reply),
            Err(e) => {
                tracing::warn!(
                    backend = self.generator.name(),
                    error = %e,
                    "Interpretation failed, replying with fallback text"
                );
                InterpretOutcome::Fallback {
                    text: FALLBACK_TEXT.to_string(),
                    reason: e.to_string(),
                }
            }
        }
    }
}

// ============================================================================
// Reply sections
// ============================================================================

/// Best-effort split of a reply into its labelled sections, for display.
/// Replies are accepted whether or not they follow the format.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InterpretationSections {
    pub meaning: Option<String>,
    pub keywords: Vec<String>,
    pub care: Option<String>,
}

impl InterpretationSections {
    pub fn parse(reply: &str) -> Self {
        let keyword_text = section(reply, KEYWORDS_LABEL).unwrap_or_else(|| reply.to_string());
        let keywords = match Regex::new(r"#([^\s#]+)") {
            Ok(re) => re
                .captures_iter(&keyword_text)
                .map(|c| c[1].to_string())
                .collect(),
            Err(_) => Vec::new(),
        };

        Self {
            meaning: section(reply, MEANING_LABEL),
            keywords,
            care: section(reply, CARE_LABEL),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.meaning.is_some() && !self.keywords.is_empty() && self.care.is_some()
    }
}

/// Text after `label` up to the next known label, trimmed.
fn section(reply: &str, label: &str) -> Option<String> {
    let start = reply.find(label)? + label.len();
    let rest = &reply[start..];
    let end = [MEANING_LABEL, KEYWORDS_LABEL, CARE_LABEL]
        .iter()
        .filter_map(|l| rest.find(l))
        .min()
        .unwrap_or(rest.len());
    let body = rest[..end].trim();
    (!body.is_empty()).then(|| body.to_string())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use wiremock::matchers::{body_partial_json, header, method, path, query_param_is_missing};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const REPLY: &str = "[Dream Meaning]\nFalling often mirrors a loss of control.\n\n\
[Psychological Keywords]\n#anxiety #control #transition\n\n\
[Monggle's Care Note]\nYou are on solid ground tonight.";

    struct CountingGenerator {
        calls: AtomicUsize,
        reply: Result<String, ()>,
    }

    impl CountingGenerator {
        fn ok(reply: &str) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                reply: Ok(reply.to_string()),
            }
        }

        fn failing() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                reply: Err(()),
            }
        }
    }

    #[async_trait]
    impl TextGenerator for CountingGenerator {
        async fn generate(&self, _prompt: &InterpretPrompt) -> Result<String, InterpretError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.reply {
                Ok(text) => Ok(text.clone()),
                Err(()) => Err(InterpretError::Api {
                    code: 503,
                    message: "unavailable".to_string(),
                }),
            }
        }

        fn name(&self) -> &str {
            "counting"
        }
    }

    fn generation_config(base_url: String) -> GenerationConfig {
        GenerationConfig {
            model: "gemini-test".to_string(),
            temperature: 0.7,
            base_url,
            timeout_seconds: 5,
        }
    }

    #[tokio::test]
    async fn test_empty_input_never_calls_backend() {
        let generator = Arc::new(CountingGenerator::ok(REPLY));
        let client = InterpretationClient::new(generator.clone());

        assert_eq!(client.interpret("").await, InterpretOutcome::Rejected);
        assert_eq!(client.interpret("   \n").await, InterpretOutcome::Rejected);
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_success_returns_reply_unmodified_after_one_call() {
        let generator = Arc::new(CountingGenerator::ok("no sections at all"));
        let client = InterpretationClient::new(generator.clone());

        let outcome = client.interpret("I was falling").await;

        assert_eq!(outcome, InterpretOutcome::Interpreted("no sections at all".to_string()));
        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_backend_error_becomes_fallback_text() {
        let generator = Arc::new(CountingGenerator::failing());
        let client = InterpretationClient::new(generator.clone());

        let outcome = client.interpret("I was falling").await;

        assert!(outcome.is_fallback());
        assert_eq!(outcome.text(), Some(FALLBACK_TEXT));
        assert_eq!(generator.calls.load(Ordering::SeqCst), 1, "no retries");
    }

    #[tokio::test]
    async fn test_blank_reply_maps_to_no_result_text() {
        let client = InterpretationClient::from_generator(CountingGenerator::ok("  "));
        let outcome = client.interpret("teeth falling out").await;
        assert_eq!(outcome.into_text().as_deref(), Some(NO_RESULT_TEXT));
    }

    #[tokio::test]
    async fn test_gemini_generate_sends_prompt_and_reads_parts() {
        let mock_server = MockServer::start().await;
        let generator =
            GeminiGenerator::new("test-api-key".to_string(), &generation_config(mock_server.uri()))
                .expect("Failed to create generator");

        Mock::given(method("POST"))
            .and(path("/models/gemini-test:generateContent"))
            .and(header("x-goog-api-key", "test-api-key"))
            .and(query_param_is_missing("key"))
            .and(body_partial_json(serde_json::json!({
                "generationConfig": { "temperature": 0.7 },
                "systemInstruction": { "parts": [{ "text": crate::prompt::SYSTEM_INSTRUCTION }] }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": [{
                    "content": { "role": "model", "parts": [{ "text": "[Dream Meaning]\n" }, { "text": "rest" }] }
                }]
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let text = generator
            .generate(&InterpretPrompt::new("I was falling"))
            .await
            .expect("generate failed");

        assert_eq!(text, "[Dream Meaning]\nrest");
    }

    #[tokio::test]
    async fn test_gemini_error_body_is_surfaced() {
        let mock_server = MockServer::start().await;
        let generator =
            GeminiGenerator::new("k".to_string(), &generation_config(mock_server.uri())).unwrap();

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_json(serde_json::json!({
                "error": { "code": 429, "message": "Resource exhausted" }
            })))
            .mount(&mock_server)
            .await;

        match generator.generate(&InterpretPrompt::new("x")).await {
            Err(InterpretError::Api { code, message }) => {
                assert_eq!(code, 429);
                assert_eq!(message, "Resource exhausted");
            }
            other => panic!("Expected Api error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_gemini_without_candidates_is_empty_reply() {
        let mock_server = MockServer::start().await;
        let generator =
            GeminiGenerator::new("k".to_string(), &generation_config(mock_server.uri())).unwrap();

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "candidates": [] })))
            .mount(&mock_server)
            .await;

        let text = generator.generate(&InterpretPrompt::new("x")).await.unwrap();
        assert!(text.is_empty());

        let client = InterpretationClient::from_generator(generator);
        assert_eq!(
            client.interpret("x").await,
            InterpretOutcome::Interpreted(NO_RESULT_TEXT.to_string())
        );
    }

    #[tokio::test]
    async fn test_gemini_transport_error_does_not_leak_key() {
        let generator = GeminiGenerator::new(
            "secret-api-key".to_string(),
            &generation_config("http://127.0.0.1:9".to_string()),
        )
        .unwrap();

        let err = generator
            .generate(&InterpretPrompt::new("x"))
            .await
            .expect_err("nothing listens on port 9");
        assert!(matches!(err, InterpretError::Http(_)));
        assert!(!err.to_string().contains("secret-api-key"), "{err}");
    }

    #[test]
    fn test_gemini_requires_api_key() {
        let result = GeminiGenerator::new("  ".to_string(), &GenerationConfig::default());
        assert!(matches!(result, Err(InterpretError::MissingApiKey)));
    }

    #[tokio::test]
    async fn test_remote_interpreter_posts_user_text() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/interpret"))
            .and(body_partial_json(serde_json::json!({ "nightmareText": "I was falling" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "text": REPLY })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let remote = RemoteInterpreter::new(&mock_server.uri(), Duration::from_secs(5)).unwrap();
        let client = InterpretationClient::from_generator(remote);

        let outcome = client.interpret("I was falling").await;
        assert_eq!(outcome, InterpretOutcome::Interpreted(REPLY.to_string()));
    }

    #[tokio::test]
    async fn test_remote_500_degrades_to_fallback() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_json(serde_json::json!({
                "error": "Interpretation failed upstream"
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let remote = RemoteInterpreter::new(&mock_server.uri(), Duration::from_secs(5)).unwrap();
        let client = InterpretationClient::from_generator(remote);

        match client.interpret("I was falling").await {
            InterpretOutcome::Fallback { text, reason } => {
                assert_eq!(text, FALLBACK_TEXT);
                assert!(reason.contains("500"), "reason was {reason}");
            }
            other => panic!("Expected fallback, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unreachable_server_degrades_to_fallback() {
        // Port 9 (discard) is closed on test machines.
        let remote = RemoteInterpreter::new("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
        let client = InterpretationClient::from_generator(remote);

        let outcome = client.interpret("I was falling").await;
        assert_eq!(outcome.text(), Some(FALLBACK_TEXT));
    }

    #[test]
    fn test_sections_parse_well_formed_reply() {
        let sections = InterpretationSections::parse(REPLY);
        assert_eq!(sections.meaning.as_deref(), Some("Falling often mirrors a loss of control."));
        assert_eq!(sections.keywords, vec!["anxiety", "control", "transition"]);
        assert_eq!(sections.care.as_deref(), Some("You are on solid ground tonight."));
        assert!(sections.is_complete());
    }

    #[test]
    fn test_sections_parse_free_text() {
        let sections = InterpretationSections::parse("Just rest. #sleep");
        assert!(sections.meaning.is_none());
        assert_eq!(sections.keywords, vec!["sleep"]);
        assert!(!sections.is_complete());
    }
}
