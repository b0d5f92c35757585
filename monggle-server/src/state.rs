use std::sync::Arc;

use async_trait::async_trait;
use monggle_core::config::api_key_from_env;
use monggle_core::{
    ChatSession, GeminiGenerator, InterpretError, InterpretPrompt, InterpretationClient,
    MonggleConfig, RecordStore, RoutineStore, TextGenerator,
};
use tokio::sync::{Mutex, RwLock};

/// Shared state for all HTTP handlers. The stores stay plain single-owner
/// values; the locks only serialise access from concurrent requests.
pub struct AppState {
    pub config: MonggleConfig,
    pub records: RwLock<RecordStore>,
    pub routines: RwLock<RoutineStore>,
    pub chat: Mutex<ChatSession>,
    /// Upstream generation provider used by `/api/interpret`.
    pub generator: Arc<dyn TextGenerator>,
    /// Client over the same provider, used by the hosted chat session.
    pub interpreter: InterpretationClient,
}

impl AppState {
    pub fn new(config: MonggleConfig, records: RecordStore, generator: Arc<dyn TextGenerator>) -> Self {
        let interpreter = InterpretationClient::new(generator.clone())
            .with_temperature(config.generation.temperature);
        Self {
            config,
            records: RwLock::new(records),
            routines: RwLock::new(RoutineStore::new()),
            chat: Mutex::new(ChatSession::with_greeting()),
            generator,
            interpreter,
        }
    }
}

/// Stand-in used when no provider key is configured: every request fails,
/// which the boundary reports as a 500 and the chat turns into the fallback.
pub struct UnconfiguredGenerator;

#[async_trait]
impl TextGenerator for UnconfiguredGenerator {
    async fn generate(&self, _prompt: &InterpretPrompt) -> Result<String, InterpretError> {
        Err(InterpretError::MissingApiKey)
    }

    fn name(&self) -> &str {
        "unconfigured"
    }
}

/// Build the Gemini generator from the environment key, or the unconfigured
/// stand-in when the key is missing.
pub fn generator_from_env(config: &MonggleConfig) -> Arc<dyn TextGenerator> {
    let api_key = api_key_from_env().unwrap_or_default();
    match GeminiGenerator::new(api_key, &config.generation) {
        Ok(generator) => {
            tracing::info!(model = generator.model(), "Gemini generator ready");
            Arc::new(generator)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Interpretation disabled: generation provider unavailable");
            Arc::new(UnconfiguredGenerator)
        }
    }
}
