//! Prompt template for nightmare interpretation.
//!
//! The same builder runs on both sides of the HTTP boundary: the server uses
//! it to talk to the generation provider, and the remote client uses it to
//! carry the user's text.

use serde::Serialize;

pub const SYSTEM_INSTRUCTION: &str = "You are Monggle's nightmare interpretation guide. \
Read the user's dream for what their unconscious may be carrying, point gently at the source \
of the anxiety, and leave them feeling calmer.";

pub const MEANING_LABEL: &str = "[Dream Meaning]";
pub const KEYWORDS_LABEL: &str = "[Psychological Keywords]";
pub const CARE_LABEL: &str = "[Monggle's Care Note]";

pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// A fully built interpretation request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InterpretPrompt {
    /// The user's text, verbatim.
    pub user_text: String,
    /// The instruction template with the text embedded.
    pub contents: String,
    pub system_instruction: &'static str,
    pub temperature: f32,
}

impl InterpretPrompt {
    pub fn new(user_text: &str) -> Self {
        Self {
            user_text: user_text.to_string(),
            contents: build_contents(user_text),
            system_instruction: SYSTEM_INSTRUCTION,
            temperature: DEFAULT_TEMPERATURE,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

fn build_contents(user_text: &str) -> String {
    format!(
        "The nightmare the user had: \"{user_text}\".\n\
\n\
Analyse it and answer strictly in the following format:\n\
\n\
{MEANING_LABEL}\n\
(Two or three lines of psychological and symbolic interpretation of the dream)\n\
\n\
{KEYWORDS_LABEL}\n\
#keyword1 #keyword2 #keyword3\n\
\n\
{CARE_LABEL}\n\
(One sentence of warm comfort or a practical note for the user)\n\
\n\
Keep the answer short, but make it feel understood."
    )
}
