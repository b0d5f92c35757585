//! JSON bodies exchanged across the interpret boundary.

use serde::{Deserialize, Serialize};

/// `POST /api/interpret` request. The field is optional so a missing value
/// reaches the handler and gets a 400 instead of a deserialisation error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InterpretRequest {
    #[serde(rename = "nightmareText", default, skip_serializing_if = "Option::is_none")]
    pub nightmare_text: Option<String>,
}

impl InterpretRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            nightmare_text: Some(text.into()),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InterpretResponse {
    #[serde(default)]
    pub text: Option<String>,
}

/// Error body used by every non-2xx response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

impl ErrorBody {
    pub fn new(msg: impl Into<String>) -> Self {
        Self { error: msg.into() }
    }
}
