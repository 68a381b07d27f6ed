use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// Enums
// =============================================================================

/// Language model hint passed to the recognizer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LanguageModel {
    /// Free-form dictation.
    #[default]
    FreeForm,
    /// Short search-style queries.
    WebSearch,
}

/// Permissions the authorization gate is asked about.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    /// Microphone access.
    RecordAudio,
}

// =============================================================================
// Identity / temporal
// =============================================================================

/// Unique identifier for one recognition session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Unix timestamp in seconds since epoch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    pub fn now() -> Self {
        Self(Utc::now().timestamp())
    }

    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt.timestamp())
    }

    pub fn to_datetime(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.0, 0).unwrap_or_default()
    }
}

// =============================================================================
// Recognition options
// =============================================================================

/// Options handed to the recognizer when a session starts.
///
/// These are fixed per process (taken from configuration), never per call.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecognitionOptions {
    pub language_model: LanguageModel,
    /// BCP-47 locale tag. `None` means the platform default locale.
    pub locale: Option<String>,
    pub max_results: u32,
    pub prompt: String,
    pub partial_results: bool,
}

impl Default for RecognitionOptions {
    fn default() -> Self {
        Self {
            language_model: LanguageModel::FreeForm,
            locale: None,
            max_results: 1,
            prompt: "Speak now...".to_string(),
            partial_results: false,
        }
    }
}
