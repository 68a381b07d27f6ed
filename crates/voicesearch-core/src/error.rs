use thiserror::Error;

/// Top-level error type for the voice search plugin.
///
/// The first group of variants is caller-visible: each one terminates the
/// current session attempt and travels back over the request channel as a
/// coded error (see [`VoiceSearchError::wire_code`]). The remaining variants
/// are internal plumbing failures.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum VoiceSearchError {
    #[error("Activity not available")]
    NoHostSurface,

    #[error("Speech recognition not available")]
    CapabilityUnavailable,

    #[error("Microphone permission denied")]
    PermissionDenied,

    #[error("Speech recognition error: {code}")]
    RecognitionFailed { code: i32 },

    #[error("Method not implemented: {method}")]
    NotImplemented { method: String },

    #[error("Recognizer error: {0}")]
    Capability(String),

    #[error("Invalid session state transition: {0}")]
    InvalidTransition(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Channel error: {0}")]
    Channel(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl VoiceSearchError {
    /// Stable code reported to the caller for this error.
    pub fn wire_code(&self) -> &'static str {
        match self {
            VoiceSearchError::NoHostSurface => "NO_ACTIVITY",
            VoiceSearchError::CapabilityUnavailable => "SPEECH_NOT_AVAILABLE",
            VoiceSearchError::PermissionDenied => "PERMISSION_DENIED",
            VoiceSearchError::RecognitionFailed { .. } => "RECOGNITION_ERROR",
            VoiceSearchError::NotImplemented { .. } => "NOT_IMPLEMENTED",
            VoiceSearchError::Capability(_) => "RECOGNIZER_ERROR",
            VoiceSearchError::InvalidTransition(_) => "INVALID_STATE",
            VoiceSearchError::Config(_) => "CONFIG_ERROR",
            VoiceSearchError::Channel(_) => "CHANNEL_ERROR",
            VoiceSearchError::Serialization(_) => "INVALID_REQUEST",
            VoiceSearchError::Io(_) => "IO_ERROR",
        }
    }

    /// Whether the error was reported by the platform recognizer itself.
    pub fn is_platform_failure(&self) -> bool {
        matches!(
            self,
            VoiceSearchError::RecognitionFailed { .. } | VoiceSearchError::Capability(_)
        )
    }
}

impl From<toml::de::Error> for VoiceSearchError {
    fn from(err: toml::de::Error) -> Self {
        VoiceSearchError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for VoiceSearchError {
    fn from(err: toml::ser::Error) -> Self {
        VoiceSearchError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for VoiceSearchError {
    fn from(err: serde_json::Error) -> Self {
        VoiceSearchError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for voice search operations.
pub type Result<T> = std::result::Result<T, VoiceSearchError>;

/// Names the well-known platform recognition error codes.
///
/// Codes stay opaque on the wire; this is only used to make logs readable.
pub fn recognition_error_label(code: i32) -> Option<&'static str> {
    match code {
        1 => Some("network timeout"),
        2 => Some("network"),
        3 => Some("audio"),
        4 => Some("server"),
        5 => Some("client"),
        6 => Some("speech timeout"),
        7 => Some("no match"),
        8 => Some("recognizer busy"),
        9 => Some("insufficient permissions"),
        _ => None,
    }
}
