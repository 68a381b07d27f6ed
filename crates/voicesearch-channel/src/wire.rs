//! Wire types for the plugin channel: method names, calls and replies.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use voicesearch_core::error::VoiceSearchError;

/// Methods the plugin answers on its channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    IsAvailable,
    StartListening,
    StopListening,
}

impl Method {
    /// Parse a channel method name. Unknown names yield `None`.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "isAvailable" => Some(Method::IsAvailable),
            "startListening" => Some(Method::StartListening),
            "stopListening" => Some(Method::StopListening),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Method::IsAvailable => "isAvailable",
            Method::StartListening => "startListening",
            Method::StopListening => "stopListening",
        }
    }
}

/// One invocation arriving on the channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodCall {
    /// Opaque call id, echoed back on the reply.
    pub id: u64,
    pub method: String,
    /// Ignored by every current method.
    #[serde(default)]
    pub args: Value,
}

impl MethodCall {
    pub fn new(id: u64, method: impl Into<String>) -> Self {
        Self {
            id,
            method: method.into(),
            args: Value::Null,
        }
    }
}

/// Terminal answer to a call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Reply {
    Success {
        value: Value,
    },
    Error {
        code: String,
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        details: Option<Value>,
    },
    NotImplemented,
}

impl Reply {
    pub fn success(value: impl Into<Value>) -> Self {
        Reply::Success {
            value: value.into(),
        }
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Reply::Error {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Reply::Success { .. })
    }
}

impl From<&VoiceSearchError> for Reply {
    fn from(err: &VoiceSearchError) -> Self {
        match err {
            VoiceSearchError::NotImplemented { .. } => Reply::NotImplemented,
            other => Reply::error(other.wire_code(), other.to_string()),
        }
    }
}

/// A reply tagged with the id of the call it answers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodReply {
    pub id: u64,
    pub reply: Reply,
}

impl MethodReply {
    pub fn new(id: u64, reply: Reply) -> Self {
        Self { id, reply }
    }
}
