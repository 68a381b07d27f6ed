use serde::{Deserialize, Serialize};

use crate::types::{SessionId, Timestamp};

/// Lifecycle events published by the session manager.
///
/// Every session that starts ends with exactly one of `SessionCompleted`,
/// `SessionFailed`, `SessionCancelled` or `SessionSuperseded`.
/// `SessionRejected` is emitted when a start request fails its preconditions
/// and no session was created.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum SessionEvent {
    /// A host surface became available.
    SurfaceAttached { label: String, timestamp: Timestamp },

    /// The host surface went away.
    SurfaceDetached { timestamp: Timestamp },

    /// A recognizer handle was created and started.
    SessionStarted {
        session_id: SessionId,
        timestamp: Timestamp,
    },

    /// The recognizer delivered its result.
    SessionCompleted {
        session_id: SessionId,
        text_length: usize,
        timestamp: Timestamp,
    },

    /// The recognizer (or a platform call) failed.
    SessionFailed {
        session_id: SessionId,
        code: String,
        timestamp: Timestamp,
    },

    /// The caller stopped the session before a result arrived.
    SessionCancelled {
        session_id: SessionId,
        timestamp: Timestamp,
    },

    /// A newer start request tore this session down.
    SessionSuperseded {
        session_id: SessionId,
        timestamp: Timestamp,
    },

    /// A start request failed its preconditions.
    SessionRejected { reason: String, timestamp: Timestamp },
}

impl SessionEvent {
    /// Returns the timestamp of the event.
    pub fn timestamp(&self) -> Timestamp {
        match self {
            SessionEvent::SurfaceAttached { timestamp, .. }
            | SessionEvent::SurfaceDetached { timestamp }
            | SessionEvent::SessionStarted { timestamp, .. }
            | SessionEvent::SessionCompleted { timestamp, .. }
            | SessionEvent::SessionFailed { timestamp, .. }
            | SessionEvent::SessionCancelled { timestamp, .. }
            | SessionEvent::SessionSuperseded { timestamp, .. }
            | SessionEvent::SessionRejected { timestamp, .. } => *timestamp,
        }
    }

    /// Returns a short event name for logging.
    pub fn event_name(&self) -> &'static str {
        match self {
            SessionEvent::SurfaceAttached { .. } => "surface_attached",
            SessionEvent::SurfaceDetached { .. } => "surface_detached",
            SessionEvent::SessionStarted { .. } => "session_started",
            SessionEvent::SessionCompleted { .. } => "session_completed",
            SessionEvent::SessionFailed { .. } => "session_failed",
            SessionEvent::SessionCancelled { .. } => "session_cancelled",
            SessionEvent::SessionSuperseded { .. } => "session_superseded",
            SessionEvent::SessionRejected { .. } => "session_rejected",
        }
    }

    /// The session this event belongs to, if any.
    pub fn session_id(&self) -> Option<SessionId> {
        match self {
            SessionEvent::SessionStarted { session_id, .. }
            | SessionEvent::SessionCompleted { session_id, .. }
            | SessionEvent::SessionFailed { session_id, .. }
            | SessionEvent::SessionCancelled { session_id, .. }
            | SessionEvent::SessionSuperseded { session_id, .. } => Some(*session_id),
            _ => None,
        }
    }

    /// Whether this event closes a session.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionEvent::SessionCompleted { .. }
                | SessionEvent::SessionFailed { .. }
                | SessionEvent::SessionCancelled { .. }
                | SessionEvent::SessionSuperseded { .. }
        )
    }
}
