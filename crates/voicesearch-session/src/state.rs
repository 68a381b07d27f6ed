//! Per-session lifecycle state machine.
//!
//! Valid transitions:
//! - Idle -> Starting (handle created)
//! - Starting -> Listening (recognizer started)
//! - Starting -> Completing (terminal event fired while the recognizer was starting)
//! - Listening -> Completing (terminal event received)
//! - Completing -> Closed (response delivered, handle released)
//! - any non-Closed state -> Closed (forced teardown)
//!
//! `Closed` is terminal.

use std::fmt;

use voicesearch_core::error::VoiceSearchError;

/// Lifecycle state of a single recognition session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Session allocated, nothing started yet.
    Idle,
    /// Recognizer handle created, start requested.
    Starting,
    /// Recognizer is capturing speech.
    Listening,
    /// A terminal result arrived and is being delivered.
    Completing,
    /// Response delivered and handle destroyed.
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Idle => write!(f, "Idle"),
            SessionState::Starting => write!(f, "Starting"),
            SessionState::Listening => write!(f, "Listening"),
            SessionState::Completing => write!(f, "Completing"),
            SessionState::Closed => write!(f, "Closed"),
        }
    }
}

impl SessionState {
    /// Returns whether a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: &SessionState) -> bool {
        matches!(
            (self, target),
            (SessionState::Idle, SessionState::Starting)
                | (SessionState::Starting, SessionState::Listening)
                | (SessionState::Starting, SessionState::Completing)
                | (SessionState::Listening, SessionState::Completing)
                // Forced teardown
                | (SessionState::Idle, SessionState::Closed)
                | (SessionState::Starting, SessionState::Closed)
                | (SessionState::Listening, SessionState::Closed)
                | (SessionState::Completing, SessionState::Closed)
        )
    }

    /// Whether the session still holds platform resources.
    pub fn is_live(&self) -> bool {
        !matches!(self, SessionState::Closed)
    }
}

/// Owned state machine for one session.
///
/// Lives inside the manager's session slot, so it needs no locking of its own.
#[derive(Debug, Clone)]
pub struct SessionLifecycle {
    state: SessionState,
}

impl Default for SessionLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionLifecycle {
    /// Create a lifecycle in `Idle`.
    pub fn new() -> Self {
        Self {
            state: SessionState::Idle,
        }
    }

    /// Returns the current state.
    pub fn current(&self) -> SessionState {
        self.state
    }

    /// Attempt to transition to the target state.
    pub fn advance(&mut self, target: SessionState) -> Result<(), VoiceSearchError> {
        if self.state.can_transition_to(&target) {
            tracing::debug!("Session state: {} -> {}", self.state, target);
            self.state = target;
            Ok(())
        } else {
            Err(VoiceSearchError::InvalidTransition(format!(
                "{} -> {}",
                self.state, target
            )))
        }
    }

    /// Move straight to `Closed` from wherever the session is.
    ///
    /// Returns `false` if the session was already closed.
    pub fn close(&mut self) -> bool {
        if self.state == SessionState::Closed {
            return false;
        }
        tracing::debug!("Session state: {} -> Closed", self.state);
        self.state = SessionState::Closed;
        true
    }
}

// =============================================================================
// Tests
// =============================================================================
