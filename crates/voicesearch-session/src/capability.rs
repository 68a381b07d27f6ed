//! Contracts consumed from the host platform.
//!
//! The platform recognizer is treated as a black box: an availability check,
//! handle creation and destruction, start/stop, and an asynchronous stream of
//! [`RecognitionEvent`]s delivered through a [`RecognitionListener`]. Exactly
//! one terminal event (`Results` or `Error`) is expected per started handle.

use std::fmt;
use std::sync::Weak;

use voicesearch_core::error::Result;
use voicesearch_core::types::{Permission, RecognitionOptions, SessionId};

// =============================================================================
// Host surface / authorization
// =============================================================================

/// The execution context able to host the recognizer (e.g. a foreground window).
///
/// The session manager only keeps a weak reference to it.
pub trait HostSurface: Send + Sync {
    /// Human-readable name used in logs and events.
    fn label(&self) -> &str;
}

/// Answers whether a permission is currently granted.
///
/// Consulted on every start request; results are never cached.
pub trait AuthorizationGate: Send + Sync {
    fn is_granted(&self, surface: &dyn HostSurface, permission: Permission) -> bool;
}

impl<F> AuthorizationGate for F
where
    F: Fn(&dyn HostSurface, Permission) -> bool + Send + Sync,
{
    fn is_granted(&self, surface: &dyn HostSurface, permission: Permission) -> bool {
        self(surface, permission)
    }
}

// =============================================================================
// Recognizer
// =============================================================================

/// Exclusively owned reference to one platform recognizer instance.
///
/// Not `Clone`: destroying a handle consumes it.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct RecognizerHandle {
    id: u64,
}

impl RecognizerHandle {
    /// Wrap a platform-assigned recognizer id.
    pub fn new(id: u64) -> Self {
        Self { id }
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

/// Events emitted by the platform recognizer.
#[derive(Debug, Clone, PartialEq)]
pub enum RecognitionEvent {
    ReadyForSpeech,
    BeginningOfSpeech,
    /// Input level changed, in dB.
    RmsChanged(f32),
    BufferReceived(Vec<u8>),
    EndOfSpeech,
    PartialResults(Vec<String>),
    /// Platform-specific event code.
    Other(i32),
    /// Terminal: ranked recognition candidates, best first.
    Results(Vec<String>),
    /// Terminal: opaque platform error code.
    Error(i32),
}

impl RecognitionEvent {
    /// Whether this event ends the session.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RecognitionEvent::Results(_) | RecognitionEvent::Error(_))
    }
}

/// Platform speech recognizer.
///
/// Calls are synchronous; results arrive later through the listener handed
/// to [`PlatformCapability::start`], possibly from another thread.
pub trait PlatformCapability: Send + Sync {
    /// Whether recognition can run on this surface at all.
    fn is_available(&self, surface: &dyn HostSurface) -> bool;

    /// Allocate a new recognizer bound to the surface.
    fn create(&self, surface: &dyn HostSurface) -> Result<RecognizerHandle>;

    /// Begin listening. Events for this handle go to `listener`.
    fn start(
        &self,
        handle: &RecognizerHandle,
        options: &RecognitionOptions,
        listener: RecognitionListener,
    ) -> Result<()>;

    /// Ask the recognizer to stop listening.
    fn stop(&self, handle: &RecognizerHandle) -> Result<()>;

    /// Release the recognizer.
    fn destroy(&self, handle: RecognizerHandle) -> Result<()>;
}

// =============================================================================
// Listener
// =============================================================================

/// Receiver side of recognizer callbacks inside the crate.
pub(crate) trait RecognitionSink: Send + Sync {
    fn on_recognition_event(&self, session_id: SessionId, event: RecognitionEvent);
}

/// Callback handle given to the platform for one session.
///
/// Holds only a weak reference to the manager: events that arrive after the
/// manager is gone, or after the session was replaced, are dropped.
#[derive(Clone)]
pub struct RecognitionListener {
    session_id: SessionId,
    sink: Weak<dyn RecognitionSink>,
}

impl RecognitionListener {
    pub(crate) fn new(session_id: SessionId, sink: Weak<dyn RecognitionSink>) -> Self {
        Self { session_id, sink }
    }

    /// The session this listener reports for.
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Deliver a recognizer event.
    pub fn on_event(&self, event: RecognitionEvent) {
        match self.sink.upgrade() {
            Some(sink) => sink.on_recognition_event(self.session_id, event),
            None => tracing::trace!(
                session_id = %self.session_id,
                "Recognition event after manager shutdown dropped"
            ),
        }
    }
}

impl fmt::Debug for RecognitionListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecognitionListener")
            .field("session_id", &self.session_id)
            .field("manager_alive", &(self.sink.strong_count() > 0))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    struct Surface;

    impl HostSurface for Surface {
        fn label(&self) -> &str {
            "test"
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        seen: Mutex<Vec<(SessionId, RecognitionEvent)>>,
    }

    impl RecognitionSink for RecordingSink {
        fn on_recognition_event(&self, session_id: SessionId, event: RecognitionEvent) {
            self.seen.lock().unwrap().push((session_id, event));
        }
    }

    #[test]
    fn test_terminal_events() {
        assert!(RecognitionEvent::Results(vec![]).is_terminal());
        assert!(RecognitionEvent::Error(7).is_terminal());
        assert!(!RecognitionEvent::ReadyForSpeech.is_terminal());
        assert!(!RecognitionEvent::PartialResults(vec!["tu".into()]).is_terminal());
        assert!(!RecognitionEvent::RmsChanged(3.5).is_terminal());
        assert!(!RecognitionEvent::Other(12).is_terminal());
    }

    #[test]
    fn test_closure_gate() {
        let gate = |_: &dyn HostSurface, permission: Permission| permission == Permission::RecordAudio;
        assert!(gate.is_granted(&Surface, Permission::RecordAudio));
    }

    #[test]
    fn test_listener_forwards_to_live_sink() {
        let sink = Arc::new(RecordingSink::default());
        let dyn_sink: Arc<dyn RecognitionSink> = sink.clone();
        let id = SessionId::new();
        let listener = RecognitionListener::new(id, Arc::downgrade(&dyn_sink));

        listener.on_event(RecognitionEvent::Results(vec!["hi".into()]));

        let seen = sink.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, id);
        assert_eq!(listener.session_id(), id);
    }

    #[test]
    fn test_listener_drops_events_after_sink_gone() {
        let dyn_sink: Arc<dyn RecognitionSink> = Arc::new(RecordingSink::default());
        let listener = RecognitionListener::new(SessionId::new(), Arc::downgrade(&dyn_sink));
        drop(dyn_sink);

        // Must not panic.
        listener.on_event(RecognitionEvent::Error(2));
        assert!(format!("{:?}", listener).contains("manager_alive: false"));
    }

    #[test]
    fn test_handle_id() {
        let handle = RecognizerHandle::new(9);
        assert_eq!(handle.id(), 9);
        assert_eq!(handle, RecognizerHandle::new(9));
    }
}
