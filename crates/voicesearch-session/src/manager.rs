//! Session manager enforcing one live recognizer session at a time.
//!
//! The `SessionManager` owns a single session slot. `begin_session` and
//! `end_session` are serialized against each other; recognizer callbacks only
//! touch the slot. No platform call is made while the slot lock is held, so a
//! recognizer may report to its listener from inside any of them. Handle
//! creation and the release of a completed handle share the `release` lock,
//! so a new handle is never created before the previous one is destroyed.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, Weak};

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;

use voicesearch_core::error::{recognition_error_label, VoiceSearchError};
use voicesearch_core::events::SessionEvent;
use voicesearch_core::types::{Permission, RecognitionOptions, SessionId, Timestamp};

use crate::capability::{
    AuthorizationGate, HostSurface, PlatformCapability, RecognitionEvent, RecognitionListener,
    RecognitionSink, RecognizerHandle,
};
use crate::slot::{PendingTranscript, ResponseSlot, SessionOutcome};
use crate::state::{SessionLifecycle, SessionState};

const EVENT_CAPACITY: usize = 64;

/// Why a live session was torn down from the outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Teardown {
    /// `end_session` was called.
    Cancelled,
    /// A newer `begin_session` replaced it.
    Superseded,
    /// The manager was dropped.
    Shutdown,
}

/// The one live session.
struct ActiveSession {
    id: SessionId,
    /// `None` while `begin_session` is still inside `PlatformCapability::start`.
    handle: Option<RecognizerHandle>,
    lifecycle: SessionLifecycle,
    response: ResponseSlot,
    started_at: DateTime<Utc>,
}

impl ActiveSession {
    fn elapsed_secs(&self) -> f32 {
        let elapsed = Utc::now() - self.started_at;
        elapsed.num_milliseconds() as f32 / 1000.0
    }
}

#[derive(Default)]
struct SessionSlot {
    active: Option<ActiveSession>,
    /// Whether any session has reached `Closed`.
    closed_any: bool,
}

impl SessionSlot {
    fn take_if(&mut self, id: SessionId) -> Option<ActiveSession> {
        if self.active.as_ref().map(|s| s.id) == Some(id) {
            self.active.take()
        } else {
            None
        }
    }
}

struct Shared {
    capability: Arc<dyn PlatformCapability>,
    gate: Arc<dyn AuthorizationGate>,
    options: RecognitionOptions,
    surface: RwLock<Option<Weak<dyn HostSurface>>>,
    /// Serializes `begin_session`, `end_session` and shutdown.
    entry: Mutex<()>,
    /// Orders `create` after the destroy of a session that completed on its own.
    release: Mutex<()>,
    slot: Mutex<SessionSlot>,
    events: broadcast::Sender<SessionEvent>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Shared {
    fn publish(&self, event: SessionEvent) {
        tracing::trace!(event = event.event_name(), "Session event");
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn current_surface(&self) -> Option<Arc<dyn HostSurface>> {
        self.surface
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .and_then(Weak::upgrade)
    }

    /// Run the start preconditions in order, short-circuiting on the first failure.
    fn check_preconditions(&self) -> Result<Arc<dyn HostSurface>, VoiceSearchError> {
        let surface = self
            .current_surface()
            .ok_or(VoiceSearchError::NoHostSurface)?;
        if !self.capability.is_available(&*surface) {
            return Err(VoiceSearchError::CapabilityUnavailable);
        }
        if !self.gate.is_granted(&*surface, Permission::RecordAudio) {
            return Err(VoiceSearchError::PermissionDenied);
        }
        Ok(surface)
    }

    fn destroy_handle(&self, session_id: SessionId, handle: RecognizerHandle) {
        let handle_id = handle.id();
        if let Err(e) = self.capability.destroy(handle) {
            tracing::warn!(
                session_id = %session_id,
                handle = handle_id,
                error = %e,
                "Recognizer destroy failed, ignoring"
            );
        }
    }

    /// Stop and release a session that has already been taken out of the slot,
    /// answering its caller with an empty transcript if nothing was delivered.
    fn teardown(&self, mut session: ActiveSession, reason: Teardown) {
        if let Some(handle) = session.handle.take() {
            if let Err(e) = self.capability.stop(&handle) {
                tracing::warn!(
                    session_id = %session.id,
                    error = %e,
                    "Recognizer stop failed, ignoring"
                );
            }
            self.destroy_handle(session.id, handle);
        }
        session.lifecycle.close();
        let already_answered = session.response.is_delivered();
        session.response.deliver(Ok(String::new()));
        lock(&self.slot).closed_any = true;

        let timestamp = Timestamp::now();
        match reason {
            Teardown::Cancelled | Teardown::Shutdown => {
                tracing::info!(
                    session_id = %session.id,
                    elapsed_secs = session.elapsed_secs(),
                    already_answered,
                    "Recognition session cancelled"
                );
                self.publish(SessionEvent::SessionCancelled {
                    session_id: session.id,
                    timestamp,
                });
            }
            Teardown::Superseded => {
                tracing::warn!(
                    session_id = %session.id,
                    elapsed_secs = session.elapsed_secs(),
                    already_answered,
                    "Recognition session superseded by a new request"
                );
                self.publish(SessionEvent::SessionSuperseded {
                    session_id: session.id,
                    timestamp,
                });
            }
        }
    }

    /// Close a session after a terminal outcome. The session has already been
    /// removed from the slot and the slot lock released.
    fn complete(&self, mut session: ActiveSession, outcome: SessionOutcome) {
        if let Err(e) = session.lifecycle.advance(SessionState::Completing) {
            tracing::debug!(session_id = %session.id, error = %e, "Completing from unexpected state");
        }

        let event = match &outcome {
            Ok(text) => {
                tracing::info!(
                    session_id = %session.id,
                    text_len = text.len(),
                    elapsed_secs = session.elapsed_secs(),
                    "Recognition session completed"
                );
                SessionEvent::SessionCompleted {
                    session_id: session.id,
                    text_length: text.len(),
                    timestamp: Timestamp::now(),
                }
            }
            Err(e) => {
                tracing::info!(
                    session_id = %session.id,
                    code = e.wire_code(),
                    error = %e,
                    "Recognition session failed"
                );
                SessionEvent::SessionFailed {
                    session_id: session.id,
                    code: e.wire_code().to_string(),
                    timestamp: Timestamp::now(),
                }
            }
        };

        session.response.deliver(outcome);
        if let Some(handle) = session.handle.take() {
            let _release = lock(&self.release);
            self.destroy_handle(session.id, handle);
        }
        session.lifecycle.close();
        lock(&self.slot).closed_any = true;
        self.publish(event);
    }
}

impl RecognitionSink for Shared {
    fn on_recognition_event(&self, session_id: SessionId, event: RecognitionEvent) {
        let outcome = match event {
            RecognitionEvent::Results(matches) => {
                Ok(matches.into_iter().next().unwrap_or_default())
            }
            RecognitionEvent::Error(code) => {
                tracing::debug!(
                    session_id = %session_id,
                    code,
                    label = recognition_error_label(code).unwrap_or("unknown"),
                    "Recognizer reported an error"
                );
                Err(VoiceSearchError::RecognitionFailed { code })
            }
            other => {
                tracing::trace!(session_id = %session_id, event = ?other, "Progress event ignored");
                return;
            }
        };

        let taken = lock(&self.slot).take_if(session_id);
        match taken {
            Some(session) => self.complete(session, outcome),
            None => tracing::debug!(
                session_id = %session_id,
                "Terminal event for a session that is no longer current, dropped"
            ),
        }
    }
}

/// Single-flight manager for recognizer sessions.
///
/// Holds a weak reference to the current host surface, at most one live
/// session, and the platform collaborators. Dropping the manager tears down
/// any live session and answers its caller.
pub struct SessionManager {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("state", &self.session_state())
            .field("surface_attached", &self.has_surface())
            .field("options", &self.shared.options)
            .finish()
    }
}

impl SessionManager {
    /// Create a manager with no surface attached and no session.
    pub fn new(
        capability: Arc<dyn PlatformCapability>,
        gate: Arc<dyn AuthorizationGate>,
        options: RecognitionOptions,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            shared: Arc::new(Shared {
                capability,
                gate,
                options,
                surface: RwLock::new(None),
                entry: Mutex::new(()),
                release: Mutex::new(()),
                slot: Mutex::new(SessionSlot::default()),
                events,
            }),
        }
    }

    /// Subscribe to lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.shared.events.subscribe()
    }

    /// Options handed to the recognizer on every start.
    pub fn options(&self) -> &RecognitionOptions {
        &self.shared.options
    }

    // -------------------------------------------------------------------------
    // Host surface
    // -------------------------------------------------------------------------

    /// Register the surface that hosts the recognizer. Only a weak reference is kept.
    pub fn attach_surface(&self, surface: &Arc<dyn HostSurface>) {
        *self
            .shared
            .surface
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(Arc::downgrade(surface));
        tracing::debug!(surface = surface.label(), "Host surface attached");
        self.shared.publish(SessionEvent::SurfaceAttached {
            label: surface.label().to_string(),
            timestamp: Timestamp::now(),
        });
    }

    /// Forget the current surface. A live session keeps running and will
    /// still be answered.
    pub fn detach_surface(&self) {
        let previous = self
            .shared
            .surface
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if previous.is_some() {
            tracing::debug!(
                session_live = self.has_active_session(),
                "Host surface detached"
            );
            self.shared.publish(SessionEvent::SurfaceDetached {
                timestamp: Timestamp::now(),
            });
        }
    }

    /// The surface is going away for a configuration change.
    pub fn detach_for_config_change(&self) {
        self.detach_surface();
    }

    /// The surface came back after a configuration change.
    pub fn reattach_after_config_change(&self, surface: &Arc<dyn HostSurface>) {
        self.attach_surface(surface);
    }

    /// Whether a surface is registered and still alive.
    pub fn has_surface(&self) -> bool {
        self.shared.current_surface().is_some()
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    /// `false` without a surface, otherwise whatever the recognizer reports.
    pub fn is_available(&self) -> bool {
        match self.shared.current_surface() {
            Some(surface) => self.shared.capability.is_available(&*surface),
            None => false,
        }
    }

    /// State of the live session; `Closed` once any session has ended,
    /// `Idle` before the first one.
    pub fn session_state(&self) -> SessionState {
        let slot = lock(&self.shared.slot);
        match &slot.active {
            Some(session) => session.lifecycle.current(),
            None if slot.closed_any => SessionState::Closed,
            None => SessionState::Idle,
        }
    }

    pub fn has_active_session(&self) -> bool {
        lock(&self.shared.slot).active.is_some()
    }

    pub fn active_session_id(&self) -> Option<SessionId> {
        lock(&self.shared.slot).active.as_ref().map(|s| s.id)
    }

    // -------------------------------------------------------------------------
    // Entry points
    // -------------------------------------------------------------------------

    /// Start a recognition session.
    ///
    /// Returns immediately; the transcript resolves once the recognizer
    /// answers, the session is cancelled, or a precondition fails. A live
    /// session from an earlier call is torn down (and answered with an empty
    /// transcript) before the new recognizer is created.
    pub fn begin_session(&self) -> PendingTranscript {
        let shared = &self.shared;
        let _entry = lock(&shared.entry);

        let surface = match shared.check_preconditions() {
            Ok(surface) => surface,
            Err(e) => {
                tracing::info!(code = e.wire_code(), "Recognition request rejected");
                shared.publish(SessionEvent::SessionRejected {
                    reason: e.wire_code().to_string(),
                    timestamp: Timestamp::now(),
                });
                let (mut response, pending) = ResponseSlot::new(None);
                response.deliver(Err(e));
                return pending;
            }
        };

        let prior = lock(&shared.slot).active.take();
        if let Some(prior) = prior {
            shared.teardown(prior, Teardown::Superseded);
        }

        let session_id = SessionId::new();
        let (response, pending) = ResponseSlot::new(Some(session_id));

        let created = {
            let _release = lock(&shared.release);
            shared.capability.create(&*surface)
        };
        let handle = match created {
            Ok(handle) => handle,
            Err(e) => {
                self.fail_before_start(session_id, response, e);
                return pending;
            }
        };

        let mut lifecycle = SessionLifecycle::new();
        if let Err(e) = lifecycle.advance(SessionState::Starting) {
            tracing::debug!(error = %e, "Unexpected lifecycle state");
        }
        lock(&shared.slot).active = Some(ActiveSession {
            id: session_id,
            handle: None,
            lifecycle,
            response,
            started_at: Utc::now(),
        });

        tracing::info!(
            session_id = %session_id,
            handle = handle.id(),
            surface = surface.label(),
            "Recognition session starting"
        );
        shared.publish(SessionEvent::SessionStarted {
            session_id,
            timestamp: Timestamp::now(),
        });

        let sink: Arc<dyn RecognitionSink> = self.shared.clone();
        let listener = RecognitionListener::new(session_id, Arc::downgrade(&sink));
        let started = shared.capability.start(&handle, &shared.options, listener);

        match started {
            Ok(()) => {
                // Hand the handle to the session, or get it back if a terminal
                // event already answered the caller during `start`.
                let orphaned = {
                    let mut slot = lock(&shared.slot);
                    match slot.active.as_mut().filter(|s| s.id == session_id) {
                        Some(session) => {
                            session.handle = Some(handle);
                            if let Err(e) = session.lifecycle.advance(SessionState::Listening) {
                                tracing::debug!(session_id = %session_id, error = %e, "Unexpected lifecycle state");
                            }
                            None
                        }
                        None => Some(handle),
                    }
                };
                if let Some(handle) = orphaned {
                    let _release = lock(&shared.release);
                    shared.destroy_handle(session_id, handle);
                }
            }
            Err(e) => {
                tracing::warn!(session_id = %session_id, error = %e, "Recognizer failed to start");
                let taken = lock(&shared.slot).take_if(session_id);
                match taken {
                    Some(mut session) => {
                        session.handle = Some(handle);
                        shared.complete(session, Err(e));
                    }
                    None => {
                        let _release = lock(&shared.release);
                        shared.destroy_handle(session_id, handle);
                    }
                }
            }
        }

        pending
    }

    fn fail_before_start(
        &self,
        session_id: SessionId,
        mut response: ResponseSlot,
        error: VoiceSearchError,
    ) {
        tracing::warn!(session_id = %session_id, error = %error, "Recognizer could not be created");
        self.shared.publish(SessionEvent::SessionFailed {
            session_id,
            code: error.wire_code().to_string(),
            timestamp: Timestamp::now(),
        });
        response.deliver(Err(error));
        lock(&self.shared.slot).closed_any = true;
    }

    /// Stop the live session, if any.
    ///
    /// Always succeeds. Stop/destroy failures are logged and absorbed; the
    /// session's caller receives an empty transcript if it had not been
    /// answered yet.
    pub fn end_session(&self) {
        let _entry = lock(&self.shared.entry);
        let active = lock(&self.shared.slot).active.take();
        match active {
            Some(session) => self.shared.teardown(session, Teardown::Cancelled),
            None => tracing::debug!("No active recognition session to stop"),
        }
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        let _entry = lock(&self.shared.entry);
        let active = lock(&self.shared.slot).active.take();
        if let Some(session) = active {
            self.shared.teardown(session, Teardown::Shutdown);
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
