//! In-memory recognizer, surface and permission gate.
//!
//! Used by tests and by hosts that want to exercise the session contract
//! without a real speech engine. The mock records every platform call in
//! order and lets the caller fire recognizer events by hand.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use voicesearch_core::error::{Result, VoiceSearchError};
use voicesearch_core::types::{Permission, RecognitionOptions};

use crate::capability::{
    AuthorizationGate, HostSurface, PlatformCapability, RecognitionEvent, RecognitionListener,
    RecognizerHandle,
};

/// One recorded call into the mock recognizer. Ids are handle ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CapabilityCall {
    IsAvailable,
    Create(u64),
    Start(u64),
    Stop(u64),
    Destroy(u64),
}

#[derive(Debug, Default)]
struct MockState {
    unavailable: bool,
    fail_create: bool,
    fail_start: bool,
    fail_stop: bool,
    fail_destroy: bool,
    next_id: u64,
    calls: Vec<CapabilityCall>,
    listeners: HashMap<u64, RecognitionListener>,
    live: HashSet<u64>,
    peak_live: usize,
    last_options: Option<RecognitionOptions>,
}

/// Scriptable [`PlatformCapability`].
#[derive(Debug, Default)]
pub struct MockCapability {
    state: Mutex<MockState>,
}

impl MockCapability {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_available(&self, available: bool) {
        self.lock().unavailable = !available;
    }

    pub fn fail_create(&self, fail: bool) {
        self.lock().fail_create = fail;
    }

    pub fn fail_start(&self, fail: bool) {
        self.lock().fail_start = fail;
    }

    pub fn fail_stop(&self, fail: bool) {
        self.lock().fail_stop = fail;
    }

    pub fn fail_destroy(&self, fail: bool) {
        self.lock().fail_destroy = fail;
    }

    /// Every call received so far, oldest first.
    pub fn calls(&self) -> Vec<CapabilityCall> {
        self.lock().calls.clone()
    }

    /// Calls other than availability checks.
    pub fn handle_calls(&self) -> Vec<CapabilityCall> {
        self.calls()
            .into_iter()
            .filter(|c| *c != CapabilityCall::IsAvailable)
            .collect()
    }

    /// Ids of handles created and not yet destroyed.
    pub fn live_handles(&self) -> Vec<u64> {
        let mut live: Vec<u64> = self.lock().live.iter().copied().collect();
        live.sort_unstable();
        live
    }

    /// Highest number of simultaneously live handles observed.
    pub fn peak_live_handles(&self) -> usize {
        self.lock().peak_live
    }

    /// Id of the most recently created handle.
    pub fn latest_handle(&self) -> Option<u64> {
        let state = self.lock();
        if state.next_id == 0 {
            None
        } else {
            Some(state.next_id)
        }
    }

    /// Options passed to the most recent `start`.
    pub fn last_options(&self) -> Option<RecognitionOptions> {
        self.lock().last_options.clone()
    }

    /// The listener registered for a handle.
    pub fn listener(&self, handle: u64) -> Option<RecognitionListener> {
        self.lock().listeners.get(&handle).cloned()
    }

    /// Fire an event at the listener registered for `handle`.
    ///
    /// The listener is invoked without holding the mock's lock, so the
    /// manager may call back into the mock. Returns `false` when no
    /// listener is registered.
    pub fn fire(&self, handle: u64, event: RecognitionEvent) -> bool {
        let listener = self.listener(handle);
        match listener {
            Some(listener) => {
                listener.on_event(event);
                true
            }
            None => false,
        }
    }

    /// Fire at the most recently created handle.
    pub fn fire_latest(&self, event: RecognitionEvent) -> bool {
        match self.latest_handle() {
            Some(handle) => self.fire(handle, event),
            None => false,
        }
    }
}

impl PlatformCapability for MockCapability {
    fn is_available(&self, _surface: &dyn HostSurface) -> bool {
        let mut state = self.lock();
        state.calls.push(CapabilityCall::IsAvailable);
        !state.unavailable
    }

    fn create(&self, _surface: &dyn HostSurface) -> Result<RecognizerHandle> {
        let mut state = self.lock();
        if state.fail_create {
            return Err(VoiceSearchError::Capability(
                "mock recognizer creation failed".to_string(),
            ));
        }
        state.next_id += 1;
        let id = state.next_id;
        state.calls.push(CapabilityCall::Create(id));
        state.live.insert(id);
        state.peak_live = state.peak_live.max(state.live.len());
        Ok(RecognizerHandle::new(id))
    }

    fn start(
        &self,
        handle: &RecognizerHandle,
        options: &RecognitionOptions,
        listener: RecognitionListener,
    ) -> Result<()> {
        let mut state = self.lock();
        state.calls.push(CapabilityCall::Start(handle.id()));
        if state.fail_start {
            return Err(VoiceSearchError::Capability(
                "mock recognizer failed to start".to_string(),
            ));
        }
        state.last_options = Some(options.clone());
        state.listeners.insert(handle.id(), listener);
        Ok(())
    }

    fn stop(&self, handle: &RecognizerHandle) -> Result<()> {
        let mut state = self.lock();
        state.calls.push(CapabilityCall::Stop(handle.id()));
        if state.fail_stop {
            return Err(VoiceSearchError::Capability(
                "mock recognizer failed to stop".to_string(),
            ));
        }
        Ok(())
    }

    fn destroy(&self, handle: RecognizerHandle) -> Result<()> {
        let mut state = self.lock();
        let id = handle.id();
        state.calls.push(CapabilityCall::Destroy(id));
        // The native resource is gone even when the platform reports a failure.
        state.live.remove(&id);
        if state.fail_destroy {
            return Err(VoiceSearchError::Capability(
                "mock recognizer failed to release".to_string(),
            ));
        }
        Ok(())
    }
}

/// A named host surface.
#[derive(Debug, Clone)]
pub struct MockSurface {
    label: String,
}

impl MockSurface {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }
}

impl HostSurface for MockSurface {
    fn label(&self) -> &str {
        &self.label
    }
}

/// Permission gate with a switchable answer.
#[derive(Debug)]
pub struct MockAuthorizationGate {
    granted: AtomicBool,
}

impl Default for MockAuthorizationGate {
    fn default() -> Self {
        Self::granted()
    }
}

impl MockAuthorizationGate {
    pub fn granted() -> Self {
        Self {
            granted: AtomicBool::new(true),
        }
    }

    pub fn denied() -> Self {
        Self {
            granted: AtomicBool::new(false),
        }
    }

    pub fn set_granted(&self, granted: bool) {
        self.granted.store(granted, Ordering::SeqCst);
    }
}

impl AuthorizationGate for MockAuthorizationGate {
    fn is_granted(&self, _surface: &dyn HostSurface, _permission: Permission) -> bool {
        self.granted.load(Ordering::SeqCst)
    }
}
