//! Channel-facing plugin: routes method calls to the session manager.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use voicesearch_core::config::VoiceSearchConfig;
use voicesearch_core::error::VoiceSearchError;
use voicesearch_session::{
    AuthorizationGate, HostSurface, PendingTranscript, PlatformCapability, SessionManager,
};

use crate::wire::{Method, MethodCall, MethodReply, Reply};

/// A call whose side effects have been applied, waiting for its reply.
#[derive(Debug)]
pub enum Dispatched {
    /// The reply is already known.
    Ready(MethodReply),
    /// `startListening` is waiting for the recognizer.
    Listening {
        id: u64,
        transcript: PendingTranscript,
    },
}

impl Dispatched {
    /// Id of the call this answers.
    pub fn id(&self) -> u64 {
        match self {
            Dispatched::Ready(reply) => reply.id,
            Dispatched::Listening { id, .. } => *id,
        }
    }

    /// Wait for the reply. Only `Listening` actually waits.
    pub async fn into_reply(self) -> MethodReply {
        match self {
            Dispatched::Ready(reply) => reply,
            Dispatched::Listening { id, transcript } => {
                let reply = match transcript.await {
                    Ok(text) => Reply::success(text),
                    Err(e) => {
                        if e.is_platform_failure() {
                            warn!(id, code = e.wire_code(), error = %e, "startListening failed");
                        } else {
                            debug!(id, code = e.wire_code(), "startListening rejected");
                        }
                        Reply::from(&e)
                    }
                };
                MethodReply::new(id, reply)
            }
        }
    }
}

/// The voice search plugin as seen by the request channel.
///
/// Answers every call with exactly one reply. While detached from the engine
/// no handler is registered, so every call gets `not_implemented`.
pub struct VoiceSearchPlugin {
    channel_name: String,
    manager: SessionManager,
    registered: AtomicBool,
}

impl VoiceSearchPlugin {
    /// Create a plugin that is not yet registered on its channel.
    pub fn new(channel_name: impl Into<String>, manager: SessionManager) -> Self {
        Self {
            channel_name: channel_name.into(),
            manager,
            registered: AtomicBool::new(false),
        }
    }

    /// Build the plugin and its session manager from configuration.
    pub fn from_config(
        config: &VoiceSearchConfig,
        capability: Arc<dyn PlatformCapability>,
        gate: Arc<dyn AuthorizationGate>,
    ) -> Self {
        let manager = SessionManager::new(capability, gate, config.recognition.options());
        Self::new(config.channel.name.clone(), manager)
    }

    pub fn channel_name(&self) -> &str {
        &self.channel_name
    }

    pub fn manager(&self) -> &SessionManager {
        &self.manager
    }

    // -------------------------------------------------------------------------
    // Engine lifecycle
    // -------------------------------------------------------------------------

    /// Register the method handler on the channel.
    pub fn attach_to_engine(&self) {
        self.registered.store(true, Ordering::SeqCst);
        info!(channel = %self.channel_name, "Voice search handler registered");
    }

    /// Unregister the method handler. A live session keeps running.
    pub fn detach_from_engine(&self) {
        self.registered.store(false, Ordering::SeqCst);
        info!(channel = %self.channel_name, "Voice search handler unregistered");
    }

    pub fn is_attached_to_engine(&self) -> bool {
        self.registered.load(Ordering::SeqCst)
    }

    // -------------------------------------------------------------------------
    // Host surface lifecycle
    // -------------------------------------------------------------------------

    pub fn attach_surface(&self, surface: &Arc<dyn HostSurface>) {
        self.manager.attach_surface(surface);
    }

    pub fn detach_surface(&self) {
        self.manager.detach_surface();
    }

    pub fn detach_surface_for_config_change(&self) {
        self.manager.detach_for_config_change();
    }

    pub fn reattach_surface_after_config_change(&self, surface: &Arc<dyn HostSurface>) {
        self.manager.reattach_after_config_change(surface);
    }

    /// Tear down any live session, answering its caller.
    pub fn shutdown(&self) {
        self.manager.end_session();
    }

    // -------------------------------------------------------------------------
    // Dispatch
    // -------------------------------------------------------------------------

    /// Apply a call's effect on the session manager without waiting.
    ///
    /// Calls must be dispatched in the order they arrive; only the returned
    /// [`Dispatched`] may be awaited out of order.
    pub fn dispatch(&self, call: MethodCall) -> Dispatched {
        if !self.is_attached_to_engine() {
            debug!(id = call.id, method = %call.method, "Call while unregistered");
            return Dispatched::Ready(MethodReply::new(call.id, Reply::NotImplemented));
        }
        let Some(method) = Method::from_name(&call.method) else {
            debug!(id = call.id, method = %call.method, "Unknown method");
            let err = VoiceSearchError::NotImplemented {
                method: call.method.clone(),
            };
            return Dispatched::Ready(MethodReply::new(call.id, Reply::from(&err)));
        };

        debug!(id = call.id, method = method.name(), "Dispatching call");
        let reply = match method {
            Method::IsAvailable => Reply::success(self.manager.is_available()),
            Method::StartListening => {
                return Dispatched::Listening {
                    id: call.id,
                    transcript: self.manager.begin_session(),
                }
            }
            Method::StopListening => {
                self.manager.end_session();
                Reply::success(Value::Null)
            }
        };
        Dispatched::Ready(MethodReply::new(call.id, reply))
    }

    /// Dispatch one call and wait for its reply.
    pub async fn handle(&self, call: MethodCall) -> MethodReply {
        self.dispatch(call).into_reply().await
    }
}

impl std::fmt::Debug for VoiceSearchPlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VoiceSearchPlugin")
            .field("channel_name", &self.channel_name)
            .field("registered", &self.is_attached_to_engine())
            .field("manager", &self.manager)
            .finish()
    }
}
