//! Single-flight recognition session management.
//!
//! Owns at most one live recognizer session at a time and mediates between
//! caller requests and a platform recognizer:
//! Idle -> Starting -> Listening -> Completing -> Closed.
//! Every started session resolves its caller exactly once, and every
//! recognizer handle is destroyed on every path into `Closed`.

pub mod capability;
pub mod manager;
pub mod mock;
pub mod slot;
pub mod state;

pub use capability::{
    AuthorizationGate, HostSurface, PlatformCapability, RecognitionEvent, RecognitionListener,
    RecognizerHandle,
};
pub use manager::SessionManager;
pub use mock::{CapabilityCall, MockAuthorizationGate, MockCapability, MockSurface};
pub use slot::{PendingTranscript, SessionOutcome};
pub use state::SessionState;
