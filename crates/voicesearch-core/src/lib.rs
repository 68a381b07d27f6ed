pub mod config;
pub mod error;
pub mod events;
pub mod types;

pub use config::VoiceSearchConfig;
pub use error::{recognition_error_label, Result, VoiceSearchError};
pub use events::SessionEvent;
pub use types::*;
