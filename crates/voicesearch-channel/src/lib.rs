//! Request channel surface for the voice search plugin.
//!
//! Method names and call/reply wire types, the plugin that dispatches calls
//! to a [`voicesearch_session::SessionManager`], and a JSON-lines server.

pub mod plugin;
pub mod server;
pub mod wire;

pub use plugin::{Dispatched, VoiceSearchPlugin};
pub use server::serve;
pub use wire::{Method, MethodCall, MethodReply, Reply};
