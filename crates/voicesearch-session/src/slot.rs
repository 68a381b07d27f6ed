//! Write-once response slot for a session.
//!
//! The manager keeps the [`ResponseSlot`]; the caller keeps the matching
//! [`PendingTranscript`]. The first delivery wins and later ones are no-ops.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use voicesearch_core::error::VoiceSearchError;
use voicesearch_core::types::SessionId;

/// Result delivered to a `begin_session` caller.
pub type SessionOutcome = Result<String, VoiceSearchError>;

/// Manager-side half of a session response.
#[derive(Debug)]
pub(crate) struct ResponseSlot {
    sender: Option<oneshot::Sender<SessionOutcome>>,
}

impl ResponseSlot {
    /// Create a slot and the caller-side future that observes it.
    pub(crate) fn new(session_id: Option<SessionId>) -> (Self, PendingTranscript) {
        let (sender, receiver) = oneshot::channel();
        (
            Self {
                sender: Some(sender),
            },
            PendingTranscript {
                session_id,
                receiver,
            },
        )
    }

    /// Deliver the outcome. Returns `false` if something was already delivered.
    pub(crate) fn deliver(&mut self, outcome: SessionOutcome) -> bool {
        match self.sender.take() {
            Some(sender) => {
                // The caller may have stopped waiting; the slot is spent either way.
                let _ = sender.send(outcome);
                true
            }
            None => false,
        }
    }

    pub(crate) fn is_delivered(&self) -> bool {
        self.sender.is_none()
    }
}

/// Caller-side handle for the eventual result of `begin_session`.
///
/// Resolves exactly once. If the manager goes away without answering, the
/// transcript resolves to an empty string, the same result an explicit
/// cancellation produces.
#[derive(Debug)]
pub struct PendingTranscript {
    session_id: Option<SessionId>,
    receiver: oneshot::Receiver<SessionOutcome>,
}

impl PendingTranscript {
    /// The session backing this request, or `None` if it was rejected before
    /// a session was created.
    pub fn session_id(&self) -> Option<SessionId> {
        self.session_id
    }
}

impl Future for PendingTranscript {
    type Output = SessionOutcome;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.receiver).poll(cx) {
            Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
            Poll::Ready(Err(_)) => Poll::Ready(Ok(String::new())),
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_first_delivery_wins() {
        let (mut slot, pending) = ResponseSlot::new(None);
        assert!(!slot.is_delivered());

        assert!(slot.deliver(Ok("turn left".to_string())));
        assert!(slot.is_delivered());
        assert!(!slot.deliver(Err(VoiceSearchError::RecognitionFailed { code: 7 })));

        assert_eq!(pending.await.unwrap(), "turn left");
    }

    #[tokio::test]
    async fn test_error_delivery() {
        let (mut slot, pending) = ResponseSlot::new(None);
        slot.deliver(Err(VoiceSearchError::PermissionDenied));
        assert!(matches!(
            pending.await,
            Err(VoiceSearchError::PermissionDenied)
        ));
    }

    #[tokio::test]
    async fn test_dropped_slot_resolves_empty() {
        let (slot, pending) = ResponseSlot::new(None);
        drop(slot);
        assert_eq!(pending.await.unwrap(), "");
    }

    #[test]
    fn test_delivery_after_caller_gone_still_spends_slot() {
        let (mut slot, pending) = ResponseSlot::new(None);
        drop(pending);
        assert!(slot.deliver(Ok(String::new())));
        assert!(slot.is_delivered());
    }

    #[test]
    fn test_session_id_tracking() {
        let (_slot, pending) = ResponseSlot::new(None);
        assert!(pending.session_id().is_none());
        let id = SessionId::new();
        let (_slot, pending) = ResponseSlot::new(Some(id));
        assert_eq!(pending.session_id(), Some(id));
    }
}
