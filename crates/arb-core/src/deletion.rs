use std::sync::Arc;

use tracing::{debug, warn};

use crate::{callback::DeletionToken, messaging::port::MessagingPort};

/// Result of a two-sided delete.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DeletionOutcome {
    pub sender_ok: bool,
    pub partner_ok: bool,
}

impl DeletionOutcome {
    pub fn is_complete(&self) -> bool {
        self.sender_ok && self.partner_ok
    }
}

/// Removes both copies of a relayed message.
pub struct DeletionCoordinator {
    messenger: Arc<dyn MessagingPort>,
}

impl DeletionCoordinator {
    pub fn new(messenger: Arc<dyn MessagingPort>) -> Self {
        Self { messenger }
    }

    /// Parses a `delete_...` payload and deletes both messages.
    ///
    /// A malformed payload deletes nothing and reports both sides failed.
    pub async fn request_deletion(&self, data: &str) -> DeletionOutcome {
        match DeletionToken::parse(data) {
            Ok(token) => self.delete(token).await,
            Err(e) => {
                warn!(data, error = %e, "ignoring malformed deletion token");
                DeletionOutcome::default()
            }
        }
    }

    /// Both deletions are always attempted; one failing does not skip the other.
    pub async fn delete(&self, token: DeletionToken) -> DeletionOutcome {
        let sender_ok = match self.messenger.delete_message(token.sender).await {
            Ok(()) => true,
            Err(e) => {
                debug!(chat = token.sender.chat_id.0, error = %e, "sender copy not deleted");
                false
            }
        };
        let partner_ok = match self.messenger.delete_message(token.partner).await {
            Ok(()) => true,
            Err(e) => {
                debug!(chat = token.partner.chat_id.0, error = %e, "partner copy not deleted");
                false
            }
        };
        DeletionOutcome {
            sender_ok,
            partner_ok,
        }
    }
}
