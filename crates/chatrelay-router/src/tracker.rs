// SPDX-FileCopyrightText: 2026 ChatRelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Delivery tracker: reconciles platform delivery/read acknowledgements
//! against stored message state.
//!
//! Status advancement is monotonic (see `chatrelay-storage`); out-of-order
//! events settle on the highest-rank status observed. Status events for
//! unknown external ids are logged and discarded -- platforms replay and
//! reorder, and an ack for a message we never stored is not an error.

use std::sync::Arc;

use chatrelay_core::ChatRelayError;
use chatrelay_core::traits::Broadcaster;
use chatrelay_core::traits::broadcast::conversation_room;
use chatrelay_core::types::StatusUpdate;
use chatrelay_storage::{ConversationStore, StatusAdvance};
use tracing::{debug, warn};

pub struct DeliveryTracker {
    store: Arc<ConversationStore>,
    bus: Arc<dyn Broadcaster>,
}

impl DeliveryTracker {
    pub fn new(store: Arc<ConversationStore>, bus: Arc<dyn Broadcaster>) -> Self {
        Self { store, bus }
    }

    /// Record one delivery/read acknowledgement.
    pub async fn record_status(&self, update: &StatusUpdate) -> Result<(), ChatRelayError> {
        match self
            .store
            .advance_status_by_external(&update.external_id, update.status)
            .await?
        {
            StatusAdvance::Advanced(message) => {
                self.bus.publish(
                    &conversation_room(&message.conversation_id),
                    "message_status",
                    serde_json::json!({
                        "message_id": message.id,
                        "external_id": update.external_id,
                        "status": message.delivery_status,
                    }),
                );
                Ok(())
            }
            StatusAdvance::Unchanged(message) => {
                debug!(
                    message_id = message.id.as_str(),
                    current = %message.delivery_status,
                    incoming = %update.status,
                    "status event did not outrank stored status"
                );
                Ok(())
            }
            StatusAdvance::Unmatched => {
                warn!(
                    external_id = update.external_id.as_str(),
                    platform = %update.platform,
                    status = %update.status,
                    "status event for unknown message discarded"
                );
                Ok(())
            }
        }
    }
}
