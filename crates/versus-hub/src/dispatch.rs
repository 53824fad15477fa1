//! Routes one decoded envelope from a client to matchmaking or its room.

use versus_protocol::{Envelope, Message, RelayKind};

use crate::profile::PlayerProfile;
use crate::{ClientHandle, HubError, HubHandle};

/// Handles an envelope received from `client`.
///
/// - `join_game` applies defaults and asks the hub to matchmake.
/// - Relay kinds go to the other room member with `senderId` stamped.
///   Without a room they are dropped silently.
/// - Anything else, including unknown kinds, is ignored.
///
/// # Errors
/// Only [`HubError::Unavailable`], meaning the hub has shut down and the
/// connection should end.
pub async fn dispatch(client: &ClientHandle, hub: &HubHandle, envelope: Envelope) -> Result<(), HubError> {
    let id = client.id();
    match envelope.message {
        Message::JoinGame(request) => {
            let profile = PlayerProfile::from_request(id, request);
            hub.join(id, profile)
        }
        Message::Relay { kind, payload } => {
            let Some(room) = client.room().await else {
                tracing::trace!(client_id = %id, %kind, "relay outside a room ignored");
                return Ok(());
            };
            let relayed = Envelope::new(Message::Relay { kind, payload }).with_sender(id);
            let delivered = room.broadcast(id, &relayed).await;
            if matches!(kind, RelayKind::GameOver | RelayKind::Pause | RelayKind::Resume) {
                tracing::debug!(client_id = %id, room_id = %room.id(), %kind, delivered, "relayed");
            }
            Ok(())
        }
        Message::Unknown { kind } => {
            tracing::debug!(client_id = %id, %kind, "ignoring unknown message kind");
            Ok(())
        }
        other => {
            tracing::debug!(client_id = %id, kind = other.kind(), "ignoring server-only message kind");
            Ok(())
        }
    }
}
