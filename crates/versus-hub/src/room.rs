//! A two-player room: relays envelopes between its members.
//!
//! Rooms are created full (exactly two members) by the hub's matchmaker and
//! only ever shrink. Membership sits behind the room's own lock so client
//! tasks can broadcast without going through the hub loop.

use tokio::sync::Mutex;
use versus_protocol::{ClientId, Envelope, Message, PlayerLeft, RoomId};

use crate::ClientHandle;

/// One head-to-head match.
pub struct Room {
    id: RoomId,
    members: Mutex<Vec<ClientHandle>>,
}

impl Room {
    /// Creates a room holding exactly the two matched clients.
    pub(crate) fn new(id: RoomId, first: ClientHandle, second: ClientHandle) -> Self {
        Self {
            id,
            members: Mutex::new(vec![first, second]),
        }
    }

    /// The room's id (the `matchId` players see).
    pub fn id(&self) -> RoomId {
        self.id
    }

    /// Ids of the current members.
    pub async fn member_ids(&self) -> Vec<ClientId> {
        self.members.lock().await.iter().map(ClientHandle::id).collect()
    }

    /// Number of current members: 2, then 1, then 0.
    pub async fn len(&self) -> usize {
        self.members.lock().await.len()
    }

    /// Returns `true` once every member has left.
    pub async fn is_empty(&self) -> bool {
        self.members.lock().await.is_empty()
    }

    /// Enqueues `envelope` for every member except `sender`.
    ///
    /// A failed delivery only affects that member. Returns how many
    /// members the envelope was queued for.
    pub async fn broadcast(&self, sender: ClientId, envelope: &Envelope) -> usize {
        let members = self.members.lock().await;
        let mut delivered = 0;
        for member in members.iter().filter(|m| m.id() != sender) {
            match member.send(envelope.clone()) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    tracing::debug!(
                        room_id = %self.id,
                        %sender,
                        error = %e,
                        "relay delivery failed"
                    );
                }
            }
        }
        delivered
    }

    /// Removes `departed` and tells every remaining member.
    ///
    /// Returns the number of members left. Removing a client that is not a
    /// member changes nothing.
    pub(crate) async fn handle_departure(&self, departed: ClientId) -> usize {
        let mut members = self.members.lock().await;
        let before = members.len();
        members.retain(|m| m.id() != departed);
        if members.len() == before {
            return members.len();
        }

        tracing::info!(
            room_id = %self.id,
            client_id = %departed,
            remaining = members.len(),
            "player left room"
        );

        let notice = Envelope::new(Message::PlayerLeft(PlayerLeft { id: departed }));
        for member in members.iter() {
            if let Err(e) = member.send(notice.clone()) {
                tracing::debug!(room_id = %self.id, error = %e, "player_left not delivered");
            }
        }
        members.len()
    }
}

impl std::fmt::Debug for Room {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Room").field("id", &self.id).finish_non_exhaustive()
    }
}
