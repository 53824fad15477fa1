//! The hub actor: sole owner of the client registry, the waiting slot and
//! the room table.
//!
//! All of that state lives inside one Tokio task. Everything else talks to
//! it through a [`HubHandle`], which only enqueues commands. Commands are
//! processed one at a time, so the check-and-set on the waiting slot can
//! never interleave with another registration, unregistration or match.
//!
//! ```text
//!  reader task ─┐
//!  reader task ─┼─ HubCommand ──→ [ Hub loop ] ──→ ClientHandle::send
//!  client send ─┘   (unbounded)       │
//!                                     └─ creates / drops Arc<Room>
//! ```

use std::collections::HashMap;
use std::ops::ControlFlow;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use versus_protocol::{ClientId, Envelope, GameStart, JoinRequest, Message, RoomId, RoomStatus};

use crate::client::{self, Mailbox};
use crate::profile::{PlayerProfile, negotiate};
use crate::{ClientHandle, HubConfig, HubError, Room};

/// Requests the hub loop understands.
pub(crate) enum HubCommand {
    /// A freshly accepted client.
    Register(ClientHandle),
    /// A client is gone (transport closed, or its outbox overflowed).
    Unregister(ClientId),
    /// `join_game` with defaults already applied.
    Join { id: ClientId, profile: PlayerProfile },
    /// Administrative message to every registered client.
    Broadcast(Envelope),
    /// Snapshot of the hub's counters.
    Stats { reply: oneshot::Sender<HubStats> },
    /// Close every client and stop the loop.
    Shutdown,
}

/// Point-in-time view of the hub's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HubStats {
    /// Registered clients.
    pub clients: usize,
    /// Rooms in the room table.
    pub rooms: usize,
    /// Occupant of the waiting slot.
    pub waiting: Option<ClientId>,
}

/// Cloneable handle used to send requests to the hub loop.
#[derive(Clone)]
pub struct HubHandle {
    sender: mpsc::UnboundedSender<HubCommand>,
    outbox_capacity: usize,
}

impl HubHandle {
    /// Allocates the outbound queue for a new client and registers it.
    ///
    /// The returned [`Mailbox`] belongs to the connection's writer.
    pub fn connect(&self, id: ClientId) -> Result<(ClientHandle, Mailbox), HubError> {
        let (handle, mailbox) = client::channel(id, self.outbox_capacity, self.sender.clone());
        self.send(HubCommand::Register(handle.clone()))?;
        Ok((handle, mailbox))
    }

    /// Tells the hub the client is gone. Safe to call more than once.
    pub fn unregister(&self, id: ClientId) -> Result<(), HubError> {
        self.send(HubCommand::Unregister(id))
    }

    /// Runs matchmaking for `id`.
    pub fn join(&self, id: ClientId, profile: PlayerProfile) -> Result<(), HubError> {
        self.send(HubCommand::Join { id, profile })
    }

    /// Queues `envelope` for every registered client.
    pub fn broadcast(&self, envelope: Envelope) -> Result<(), HubError> {
        self.send(HubCommand::Broadcast(envelope))
    }

    /// Returns a snapshot taken after every previously sent command.
    pub async fn stats(&self) -> Result<HubStats, HubError> {
        let (reply, rx) = oneshot::channel();
        self.send(HubCommand::Stats { reply })?;
        rx.await.map_err(|_| HubError::Unavailable)
    }

    /// Closes every client and stops the hub loop.
    pub fn shutdown(&self) -> Result<(), HubError> {
        self.send(HubCommand::Shutdown)
    }

    fn send(&self, command: HubCommand) -> Result<(), HubError> {
        self.sender.send(command).map_err(|_| HubError::Unavailable)
    }
}

/// Spawns the hub loop and returns a handle to it plus its task.
pub fn spawn_hub(config: HubConfig) -> (HubHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let handle = HubHandle {
        sender: tx,
        outbox_capacity: config.outbox_capacity,
    };
    let hub = Hub {
        config,
        clients: HashMap::new(),
        waiting: None,
        rooms: HashMap::new(),
        player_rooms: HashMap::new(),
        next_room_id: 1,
        receiver: rx,
    };
    (handle, tokio::spawn(hub.run()))
}

struct Registered {
    handle: ClientHandle,
    /// Set by the first `join_game`.
    profile: Option<PlayerProfile>,
}

struct Waiting {
    id: ClientId,
    since: Instant,
}

struct Hub {
    config: HubConfig,
    clients: HashMap<ClientId, Registered>,
    /// Matchmaking queue of capacity one. Always a registered, roomless
    /// client when set.
    waiting: Option<Waiting>,
    rooms: HashMap<RoomId, Arc<Room>>,
    /// Which room each client is in. A client is in at most one.
    player_rooms: HashMap<ClientId, RoomId>,
    next_room_id: u64,
    receiver: mpsc::UnboundedReceiver<HubCommand>,
}

impl Hub {
    async fn run(mut self) {
        tracing::info!("hub started");

        loop {
            let deadline = self.waiting_deadline();
            tokio::select! {
                command = self.receiver.recv() => {
                    let Some(command) = command else { break };
                    if self.handle(command).await.is_break() {
                        break;
                    }
                }
                () = wait_until(deadline) => self.expire_waiting(),
            }
        }

        tracing::info!("hub stopped");
    }

    async fn handle(&mut self, command: HubCommand) -> ControlFlow<()> {
        match command {
            HubCommand::Register(handle) => self.register(handle),
            HubCommand::Unregister(id) => self.unregister(id).await,
            HubCommand::Join { id, profile } => self.join(id, profile).await,
            HubCommand::Broadcast(envelope) => {
                for entry in self.clients.values() {
                    let _ = entry.handle.send(envelope.clone());
                }
            }
            HubCommand::Stats { reply } => {
                let _ = reply.send(self.stats());
            }
            HubCommand::Shutdown => {
                self.shutdown().await;
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    fn register(&mut self, handle: ClientHandle) {
        let id = handle.id();
        if self.clients.contains_key(&id) {
            tracing::warn!(client_id = %id, "duplicate registration ignored");
            return;
        }
        if self.config.is_full(self.clients.len()) {
            tracing::warn!(
                client_id = %id,
                limit = self.config.max_clients,
                "client limit reached, refusing connection"
            );
            handle.close();
            return;
        }

        let _ = handle.send(Envelope::new(Message::Identity).with_sender(id));
        if let Some(status) = self.host_status() {
            let _ = handle.send(Envelope::new(Message::RoomStatus(status)));
        }
        self.clients.insert(id, Registered { handle, profile: None });
        tracing::info!(client_id = %id, clients = self.clients.len(), "client registered");
    }

    async fn unregister(&mut self, id: ClientId) {
        let Some(entry) = self.clients.remove(&id) else {
            tracing::trace!(client_id = %id, "already unregistered");
            return;
        };
        entry.handle.close();

        if self.waiting.as_ref().is_some_and(|w| w.id == id) {
            self.waiting = None;
            tracing::info!(client_id = %id, "waiting host left");
            self.announce(RoomStatus::vacant());
        }
        self.leave_room(&entry.handle).await;

        tracing::info!(client_id = %id, clients = self.clients.len(), "client unregistered");
    }

    async fn join(&mut self, id: ClientId, profile: PlayerProfile) {
        let Some(entry) = self.clients.get_mut(&id) else {
            tracing::debug!(client_id = %id, "join from unregistered client ignored");
            return;
        };
        // The display name sticks from the first join; settings follow the latest.
        let profile = match entry.profile.take() {
            Some(first) => PlayerProfile {
                name: first.name,
                settings: profile.settings,
            },
            None => profile,
        };
        entry.profile = Some(profile.clone());
        let handle = entry.handle.clone();
        if handle.is_closed() {
            return;
        }

        if self.player_rooms.contains_key(&id) {
            self.leave_room(&handle).await;
        }

        if self.waiting.as_ref().is_some_and(|w| w.id == id) {
            let _ = handle.send(Envelope::new(Message::WaitingForOpponent));
            return;
        }

        match self.waiting.take() {
            None => self.wait(&handle, &profile),
            Some(host) => self.start_match(host.id, handle, profile).await,
        }
    }

    fn wait(&mut self, handle: &ClientHandle, profile: &PlayerProfile) {
        let id = handle.id();
        self.waiting = Some(Waiting {
            id,
            since: Instant::now(),
        });
        let _ = handle.send(Envelope::new(Message::WaitingForOpponent));
        tracing::info!(client_id = %id, name = %profile.name, "waiting for opponent");
        self.announce(RoomStatus::hosted(profile.settings.clone()));
    }

    async fn start_match(&mut self, host_id: ClientId, joiner: ClientHandle, joiner_profile: PlayerProfile) {
        let host = self
            .clients
            .get(&host_id)
            .filter(|h| !h.handle.is_closed())
            .map(|h| {
                let profile = h.profile.clone().unwrap_or_else(|| {
                    PlayerProfile::from_request(host_id, JoinRequest::default())
                });
                (h.handle.clone(), profile)
            });
        // A host whose outbox just overflowed is closed but not yet
        // unregistered; the joiner takes the slot instead.
        let Some((host, host_profile)) = host else {
            tracing::debug!(client_id = %host_id, "waiting host is gone, joiner waits instead");
            self.wait(&joiner, &joiner_profile);
            return;
        };

        let room_id = RoomId::new(self.next_room_id);
        self.next_room_id += 1;
        let rules = negotiate(&host_profile.settings, &joiner_profile.settings);
        let room = Arc::new(Room::new(room_id, joiner.clone(), host.clone()));

        // Room references go in before game_start so a client's first
        // relay after game_start always finds its room.
        joiner.set_room(Some(Arc::clone(&room))).await;
        host.set_room(Some(Arc::clone(&room))).await;
        self.player_rooms.insert(joiner.id(), room_id);
        self.player_rooms.insert(host_id, room_id);
        self.rooms.insert(room_id, room);

        tracing::info!(
            %room_id,
            host = %host_id,
            joiner = %joiner.id(),
            attack_mode = rules.attack_mode.as_str(),
            rooms = self.rooms.len(),
            "match started"
        );

        let _ = joiner.send(Envelope::new(Message::GameStart(GameStart {
            opponent_id: host_id,
            opponent_name: host_profile.name,
            match_id: room_id,
            rules,
        })));
        let _ = host.send(Envelope::new(Message::GameStart(GameStart {
            opponent_id: joiner.id(),
            opponent_name: joiner_profile.name,
            match_id: room_id,
            rules,
        })));

        self.announce(RoomStatus::vacant());
    }

    /// Removes the client from its room, dropping the room once empty.
    async fn leave_room(&mut self, client: &ClientHandle) {
        let id = client.id();
        let Some(room_id) = self.player_rooms.remove(&id) else {
            return;
        };
        client.set_room(None).await;

        let Some(room) = self.rooms.get(&room_id).cloned() else {
            return;
        };
        if room.handle_departure(id).await == 0 {
            self.rooms.remove(&room_id);
            tracing::info!(%room_id, rooms = self.rooms.len(), "room closed");
        }
    }

    fn expire_waiting(&mut self) {
        let Some(waiting) = self.waiting.take() else {
            return;
        };
        if let Some(entry) = self.clients.get(&waiting.id) {
            let _ = entry.handle.send(Envelope::new(Message::WaitingExpired));
        }
        tracing::info!(client_id = %waiting.id, "waiting host expired");
        self.announce(RoomStatus::vacant());
    }

    fn waiting_deadline(&self) -> Option<Instant> {
        let timeout = self.config.waiting_timeout?;
        self.waiting.as_ref().map(|w| w.since + timeout)
    }

    /// Current host notice, if announcements are on and a host is waiting.
    fn host_status(&self) -> Option<RoomStatus> {
        if !self.config.announce_host {
            return None;
        }
        let waiting = self.waiting.as_ref()?;
        let profile = self.clients.get(&waiting.id)?.profile.as_ref()?;
        Some(RoomStatus::hosted(profile.settings.clone()))
    }

    /// Sends `status` to every registered client that is neither in a live
    /// match nor the waiting host. A player whose opponent has left still
    /// counts as free.
    fn announce(&self, status: RoomStatus) {
        if !self.config.announce_host {
            return;
        }
        let mut occupancy: HashMap<RoomId, usize> = HashMap::new();
        for room_id in self.player_rooms.values() {
            *occupancy.entry(*room_id).or_default() += 1;
        }
        let host = self.waiting.as_ref().map(|w| w.id);
        let notice = Envelope::new(Message::RoomStatus(status));
        for (id, entry) in &self.clients {
            let in_match = self
                .player_rooms
                .get(id)
                .is_some_and(|room_id| occupancy.get(room_id).copied().unwrap_or(0) >= 2);
            if Some(*id) == host || in_match {
                continue;
            }
            let _ = entry.handle.send(notice.clone());
        }
    }

    fn stats(&self) -> HubStats {
        HubStats {
            clients: self.clients.len(),
            rooms: self.rooms.len(),
            waiting: self.waiting.as_ref().map(|w| w.id),
        }
    }

    async fn shutdown(&mut self) {
        tracing::info!(
            clients = self.clients.len(),
            rooms = self.rooms.len(),
            "hub shutting down"
        );
        for (_, entry) in self.clients.drain() {
            entry.handle.close();
            entry.handle.set_room(None).await;
        }
        self.waiting = None;
        self.rooms.clear();
        self.player_rooms.clear();
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
