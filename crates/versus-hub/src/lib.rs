//! Connection hub for the Versus relay.
//!
//! The hub pairs anonymous clients into two-player rooms and relays
//! gameplay envelopes between them.
//!
//! # Key types
//!
//! - [`spawn_hub`] / [`HubHandle`]: the actor that owns the client
//!   registry, the one-slot waiting queue and the room table
//! - [`ClientHandle`] / [`Mailbox`]: a client's bounded outbound queue
//! - [`Room`]: a two-player match with its own membership lock
//! - [`dispatch`]: routes each inbound envelope
//! - [`PlayerProfile`] / [`negotiate`]: join defaults and host-wins rules
//!
//! # Lifecycle
//!
//! ```text
//! connect ──→ join_game ──┬─→ waiting slot empty: wait
//!                         └─→ slot taken: Room{host, joiner}, game_start ×2
//! relay kinds ──→ Room::broadcast ──→ other member
//! disconnect ──→ unregister ──→ clear slot, player_left, drop empty room
//! ```

mod client;
mod config;
mod dispatch;
mod error;
mod hub;
mod profile;
mod room;

pub use client::{ClientHandle, Mailbox};
pub use config::{DEFAULT_MAX_CLIENTS, DEFAULT_OUTBOX_CAPACITY, HubConfig};
pub use dispatch::dispatch;
pub use error::{DeliveryError, HubError};
pub use hub::{HubHandle, HubStats, spawn_hub};
pub use profile::{MAX_NAME_LEN, PlayerProfile, display_name, negotiate};
pub use room::Room;
