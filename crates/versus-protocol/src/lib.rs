//! Wire protocol for the Versus relay.
//!
//! This crate defines the "language" clients and relay speak:
//!
//! - **Envelope** ([`Envelope`], [`Message`]): one JSON text frame,
//!   `{type, payload?, senderId?}`, typed by its `type` tag.
//! - **Payloads** ([`JoinRequest`], [`GameStart`], [`RoomStatus`], …):
//!   the shapes behind each tag.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): bytes ↔ envelopes.
//! - **Errors** ([`ProtocolError`]).
//!
//! The protocol layer knows nothing about sockets or rooms.
//!
//! ```text
//! Transport (frames) → Protocol (Envelope) → Hub (clients, rooms)
//! ```

mod codec;
mod envelope;
mod error;
mod types;

pub use codec::{Codec, JsonCodec};
pub use envelope::{Envelope, Message};
pub use error::ProtocolError;
pub use types::{
    AttackMode, ClientId, GameSettings, GameStart, JoinRequest, MatchRules, Opaque,
    PlayerLeft, RelayKind, RoomId, RoomStatus,
};
