//! The top-level wire unit: `{type, payload?, senderId?}`.
//!
//! On the wire the payload shape depends on `type`. In Rust that becomes
//! the [`Message`] sum type, with one variant per recognised kind and a
//! catch-all [`Message::Unknown`] so clients can be newer than the relay.
//!
//! ```text
//! {"type":"attack","payload":{"lines":2},"senderId":"0000002a"}
//!   │               │                      └─ stamped by the relay
//!   │               └─ kept as raw JSON for relay kinds
//!   └─ selects the Message variant
//! ```

use serde::de::DeserializeOwned;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::value::RawValue;

use crate::types::{GameStart, JoinRequest, Opaque, PlayerLeft, RelayKind, RoomStatus};
use crate::{ClientId, ProtocolError};

/// Every message the relay understands, keyed by its wire `type`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Server → client: tells a fresh connection its own id (in `senderId`).
    Identity,
    /// Client → server: "find me an opponent".
    JoinGame(JoinRequest),
    /// Server → client: you occupy the waiting slot.
    WaitingForOpponent,
    /// Server → client: you waited too long and left the waiting slot.
    WaitingExpired,
    /// Server → client: whether a host is currently waiting.
    RoomStatus(RoomStatus),
    /// Server → client: you have been matched.
    GameStart(GameStart),
    /// Server → client: your opponent is gone.
    PlayerLeft(PlayerLeft),
    /// Either direction: gameplay traffic forwarded verbatim.
    Relay {
        kind: RelayKind,
        payload: Option<Opaque>,
    },
    /// A `type` this relay does not know. Accepted and ignored.
    Unknown { kind: String },
}

impl Message {
    /// The wire `type` tag.
    pub fn kind(&self) -> &str {
        match self {
            Self::Identity => "identity",
            Self::JoinGame(_) => "join_game",
            Self::WaitingForOpponent => "waiting_for_opponent",
            Self::WaitingExpired => "waiting_expired",
            Self::RoomStatus(_) => "room_status",
            Self::GameStart(_) => "game_start",
            Self::PlayerLeft(_) => "player_left",
            Self::Relay { kind, .. } => kind.as_str(),
            Self::Unknown { kind } => kind,
        }
    }

    /// Builds a `Message` from a wire tag and its raw payload.
    ///
    /// # Errors
    /// Fails when a known kind carries a payload of the wrong shape, or a
    /// server kind that requires a payload has none.
    pub fn from_parts(kind: &str, payload: Option<Box<RawValue>>) -> Result<Self, ProtocolError> {
        if let Some(relay) = RelayKind::from_tag(kind) {
            return Ok(Self::Relay {
                kind: relay,
                payload: payload.map(Opaque::from_raw),
            });
        }
        let message = match kind {
            "identity" => Self::Identity,
            "join_game" => Self::JoinGame(optional_payload(payload.as_deref())?),
            "waiting_for_opponent" => Self::WaitingForOpponent,
            "waiting_expired" => Self::WaitingExpired,
            "room_status" => Self::RoomStatus(required_payload(kind, payload.as_deref())?),
            "game_start" => Self::GameStart(required_payload(kind, payload.as_deref())?),
            "player_left" => Self::PlayerLeft(required_payload(kind, payload.as_deref())?),
            other => Self::Unknown {
                kind: other.to_string(),
            },
        };
        Ok(message)
    }
}

fn optional_payload<T: DeserializeOwned + Default>(raw: Option<&RawValue>) -> Result<T, ProtocolError> {
    match raw.filter(|raw| raw.get() != "null") {
        Some(raw) => serde_json::from_str(raw.get()).map_err(ProtocolError::Decode),
        None => Ok(T::default()),
    }
}

fn required_payload<T: DeserializeOwned>(kind: &str, raw: Option<&RawValue>) -> Result<T, ProtocolError> {
    let raw = raw.ok_or_else(|| ProtocolError::InvalidMessage(format!("{kind} requires a payload")))?;
    serde_json::from_str(raw.get()).map_err(ProtocolError::Decode)
}

/// One frame on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawEnvelope")]
pub struct Envelope {
    pub message: Message,
    /// Stamped by the relay on forwarded and identity frames. Whatever a
    /// client puts here is display-only and gets overwritten.
    pub sender_id: Option<ClientId>,
}

impl Envelope {
    /// An envelope with no sender.
    pub fn new(message: Message) -> Self {
        Self {
            message,
            sender_id: None,
        }
    }

    /// Replaces the sender stamp.
    pub fn with_sender(mut self, sender: ClientId) -> Self {
        self.sender_id = Some(sender);
        self
    }

    /// The wire `type` tag.
    pub fn kind(&self) -> &str {
        self.message.kind()
    }
}

impl From<Message> for Envelope {
    fn from(message: Message) -> Self {
        Self::new(message)
    }
}

/// The envelope exactly as it sits in JSON, before the payload is typed.
#[derive(Deserialize)]
struct RawEnvelope {
    #[serde(rename = "type")]
    kind: String,
    /// Absent stays `None`; an explicit `null` is kept as raw `null`.
    #[serde(default, deserialize_with = "present")]
    payload: Option<Box<RawValue>>,
    #[serde(default, rename = "senderId")]
    sender_id: Option<serde_json::Value>,
}

fn present<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Box<RawValue>>, D::Error> {
    Box::<RawValue>::deserialize(deserializer).map(Some)
}

impl TryFrom<RawEnvelope> for Envelope {
    type Error = ProtocolError;

    fn try_from(raw: RawEnvelope) -> Result<Self, Self::Error> {
        let message = Message::from_parts(&raw.kind, raw.payload)?;
        // Lenient: a junk senderId must not cost us an otherwise good frame.
        let sender_id = raw
            .sender_id
            .as_ref()
            .and_then(serde_json::Value::as_str)
            .and_then(|s| s.parse().ok());
        Ok(Self { message, sender_id })
    }
}

impl Serialize for Envelope {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let has_payload = match &self.message {
            Message::JoinGame(_)
            | Message::RoomStatus(_)
            | Message::GameStart(_)
            | Message::PlayerLeft(_) => true,
            Message::Relay { payload, .. } => payload.is_some(),
            _ => false,
        };
        let len = 1 + usize::from(has_payload) + usize::from(self.sender_id.is_some());

        let mut state = serializer.serialize_struct("Envelope", len)?;
        state.serialize_field("type", self.message.kind())?;
        match &self.message {
            Message::JoinGame(p) => state.serialize_field("payload", p)?,
            Message::RoomStatus(p) => state.serialize_field("payload", p)?,
            Message::GameStart(p) => state.serialize_field("payload", p)?,
            Message::PlayerLeft(p) => state.serialize_field("payload", p)?,
            Message::Relay {
                payload: Some(p), ..
            } => state.serialize_field("payload", p)?,
            _ => {}
        }
        if let Some(sender) = &self.sender_id {
            state.serialize_field("senderId", sender)?;
        }
        state.end()
    }
}
