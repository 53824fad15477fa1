//! Identity and payload types that travel inside an [`Envelope`](crate::Envelope).
//!
//! Field names follow the browser client's camelCase convention; every
//! struct here carries `#[serde(rename_all = "camelCase")]`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::value::RawValue;

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Opaque identity of one connected client.
///
/// Assigned when the connection is accepted and never reused while the
/// process runs. Registries key on this instead of on object identity.
/// On the wire it is an 8+ digit lowercase hex string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(u64);

impl ClientId {
    /// Wraps a raw id.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08x}", self.0)
    }
}

impl FromStr for ClientId {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        u64::from_str_radix(s, 16)
            .map(Self)
            .map_err(|_| ProtocolError::InvalidMessage(format!("bad client id {s:?}")))
    }
}

impl Serialize for ClientId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ClientId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Identity of one two-party room. Serialized as `room-<n>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoomId(u64);

impl RoomId {
    /// Wraps a raw id.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "room-{}", self.0)
    }
}

impl FromStr for RoomId {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.strip_prefix("room-")
            .and_then(|n| n.parse().ok())
            .map(Self)
            .ok_or_else(|| ProtocolError::InvalidMessage(format!("bad room id {s:?}")))
    }
}

impl Serialize for RoomId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for RoomId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Game configuration
// ---------------------------------------------------------------------------

/// How cleared lines hurt the opponent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AttackMode {
    /// Send garbage rows to the opponent.
    #[default]
    Garbage,
    /// Send cleared lines as-is.
    Lines,
}

impl AttackMode {
    /// Wire name of the mode.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Garbage => "garbage",
            Self::Lines => "lines",
        }
    }
}

impl FromStr for AttackMode {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "garbage" => Ok(Self::Garbage),
            "lines" => Ok(Self::Lines),
            other => Err(ProtocolError::InvalidMessage(format!(
                "unknown attack mode {other:?}"
            ))),
        }
    }
}

// Unknown modes from newer clients degrade to the default instead of
// failing the whole join frame.
impl<'de> Deserialize<'de> for AttackMode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(raw.parse().unwrap_or_default())
    }
}

/// Payload of `join_game`: everything the client may declare, all optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct JoinRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attack_mode: Option<AttackMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub show_ghost_piece: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effect_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_cascade_gravity: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_hold_piece: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub increase_gravity: Option<bool>,
}

/// A client's resolved configuration after defaults are applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSettings {
    pub attack_mode: AttackMode,
    pub show_ghost_piece: bool,
    pub effect_type: String,
    pub use_cascade_gravity: bool,
    pub allow_hold_piece: bool,
    pub increase_gravity: bool,
}

impl GameSettings {
    /// Visual effect used when a client does not pick one.
    pub const DEFAULT_EFFECT: &'static str = "explosion";

    /// The subset of settings both boards in a match must agree on.
    pub fn rules(&self) -> MatchRules {
        MatchRules {
            attack_mode: self.attack_mode,
            use_cascade_gravity: self.use_cascade_gravity,
            allow_hold_piece: self.allow_hold_piece,
            increase_gravity: self.increase_gravity,
        }
    }
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            attack_mode: AttackMode::Garbage,
            show_ghost_piece: true,
            effect_type: Self::DEFAULT_EFFECT.to_string(),
            use_cascade_gravity: false,
            allow_hold_piece: true,
            increase_gravity: true,
        }
    }
}

/// Authoritative shared rules for one match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchRules {
    pub attack_mode: AttackMode,
    pub use_cascade_gravity: bool,
    pub allow_hold_piece: bool,
    pub increase_gravity: bool,
}

// ---------------------------------------------------------------------------
// Server → client payloads
// ---------------------------------------------------------------------------

/// Payload of `game_start`, addressed to one of the two players.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStart {
    pub opponent_id: ClientId,
    pub opponent_name: String,
    pub match_id: RoomId,
    #[serde(flatten)]
    pub rules: MatchRules,
}

/// Payload of `room_status`: whether a host is waiting for an opponent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomStatus {
    pub has_host: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_settings: Option<GameSettings>,
}

impl RoomStatus {
    /// A host is waiting with these settings.
    pub fn hosted(settings: GameSettings) -> Self {
        Self {
            has_host: true,
            host_settings: Some(settings),
        }
    }

    /// Nobody is waiting.
    pub fn vacant() -> Self {
        Self {
            has_host: false,
            host_settings: None,
        }
    }
}

/// Payload of `player_left`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerLeft {
    pub id: ClientId,
}

// ---------------------------------------------------------------------------
// Relay payloads
// ---------------------------------------------------------------------------

/// Gameplay kinds the relay forwards between room members untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelayKind {
    GameState,
    Attack,
    GameOver,
    Pause,
    Resume,
}

impl RelayKind {
    /// Every relay kind, in wire order.
    pub const ALL: [RelayKind; 5] = [
        Self::GameState,
        Self::Attack,
        Self::GameOver,
        Self::Pause,
        Self::Resume,
    ];

    /// The `type` tag used on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::GameState => "game_state",
            Self::Attack => "attack",
            Self::GameOver => "game_over",
            Self::Pause => "pause",
            Self::Resume => "resume",
        }
    }

    /// Looks up a relay kind by its wire tag.
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == tag)
    }
}

impl fmt::Display for RelayKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A JSON value kept exactly as it arrived.
///
/// Relay payloads are never parsed, so forwarding preserves key order,
/// whitespace and number formatting byte for byte.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Opaque(Box<RawValue>);

impl Opaque {
    pub(crate) fn from_raw(raw: Box<RawValue>) -> Self {
        Self(raw)
    }

    /// The raw JSON text.
    pub fn as_str(&self) -> &str {
        self.0.get()
    }
}

impl PartialEq for Opaque {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Eq for Opaque {}
