//! Per-player join data and the rules a match is played under.

use versus_protocol::{ClientId, GameSettings, JoinRequest, MatchRules};

/// Longest display name kept, in characters.
pub const MAX_NAME_LEN: usize = 32;

/// What the hub remembers about a player once it has joined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerProfile {
    pub name: String,
    pub settings: GameSettings,
}

impl PlayerProfile {
    /// Applies defaults to everything the join request left out.
    pub fn from_request(id: ClientId, request: JoinRequest) -> Self {
        let defaults = GameSettings::default();
        let settings = GameSettings {
            attack_mode: request.attack_mode.unwrap_or(defaults.attack_mode),
            show_ghost_piece: request.show_ghost_piece.unwrap_or(defaults.show_ghost_piece),
            effect_type: request
                .effect_type
                .filter(|e| !e.trim().is_empty())
                .unwrap_or(defaults.effect_type),
            use_cascade_gravity: request
                .use_cascade_gravity
                .unwrap_or(defaults.use_cascade_gravity),
            allow_hold_piece: request.allow_hold_piece.unwrap_or(defaults.allow_hold_piece),
            increase_gravity: request.increase_gravity.unwrap_or(defaults.increase_gravity),
        };
        Self {
            name: display_name(id, request.name.as_deref()),
            settings,
        }
    }
}

/// Trims and truncates `requested`, falling back to `Player <id suffix>`.
pub fn display_name(id: ClientId, requested: Option<&str>) -> String {
    match requested.map(str::trim).filter(|n| !n.is_empty()) {
        Some(name) => name.chars().take(MAX_NAME_LEN).collect(),
        None => {
            let id = id.to_string();
            let suffix = &id[id.len().saturating_sub(4)..];
            format!("Player {suffix}")
        }
    }
}

/// Reconciles both players' shared rules into one. The host wins every
/// conflict.
pub fn negotiate(host: &GameSettings, joiner: &GameSettings) -> MatchRules {
    let rules = host.rules();
    if rules != joiner.rules() {
        tracing::debug!(
            host_mode = rules.attack_mode.as_str(),
            joiner_mode = joiner.attack_mode.as_str(),
            "joiner rules differ, host settings apply"
        );
    }
    rules
}
