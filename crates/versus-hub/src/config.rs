//! Hub configuration.

use std::time::Duration;

/// Default number of envelopes a client may have queued before it is
/// treated as a stalled consumer and disconnected.
pub const DEFAULT_OUTBOX_CAPACITY: usize = 256;

/// Default cap on concurrently registered clients.
pub const DEFAULT_MAX_CLIENTS: usize = 1024;

/// Limits and policies for one [`Hub`](crate::spawn_hub).
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Capacity of each client's outbound queue. A push onto a full queue
    /// force-disconnects that client. Clamped to at least 1.
    pub outbox_capacity: usize,

    /// Maximum registered clients. Registrations beyond it are refused.
    /// 0 means unlimited.
    pub max_clients: usize,

    /// How long a host may sit in the waiting slot before it is told
    /// `waiting_expired` and removed. `None` waits forever.
    pub waiting_timeout: Option<Duration>,

    /// Whether roomless clients get `room_status` notices as hosts come
    /// and go.
    pub announce_host: bool,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            outbox_capacity: DEFAULT_OUTBOX_CAPACITY,
            max_clients: DEFAULT_MAX_CLIENTS,
            waiting_timeout: None,
            announce_host: true,
        }
    }
}

impl HubConfig {
    /// Returns `true` if `registered` clients already fill the cap.
    pub fn is_full(&self, registered: usize) -> bool {
        self.max_clients != 0 && registered >= self.max_clients
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hub_config_default() {
        let config = HubConfig::default();
        assert_eq!(config.outbox_capacity, 256);
        assert_eq!(config.max_clients, 1024);
        assert!(config.waiting_timeout.is_none());
        assert!(config.announce_host);
    }

    #[test]
    fn test_zero_max_clients_is_unlimited() {
        let config = HubConfig {
            max_clients: 0,
            ..HubConfig::default()
        };
        assert!(!config.is_full(1_000_000));

        let capped = HubConfig {
            max_clients: 2,
            ..HubConfig::default()
        };
        assert!(!capped.is_full(1));
        assert!(capped.is_full(2));
    }
}
