//! Error types for the hub layer.

use versus_protocol::ClientId;

/// Errors returned to callers of [`HubHandle`](crate::HubHandle).
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    /// The hub's control loop has stopped (shutdown or task gone).
    #[error("hub is unavailable")]
    Unavailable,
}

/// Why a single envelope did not reach a single client.
///
/// Delivery failures are per-recipient: they never abort delivery to
/// anyone else and are never reported back to the sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    /// The client's outbound queue was full. The client has been closed
    /// and scheduled for unregistration.
    #[error("outbox of client {0} overflowed")]
    Overflow(ClientId),

    /// The client is already being torn down.
    #[error("client {0} is closed")]
    Closed(ClientId),
}
