//! Unified error type for the Versus relay.

use versus_hub::HubError;
use versus_protocol::ProtocolError;
use versus_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each layer's variant lets `?` convert
/// sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum VersusError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The hub has stopped.
    #[error(transparent)]
    Hub(#[from] HubError),

    /// An environment variable held a value that could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(String),
}
