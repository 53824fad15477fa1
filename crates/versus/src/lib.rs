//! # Versus
//!
//! A WebSocket relay for head-to-head falling-block games.
//!
//! Clients connect, send `join_game`, and are paired first come, first
//! served into two-player rooms. The relay never simulates the game: it
//! forwards each player's `game_state`, `attack`, `game_over`, `pause` and
//! `resume` envelopes to the opponent, stamped with the sender's id.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use versus::prelude::*;
//!
//! # async fn start() -> Result<(), VersusError> {
//! versus::init_tracing("info");
//! let server = VersusServer::builder()
//!     .config(ServerConfig::from_env()?)
//!     .build()
//!     .await?;
//! server.run_until(async { let _ = tokio::signal::ctrl_c().await; }).await
//! # }
//! ```

mod config;
mod error;
mod logging;
mod pump;
mod server;

pub use config::{DEFAULT_BIND_ADDR, ServerConfig};
pub use error::VersusError;
pub use logging::init_tracing;
pub use server::{VersusServer, VersusServerBuilder};

pub use versus_hub as hub;
pub use versus_protocol as protocol;
pub use versus_transport as transport;

/// Re-exports everything needed to run and observe a relay.
pub mod prelude {
    pub use crate::{ServerConfig, VersusError, VersusServer, VersusServerBuilder};
    pub use versus_hub::{HubConfig, HubHandle, HubStats};
    pub use versus_protocol::{
        AttackMode, ClientId, Codec, Envelope, GameSettings, GameStart, JoinRequest,
        JsonCodec, Message, RelayKind, RoomId,
    };
}
