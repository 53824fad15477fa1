//! Standalone Versus relay.
//!
//! Configured through `VERSUS_*` environment variables (see
//! `ServerConfig::from_env`) and `RUST_LOG`. Stops on Ctrl-C.
//!
//! ```text
//! VERSUS_BIND=0.0.0.0:8080 RUST_LOG=versus=debug cargo run -p relay-server
//! ```

use versus::prelude::*;

#[tokio::main]
async fn main() -> Result<(), VersusError> {
    versus::init_tracing("info");

    let config = ServerConfig::from_env()?;
    tracing::info!(
        bind = %config.bind_addr,
        max_clients = config.hub.max_clients,
        outbox_capacity = config.hub.outbox_capacity,
        waiting_timeout = ?config.hub.waiting_timeout,
        "starting relay"
    );

    let server = VersusServer::builder().config(config).build().await?;
    tracing::info!(addr = ?server.local_addr().ok(), "ready for players");

    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "could not listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        })
        .await
}
