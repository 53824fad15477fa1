//! `VersusServer` builder and accept loop.
//!
//! Ties the layers together: transport → protocol → hub.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use versus_hub::{HubConfig, HubHandle, spawn_hub};
use versus_protocol::{Codec, JsonCodec};
use versus_transport::{Transport, WebSocketTransport};

use crate::pump::pump;
use crate::{ServerConfig, VersusError};

/// Builder for configuring and starting a relay.
///
/// # Example
///
/// ```rust,no_run
/// use versus::prelude::*;
///
/// # async fn start() -> Result<(), VersusError> {
/// let server = VersusServer::builder()
///     .bind("0.0.0.0:8080")
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct VersusServerBuilder {
    config: ServerConfig,
}

impl VersusServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces every setting at once, e.g. with
    /// [`ServerConfig::from_env`].
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    /// Sets the hub's limits and policies.
    pub fn hub_config(mut self, config: HubConfig) -> Self {
        self.config.hub = config;
        self
    }

    /// Sets how long a new connection may take to finish the upgrade.
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.config.handshake_timeout = timeout;
        self
    }

    /// Binds the listener and starts the hub.
    ///
    /// # Errors
    /// [`VersusError::Transport`] if the address cannot be bound.
    pub async fn build(self) -> Result<VersusServer, VersusError> {
        let transport = WebSocketTransport::bind(&self.config.bind_addr)
            .await?
            .with_handshake_timeout(self.config.handshake_timeout);
        let (hub, hub_task) = spawn_hub(self.config.hub);

        Ok(VersusServer {
            transport,
            hub,
            hub_task,
            codec: JsonCodec,
        })
    }
}

/// A bound relay with a running hub.
///
/// Call [`run()`](Self::run) or [`run_until()`](Self::run_until) to start
/// accepting connections.
pub struct VersusServer<C: Codec = JsonCodec> {
    transport: WebSocketTransport,
    hub: HubHandle,
    hub_task: JoinHandle<()>,
    codec: C,
}

impl VersusServer {
    /// Creates a new builder.
    pub fn builder() -> VersusServerBuilder {
        VersusServerBuilder::new()
    }
}

impl<C: Codec + Clone> VersusServer<C> {
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// A handle to the hub, for stats, broadcasts or shutdown.
    pub fn hub(&self) -> HubHandle {
        self.hub.clone()
    }

    /// Runs the accept loop until the process is terminated.
    pub async fn run(self) -> Result<(), VersusError> {
        self.run_until(std::future::pending()).await
    }

    /// Runs the accept loop until `shutdown` completes, then stops the hub,
    /// which closes every client.
    ///
    /// A failed accept or upgrade only affects that connection.
    pub async fn run_until(
        mut self,
        shutdown: impl Future<Output = ()>,
    ) -> Result<(), VersusError> {
        tracing::info!(addr = ?self.local_addr().ok(), "Versus relay running");
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                () = &mut shutdown => break,
                accepted = self.transport.accept() => match accepted {
                    Ok(conn) => {
                        let hub = self.hub.clone();
                        let codec = self.codec.clone();
                        tokio::spawn(async move {
                            if let Err(e) = pump(conn, hub, codec).await {
                                tracing::debug!(
                                    error = %e,
                                    "connection ended with error"
                                );
                            }
                        });
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "accept failed");
                    }
                },
            }
        }

        tracing::info!("shutdown requested, stopping relay");
        self.transport.shutdown().await?;
        // The hub may already be gone; either way there is nothing left to stop.
        let _ = self.hub.shutdown();
        if let Err(e) = self.hub_task.await {
            tracing::error!(error = %e, "hub task failed");
        }
        Ok(())
    }
}
