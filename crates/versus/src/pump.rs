//! Per-connection pump: moves frames between one socket and the hub.
//!
//! Each accepted connection gets two tasks:
//!   1. Reader (this task): recv frame → decode → [`dispatch`]
//!   2. Writer (spawned): [`Mailbox`] → encode → text frame
//!
//! Either side ending ends the other, and so does the hub closing the
//! client. The client is unregistered exactly once, by [`UnregisterGuard`],
//! however the reader exits.

use std::sync::Arc;
use std::time::Duration;

use versus_hub::{HubHandle, Mailbox, dispatch};
use versus_protocol::{ClientId, Codec, Envelope};
use versus_transport::{Connection, WebSocketConnection};

use crate::VersusError;

/// How long the writer gets to flush and send a close frame once the reader
/// has stopped. A peer that stopped reading can stall a socket write
/// forever; past this the connection is dropped instead.
pub(crate) const CLOSE_GRACE: Duration = Duration::from_secs(1);

/// Drop guard that unregisters the client when the reader exits.
///
/// Unregistering only enqueues a hub command, so it can run synchronously
/// inside `Drop`, including during a panic.
struct UnregisterGuard {
    client_id: ClientId,
    hub: HubHandle,
}

impl Drop for UnregisterGuard {
    fn drop(&mut self) {
        let _ = self.hub.unregister(self.client_id);
    }
}

/// Handles a single connection from registration to close.
pub(crate) async fn pump<C>(
    conn: WebSocketConnection,
    hub: HubHandle,
    codec: C,
) -> Result<(), VersusError>
where
    C: Codec + Clone,
{
    let conn_id = conn.id();
    let client_id = ClientId::new(conn_id.into_inner());
    let (client, mailbox) = hub.connect(client_id)?;
    let guard = UnregisterGuard {
        client_id,
        hub: hub.clone(),
    };
    tracing::debug!(%conn_id, %client_id, "connection pump started");

    let conn = Arc::new(conn);
    let mut writer = tokio::spawn(write_loop(Arc::clone(&conn), mailbox, codec.clone()));
    let mut writer_done = false;

    loop {
        let frame = tokio::select! {
            frame = conn.recv() => frame,
            _ = &mut writer => {
                writer_done = true;
                break;
            }
            () = client.closed() => {
                tracing::debug!(%client_id, "client closed by hub");
                break;
            }
        };
        let data = match frame {
            Ok(Some(data)) => data,
            Ok(None) => {
                tracing::info!(%client_id, "connection closed cleanly");
                break;
            }
            Err(e) => {
                tracing::debug!(%client_id, error = %e, "recv error");
                break;
            }
        };

        let envelope: Envelope = match codec.decode(&data) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::debug!(%client_id, error = %e, "dropping malformed frame");
                continue;
            }
        };

        if let Err(e) = dispatch(&client, &hub, envelope).await {
            tracing::debug!(%client_id, error = %e, "hub gone, closing connection");
            break;
        }
    }

    // Unregistering closes the mailbox, which lets the writer flush and stop.
    drop(guard);
    drop(client);
    if !writer_done && tokio::time::timeout(CLOSE_GRACE, &mut writer).await.is_err() {
        tracing::info!(%client_id, "writer stalled, dropping connection");
        writer.abort();
        let _ = writer.await;
    }
    tracing::debug!(%client_id, "connection pump finished");
    Ok(())
}

/// Drains the client's mailbox onto the socket, then sends a close frame.
async fn write_loop<C: Codec>(conn: Arc<WebSocketConnection>, mut mailbox: Mailbox, codec: C) {
    let client_id = mailbox.id();

    while let Some(envelope) = mailbox.recv().await {
        let bytes = match codec.encode(&envelope) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(%client_id, kind = envelope.kind(), error = %e, "encode failed");
                continue;
            }
        };
        let sent = match std::str::from_utf8(&bytes) {
            Ok(text) => conn.send_text(text).await,
            Err(_) => conn.send(&bytes).await,
        };
        if let Err(e) = sent {
            tracing::debug!(%client_id, error = %e, "write failed, stopping writer");
            return;
        }
    }

    if let Err(e) = conn.close().await {
        tracing::trace!(%client_id, error = %e, "close frame not sent");
    }
}
