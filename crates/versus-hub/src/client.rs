//! Per-client outbound queue.
//!
//! Every connected client owns one bounded queue. Many producers (the hub
//! loop, rooms, the client's own dispatcher) push through cloned
//! [`ClientHandle`]s; exactly one consumer, the connection's writer, drains
//! it through the [`Mailbox`].
//!
//! Closing is a separate signal rather than dropping senders, because
//! handles live on inside rooms and the registry after the hub decides the
//! client is gone.

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{Mutex, mpsc, watch};
use versus_protocol::{ClientId, Envelope};

use crate::hub::HubCommand;
use crate::{DeliveryError, Room};

/// Producer side of a client's outbound queue, plus its room back-reference.
///
/// Cheap to clone. All clones refer to the same client.
#[derive(Clone)]
pub struct ClientHandle {
    id: ClientId,
    outbox: mpsc::Sender<Envelope>,
    closed: Arc<watch::Sender<bool>>,
    room: Arc<Mutex<Option<Arc<Room>>>>,
    hub: mpsc::UnboundedSender<HubCommand>,
}

impl ClientHandle {
    /// The client's id.
    pub fn id(&self) -> ClientId {
        self.id
    }

    /// Enqueues an envelope without waiting.
    ///
    /// A full queue means the consumer has stalled: the client is closed
    /// and handed to the hub for unregistration instead of blocking the
    /// producer.
    pub fn send(&self, envelope: Envelope) -> Result<(), DeliveryError> {
        if self.is_closed() {
            return Err(DeliveryError::Closed(self.id));
        }
        match self.outbox.try_send(envelope) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                tracing::warn!(
                    client_id = %self.id,
                    "outbox full, disconnecting slow client"
                );
                self.close();
                let _ = self.hub.send(HubCommand::Unregister(self.id));
                Err(DeliveryError::Overflow(self.id))
            }
            Err(TrySendError::Closed(_)) => Err(DeliveryError::Closed(self.id)),
        }
    }

    /// Returns `true` once the client is being torn down.
    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    /// Resolves once the client is closed, immediately if it already is.
    ///
    /// Lets the connection's reader stop as soon as the hub drops the
    /// client, without waiting for the writer.
    pub async fn closed(&self) {
        let mut closed = self.closed.subscribe();
        // The sender lives in `self`, so this cannot fail.
        let _ = closed.wait_for(|closed| *closed).await;
    }

    /// The room this client currently plays in, if any.
    pub async fn room(&self) -> Option<Arc<Room>> {
        self.room.lock().await.clone()
    }

    /// Signals the writer to flush what is queued, send a close frame and
    /// stop. Idempotent.
    pub(crate) fn close(&self) {
        self.closed.send_replace(true);
    }

    pub(crate) async fn set_room(&self, room: Option<Arc<Room>>) {
        *self.room.lock().await = room;
    }
}

impl fmt::Debug for ClientHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientHandle")
            .field("id", &self.id)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

/// Consumer side of a client's outbound queue. Owned by the writer loop.
pub struct Mailbox {
    id: ClientId,
    inbox: mpsc::Receiver<Envelope>,
    closed: watch::Receiver<bool>,
}

impl Mailbox {
    /// The client's id.
    pub fn id(&self) -> ClientId {
        self.id
    }

    /// Waits for the next envelope.
    ///
    /// After the client is closed, returns whatever is still buffered and
    /// then `None`.
    pub async fn recv(&mut self) -> Option<Envelope> {
        if self.is_closed() {
            return self.inbox.try_recv().ok();
        }
        tokio::select! {
            biased;
            envelope = self.inbox.recv() => envelope,
            _ = self.closed.changed() => self.inbox.try_recv().ok(),
        }
    }

    /// Takes a buffered envelope without waiting.
    pub fn try_recv(&mut self) -> Option<Envelope> {
        self.inbox.try_recv().ok()
    }

    /// Returns `true` once the hub has closed this client.
    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }
}

/// Creates a connected handle/mailbox pair for `id`.
pub(crate) fn channel(
    id: ClientId,
    capacity: usize,
    hub: mpsc::UnboundedSender<HubCommand>,
) -> (ClientHandle, Mailbox) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let (closed_tx, closed_rx) = watch::channel(false);
    let handle = ClientHandle {
        id,
        outbox: tx,
        closed: Arc::new(closed_tx),
        room: Arc::new(Mutex::new(None)),
        hub,
    };
    let mailbox = Mailbox {
        id,
        inbox: rx,
        closed: closed_rx,
    };
    (handle, mailbox)
}
