//! The serialized write path.
//!
//! Both the read path and the heartbeat task write to the connection; the
//! wire serializes them behind one async lock and guards every write with
//! the closed flag so nothing is written after a close has gone out.

use std::sync::atomic::{AtomicBool, Ordering};

use futures::{Sink, SinkExt};
use tokio::sync::Mutex;

use riptide_proto::{CloseCode, Payload};

use crate::error::GatewayError;
use crate::transport::{Frame, TransportError};

/// Shared writer for one connection.
#[derive(Debug)]
pub(crate) struct Wire<Tx> {
    tx: Mutex<Tx>,
    closed: AtomicBool,
}

impl<Tx> Wire<Tx>
where
    Tx: Sink<Frame, Error = TransportError> + Unpin + Send,
{
    pub(crate) fn new(tx: Tx) -> Self {
        Self {
            tx: Mutex::new(tx),
            closed: AtomicBool::new(false),
        }
    }

    /// Whether a close has been written or observed.
    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Record a close performed by the peer, without writing anything.
    pub(crate) fn mark_closed(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    /// Serialize and write one payload.
    ///
    /// # Errors
    ///
    /// Fails with [`GatewayError::Closed`] once the close flag is set;
    /// transport failures keep their underlying cause.
    pub(crate) async fn send(&self, payload: &Payload) -> Result<(), GatewayError> {
        if self.is_closed() {
            return Err(GatewayError::Closed);
        }
        let json = payload.to_json()?;
        let mut tx = self.tx.lock().await;
        // A close may have won the race while we waited for the lock.
        if self.is_closed() {
            return Err(GatewayError::Closed);
        }
        tx.send(Frame::Message(json))
            .await
            .map_err(GatewayError::Transport)
    }

    /// Write a close frame, transitioning the closed flag exactly once.
    ///
    /// # Errors
    ///
    /// Fails with [`GatewayError::Closed`] when a close already happened;
    /// transport failures keep their underlying cause (the flag stays
    /// set either way).
    pub(crate) async fn send_close(&self, code: CloseCode) -> Result<(), GatewayError> {
        if self
            .closed
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(GatewayError::Closed);
        }
        let mut tx = self.tx.lock().await;
        tx.send(Frame::Close {
            code: code.as_u16(),
            reason: String::new(),
        })
        .await
        .map_err(GatewayError::Transport)
    }
}
