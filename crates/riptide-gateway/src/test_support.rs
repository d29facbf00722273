//! In-memory transport for unit tests.

use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::channel::mpsc;
use futures::{Sink, Stream, StreamExt};

use crate::transport::{Frame, TransportError};

/// A channel-backed transport: injected frames come out of the stream
/// side, sunk frames land on an inspectable receiver.
pub(crate) struct ChannelTransport {
    rx: mpsc::UnboundedReceiver<Result<Frame, TransportError>>,
    tx: mpsc::UnboundedSender<Frame>,
}

/// Build a transport plus its test-side handles: a sender that injects
/// inbound frames and a receiver that observes outbound frames.
pub(crate) fn channel_transport() -> (
    ChannelTransport,
    mpsc::UnboundedSender<Result<Frame, TransportError>>,
    mpsc::UnboundedReceiver<Frame>,
) {
    let (inject_tx, inject_rx) = mpsc::unbounded();
    let (out_tx, out_rx) = mpsc::unbounded();
    (
        ChannelTransport {
            rx: inject_rx,
            tx: out_tx,
        },
        inject_tx,
        out_rx,
    )
}

impl Stream for ChannelTransport {
    type Item = Result<Frame, TransportError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.rx).poll_next(cx)
    }
}

impl Sink<Frame> for ChannelTransport {
    type Error = TransportError;

    fn poll_ready(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Pin::new(&mut self.tx)
            .poll_ready(cx)
            .map_err(|_| TransportError::Closed)
    }

    fn start_send(mut self: Pin<&mut Self>, frame: Frame) -> Result<(), Self::Error> {
        Pin::new(&mut self.tx)
            .start_send(frame)
            .map_err(|_| TransportError::Closed)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Pin::new(&mut self.tx)
            .poll_flush(cx)
            .map_err(|_| TransportError::Closed)
    }

    fn poll_close(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Pin::new(&mut self.tx)
            .poll_close(cx)
            .map_err(|_| TransportError::Closed)
    }
}

/// Receive the next outbound frame, panicking after a short timeout.
pub(crate) async fn recv_frame(rx: &mut mpsc::UnboundedReceiver<Frame>) -> Frame {
    tokio::time::timeout(Duration::from_secs(1), rx.next())
        .await
        .expect("timed out waiting for outbound frame")
        .expect("transport dropped")
}
