//! The heartbeat liveness task.
//!
//! Spawned once Hello is processed, with the interval the gateway
//! negotiated. Each tick the task checks-and-clears the ack flag: a clear
//! flag means the previous beat was never acknowledged, so the task
//! writes a restart close and cancels the session's token to unblock the
//! read path. Heartbeats bypass every rate limiter.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::Sink;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use riptide_proto::{CloseCode, Payload};

use crate::sequence::SequenceTracker;
use crate::transport::{Frame, TransportError};
use crate::wire::Wire;

/// Spawn the heartbeat task for one connection.
///
/// `acked` must start `true`; the gateway's HeartbeatAck handler sets it
/// back to `true` after every beat. Cancelling `cancel` stops the task
/// without writing; the task itself cancels the token when it tears the
/// connection down.
pub(crate) fn spawn<Tx>(
    wire: Arc<Wire<Tx>>,
    tracker: SequenceTracker,
    interval: Duration,
    acked: Arc<AtomicBool>,
    cancel: CancellationToken,
) -> JoinHandle<()>
where
    Tx: Sink<Frame, Error = TransportError> + Unpin + Send + 'static,
{
    tokio::spawn(run(wire, tracker, interval, acked, cancel))
}

async fn run<Tx>(
    wire: Arc<Wire<Tx>>,
    tracker: SequenceTracker,
    interval: Duration,
    acked: Arc<AtomicBool>,
    cancel: CancellationToken,
)
where
    Tx: Sink<Frame, Error = TransportError> + Unpin + Send,
{
    // Spread sessions sharing a process across the interval so their
    // beats do not synchronize.
    let jitter = interval.mul_f64(rand::random::<f64>());
    tokio::select! {
        () = cancel.cancelled() => return,
        () = sleep(jitter) => {}
    }

    loop {
        // An ack must have arrived since the previous beat.
        if !acked.swap(false, Ordering::SeqCst) {
            warn!("heartbeat ack missed, tearing down for resume");
            teardown(&wire, &cancel).await;
            return;
        }

        let sequence = tracker.last();
        if let Err(e) = wire.send(&Payload::heartbeat(sequence)).await {
            if wire.is_closed() {
                debug!("session closed before heartbeat, exiting");
            } else {
                warn!(error = %e, "heartbeat send failed, tearing down");
            }
            teardown(&wire, &cancel).await;
            return;
        }
        debug!(sequence, "heartbeat sent");

        tokio::select! {
            () = cancel.cancelled() => return,
            () = sleep(interval) => {}
        }
    }
}

async fn teardown<Tx>(wire: &Wire<Tx>, cancel: &CancellationToken)
where
    Tx: Sink<Frame, Error = TransportError> + Unpin + Send,
{
    // Best effort: the close write can itself fail on a dead peer. The
    // cancellation forces the read path off its blocking receive either
    // way.
    let _ = wire.send_close(CloseCode::ServiceRestart).await;
    cancel.cancel();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{channel_transport, recv_frame};
    use futures::StreamExt;
    use riptide_proto::Opcode;

    fn wire() -> (
        Arc<Wire<futures::stream::SplitSink<crate::test_support::ChannelTransport, Frame>>>,
        futures::channel::mpsc::UnboundedReceiver<Frame>,
    ) {
        let (transport, _inject, outbound) = channel_transport();
        let (tx, _rx) = transport.split();
        (Arc::new(Wire::new(tx)), outbound)
    }

    fn parse_op(frame: &Frame) -> Opcode {
        match frame {
            Frame::Message(text) => Payload::from_json(text).expect("bad payload").op,
            Frame::Close { .. } => panic!("expected a message frame"),
        }
    }

    #[tokio::test]
    async fn test_sends_heartbeat_with_current_sequence() {
        let (wire, mut outbound) = wire();
        let tracker = SequenceTracker::new(41);
        let acked = Arc::new(AtomicBool::new(true));
        let cancel = CancellationToken::new();

        let task = spawn(
            wire,
            tracker,
            Duration::from_millis(20),
            acked,
            cancel.clone(),
        );

        let frame = recv_frame(&mut outbound).await;
        match &frame {
            Frame::Message(text) => {
                let payload = Payload::from_json(text).unwrap();
                assert_eq!(payload.op, Opcode::Heartbeat);
                assert_eq!(payload.d, serde_json::json!(41));
            }
            Frame::Close { .. } => panic!("expected a heartbeat"),
        }

        cancel.cancel();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_keeps_beating_while_acks_arrive() {
        let (wire, mut outbound) = wire();
        let acked = Arc::new(AtomicBool::new(true));
        let cancel = CancellationToken::new();

        let task = spawn(
            wire,
            SequenceTracker::new(0),
            Duration::from_millis(10),
            Arc::clone(&acked),
            cancel.clone(),
        );

        for _ in 0..3 {
            let frame = recv_frame(&mut outbound).await;
            assert_eq!(parse_op(&frame), Opcode::Heartbeat);
            // Acknowledge every beat so the task keeps going.
            acked.store(true, Ordering::SeqCst);
        }

        cancel.cancel();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_missed_ack_writes_restart_close() {
        let (wire, mut outbound) = wire();
        let acked = Arc::new(AtomicBool::new(true));
        let cancel = CancellationToken::new();

        let task = spawn(
            wire,
            SequenceTracker::new(0),
            Duration::from_millis(10),
            acked,
            cancel.clone(),
        );

        // First beat goes out; the ack never arrives.
        let first = recv_frame(&mut outbound).await;
        assert_eq!(parse_op(&first), Opcode::Heartbeat);

        // The very next tick detects the miss: restart close, no second beat.
        let second = recv_frame(&mut outbound).await;
        assert_eq!(
            second,
            Frame::Close {
                code: 1012,
                reason: String::new()
            }
        );

        task.await.unwrap();
        assert!(cancel.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancellation_stops_without_writing() {
        let (wire, mut outbound) = wire();
        let acked = Arc::new(AtomicBool::new(true));
        let cancel = CancellationToken::new();

        let task = spawn(
            wire,
            SequenceTracker::new(0),
            // Long interval: the task sits in its jitter sleep.
            Duration::from_secs(3600),
            acked,
            cancel.clone(),
        );

        cancel.cancel();
        task.await.unwrap();

        assert!(
            tokio::time::timeout(Duration::from_millis(50), outbound.next())
                .await
                .is_err(),
            "no frame should have been written"
        );
    }

    #[tokio::test]
    async fn test_exits_when_session_already_closed() {
        let (wire, mut outbound) = wire();
        wire.mark_closed();
        let acked = Arc::new(AtomicBool::new(true));
        let cancel = CancellationToken::new();

        let task = spawn(
            wire,
            SequenceTracker::new(0),
            Duration::from_millis(5),
            acked,
            cancel.clone(),
        );

        task.await.unwrap();
        assert!(cancel.is_cancelled());
        assert!(
            tokio::time::timeout(Duration::from_millis(50), outbound.next())
                .await
                .is_err(),
            "a closed session must not be written to"
        );
    }
}
