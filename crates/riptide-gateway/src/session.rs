//! The connection lifecycle state machine.
//!
//! One `Session` owns one underlying connection. The caller drives the
//! read path by calling [`Session::read_next`] (or [`Session::run`]);
//! each call pulls one frame, decodes it, updates the sequence tracker,
//! and feeds the payload to the current state. The heartbeat task runs
//! independently once Hello is processed and only ever touches shared
//! flags and the write path; state transitions belong to the read path
//! alone.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{SplitSink, SplitStream};
use futures::StreamExt;
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use riptide_proto::{
    can_resume_raw, CloseCode, EventType, Hello, Identify, Intents, Opcode, Payload, ReadyData,
    Resume,
};

use crate::config::Config;
use crate::error::GatewayError;
use crate::heartbeat;
use crate::limiter::{Acquire, TokenBucket};
use crate::sequence::SequenceTracker;
use crate::transport::{Frame, Transport, TransportError};
use crate::wire::Wire;

/// How long the read path keeps reading after teardown began, to collect
/// the peer's close reply before giving up on the socket.
const FORCED_READ_TIMEOUT: Duration = Duration::from_millis(500);

/// Where a session stands in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Connected, waiting for the gateway's Hello.
    Hello,
    /// Identify or Resume sent, waiting for Ready or Resumed.
    Ready {
        /// Whether this handshake is a resume rather than a fresh identify.
        resuming: bool,
    },
    /// Handshake complete; events flowing.
    Connected,
    /// Closed for good; the session identity has been discarded.
    Closed,
    /// Closed, but the session may be resumed on a fresh connection.
    ResumableClosed,
}

impl SessionState {
    /// Whether no further payloads will be accepted.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed | Self::ResumableClosed)
    }

    /// Short name for diagnostics.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Hello => "hello",
            Self::Ready { .. } => "ready",
            Self::Connected => "connected",
            Self::Closed => "closed",
            Self::ResumableClosed => "resumable-closed",
        }
    }
}

/// A dispatch event delivered to the caller's handler.
#[derive(Debug, Clone)]
pub struct DispatchEvent {
    /// The event type.
    pub event: EventType,
    /// The sequence number it arrived with.
    pub sequence: i64,
    /// The event body.
    pub data: Value,
}

/// Receives dispatch events that pass the whitelist.
pub trait EventHandler: Send {
    /// Handle one event. Called from the read path, in arrival order.
    fn handle(&mut self, event: DispatchEvent);
}

impl<F> EventHandler for F
where
    F: FnMut(DispatchEvent) + Send,
{
    fn handle(&mut self, event: DispatchEvent) {
        self(event);
    }
}

/// Snapshot of everything needed to resume this session later.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumeState {
    /// The session id from the Ready event.
    pub session_id: String,
    /// The resume URL from the Ready event, if one was captured.
    pub resume_url: Option<String>,
    /// The last processed sequence number.
    pub sequence: i64,
}

/// Identity of one logical session, owned by exactly one `Session`.
#[derive(Debug, Clone)]
struct SessionIdentity {
    token: String,
    shard: [u32; 2],
    intents: Intents,
    session_id: Option<String>,
    resume_url: Option<String>,
}

/// One gateway connection and its session state machine.
pub struct Session<T, H>
where
    T: Transport + 'static,
    H: EventHandler,
{
    rx: SplitStream<T>,
    wire: Arc<Wire<SplitSink<T, Frame>>>,
    state: SessionState,
    identity: SessionIdentity,
    whitelist: Option<HashSet<EventType>>,
    tracker: SequenceTracker,
    acked: Arc<AtomicBool>,
    command_bucket: TokenBucket,
    identify_bucket: Arc<TokenBucket>,
    heartbeat: Option<JoinHandle<()>>,
    cancel: CancellationToken,
    config: Config,
    handler: H,
}

impl<T, H> Session<T, H>
where
    T: Transport + 'static,
    H: EventHandler,
{
    /// Build a session over an established transport.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when `config` does not validate.
    pub fn new(transport: T, config: Config, handler: H) -> Result<Self, GatewayError> {
        config.validate()?;
        let intents = config.effective_intents()?;

        let (session_id, resume_url, initial_sequence) = match &config.prior_session {
            Some(prior) => (
                Some(prior.session_id.clone()),
                prior.resume_url.clone(),
                prior.sequence,
            ),
            None => (None, None, 0),
        };

        let identity = SessionIdentity {
            token: config.token.clone(),
            shard: config.shard,
            intents,
            session_id,
            resume_url,
        };

        let (tx, rx) = transport.split();

        Ok(Self {
            rx,
            wire: Arc::new(Wire::new(tx)),
            state: SessionState::Hello,
            identity,
            whitelist: config.event_whitelist.clone(),
            tracker: SequenceTracker::new(initial_sequence),
            acked: Arc::new(AtomicBool::new(true)),
            command_bucket: TokenBucket::new(
                config.command_limit.capacity(),
                config.command_limit.window,
            ),
            // Identify pacing is per-process on the remote side; prefer a
            // bucket shared across this process's sessions when given one.
            identify_bucket: config.identify_bucket.clone().unwrap_or_else(|| {
                Arc::new(TokenBucket::new(
                    config.identify_limit.capacity,
                    config.identify_limit.window,
                ))
            }),
            heartbeat: None,
            cancel: CancellationToken::new(),
            config,
            handler,
        })
    }

    /// The current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// The last processed sequence number.
    #[must_use]
    pub fn sequence(&self) -> i64 {
        self.tracker.last()
    }

    /// The session id, once Ready has been observed.
    #[must_use]
    pub fn session_id(&self) -> Option<&str> {
        self.identity.session_id.as_deref()
    }

    /// Everything needed to resume this session on a new connection,
    /// when a session id is held.
    #[must_use]
    pub fn resume_state(&self) -> Option<ResumeState> {
        self.identity.session_id.clone().map(|session_id| ResumeState {
            session_id,
            resume_url: self.identity.resume_url.clone(),
            sequence: self.tracker.last(),
        })
    }

    /// Drive the read path until a fatal or resumable condition surfaces.
    pub async fn run(&mut self) -> GatewayError {
        loop {
            if let Err(e) = self.read_next().await {
                return e;
            }
        }
    }

    /// Pull the next frame and feed it through the state machine.
    ///
    /// # Errors
    ///
    /// Fails with [`GatewayError::Closed`] when the session is already
    /// closed; otherwise every fatal or resumable transition surfaces as
    /// the corresponding typed error.
    pub async fn read_next(&mut self) -> Result<(), GatewayError> {
        if self.state.is_terminal() {
            return Err(GatewayError::Closed);
        }

        let frame = if self.cancel.is_cancelled() {
            self.drain_read().await
        } else {
            let cancel = self.cancel.clone();
            let frame = tokio::select! {
                frame = self.rx.next() => Some(frame),
                () = cancel.cancelled() => None,
            };
            match frame {
                Some(frame) => frame,
                // Teardown began while we were blocked; one bounded read
                // collects the peer's close reply, then we give up.
                None => self.drain_read().await,
            }
        };

        let frame = match frame {
            Some(Ok(frame)) => frame,
            Some(Err(e)) => {
                // The socket died under us; the session may be resumed.
                self.wire.mark_closed();
                self.finish(true);
                return Err(e.into());
            }
            None => {
                self.wire.mark_closed();
                self.finish(true);
                return Err(TransportError::Closed.into());
            }
        };

        match frame {
            Frame::Close { code, reason } => self.on_remote_close(code, reason),
            Frame::Message(text) => {
                debug!(bytes = text.len(), "payload received");
                let payload = match Payload::from_json(&text) {
                    Ok(payload) => payload,
                    Err(e) => {
                        // The stream can no longer be trusted.
                        let _ = self.wire.send_close(CloseCode::Normal).await;
                        self.finish(false);
                        return Err(e.into());
                    }
                };

                let outdated = match self.tracker.track(&payload) {
                    Ok(outdated) => outdated,
                    Err(e) => {
                        // Events were lost; force a restart so the gateway
                        // replays them on resume.
                        let _ = self.wire.send_close(CloseCode::ServiceRestart).await;
                        self.finish(true);
                        return Err(e);
                    }
                };

                self.process(payload, outdated).await
            }
        }
    }

    /// Send an outbound command through the general rate limiter.
    ///
    /// # Errors
    ///
    /// Fails with [`GatewayError::Closed`] on a closed session, or with a
    /// transport error when the write fails.
    pub async fn send(&mut self, op: Opcode, data: Value) -> Result<(), GatewayError> {
        if self.state.is_terminal() {
            return Err(GatewayError::Closed);
        }
        self.command_bucket.acquire().await;
        self.wire.send(&Payload::command(op, data)).await
    }

    /// Close the session for good. The session identity is discarded.
    ///
    /// # Errors
    ///
    /// Returns the close-write error, if any; the session transitions to
    /// [`SessionState::Closed`] regardless.
    pub async fn close(&mut self) -> Result<(), GatewayError> {
        let result = self.wire.send_close(CloseCode::Normal).await;
        self.finish(false);
        result
    }

    /// Close the session so it can be resumed on a fresh connection.
    ///
    /// # Errors
    ///
    /// Returns the close-write error, if any; the session transitions to
    /// [`SessionState::ResumableClosed`] regardless.
    pub async fn close_for_resume(&mut self) -> Result<(), GatewayError> {
        let result = self.wire.send_close(CloseCode::ServiceRestart).await;
        self.finish(true);
        result
    }

    async fn drain_read(&mut self) -> Option<Result<Frame, TransportError>> {
        match tokio::time::timeout(FORCED_READ_TIMEOUT, self.rx.next()).await {
            Ok(frame) => frame,
            Err(_) => Some(Err(TransportError::Timeout)),
        }
    }

    /// Enter a terminal state and stop the heartbeat task.
    fn finish(&mut self, resumable: bool) {
        if resumable {
            self.state = SessionState::ResumableClosed;
        } else {
            self.identity.session_id = None;
            self.identity.resume_url = None;
            self.state = SessionState::Closed;
        }
        self.cancel.cancel();
        // The cancelled task winds down on its own; detach the handle.
        drop(self.heartbeat.take());
    }

    async fn process(&mut self, payload: Payload, outdated: bool) -> Result<(), GatewayError> {
        match self.state {
            SessionState::Hello => self.on_hello(payload).await,
            SessionState::Ready { .. } | SessionState::Connected => {
                self.on_payload(payload, outdated).await
            }
            SessionState::Closed | SessionState::ResumableClosed => Err(GatewayError::Closed),
        }
    }

    async fn on_hello(&mut self, payload: Payload) -> Result<(), GatewayError> {
        if payload.op != Opcode::Hello {
            let _ = self.wire.send_close(CloseCode::Normal).await;
            self.finish(false);
            return Err(GatewayError::UnexpectedOpcode {
                opcode: payload.op,
                state: "hello",
            });
        }

        let hello = match Hello::from_data(&payload.d) {
            Ok(hello) => hello,
            Err(e) => {
                let _ = self.wire.send_close(CloseCode::Normal).await;
                self.finish(false);
                return Err(e.into());
            }
        };

        let interval = Duration::from_millis(hello.heartbeat_interval);
        info!(interval_ms = hello.heartbeat_interval, "gateway hello");
        self.heartbeat = Some(heartbeat::spawn(
            Arc::clone(&self.wire),
            self.tracker.clone(),
            interval,
            Arc::clone(&self.acked),
            self.cancel.clone(),
        ));

        if self.identity.session_id.is_some() {
            self.send_resume().await
        } else {
            self.send_identify().await
        }
    }

    async fn send_identify(&mut self) -> Result<(), GatewayError> {
        // Identify slots are scarce; a denial ends this attempt rather
        // than stalling past the handshake window.
        if let Acquire::Denied { retry_after } = self.identify_bucket.try_acquire() {
            warn!(?retry_after, "identify rate limited");
            let _ = self.wire.send_close(CloseCode::Normal).await;
            self.finish(false);
            return Err(GatewayError::IdentifyRateLimited { retry_after });
        }

        self.command_bucket.acquire().await;

        let identify = Identify {
            token: self.identity.token.clone(),
            properties: self.config.properties.clone(),
            compress: self.config.compress,
            large_threshold: self.config.large_threshold,
            shard: self.identity.shard,
            presence: self.config.presence.clone(),
            intents: self.identity.intents,
        };
        self.wire.send(&Payload::identify(&identify)?).await?;

        debug!(shard = ?self.identity.shard, "identify sent");
        self.state = SessionState::Ready { resuming: false };
        Ok(())
    }

    async fn send_resume(&mut self) -> Result<(), GatewayError> {
        let resume = self.resume_command()?;
        self.command_bucket.acquire().await;
        self.wire.send(&Payload::resume(&resume)?).await?;

        debug!(session_id = %resume.session_id, seq = resume.seq, "resume sent");
        self.state = SessionState::Ready { resuming: true };
        Ok(())
    }

    fn resume_command(&self) -> Result<Resume, GatewayError> {
        let session_id = self
            .identity
            .session_id
            .clone()
            .ok_or(GatewayError::MissingSessionId)?;
        Ok(Resume {
            token: self.identity.token.clone(),
            session_id,
            seq: self.tracker.last(),
        })
    }

    async fn on_payload(&mut self, payload: Payload, outdated: bool) -> Result<(), GatewayError> {
        match payload.op {
            Opcode::Dispatch => self.on_dispatch(payload, outdated).await,
            Opcode::Heartbeat => {
                // An on-demand beat; liveness is never rate limited.
                debug!("heartbeat requested by gateway");
                self.wire.send(&Payload::heartbeat(self.tracker.last())).await
            }
            Opcode::HeartbeatAck => {
                self.acked.store(true, Ordering::SeqCst);
                Ok(())
            }
            Opcode::Reconnect => {
                info!("gateway requested reconnect");
                let _ = self.wire.send_close(CloseCode::ServiceRestart).await;
                self.finish(true);
                Err(GatewayError::ReconnectRequested)
            }
            Opcode::InvalidSession => {
                let resumable = payload.invalid_session_resumable();
                warn!(resumable, "session invalidated by gateway");
                let code = if resumable {
                    CloseCode::ServiceRestart
                } else {
                    CloseCode::Normal
                };
                let _ = self.wire.send_close(code).await;
                self.finish(resumable);
                Err(GatewayError::InvalidSession { resumable })
            }
            opcode => {
                // Includes a second Hello: a wrong opcode means the stream
                // is no longer trustworthy.
                let state = self.state.name();
                let _ = self.wire.send_close(CloseCode::Normal).await;
                self.finish(false);
                Err(GatewayError::UnexpectedOpcode { opcode, state })
            }
        }
    }

    async fn on_dispatch(&mut self, payload: Payload, outdated: bool) -> Result<(), GatewayError> {
        let Some(event) = payload.event_type() else {
            debug!(event = ?payload.t, "dropping unknown event");
            return Ok(());
        };
        let sequence = payload.s.unwrap_or_else(|| self.tracker.last());

        match event {
            EventType::Ready => {
                let ready = match ReadyData::from_data(&payload.d) {
                    Ok(ready) => ready,
                    Err(e) => {
                        let _ = self.wire.send_close(CloseCode::Normal).await;
                        self.finish(false);
                        return Err(e.into());
                    }
                };
                // Identity capture runs even for outdated payloads; only
                // the state transition is withheld.
                info!(session_id = %ready.session_id, "session ready");
                self.identity.session_id = Some(ready.session_id);
                self.identity.resume_url = Some(ready.resume_gateway_url);
                if !outdated && matches!(self.state, SessionState::Ready { .. }) {
                    self.state = SessionState::Connected;
                }
                self.handler.handle(DispatchEvent {
                    event,
                    sequence,
                    data: payload.d,
                });
                Ok(())
            }
            EventType::Resumed => {
                info!("session resumed");
                if !outdated && matches!(self.state, SessionState::Ready { .. }) {
                    self.state = SessionState::Connected;
                }
                self.handler.handle(DispatchEvent {
                    event,
                    sequence,
                    data: payload.d,
                });
                Ok(())
            }
            _ => {
                if outdated {
                    debug!(event = %event.name(), sequence, "dropping outdated event");
                    return Ok(());
                }
                if self
                    .whitelist
                    .as_ref()
                    .is_some_and(|whitelist| !whitelist.contains(&event))
                {
                    debug!(event = %event.name(), "event not whitelisted");
                    return Ok(());
                }
                self.handler.handle(DispatchEvent {
                    event,
                    sequence,
                    data: payload.d,
                });
                Ok(())
            }
        }
    }

    fn on_remote_close(&mut self, code: u16, reason: String) -> Result<(), GatewayError> {
        self.wire.mark_closed();
        let resumable = can_resume_raw(code);
        warn!(code, reason = %reason, resumable, "gateway closed the connection");
        self.finish(resumable);
        Err(GatewayError::CloseCode {
            code,
            reason,
            resumable,
        })
    }
}

impl<T, H> Drop for Session<T, H>
where
    T: Transport + 'static,
    H: EventHandler,
{
    fn drop(&mut self) {
        // The heartbeat task holds only shared handles; cancelling the
        // token is enough for it to exit.
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::channel_transport;

    fn noop_handler() -> impl EventHandler {
        |_event: DispatchEvent| {}
    }

    fn fresh_session() -> Session<crate::test_support::ChannelTransport, impl EventHandler> {
        let (transport, _inject, _outbound) = channel_transport();
        Session::new(
            transport,
            Config::new("token").with_intents(Intents::GUILD_MESSAGES),
            noop_handler(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_initial_state() {
        let session = fresh_session();
        assert_eq!(session.state(), SessionState::Hello);
        assert_eq!(session.sequence(), 0);
        assert!(session.session_id().is_none());
        assert!(session.resume_state().is_none());
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let (transport, _inject, _outbound) = channel_transport();
        let result = Session::new(transport, Config::new(""), noop_handler());
        assert!(matches!(result, Err(GatewayError::Config(_))));
    }

    #[tokio::test]
    async fn test_resume_rejected_without_session_id() {
        let (transport, _inject, _outbound) = channel_transport();
        // A sequence number alone is not enough to resume.
        let mut config = Config::new("token").with_intents(Intents::GUILD_MESSAGES);
        config.prior_session = None;
        let session = Session::new(transport, config, noop_handler()).unwrap();

        assert!(matches!(
            session.resume_command(),
            Err(GatewayError::MissingSessionId)
        ));
    }

    #[tokio::test]
    async fn test_prior_session_hydrates_identity() {
        let (transport, _inject, _outbound) = channel_transport();
        let config = Config::new("token")
            .with_intents(Intents::GUILD_MESSAGES)
            .with_prior_session(crate::config::PriorSession {
                session_id: "sess-9".to_string(),
                sequence: 123,
                resume_url: Some("wss://resume.example".to_string()),
            });
        let session = Session::new(transport, config, noop_handler()).unwrap();

        assert_eq!(session.sequence(), 123);
        assert_eq!(session.session_id(), Some("sess-9"));

        let resume = session.resume_command().unwrap();
        assert_eq!(resume.session_id, "sess-9");
        assert_eq!(resume.seq, 123);
    }

    #[tokio::test]
    async fn test_read_next_on_terminal_state_fails() {
        let mut session = fresh_session();
        session.finish(false);

        assert!(matches!(
            session.read_next().await,
            Err(GatewayError::Closed)
        ));
    }

    #[test]
    fn test_session_state_names() {
        assert_eq!(SessionState::Hello.name(), "hello");
        assert_eq!(SessionState::Ready { resuming: true }.name(), "ready");
        assert_eq!(SessionState::Connected.name(), "connected");
        assert!(SessionState::Closed.is_terminal());
        assert!(SessionState::ResumableClosed.is_terminal());
        assert!(!SessionState::Connected.is_terminal());
    }
}
