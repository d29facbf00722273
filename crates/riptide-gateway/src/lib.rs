//! # riptide-gateway
//!
//! Connection core for the Riptide gateway client: the session lifecycle
//! state machine, sequence bookkeeping, heartbeat liveness, resume and
//! identify handshakes, and outbound-command admission control.
//!
//! A [`Session`] wraps one established [`transport::Transport`] (usually
//! [`transport::ws::connect`]) and is driven by the caller:
//!
//! ```no_run
//! use riptide_gateway::{Config, Session};
//! use riptide_proto::Intents;
//!
//! # async fn example() -> Result<(), riptide_gateway::GatewayError> {
//! let transport = riptide_gateway::transport::ws::connect("wss://gateway.example.com").await?;
//! let config = Config::new("bot-token").with_intents(Intents::GUILD_MESSAGES);
//! let mut session = Session::new(transport, config, |event: riptide_gateway::DispatchEvent| {
//!     println!("{:?}", event.event);
//! })?;
//!
//! let error = session.run().await;
//! if error.can_resume() {
//!     // Redial with `session.resume_state()` carried into the next config.
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
mod heartbeat;
pub mod limiter;
pub mod sequence;
pub mod session;
pub mod transport;
mod wire;

#[cfg(test)]
mod test_support;

pub use config::{CommandRateLimit, Config, IdentifyRateLimit, PriorSession};
pub use error::GatewayError;
pub use limiter::{Acquire, TokenBucket};
pub use sequence::SequenceTracker;
pub use session::{DispatchEvent, EventHandler, ResumeState, Session, SessionState};
pub use transport::{Frame, Transport, TransportError};
