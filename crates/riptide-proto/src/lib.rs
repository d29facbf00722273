//! # riptide-proto
//!
//! Wire protocol definitions for the Riptide gateway client: the payload
//! envelope, opcode and close-code catalogs, the event catalog, and the
//! intent bitmask with its event relations.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod close;
pub mod error;
pub mod events;
pub mod intents;
pub mod payload;

pub use close::{can_resume_raw, CloseCode};
pub use error::ProtoError;
pub use events::EventType;
pub use intents::{derive_from_event_lists, unreachable_events, Intents};
pub use payload::{ConnectionProperties, Hello, Identify, Opcode, Payload, ReadyData, Resume};
