//! Sequence-number bookkeeping.
//!
//! Dispatch payloads carry a monotonically non-decreasing sequence number
//! spanning resumes. The tracker classifies each payload: fresh (advance),
//! outdated (`s <= last`, no advance, still processed for side effects),
//! or skipped (a gap of more than one — events were lost and the caller
//! must force a restart-close).

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use riptide_proto::Payload;

use crate::error::GatewayError;

/// Tracks the last-seen sequence number for one logical session.
///
/// Clones share the counter, so the heartbeat task can read the current
/// value while the read path advances it.
#[derive(Debug, Clone)]
pub struct SequenceTracker {
    last: Arc<AtomicI64>,
}

impl SequenceTracker {
    /// Create a tracker, hydrated with a prior session's sequence when
    /// resuming (zero for a fresh session).
    #[must_use]
    pub fn new(initial: i64) -> Self {
        Self {
            last: Arc::new(AtomicI64::new(initial)),
        }
    }

    /// The last accepted sequence number.
    #[must_use]
    pub fn last(&self) -> i64 {
        self.last.load(Ordering::SeqCst)
    }

    /// Classify one payload and advance the counter when it is fresh.
    ///
    /// Returns `true` when the payload is outdated. Payloads without a
    /// sequence number are never outdated and never advance.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::SequenceSkipped`] when more than one event
    /// was lost; the caller must write a restart-close. The counter does
    /// not advance in that case.
    pub fn track(&self, payload: &Payload) -> Result<bool, GatewayError> {
        let Some(sequence) = payload.s else {
            return Ok(false);
        };

        let last = self.last.load(Ordering::SeqCst);
        if sequence <= last {
            return Ok(true);
        }
        if sequence - last > 1 {
            return Err(GatewayError::SequenceSkipped {
                expected: last + 1,
                actual: sequence,
            });
        }
        self.last.store(sequence, Ordering::SeqCst);
        Ok(false)
    }
}

impl Default for SequenceTracker {
    fn default() -> Self {
        Self::new(0)
    }
}
