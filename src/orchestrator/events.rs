//! Progress events emitted by the orchestrator.
//!
//! The orchestrator is the single producer; a presentation layer (progress
//! bar, log, test) is the single consumer. Events for one record arrive in
//! the order its phases happened.

use std::fmt;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::trace;

/// Where a record is in its workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Record picked up, nothing done yet.
    Pending,
    Searching,
    /// Search returned nothing usable.
    NoCandidates,
    /// A transfer attempt against one candidate is starting.
    Attempting,
    /// An attempt failed and will be repeated after a pause.
    Retrying,
    Succeeded,
    /// Every candidate failed.
    Exhausted,
    /// The file was fetched but could not be recorded as complete.
    StoreFailed,
    /// Cancellation stopped the record before a candidate succeeded.
    Cancelled,
}

impl Phase {
    /// Returns true for phases after which no more events follow for the
    /// record.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::NoCandidates
                | Self::Succeeded
                | Self::Exhausted
                | Self::StoreFailed
                | Self::Cancelled
        )
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::Searching => "searching",
            Self::NoCandidates => "no candidates",
            Self::Attempting => "attempting",
            Self::Retrying => "retrying",
            Self::Succeeded => "succeeded",
            Self::Exhausted => "exhausted",
            Self::StoreFailed => "store failed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// One step of progress for one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    pub record_id: u32,
    pub phase: Phase,
    pub message: String,
}

/// Sending half of the event channel.
///
/// A disabled sender drops every event; a sender whose receiver is gone does
/// the same.
#[derive(Debug, Clone, Default)]
pub struct EventSender {
    tx: Option<UnboundedSender<ProgressEvent>>,
}

impl EventSender {
    /// Creates a connected sender/receiver pair.
    #[must_use]
    pub fn channel() -> (Self, UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    #[must_use]
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn emit(&self, record_id: u32, phase: Phase, message: impl Into<String>) {
        let Some(tx) = &self.tx else {
            return;
        };
        let event = ProgressEvent {
            record_id,
            phase,
            message: message.into(),
        };
        if tx.send(event).is_err() {
            trace!(record_id, %phase, "event receiver dropped");
        }
    }
}
