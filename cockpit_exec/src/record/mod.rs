//! # Recording session management
//!
//! Tracks the vehicle's video recording session, issuing start and stop requests on behalf of the
//! operator and reconciling the local belief with the vehicle's acknowledgements and current
//! session reports.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod state;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Serialize;
use uuid::Uuid;

use comms_if::{net::TransportError, trident::VideoSessionResponse};

pub use state::*;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Recording state as seen by the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RecordingState {
    Idle,
    PendingStart,
    Recording,
    PendingStop,
}

/// Reason a recording request was rejected by the vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RejectReason {
    Generic,
    InvalidSession,
    InProgress,
    NoSpace,
}

/// Result of the operator toggling the recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    /// A start request was sent for the new session.
    StartRequested(Uuid),

    /// A stop request was sent for the current session.
    StopRequested(Uuid),

    /// A request is already awaiting its acknowledgement, nothing was sent.
    NotReady(RecordingState),
}

#[derive(Debug, thiserror::Error)]
pub enum RecordingError {
    #[error("Could not send the recording request: {0}")]
    PublishError(TransportError),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl RecordingState {
    pub fn is_pending(&self) -> bool {
        matches!(self, RecordingState::PendingStart | RecordingState::PendingStop)
    }
}

impl std::fmt::Display for RecordingState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RecordingState::Idle => "idle",
            RecordingState::PendingStart => "starting",
            RecordingState::Recording => "recording",
            RecordingState::PendingStop => "stopping",
        };
        write!(f, "{}", s)
    }
}

impl RejectReason {
    /// The rejection reason carried by a response, or `None` if it isn't a rejection.
    pub fn from_response(response: VideoSessionResponse) -> Option<Self> {
        match response {
            VideoSessionResponse::RejectedGeneric => Some(RejectReason::Generic),
            VideoSessionResponse::RejectedInvalidSession => Some(RejectReason::InvalidSession),
            VideoSessionResponse::RejectedSessionInProgress => Some(RejectReason::InProgress),
            VideoSessionResponse::RejectedNoSpace => Some(RejectReason::NoSpace),
            VideoSessionResponse::Unknown | VideoSessionResponse::Accepted => None,
        }
    }

    /// True if the operator must be notified of this rejection.
    pub fn is_user_facing(&self) -> bool {
        matches!(self, RejectReason::InProgress | RejectReason::NoSpace)
    }

    /// Notice shown to the operator.
    pub fn message(&self) -> &'static str {
        match self {
            RejectReason::Generic => "Recording request rejected",
            RejectReason::InvalidSession => "Invalid recording session",
            RejectReason::InProgress => "Already in progress",
            RejectReason::NoSpace => "No space left",
        }
    }
}
