use crate::errors::TurnFailure;
use crate::model::{ModelRef, ProviderId};

/// Lifecycle state of one streaming turn.
///
/// `Completed`, `Cancelled`, and `Error` are terminal; a terminal turn never
/// transitions again. Starting over means creating a new `TurnStream`, never
/// mutating a finished one.
#[derive(Clone, Copy, Debug, Eq, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum TurnStatus {
    /// Built but not yet streaming.
    Idle,
    /// Request in flight, deltas arriving.
    Streaming,
    /// Stream finished with the `[DONE]` sentinel.
    Completed,
    /// Caller cancelled the turn; not an error.
    Cancelled,
    /// Transport, provider, or protocol failure.
    Error,
}

impl TurnStatus {
    /// Returns true for `Completed`, `Cancelled`, and `Error`.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Error)
    }
}

/// Normalized stream events exposed by `TurnStream`.
#[derive(Clone, Debug, PartialEq)]
pub enum StreamEvent {
    /// First event for every turn.
    TurnStarted {
        turn_id: uuid::Uuid,
        conversation_id: uuid::Uuid,
        provider: ProviderId,
        model: String,
    },
    /// Incremental assistant text fragment, applied in arrival order.
    ContentDelta {
        turn_id: uuid::Uuid,
        seq: u64,
        text: String,
    },
    /// Terminal success event carrying the full accumulated transcript.
    Completed {
        turn_id: uuid::Uuid,
        content: String,
        finish_reason: Option<String>,
    },
    /// Terminal cancellation event; carries no message by design.
    Cancelled { turn_id: uuid::Uuid },
    /// Terminal failure event.
    Error {
        turn_id: uuid::Uuid,
        failure: TurnFailure,
    },
}

impl StreamEvent {
    /// Returns true for the three terminal variants.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed { .. } | Self::Cancelled { .. } | Self::Error { .. }
        )
    }
}

/// Final result of a turn, produced exactly once per turn regardless of
/// which terminal state was reached.
///
/// `content` holds whatever accumulated before the terminal transition, so a
/// cancelled turn still exposes its partial transcript.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TurnOutcome {
    /// Model the turn ran against.
    pub model: ModelRef,
    /// Terminal status (`Completed`, `Cancelled`, or `Error`).
    pub status: TurnStatus,
    /// Accumulated assistant text, possibly partial.
    pub content: String,
    /// Failure detail, present only when `status == Error`.
    pub failure: Option<TurnFailure>,
    /// Vendor finish reason when the provider reported one.
    pub finish_reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_statuses_are_terminal() {
        assert!(TurnStatus::Completed.is_terminal());
        assert!(TurnStatus::Cancelled.is_terminal());
        assert!(TurnStatus::Error.is_terminal());
        assert!(!TurnStatus::Idle.is_terminal());
        assert!(!TurnStatus::Streaming.is_terminal());
    }

    #[test]
    fn cancelled_event_carries_no_failure() {
        let event = StreamEvent::Cancelled {
            turn_id: uuid::Uuid::new_v4(),
        };
        assert!(event.is_terminal());
    }
}
