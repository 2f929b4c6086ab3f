//! State machine for the answer cycle
//!
//! Success path: Idle → Building → Streaming → Persisting →
//! DirectiveHandling → Idle. Build failures short-circuit through Failed;
//! cancellation detours through Cancelled but still persists partial output.

pub use sunday_common::StateError;
use serde::{Deserialize, Serialize};

/// Phases of one answer cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleState {
    Idle,
    Building,
    Streaming,
    Cancelled,
    Persisting,
    DirectiveHandling,
    Failed,
}

impl CycleState {
    /// Get all valid next states from current state
    pub fn valid_transitions(&self) -> &'static [CycleState] {
        match self {
            Self::Idle => &[Self::Building],
            Self::Building => &[Self::Streaming, Self::Failed],
            Self::Streaming => &[Self::Persisting, Self::Cancelled, Self::Failed],
            Self::Cancelled => &[Self::Persisting],
            Self::Persisting => &[Self::DirectiveHandling, Self::Idle],
            Self::DirectiveHandling => &[Self::Idle],
            Self::Failed => &[Self::Idle],
        }
    }
}

impl std::fmt::Display for CycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Building => write!(f, "building"),
            Self::Streaming => write!(f, "streaming"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Persisting => write!(f, "persisting"),
            Self::DirectiveHandling => write!(f, "directive_handling"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Events that drive the answer cycle
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CycleEvent {
    /// A question was submitted and the cycle begins
    QuestionSubmitted,
    /// The context builder produced the outgoing message sequence
    ContextReady,
    /// The context builder hit a blocking error
    ContextFailed,
    /// The completion stream ended (naturally or after cancellation)
    StreamClosed,
    /// The cancel token was signalled mid-stream
    Cancel,
    /// The completion request or stream failed
    StreamFailed,
    /// The thread document was written (or the write was absorbed)
    Saved,
    /// The cycle is done and the orchestrator returns to idle
    Finished,
}

impl std::fmt::Display for CycleEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::QuestionSubmitted => write!(f, "question_submitted"),
            Self::ContextReady => write!(f, "context_ready"),
            Self::ContextFailed => write!(f, "context_failed"),
            Self::StreamClosed => write!(f, "stream_closed"),
            Self::Cancel => write!(f, "cancel"),
            Self::StreamFailed => write!(f, "stream_failed"),
            Self::Saved => write!(f, "saved"),
            Self::Finished => write!(f, "finished"),
        }
    }
}

/// Answer cycle state machine
pub struct AnswerCycleStateMachine;

impl AnswerCycleStateMachine {
    /// Attempt a state transition
    pub fn transition(current: CycleState, event: CycleEvent) -> Result<CycleState, StateError> {
        let next = match (&current, &event) {
            (CycleState::Idle, CycleEvent::QuestionSubmitted) => CycleState::Building,

            (CycleState::Building, CycleEvent::ContextReady) => CycleState::Streaming,
            (CycleState::Building, CycleEvent::ContextFailed) => CycleState::Failed,

            (CycleState::Streaming, CycleEvent::StreamClosed) => CycleState::Persisting,
            (CycleState::Streaming, CycleEvent::Cancel) => CycleState::Cancelled,
            (CycleState::Streaming, CycleEvent::StreamFailed) => CycleState::Failed,

            (CycleState::Cancelled, CycleEvent::StreamClosed) => CycleState::Persisting,

            (CycleState::Persisting, CycleEvent::Saved) => CycleState::DirectiveHandling,
            (CycleState::Persisting, CycleEvent::Finished) => CycleState::Idle,

            (CycleState::DirectiveHandling, CycleEvent::Finished) => CycleState::Idle,

            (CycleState::Failed, CycleEvent::Finished) => CycleState::Idle,

            _ => {
                return Err(StateError::InvalidTransition {
                    from: current.to_string(),
                    to: "unknown".to_string(),
                    event: event.to_string(),
                });
            }
        };

        Ok(next)
    }

    /// Check if a transition is valid without performing it
    pub fn can_transition(current: CycleState, event: CycleEvent) -> bool {
        Self::transition(current, event).is_ok()
    }
}
