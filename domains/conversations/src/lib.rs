//! Conversations domain: chat threads, answer cycles, email directives

pub mod context;
pub mod directives;
pub mod domain;
pub mod orchestrator;
pub mod repository;

// Re-export domain types at the crate root for convenience
pub use domain::entities::{ChatThread, FileRef, Turn, TurnMode};
pub use domain::state::{AnswerCycleStateMachine, CycleEvent, CycleState};

// Re-export repository types
pub use repository::{InMemoryThreadStore, PgThreadStore, ThreadStore};

// Re-export orchestration types
pub use context::{ContextBuilder, ContextError, ContextOutcome};
pub use directives::{Directive, DirectiveKind};
pub use orchestrator::{AnswerEvent, AnswerOrchestrator, AnswerRequest, CycleError};
