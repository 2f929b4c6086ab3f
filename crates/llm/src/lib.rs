//! Sunday LLM client
//!
//! Provides the streaming completion client used by the answer pipeline:
//! - Chat wire types (roles, messages, generation parameters)
//! - `CompletionClient` trait with a cancellable, fragment-by-fragment stream
//! - HTTP implementation against the streaming chat backend
//! - Mock implementation for testing
//! - Mode classification client (chat/search/image/gmail routing)

use std::pin::Pin;

use futures::Stream;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

pub mod client;
pub mod mock;
pub mod tools;

pub use client::HttpCompletionClient;
pub use mock::MockCompletionClient;
pub use tools::{ModeClassifier, ModeDecision};

/// Message role in the model context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// One entry of the linear context sent to the language model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Sampling parameters carried with every completion request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub top_p: f32,
    pub frequency_penalty: f32,
    pub presence_penalty: f32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            temperature: 0.7,
            max_tokens: 4096,
            top_p: 1.0,
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
        }
    }
}

/// A completion request: ordered context plus sampling parameters
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub params: GenerationParams,
}

/// Errors from the streaming completion client
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CompletionError {
    #[error("Completion request failed to send: {0}")]
    Request(String),

    #[error("Completion backend returned status {status}")]
    RequestFailed { status: u16 },

    #[error("Completion stream failed: {0}")]
    Stream(String),

    #[error("Completion cancelled")]
    Cancelled,
}

/// Finite, non-restartable sequence of streamed text fragments.
///
/// Fragments arrive strictly in order; the consumer owns accumulation.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String, CompletionError>> + Send>>;

/// Streaming completion backend
#[async_trait::async_trait]
pub trait CompletionClient: Send + Sync {
    /// Open a cancellable completion stream.
    ///
    /// A non-2xx initial response fails before any fragment is yielded.
    /// Cancelling the token terminates fragment production cleanly; it is
    /// never reported as a transport failure.
    async fn stream(
        &self,
        request: CompletionRequest,
        cancel: CancellationToken,
    ) -> Result<FragmentStream, CompletionError>;
}
