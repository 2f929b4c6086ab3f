//! Domain entities for the Conversations domain
//!
//! A `ChatThread` owns the ordered turns (question/answer exchanges) and the
//! linear message context sent to the language model. Turns are append-only;
//! an answer cycle always targets the last turn of its thread.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use sunday_common::{Error, Result};
use sunday_llm::{ChatMessage, Role};

/// Focus mode of a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TurnMode {
    #[default]
    Chat,
    Search,
    Image,
    Gmail,
    #[serde(rename = "")]
    Unspecified,
}

impl TurnMode {
    /// Map a mode classification string onto a turn mode.
    ///
    /// Unknown verdicts fall back to plain chat, matching the classifier's
    /// own fallback behavior.
    pub fn from_mode_str(mode: &str) -> Self {
        match mode {
            "search" => TurnMode::Search,
            "image" => TurnMode::Image,
            "gmail" => TurnMode::Gmail,
            "" => TurnMode::Unspecified,
            _ => TurnMode::Chat,
        }
    }
}

impl std::fmt::Display for TurnMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TurnMode::Chat => write!(f, "chat"),
            TurnMode::Search => write!(f, "search"),
            TurnMode::Image => write!(f, "image"),
            TurnMode::Gmail => write!(f, "gmail"),
            TurnMode::Unspecified => write!(f, ""),
        }
    }
}

/// Reference to a file attached to a turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRef {
    pub name: String,
    pub url: String,
}

/// One question/answer exchange within a thread
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Turn {
    pub mode: TurnMode,
    pub question: String,
    #[serde(default)]
    pub answer: String,
    #[serde(default)]
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_info: Option<FileRef>,
}

impl Turn {
    /// Create a new in-flight turn (empty answer)
    pub fn new(question: impl Into<String>, mode: TurnMode) -> Result<Self> {
        let question = question.into();
        if question.trim().is_empty() {
            return Err(Error::Validation(
                "Turn question cannot be empty or whitespace-only".to_string(),
            ));
        }
        Ok(Turn {
            mode,
            question,
            answer: String::new(),
            query: String::new(),
            file_info: None,
        })
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = query.into();
        self
    }

    pub fn with_file(mut self, file_info: FileRef) -> Self {
        self.file_info = Some(file_info);
        self
    }
}

/// A conversation thread: ordered turns plus the model message context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatThread {
    pub chats: Vec<Turn>,
    pub messages: Vec<ChatMessage>,
    pub created_at: DateTime<Utc>,
}

impl ChatThread {
    pub fn new() -> Self {
        Self {
            chats: Vec::new(),
            messages: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn last_turn(&self) -> Option<&Turn> {
        self.chats.last()
    }

    /// Overwrite the answer of the in-flight (last) turn
    pub fn update_last_answer(&mut self, answer: &str) {
        if let Some(turn) = self.chats.last_mut() {
            turn.answer = answer.to_string();
        }
    }

    /// The system message heading the context, if any
    pub fn system_message(&self) -> Option<&ChatMessage> {
        self.messages.iter().find(|m| m.role == Role::System)
    }

    /// Content of the most recent user message, if any
    pub fn last_user_content(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
    }

    /// Replace the content of the most recent assistant message.
    ///
    /// Returns false when the thread holds no assistant message yet.
    pub fn replace_last_assistant(&mut self, content: &str) -> bool {
        if let Some(message) = self
            .messages
            .iter_mut()
            .rev()
            .find(|m| m.role == Role::Assistant)
        {
            message.content = content.to_string();
            true
        } else {
            false
        }
    }

    /// Count of messages with the given role
    pub fn count_role(&self, role: Role) -> usize {
        self.messages.iter().filter(|m| m.role == role).count()
    }
}

impl Default for ChatThread {
    fn default() -> Self {
        Self::new()
    }
}
