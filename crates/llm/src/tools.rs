//! Mode classification client
//!
//! Asks the tools backend which focus mode a question belongs to
//! (chat, search, image, gmail, ...). Any transport, status, or decode
//! failure falls back to plain chat mode so classification can never block
//! an answer cycle.

use reqwest::Client;
use serde::Deserialize;

use crate::ChatMessage;

const CLASSIFIER_PREAMBLE: &str = "You are an AI Assistant named Sunday who \
determines the appropriate function to use based on user queries.";

/// Classification verdict from the tools backend
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ModeDecision {
    #[serde(default = "default_mode")]
    pub mode: String,
    #[serde(default)]
    pub arg: String,
}

fn default_mode() -> String {
    "chat".to_string()
}

impl Default for ModeDecision {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            arg: String::new(),
        }
    }
}

/// Client for the mode classification backend
pub struct ModeClassifier {
    http: Client,
    tools_url: String,
}

impl ModeClassifier {
    pub fn new(tools_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            tools_url: tools_url.into(),
        }
    }

    /// Classify a question, defaulting to chat mode on any failure
    pub async fn classify(&self, question: &str) -> ModeDecision {
        let messages = vec![
            ChatMessage::system(CLASSIFIER_PREAMBLE),
            ChatMessage::user(question),
        ];

        let response = match self.http.post(&self.tools_url).json(&messages).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!(error = %e, "Mode classification request failed, defaulting to chat");
                return ModeDecision::default();
            }
        };

        if !response.status().is_success() {
            tracing::debug!(
                status = %response.status(),
                "Mode classification returned non-success, defaulting to chat"
            );
            return ModeDecision::default();
        }

        match response.json::<ModeDecision>().await {
            Ok(decision) => decision,
            Err(e) => {
                tracing::debug!(error = %e, "Mode classification response unreadable, defaulting to chat");
                ModeDecision::default()
            }
        }
    }
}
