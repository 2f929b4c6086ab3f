//! Prompt context assembly for an answer cycle
//!
//! Builds the message sequence sent to the completion backend from the
//! thread history, the new question, and (when the question concerns email)
//! a Gmail snapshot rendered into a system message.

use std::sync::Arc;

use sunday_gmail::{CredentialStore, EmailRecord, GmailError, MailService, GMAIL_PROVIDER};
use sunday_llm::ChatMessage;
use uuid::Uuid;

use crate::domain::entities::TurnMode;

/// Most recent emails fetched from Gmail per augmentation
pub const GMAIL_FETCH_LIMIT: u32 = 500;
/// Emails actually rendered into the context message
pub const GMAIL_CONTEXT_LIMIT: usize = 50;

const SYSTEM_PREAMBLE: &str =
    "You are an AI Assistant named Sunday. Answer the user's questions clearly and concisely.";

const EMAIL_KEYWORDS: &[&str] = &[
    "email",
    "emails",
    "inbox",
    "message",
    "messages",
    "mail",
    "send",
    "draft",
    "save for later",
];

const GMAIL_GUIDELINES: &str = r#", please use this information to answer the user's question, summarising the emails as much as possible, and format it neatly. Add a 1 line summary of the email at the end of each email, provide the time of the email in the summary, and use a new line to separate each line.
1. Focus on the most relevant emails
2. Summarize key points briefly
3. Mention senders and dates
4. Keep responses under 200 words
5. Use bullet points for clarity
6. Highlight urgent items first

When creating email drafts or sending emails, format the JSON like this:
```terminal
DRAFT_CONTENT: {
  "to": "recipient@example.com",
  "subject": "Email Subject",
  "body": "Email content here..."
}
```
Or for sending:
```terminal
SEND_CONTENT: {
  "to": "recipient@example.com",
  "subject": "Email Subject",
  "body": "Email content here..."
}
```
The JSON must be the last part of your response. Never mention the JSON structure to the user.
Priority rules:
1. If user says "send" and "email" together, ALWAYS use SEND_CONTENT
2. Only use DRAFT_CONTENT if user explicitly says "draft" or "save for later"
3. When unsure, ask user to clarify if they want to send or draft"#;

/// Errors that block an answer cycle during context assembly
#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    #[error("Gmail fetch failed: {0}")]
    Fetch(#[from] GmailError),
    #[error("No emails found")]
    NoEmailsFound,
}

/// Result of context assembly.
///
/// `thread_messages` is what the thread persists; `outgoing` is what the
/// completion backend receives. They differ only when Gmail augmentation
/// replaces the outgoing sequence with an email-context prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextOutcome {
    pub thread_messages: Vec<ChatMessage>,
    pub outgoing: Vec<ChatMessage>,
}

/// Decide whether a question should be answered against the user's inbox
pub fn query_requires_gmail(question: &str, mode: TurnMode) -> bool {
    if mode == TurnMode::Gmail {
        return true;
    }
    let lowered = question.to_lowercase();
    EMAIL_KEYWORDS.iter().any(|keyword| lowered.contains(keyword))
}

/// Messages for the first turn of a thread
pub fn initial_messages(question: &str, data: Option<&str>) -> Vec<ChatMessage> {
    let content = match data {
        Some(data) if !data.is_empty() => format!("{question}\n\n{data}"),
        _ => question.to_string(),
    };
    vec![
        ChatMessage::system(SYSTEM_PREAMBLE),
        ChatMessage::user(content),
    ]
}

/// Render fetched emails into a system-plus-question sequence.
///
/// At most [`GMAIL_CONTEXT_LIMIT`] emails are included; missing headers fall
/// back to "Unknown" / "No Subject" and the timestamp comes from the
/// message's internal date in epoch milliseconds.
pub fn gmail_context_messages(emails: &[EmailRecord], question: &str) -> Vec<ChatMessage> {
    let email_context = emails
        .iter()
        .take(GMAIL_CONTEXT_LIMIT)
        .map(|email| {
            format!(
                "From: {}\nSubject: {}\nSnippet: {}.\nAt: {}",
                email.from(),
                email.subject(),
                email.snippet,
                format_internal_date(email.internal_date),
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    vec![
        ChatMessage::system(format!(
            "You are helping the user with their Gmail. Here are their recent emails:\n{email_context}{GMAIL_GUIDELINES}"
        )),
        ChatMessage::user(question),
    ]
}

fn format_internal_date(millis: i64) -> String {
    chrono::DateTime::from_timestamp_millis(millis)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_default()
}

/// Assembles the per-cycle prompt context
pub struct ContextBuilder {
    credentials: Arc<dyn CredentialStore>,
    mail: Arc<dyn MailService>,
}

impl ContextBuilder {
    pub fn new(credentials: Arc<dyn CredentialStore>, mail: Arc<dyn MailService>) -> Self {
        Self { credentials, mail }
    }

    /// Build the context for one answer cycle.
    ///
    /// An empty history synthesizes the initial sequence; otherwise the new
    /// question is appended. When the question requires Gmail and the user
    /// has a stored credential, the outgoing sequence is replaced with the
    /// email-augmented prompt. A missing credential skips augmentation
    /// silently; a fetch failure or an empty inbox blocks the cycle.
    pub async fn build(
        &self,
        user_id: Uuid,
        history: &[ChatMessage],
        question: &str,
        mode: TurnMode,
        data: Option<&str>,
    ) -> Result<ContextOutcome, ContextError> {
        let thread_messages = if history.is_empty() {
            initial_messages(question, data)
        } else {
            let mut messages = history.to_vec();
            messages.push(ChatMessage::user(question));
            messages
        };

        let mut outgoing = thread_messages.clone();

        if query_requires_gmail(question, mode) {
            match self.credentials.get(user_id, GMAIL_PROVIDER).await {
                Ok(Some(credential)) => {
                    let emails = self
                        .mail
                        .fetch_recent(&credential.access_token, GMAIL_FETCH_LIMIT, None)
                        .await?;
                    if emails.is_empty() {
                        return Err(ContextError::NoEmailsFound);
                    }
                    outgoing = gmail_context_messages(&emails, question);
                }
                Ok(None) => {
                    tracing::debug!(%user_id, "No Gmail credential, skipping email context");
                }
                Err(e) => {
                    tracing::warn!(%user_id, error = %e, "Credential lookup failed, skipping email context");
                }
            }
        }

        Ok(ContextOutcome {
            thread_messages,
            outgoing,
        })
    }
}
