//! Sunday Gmail Service
//!
//! External augmentation provider for the answer pipeline:
//! - Fetch recent messages (headers, snippet, internal timestamp)
//! - Create drafts and send mail through the Gmail REST API
//! - Per-(user, provider) credential storage
//! - Mock implementation for testing

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod client;
pub mod credentials;
pub mod mock;

pub use client::GmailClient;
pub use credentials::{
    Credential, CredentialStore, InMemoryCredentialStore, PgCredentialStore, GMAIL_PROVIDER,
};
pub use mock::MockMailService;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GmailError {
    #[error("Invalid recipient address: {0}")]
    InvalidRecipient(String),

    #[error("Gmail fetch failed: {0}")]
    Fetch(String),

    #[error("Gmail write failed: {0}")]
    Write(String),
}

/// One message header as exposed by the provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct EmailHeader {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub value: String,
}

/// Explicit schema for an augmentation record, with defensive defaults for
/// whatever the provider leaves out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct EmailRecord {
    pub id: String,
    pub headers: Vec<EmailHeader>,
    pub snippet: String,
    /// Provider-internal timestamp, milliseconds since the Unix epoch
    pub internal_date: i64,
}

impl EmailRecord {
    /// Look up a header value by name
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| h.name == name)
            .map(|h| h.value.as_str())
    }

    /// Sender, falling back to "Unknown"
    pub fn from(&self) -> &str {
        self.header("From").unwrap_or("Unknown")
    }

    /// Subject, falling back to "No Subject"
    pub fn subject(&self) -> &str {
        self.header("Subject").unwrap_or("No Subject")
    }
}

/// Basic email-address shape check applied before any network call
pub fn is_valid_recipient(address: &str) -> bool {
    static RECIPIENT_RE: OnceLock<Regex> = OnceLock::new();
    let re = RECIPIENT_RE
        .get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid recipient regex"));
    re.is_match(address)
}

/// External augmentation service (Gmail-shaped)
#[async_trait::async_trait]
pub trait MailService: Send + Sync {
    /// Fetch up to `max_results` recent messages, optionally filtered by label
    async fn fetch_recent(
        &self,
        access_token: &str,
        max_results: u32,
        label: Option<&str>,
    ) -> Result<Vec<EmailRecord>, GmailError>;

    /// Create a draft addressed to `to`
    async fn create_draft(
        &self,
        access_token: &str,
        to: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), GmailError>;

    /// Send a message to `to`
    async fn send_email(
        &self,
        access_token: &str,
        to: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), GmailError>;
}
