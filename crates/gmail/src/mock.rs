//! Mock Mail Service Implementation
//!
//! In-memory Gmail stand-in for tests: serves a scripted inbox and captures
//! draft/send calls for assertion, with switchable failure modes.

use std::sync::{Arc, Mutex};

use crate::{is_valid_recipient, EmailHeader, EmailRecord, GmailError, MailService};

/// A draft or send call captured by the mock
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedMail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Scripted mail service for testing
#[derive(Clone, Default)]
pub struct MockMailService {
    inbox: Vec<EmailRecord>,
    fail_fetch: bool,
    fail_writes: bool,
    drafts: Arc<Mutex<Vec<CapturedMail>>>,
    sent: Arc<Mutex<Vec<CapturedMail>>>,
}

impl MockMailService {
    /// Mock with an empty inbox
    pub fn new() -> Self {
        Self::default()
    }

    /// Mock serving the given inbox
    pub fn with_inbox(inbox: Vec<EmailRecord>) -> Self {
        Self {
            inbox,
            ..Self::default()
        }
    }

    /// Convenience builder for a simple inbox record
    pub fn record(id: &str, from: &str, subject: &str, snippet: &str) -> EmailRecord {
        EmailRecord {
            id: id.to_string(),
            headers: vec![
                EmailHeader {
                    name: "From".to_string(),
                    value: from.to_string(),
                },
                EmailHeader {
                    name: "Subject".to_string(),
                    value: subject.to_string(),
                },
            ],
            snippet: snippet.to_string(),
            internal_date: 1_700_000_000_000,
        }
    }

    /// Fail all fetches with a fetch error
    pub fn failing_fetch(mut self) -> Self {
        self.fail_fetch = true;
        self
    }

    /// Fail all draft/send calls with a write error
    pub fn failing_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    /// Drafts captured so far
    pub fn drafts(&self) -> Vec<CapturedMail> {
        self.drafts.lock().unwrap().clone()
    }

    /// Sent messages captured so far
    pub fn sent(&self) -> Vec<CapturedMail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl MailService for MockMailService {
    async fn fetch_recent(
        &self,
        _access_token: &str,
        max_results: u32,
        _label: Option<&str>,
    ) -> Result<Vec<EmailRecord>, GmailError> {
        if self.fail_fetch {
            return Err(GmailError::Fetch("mock fetch failure".to_string()));
        }
        Ok(self
            .inbox
            .iter()
            .take(max_results as usize)
            .cloned()
            .collect())
    }

    async fn create_draft(
        &self,
        _access_token: &str,
        to: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), GmailError> {
        if !is_valid_recipient(to) {
            return Err(GmailError::InvalidRecipient(to.to_string()));
        }
        if self.fail_writes {
            return Err(GmailError::Write("mock draft failure".to_string()));
        }
        self.drafts.lock().unwrap().push(CapturedMail {
            to: to.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }

    async fn send_email(
        &self,
        _access_token: &str,
        to: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), GmailError> {
        if !is_valid_recipient(to) {
            return Err(GmailError::InvalidRecipient(to.to_string()));
        }
        if self.fail_writes {
            return Err(GmailError::Write("mock send failure".to_string()));
        }
        self.sent.lock().unwrap().push(CapturedMail {
            to: to.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }
}
