//! Gmail REST API Client Implementation
//!
//! Calls the Gmail users.messages and users.drafts endpoints with bearer
//! auth. Outgoing mail is wrapped in a minimal RFC-822-style envelope and
//! base64url-encoded per the provider's transport contract.

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use crate::{is_valid_recipient, EmailHeader, EmailRecord, GmailError, MailService};

const DEFAULT_BASE_URL: &str = "https://gmail.googleapis.com/gmail/v1";

/// Message list response
#[derive(Debug, Deserialize)]
struct MessageListResponse {
    #[serde(default)]
    messages: Vec<MessageRef>,
}

#[derive(Debug, Deserialize)]
struct MessageRef {
    id: String,
}

/// Full message response; every field the provider might omit is defaulted
#[derive(Debug, Deserialize, Default)]
struct MessageResponse {
    #[serde(default)]
    id: String,
    #[serde(default)]
    snippet: String,
    #[serde(default, rename = "internalDate")]
    internal_date: String,
    #[serde(default)]
    payload: MessagePayload,
}

#[derive(Debug, Deserialize, Default)]
struct MessagePayload {
    #[serde(default)]
    headers: Vec<EmailHeader>,
}

impl From<MessageResponse> for EmailRecord {
    fn from(m: MessageResponse) -> Self {
        EmailRecord {
            id: m.id,
            headers: m.payload.headers,
            snippet: m.snippet,
            internal_date: m.internal_date.parse().unwrap_or(0),
        }
    }
}

/// Gmail HTTP client
pub struct GmailClient {
    http: Client,
    base_url: String,
}

impl GmailClient {
    /// Create a client against the production Gmail API
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Create a client against a custom base URL (testing, proxies)
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            http: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Build the raw transport envelope for an outgoing message
    fn encode_raw_message(to: &str, subject: &str, body: &str) -> String {
        let raw = format!(
            "To: {to}\nSubject: {subject}\nContent-Type: text/plain; charset=utf-8\n\n{body}"
        );
        URL_SAFE.encode(raw)
    }

    async fn fetch_message(
        &self,
        access_token: &str,
        id: &str,
    ) -> Result<EmailRecord, GmailError> {
        let response = self
            .http
            .get(format!("{}/users/me/messages/{}", self.base_url, id))
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| GmailError::Fetch(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read response body".to_string());
            return Err(GmailError::Fetch(format!(
                "Gmail API returned {} for message {}: {}",
                status, id, body
            )));
        }

        let message: MessageResponse = response
            .json()
            .await
            .map_err(|e| GmailError::Fetch(format!("Failed to parse message {}: {}", id, e)))?;

        Ok(message.into())
    }
}

impl Default for GmailClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl MailService for GmailClient {
    async fn fetch_recent(
        &self,
        access_token: &str,
        max_results: u32,
        label: Option<&str>,
    ) -> Result<Vec<EmailRecord>, GmailError> {
        let mut url = format!(
            "{}/users/me/messages?maxResults={}",
            self.base_url, max_results
        );
        if let Some(label) = label {
            url.push_str("&labelIds=");
            url.push_str(label);
        }

        let response = self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| GmailError::Fetch(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read response body".to_string());
            return Err(GmailError::Fetch(format!(
                "Gmail API returned {}: {}",
                status, body
            )));
        }

        let list: MessageListResponse = response
            .json()
            .await
            .map_err(|e| GmailError::Fetch(format!("Failed to parse message list: {}", e)))?;

        let mut records = Vec::with_capacity(list.messages.len());
        for message_ref in &list.messages {
            records.push(self.fetch_message(access_token, &message_ref.id).await?);
        }

        tracing::debug!(count = records.len(), "Fetched recent Gmail messages");
        Ok(records)
    }

    async fn create_draft(
        &self,
        access_token: &str,
        to: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), GmailError> {
        if !is_valid_recipient(to) {
            return Err(GmailError::InvalidRecipient(to.to_string()));
        }

        let raw = Self::encode_raw_message(to, subject, body);
        let response = self
            .http
            .post(format!("{}/users/me/drafts", self.base_url))
            .bearer_auth(access_token)
            .json(&json!({ "message": { "raw": raw } }))
            .send()
            .await
            .map_err(|e| GmailError::Write(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read response body".to_string());
            return Err(GmailError::Write(format!(
                "Draft creation returned {}: {}",
                status, body
            )));
        }

        tracing::info!(to = %to, "Gmail draft created");
        Ok(())
    }

    async fn send_email(
        &self,
        access_token: &str,
        to: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), GmailError> {
        // Validation applied symmetrically with create_draft
        if !is_valid_recipient(to) {
            return Err(GmailError::InvalidRecipient(to.to_string()));
        }

        let raw = Self::encode_raw_message(to, subject, body);
        let response = self
            .http
            .post(format!("{}/users/me/messages/send", self.base_url))
            .bearer_auth(access_token)
            .json(&json!({ "raw": raw }))
            .send()
            .await
            .map_err(|e| GmailError::Write(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read response body".to_string());
            return Err(GmailError::Write(format!(
                "Email send returned {}: {}",
                status, body
            )));
        }

        tracing::info!(to = %to, "Gmail message sent");
        Ok(())
    }
}
