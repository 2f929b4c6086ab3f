//! HTTP Streaming Completion Client
//!
//! Posts the message context to the streaming chat backend and exposes the
//! raw streamed response body as an ordered sequence of text fragments.

use futures::{future, StreamExt};
use reqwest::Client;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::{ChatMessage, CompletionClient, CompletionError, CompletionRequest, FragmentStream};

/// Chat backend request body
#[derive(Debug, Serialize)]
struct ChatRequestBody<'a> {
    messages: &'a [ChatMessage],
    model: &'a str,
    temperature: f32,
    max_tokens: u32,
    top_p: f32,
    frequency_penalty: f32,
    presence_penalty: f32,
}

/// Streaming completion client against the chat backend HTTP API
pub struct HttpCompletionClient {
    http: Client,
    chat_url: String,
}

impl HttpCompletionClient {
    /// Create a new client posting to the given chat endpoint
    pub fn new(chat_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            chat_url: chat_url.into(),
        }
    }
}

#[async_trait::async_trait]
impl CompletionClient for HttpCompletionClient {
    async fn stream(
        &self,
        request: CompletionRequest,
        cancel: CancellationToken,
    ) -> Result<FragmentStream, CompletionError> {
        let params = &request.params;
        let body = ChatRequestBody {
            messages: &request.messages,
            model: &params.model,
            temperature: params.temperature,
            max_tokens: params.max_tokens,
            top_p: params.top_p,
            frequency_penalty: params.frequency_penalty,
            presence_penalty: params.presence_penalty,
        };

        tracing::debug!(
            model = %params.model,
            messages = request.messages.len(),
            "Opening completion stream"
        );

        let send = self.http.post(&self.chat_url).json(&body).send();

        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(CompletionError::Cancelled),
            result = send => result.map_err(|e| {
                if cancel.is_cancelled() {
                    CompletionError::Cancelled
                } else {
                    CompletionError::Request(e.to_string())
                }
            })?,
        };

        let status = response.status();
        if !status.is_success() {
            return Err(CompletionError::RequestFailed {
                status: status.as_u16(),
            });
        }

        // The body is raw streamed text. Chunk boundaries may split multi-byte
        // UTF-8 sequences, so incomplete trailing bytes are carried into the
        // next chunk.
        let err_cancel = cancel.clone();
        let fragments = response
            .bytes_stream()
            .scan(Vec::<u8>::new(), move |carry, chunk| {
                let item = match chunk {
                    Ok(bytes) => {
                        carry.extend_from_slice(&bytes);
                        Ok(decode_valid_prefix(carry))
                    }
                    Err(_) if err_cancel.is_cancelled() => Err(CompletionError::Cancelled),
                    Err(e) => Err(CompletionError::Stream(e.to_string())),
                };
                future::ready(Some(item))
            })
            .filter(|item| future::ready(!matches!(item, Ok(text) if text.is_empty())))
            .take_until(cancel.clone().cancelled_owned());

        Ok(Box::pin(fragments))
    }
}

/// Drain the longest valid UTF-8 prefix of `carry` into a String.
///
/// Truly invalid bytes (not an incomplete tail) are replaced rather than
/// left to stall the carry buffer forever.
fn decode_valid_prefix(carry: &mut Vec<u8>) -> String {
    match std::str::from_utf8(carry) {
        Ok(valid) => {
            let text = valid.to_string();
            carry.clear();
            text
        }
        Err(e) if e.error_len().is_some() => {
            let text = String::from_utf8_lossy(carry).into_owned();
            carry.clear();
            text
        }
        Err(e) => {
            let valid_len = e.valid_up_to();
            let text = String::from_utf8_lossy(&carry[..valid_len]).into_owned();
            carry.drain(..valid_len);
            text
        }
    }
}
