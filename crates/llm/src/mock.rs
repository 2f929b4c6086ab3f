//! Mock Completion Client Implementation
//!
//! In-memory streaming backend for tests: plays back a scripted fragment
//! sequence, optionally pausing between fragments so cancellation can land
//! mid-stream, and records every request it receives.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::{CompletionClient, CompletionError, CompletionRequest, FragmentStream};

/// Scripted completion backend for testing
#[derive(Clone)]
pub struct MockCompletionClient {
    fragments: Vec<String>,
    fail_status: Option<u16>,
    mid_stream_error: Option<String>,
    fragment_delay: Option<Duration>,
    requests: Arc<Mutex<Vec<CompletionRequest>>>,
    calls: Arc<AtomicUsize>,
}

impl MockCompletionClient {
    /// Stream the given fragments in order
    pub fn new(fragments: Vec<&str>) -> Self {
        Self {
            fragments: fragments.into_iter().map(String::from).collect(),
            fail_status: None,
            mid_stream_error: None,
            fragment_delay: None,
            requests: Arc::new(Mutex::new(Vec::new())),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Fail the initial request with the given HTTP status
    pub fn failing(status: u16) -> Self {
        let mut mock = Self::new(vec![]);
        mock.fail_status = Some(status);
        mock
    }

    /// Inject a transport error after all fragments have been yielded
    pub fn with_mid_stream_error(mut self, message: &str) -> Self {
        self.mid_stream_error = Some(message.to_string());
        self
    }

    /// Pause between fragments so callers can cancel mid-stream
    pub fn with_fragment_delay(mut self, delay: Duration) -> Self {
        self.fragment_delay = Some(delay);
        self
    }

    /// Number of stream requests received so far
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Requests received so far, in order
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl CompletionClient for MockCompletionClient {
    async fn stream(
        &self,
        request: CompletionRequest,
        cancel: CancellationToken,
    ) -> Result<FragmentStream, CompletionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request);

        if let Some(status) = self.fail_status {
            return Err(CompletionError::RequestFailed { status });
        }

        let mut items: Vec<Result<String, CompletionError>> =
            self.fragments.iter().cloned().map(Ok).collect();
        if let Some(message) = &self.mid_stream_error {
            items.push(Err(CompletionError::Stream(message.clone())));
        }

        let delay = self.fragment_delay;
        let stream = futures::stream::iter(items)
            .then(move |item| async move {
                if let Some(delay) = delay {
                    tokio::time::sleep(delay).await;
                }
                item
            })
            .take_until(cancel.clone().cancelled_owned());

        Ok(Box::pin(stream))
    }
}
