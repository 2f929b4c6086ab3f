//! Shared harness for answer cycle integration tests

use std::sync::Arc;

use sunday_conversations::{AnswerEvent, AnswerOrchestrator, InMemoryThreadStore};
use sunday_gmail::{Credential, CredentialStore, InMemoryCredentialStore, MockMailService, GMAIL_PROVIDER};
use sunday_llm::MockCompletionClient;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Fully in-memory orchestrator wiring with handles onto every collaborator
pub struct Harness {
    pub user_id: Uuid,
    pub thread_id: Uuid,
    pub threads: InMemoryThreadStore,
    pub credentials: Arc<InMemoryCredentialStore>,
    pub mail: MockMailService,
    pub completion: MockCompletionClient,
}

impl Harness {
    pub fn new(completion: MockCompletionClient) -> Self {
        Self {
            user_id: Uuid::new_v4(),
            thread_id: Uuid::new_v4(),
            threads: InMemoryThreadStore::new(),
            credentials: Arc::new(InMemoryCredentialStore::new()),
            mail: MockMailService::new(),
            completion,
        }
    }

    pub fn with_mail(mut self, mail: MockMailService) -> Self {
        self.mail = mail;
        self
    }

    /// Store a Gmail credential for the harness user
    pub async fn grant_gmail(&self) {
        self.credentials
            .put(
                self.user_id,
                GMAIL_PROVIDER,
                &Credential::from_oauth_tokens("test-access-token", "test-refresh-token", 3600),
            )
            .await
            .expect("credential store write");
    }

    pub async fn open(&self) -> (AnswerOrchestrator, mpsc::UnboundedReceiver<AnswerEvent>) {
        AnswerOrchestrator::open(
            self.user_id,
            self.thread_id,
            Arc::new(self.threads.clone()),
            self.credentials.clone(),
            Arc::new(self.mail.clone()),
            Arc::new(self.completion.clone()),
        )
        .await
        .expect("orchestrator open")
    }
}

/// Drain every event currently buffered on the receiver
pub fn drain_events(receiver: &mut mpsc::UnboundedReceiver<AnswerEvent>) -> Vec<AnswerEvent> {
    let mut events = Vec::new();
    while let Ok(event) = receiver.try_recv() {
        events.push(event);
    }
    events
}
