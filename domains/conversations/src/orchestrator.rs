//! Answer cycle orchestration
//!
//! Drives one question/answer exchange end to end: context assembly,
//! cancellable streaming, incremental state updates, best-effort
//! persistence, and execution of email directives found in the final
//! answer. One cycle per thread runs at a time; overlapping invocations
//! are rejected.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use futures::StreamExt;
use sunday_common::state::StateError;
use sunday_gmail::{CredentialStore, GmailError, MailService, GMAIL_PROVIDER};
use sunday_llm::{
    ChatMessage, CompletionClient, CompletionError, CompletionRequest, GenerationParams,
};
use uuid::Uuid;

use crate::context::{ContextBuilder, ContextError};
use crate::directives::{self, Directive, DirectiveKind};
use crate::domain::entities::{ChatThread, Turn, TurnMode};
use crate::domain::state::{AnswerCycleStateMachine, CycleEvent, CycleState};
use crate::repository::ThreadStore;

/// Model pinned for image-mode turns
const IMAGE_MODE_MODEL: &str = "gpt-4o";

const DRAFT_OK_SUFFIX: &str = "\n\nDraft has been created in Gmail!";
const DRAFT_ERR_SUFFIX: &str = "\n\n⚠️ Failed to create draft - please check Gmail connection";
const SEND_OK_SUFFIX: &str = "\n\nEmail has been sent successfully!";
const SEND_ERR_SUFFIX: &str = "\n\n⚠️ Failed to send email - please check Gmail connection";

/// Progress notifications emitted over the orchestrator's event channel
#[derive(Debug, Clone, PartialEq)]
pub enum AnswerEvent {
    Started,
    /// Accumulated answer after a new fragment or suffix
    Delta { answer: String },
    /// Final answer for the cycle (possibly partial after cancellation)
    Completed { answer: String },
    Failed { message: String, retryable: bool },
}

/// Inputs for one answer cycle
#[derive(Debug, Clone, PartialEq)]
pub struct AnswerRequest {
    pub question: String,
    pub mode: TurnMode,
    pub query: Option<String>,
    pub data: Option<String>,
}

impl AnswerRequest {
    pub fn new(question: impl Into<String>, mode: TurnMode) -> Self {
        Self {
            question: question.into(),
            mode,
            query: None,
            data: None,
        }
    }
}

/// Replayable record of the last failed cycle
#[derive(Debug, Clone, PartialEq)]
enum CycleRequest {
    Answer(AnswerRequest),
    Rewrite,
}

#[derive(Debug, thiserror::Error)]
pub enum CycleError {
    #[error("Another answer cycle is already in flight")]
    CycleInFlight,

    #[error("Failed to access Gmail - please reconnect")]
    GmailFetch(#[source] GmailError),

    #[error("No emails found")]
    NoEmailsFound,

    #[error("Something went wrong. Please try again later.")]
    Completion(#[source] CompletionError),

    #[error("Nothing to rewrite yet")]
    NothingToRewrite,

    #[error(transparent)]
    Domain(#[from] sunday_common::Error),

    #[error(transparent)]
    State(#[from] StateError),
}

impl CycleError {
    /// Whether replaying the same inputs could plausibly succeed
    pub fn retryable(&self) -> bool {
        matches!(self, CycleError::GmailFetch(_) | CycleError::Completion(_))
    }
}

impl From<ContextError> for CycleError {
    fn from(err: ContextError) -> Self {
        match err {
            ContextError::Fetch(e) => CycleError::GmailFetch(e),
            ContextError::NoEmailsFound => CycleError::NoEmailsFound,
        }
    }
}

struct ActiveCycle {
    cancel: CancellationToken,
    state: CycleState,
}

/// Coordinates answer cycles for a single `(user, thread)` pair.
///
/// All collaborators are injected; nothing here reaches for ambient state.
pub struct AnswerOrchestrator {
    user_id: Uuid,
    thread_id: Uuid,
    generation: GenerationParams,
    custom_instruction: Option<String>,
    thread: tokio::sync::Mutex<ChatThread>,
    threads: Arc<dyn ThreadStore>,
    credentials: Arc<dyn CredentialStore>,
    mail: Arc<dyn MailService>,
    completion: Arc<dyn CompletionClient>,
    context: ContextBuilder,
    events: mpsc::UnboundedSender<AnswerEvent>,
    active: std::sync::Mutex<Option<ActiveCycle>>,
    last_failed: std::sync::Mutex<Option<CycleRequest>>,
}

impl AnswerOrchestrator {
    /// Load (or start) the thread and return the orchestrator together with
    /// a receiver for its progress events.
    pub async fn open(
        user_id: Uuid,
        thread_id: Uuid,
        threads: Arc<dyn ThreadStore>,
        credentials: Arc<dyn CredentialStore>,
        mail: Arc<dyn MailService>,
        completion: Arc<dyn CompletionClient>,
    ) -> Result<(Self, mpsc::UnboundedReceiver<AnswerEvent>), CycleError> {
        let thread = threads
            .get(user_id, thread_id)
            .await?
            .unwrap_or_else(ChatThread::new);
        let (events, receiver) = mpsc::unbounded_channel();

        let orchestrator = Self {
            user_id,
            thread_id,
            generation: GenerationParams::default(),
            custom_instruction: None,
            thread: tokio::sync::Mutex::new(thread),
            context: ContextBuilder::new(credentials.clone(), mail.clone()),
            threads,
            credentials,
            mail,
            completion,
            events,
            active: std::sync::Mutex::new(None),
            last_failed: std::sync::Mutex::new(None),
        };
        Ok((orchestrator, receiver))
    }

    pub fn with_generation_params(mut self, generation: GenerationParams) -> Self {
        self.generation = generation;
        self
    }

    /// Extra system instruction inserted before the final user message on
    /// rewrite cycles
    pub fn with_custom_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.custom_instruction = Some(instruction.into());
        self
    }

    /// Current thread snapshot
    pub async fn thread(&self) -> ChatThread {
        self.thread.lock().await.clone()
    }

    /// Run one full answer cycle for `request`, returning the final answer
    pub async fn handle_answer(&self, request: AnswerRequest) -> Result<String, CycleError> {
        let cancel = self.begin_cycle()?;
        let result = self.run_answer_cycle(&request, cancel).await;
        self.end_cycle(result, CycleRequest::Answer(request))
    }

    /// Regenerate the last turn's answer from reconstructed history.
    ///
    /// Augmentation is never re-evaluated and no directive pass runs.
    pub async fn handle_rewrite(&self) -> Result<String, CycleError> {
        let cancel = self.begin_cycle()?;
        let result = self.run_rewrite_cycle(cancel).await;
        self.end_cycle(result, CycleRequest::Rewrite)
    }

    /// Signal cancellation of the in-flight cycle. No-op unless a stream is
    /// currently open.
    pub fn handle_cancel(&self) {
        let active = self.active.lock().unwrap();
        if let Some(cycle) = active.as_ref() {
            if cycle.state == CycleState::Streaming {
                cycle.cancel.cancel();
            }
        }
    }

    /// Replay the last failed cycle with its original inputs. Returns
    /// `Ok(None)` when there is nothing to retry.
    pub async fn retry(&self) -> Result<Option<String>, CycleError> {
        let pending = self.last_failed.lock().unwrap().clone();
        match pending {
            Some(CycleRequest::Answer(request)) => self.handle_answer(request).await.map(Some),
            Some(CycleRequest::Rewrite) => self.handle_rewrite().await.map(Some),
            None => Ok(None),
        }
    }

    async fn run_answer_cycle(
        &self,
        request: &AnswerRequest,
        cancel: CancellationToken,
    ) -> Result<String, CycleError> {
        let mut state = self.advance(CycleState::Idle, CycleEvent::QuestionSubmitted)?;
        self.emit(AnswerEvent::Started);

        let mut thread = self.thread.lock().await;
        let prior_messages = thread.messages.clone();

        // A retried cycle reuses the turn it appended on the failed attempt.
        let reuse_turn = thread
            .last_turn()
            .map(|turn| turn.question == request.question && turn.answer.is_empty())
            .unwrap_or(false);
        if !reuse_turn {
            let mut turn = Turn::new(&request.question, request.mode)?;
            if let Some(query) = &request.query {
                turn = turn.with_query(query);
            }
            thread.chats.push(turn);
        }

        let outcome = match self
            .context
            .build(
                self.user_id,
                &thread.messages,
                &request.question,
                request.mode,
                request.data.as_deref(),
            )
            .await
        {
            Ok(outcome) => outcome,
            Err(err) => {
                let failed = self.advance(state, CycleEvent::ContextFailed)?;
                self.advance(failed, CycleEvent::Finished)?;
                return Err(err.into());
            }
        };
        thread.messages = outcome.thread_messages;
        state = self.advance(state, CycleEvent::ContextReady)?;

        let params = self.params_for(request.mode);
        let answer = match self
            .consume_stream(&mut thread, outcome.outgoing, params, state, cancel.clone())
            .await
        {
            Ok(answer) => answer,
            Err(err) => {
                // Nothing was persisted; restore the in-memory sequence so a
                // retry replays the cycle from the same starting point.
                thread.messages = prior_messages;
                thread.update_last_answer("");
                return Err(err);
            }
        };

        if cancel.is_cancelled() {
            // Partial answer stays on the turn; no assistant message is
            // appended for an aborted stream.
            state = self.advance(state, CycleEvent::Cancel)?;
            state = self.advance(state, CycleEvent::StreamClosed)?;
            self.persist(&thread).await;
            self.advance(state, CycleEvent::Finished)?;
            self.emit(AnswerEvent::Completed {
                answer: answer.clone(),
            });
            return Ok(answer);
        }

        state = self.advance(state, CycleEvent::StreamClosed)?;
        thread.messages.push(ChatMessage::assistant(&answer));
        self.persist(&thread).await;
        state = self.advance(state, CycleEvent::Saved)?;
        self.emit(AnswerEvent::Completed {
            answer: answer.clone(),
        });

        let mut final_answer = answer;
        if self.run_directives(&mut thread, &mut final_answer).await {
            self.persist(&thread).await;
        }
        self.advance(state, CycleEvent::Finished)?;
        Ok(final_answer)
    }

    async fn run_rewrite_cycle(&self, cancel: CancellationToken) -> Result<String, CycleError> {
        let mut state = self.advance(CycleState::Idle, CycleEvent::QuestionSubmitted)?;
        self.emit(AnswerEvent::Started);

        let mut thread = self.thread.lock().await;
        let last_turn = match thread.last_turn() {
            Some(turn) if !turn.answer.is_empty() => turn.clone(),
            _ => {
                let failed = self.advance(state, CycleEvent::ContextFailed)?;
                self.advance(failed, CycleEvent::Finished)?;
                return Err(CycleError::NothingToRewrite);
            }
        };

        let messages = self.rewrite_messages(&thread, &last_turn);
        state = self.advance(state, CycleEvent::ContextReady)?;

        let params = self.params_for(last_turn.mode);
        let answer = match self
            .consume_stream(&mut thread, messages, params, state, cancel.clone())
            .await
        {
            Ok(answer) => answer,
            Err(err) => {
                // Put the previous answer back; the failed partial was never
                // persisted.
                thread.update_last_answer(&last_turn.answer);
                return Err(err);
            }
        };

        if cancel.is_cancelled() {
            state = self.advance(state, CycleEvent::Cancel)?;
            state = self.advance(state, CycleEvent::StreamClosed)?;
            self.persist(&thread).await;
            self.advance(state, CycleEvent::Finished)?;
            self.emit(AnswerEvent::Completed {
                answer: answer.clone(),
            });
            return Ok(answer);
        }

        state = self.advance(state, CycleEvent::StreamClosed)?;
        thread.replace_last_assistant(&answer);
        self.persist(&thread).await;
        state = self.advance(state, CycleEvent::Saved)?;
        self.advance(state, CycleEvent::Finished)?;
        self.emit(AnswerEvent::Completed {
            answer: answer.clone(),
        });
        Ok(answer)
    }

    /// Reconstruct the prompt for a rewrite: system message, every prior
    /// question/answer pair, optional custom instruction, then the final
    /// user message.
    fn rewrite_messages(&self, thread: &ChatThread, last_turn: &Turn) -> Vec<ChatMessage> {
        let mut messages = Vec::new();
        if let Some(system) = thread.system_message() {
            messages.push(system.clone());
        }
        for turn in &thread.chats[..thread.chats.len().saturating_sub(1)] {
            messages.push(ChatMessage::user(&turn.question));
            if !turn.answer.is_empty() {
                messages.push(ChatMessage::assistant(&turn.answer));
            }
        }
        if let Some(instruction) = &self.custom_instruction {
            messages.push(ChatMessage::system(instruction));
        }
        let final_content = thread
            .last_user_content()
            .unwrap_or(&last_turn.question)
            .to_string();
        messages.push(ChatMessage::user(final_content));
        messages
    }

    /// Open the completion stream and fold fragments into the last turn,
    /// emitting a delta per fragment. Returns the accumulated answer; on
    /// cancellation the partial text accumulated so far.
    async fn consume_stream(
        &self,
        thread: &mut ChatThread,
        messages: Vec<ChatMessage>,
        params: GenerationParams,
        state: CycleState,
        cancel: CancellationToken,
    ) -> Result<String, CycleError> {
        let request = CompletionRequest { messages, params };
        let mut stream = match self.completion.stream(request, cancel.clone()).await {
            Ok(stream) => stream,
            Err(CompletionError::Cancelled) => return Ok(String::new()),
            Err(err) => {
                let failed = self.advance(state, CycleEvent::StreamFailed)?;
                self.advance(failed, CycleEvent::Finished)?;
                return Err(CycleError::Completion(err));
            }
        };

        let mut answer = String::new();
        while let Some(item) = stream.next().await {
            match item {
                Ok(fragment) => {
                    answer.push_str(&fragment);
                    thread.update_last_answer(&answer);
                    self.emit(AnswerEvent::Delta {
                        answer: answer.clone(),
                    });
                }
                Err(CompletionError::Cancelled) => break,
                Err(err) => {
                    // Mid-stream failure: nothing is persisted, the caller
                    // gets a retry with the original inputs.
                    let failed = self.advance(state, CycleEvent::StreamFailed)?;
                    self.advance(failed, CycleEvent::Finished)?;
                    return Err(CycleError::Completion(err));
                }
            }
        }
        Ok(answer)
    }

    /// Execute any draft/send directives embedded in the final answer.
    ///
    /// Each directive is independent: a draft failure does not stop the
    /// send, and vice versa. Returns whether the answer text changed.
    async fn run_directives(&self, thread: &mut ChatThread, answer: &mut String) -> bool {
        let directives = directives::extract(answer);
        if directives.is_empty() {
            return false;
        }

        let credential = match self.credentials.get(self.user_id, GMAIL_PROVIDER).await {
            Ok(Some(credential)) => credential,
            Ok(None) => {
                tracing::debug!(user_id = %self.user_id, "No Gmail credential, skipping directives");
                return false;
            }
            Err(e) => {
                tracing::warn!(user_id = %self.user_id, error = %e, "Credential lookup failed, skipping directives");
                return false;
            }
        };

        for directive in directives {
            let suffix = self.execute_directive(&credential.access_token, &directive).await;
            answer.push_str(suffix);
            thread.update_last_answer(answer);
            self.emit(AnswerEvent::Delta {
                answer: answer.clone(),
            });
        }
        true
    }

    async fn execute_directive(&self, access_token: &str, directive: &Directive) -> &'static str {
        let result = match directive.kind {
            DirectiveKind::Draft => {
                self.mail
                    .create_draft(access_token, &directive.to, &directive.subject, &directive.body)
                    .await
            }
            DirectiveKind::Send => {
                self.mail
                    .send_email(access_token, &directive.to, &directive.subject, &directive.body)
                    .await
            }
        };

        match (&result, directive.kind) {
            (Ok(()), DirectiveKind::Draft) => DRAFT_OK_SUFFIX,
            (Ok(()), DirectiveKind::Send) => SEND_OK_SUFFIX,
            (Err(e), kind) => {
                tracing::warn!(kind = %kind, error = %e, "Directive execution failed");
                match kind {
                    DirectiveKind::Draft => DRAFT_ERR_SUFFIX,
                    DirectiveKind::Send => SEND_ERR_SUFFIX,
                }
            }
        }
    }

    fn params_for(&self, mode: TurnMode) -> GenerationParams {
        let mut params = self.generation.clone();
        if mode == TurnMode::Image {
            params.model = IMAGE_MODE_MODEL.to_string();
        }
        params
    }

    /// Write the thread out, logging failure without interrupting the cycle.
    /// Durability here is deliberately best-effort.
    async fn persist(&self, thread: &ChatThread) {
        if let Err(e) = self
            .threads
            .put(self.user_id, self.thread_id, thread)
            .await
        {
            tracing::warn!(
                user_id = %self.user_id,
                thread_id = %self.thread_id,
                error = %e,
                "Thread persistence failed, continuing"
            );
        }
    }

    fn begin_cycle(&self) -> Result<CancellationToken, CycleError> {
        let mut active = self.active.lock().unwrap();
        if active.is_some() {
            return Err(CycleError::CycleInFlight);
        }
        let cancel = CancellationToken::new();
        *active = Some(ActiveCycle {
            cancel: cancel.clone(),
            state: CycleState::Idle,
        });
        Ok(cancel)
    }

    /// Close out the cycle: clear the guard, record failures for retry, and
    /// emit a terminal `Failed` event when needed.
    fn end_cycle(
        &self,
        result: Result<String, CycleError>,
        request: CycleRequest,
    ) -> Result<String, CycleError> {
        *self.active.lock().unwrap() = None;
        match &result {
            Ok(_) => {
                *self.last_failed.lock().unwrap() = None;
            }
            Err(err) => {
                if err.retryable() {
                    *self.last_failed.lock().unwrap() = Some(request);
                }
                self.emit(AnswerEvent::Failed {
                    message: err.to_string(),
                    retryable: err.retryable(),
                });
            }
        }
        result
    }

    fn advance(&self, state: CycleState, event: CycleEvent) -> Result<CycleState, CycleError> {
        let next = AnswerCycleStateMachine::transition(state, event)?;
        if let Some(cycle) = self.active.lock().unwrap().as_mut() {
            cycle.state = next;
        }
        Ok(next)
    }

    fn emit(&self, event: AnswerEvent) {
        // Receiver going away just means nobody is watching anymore.
        let _ = self.events.send(event);
    }
}
