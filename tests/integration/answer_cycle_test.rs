//! End-to-end answer cycle tests over fully in-memory collaborators

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{drain_events, Harness};
use sunday_conversations::{AnswerEvent, AnswerRequest, CycleError, TurnMode};
use sunday_gmail::MockMailService;
use sunday_llm::MockCompletionClient;

fn chat(question: &str) -> AnswerRequest {
    AnswerRequest::new(question, TurnMode::Chat)
}

#[tokio::test]
async fn test_full_success_cycle_emits_ordered_events() {
    let harness = Harness::new(MockCompletionClient::new(vec!["The answer", " is 42."]));
    let (orchestrator, mut events) = harness.open().await;

    let answer = orchestrator.handle_answer(chat("what is it?")).await.unwrap();
    assert_eq!(answer, "The answer is 42.");

    let events = drain_events(&mut events);
    assert_eq!(events[0], AnswerEvent::Started);
    assert_eq!(
        events[1],
        AnswerEvent::Delta {
            answer: "The answer".to_string()
        }
    );
    assert_eq!(
        events[2],
        AnswerEvent::Delta {
            answer: "The answer is 42.".to_string()
        }
    );
    assert_eq!(
        events[3],
        AnswerEvent::Completed {
            answer: "The answer is 42.".to_string()
        }
    );

    // One write for the finished turn, none for directives
    assert_eq!(harness.threads.put_count(), 1);
    let stored = harness
        .threads
        .stored(harness.user_id, harness.thread_id)
        .unwrap();
    assert_eq!(stored.chats.len(), 1);
    assert_eq!(stored.chats[0].answer, "The answer is 42.");
}

#[tokio::test]
async fn test_message_growth_per_cycle() {
    let harness = Harness::new(MockCompletionClient::new(vec!["ok"]));
    let (orchestrator, _events) = harness.open().await;

    // First cycle synthesizes system + user, then appends the assistant
    orchestrator.handle_answer(chat("first question")).await.unwrap();
    assert_eq!(orchestrator.thread().await.messages.len(), 3);

    // Every later cycle adds exactly one user and one assistant message
    orchestrator.handle_answer(chat("second question")).await.unwrap();
    assert_eq!(orchestrator.thread().await.messages.len(), 5);

    orchestrator.handle_answer(chat("third question")).await.unwrap();
    assert_eq!(orchestrator.thread().await.messages.len(), 7);
}

#[tokio::test]
async fn test_augmentation_replaces_outgoing_but_not_history() {
    let mail = MockMailService::with_inbox(vec![MockMailService::record(
        "msg-1",
        "boss@example.com",
        "Quarterly review",
        "please prepare slides",
    )]);
    let completion = MockCompletionClient::new(vec!["You have one email from your boss."]);
    let harness = Harness::new(completion.clone()).with_mail(mail);
    harness.grant_gmail().await;
    let (orchestrator, _events) = harness.open().await;

    orchestrator.handle_answer(chat("check my inbox")).await.unwrap();

    // The completion backend saw the synthesized email context
    let sent = completion.requests();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].messages[0].content.contains("boss@example.com"));
    assert!(sent[0].messages[0].content.contains("Quarterly review"));

    // The stored history keeps the plain sequence, still net +3 on first cycle
    let thread = orchestrator.thread().await;
    assert_eq!(thread.messages.len(), 3);
    assert!(!thread.messages[0].content.contains("boss@example.com"));
}

#[tokio::test]
async fn test_empty_inbox_never_reaches_completion() {
    let completion = MockCompletionClient::new(vec!["should never stream"]);
    let harness = Harness::new(completion.clone());
    harness.grant_gmail().await;
    let (orchestrator, mut events) = harness.open().await;

    let err = orchestrator
        .handle_answer(chat("summarize my emails"))
        .await
        .unwrap_err();
    assert!(matches!(err, CycleError::NoEmailsFound));
    assert_eq!(err.to_string(), "No emails found");
    assert_eq!(completion.call_count(), 0);

    let events = drain_events(&mut events);
    assert!(events.contains(&AnswerEvent::Failed {
        message: "No emails found".to_string(),
        retryable: false,
    }));
}

#[tokio::test]
async fn test_fetch_failure_is_surfaced_and_retryable() {
    let harness =
        Harness::new(MockCompletionClient::new(vec!["x"])).with_mail(MockMailService::new().failing_fetch());
    harness.grant_gmail().await;
    let (orchestrator, mut events) = harness.open().await;

    let err = orchestrator.handle_answer(chat("check my mail")).await.unwrap_err();
    assert!(matches!(err, CycleError::GmailFetch(_)));
    assert_eq!(err.to_string(), "Failed to access Gmail - please reconnect");

    let events = drain_events(&mut events);
    assert!(events.contains(&AnswerEvent::Failed {
        message: "Failed to access Gmail - please reconnect".to_string(),
        retryable: true,
    }));
}

#[tokio::test]
async fn test_retry_replays_the_same_inputs() {
    let completion = MockCompletionClient::failing(503);
    let harness = Harness::new(completion.clone());
    let (orchestrator, _events) = harness.open().await;

    let err = orchestrator.handle_answer(chat("flaky question")).await.unwrap_err();
    assert!(err.retryable());

    let retried = orchestrator.retry().await;
    assert!(retried.is_err());

    let requests = completion.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0], requests[1]);

    // The retried cycle reuses the in-flight turn instead of appending another
    assert_eq!(orchestrator.thread().await.chats.len(), 1);
}

#[tokio::test]
async fn test_mid_stream_failure_is_retryable_and_never_persisted() {
    let completion =
        MockCompletionClient::new(vec!["partial "]).with_mid_stream_error("connection reset");
    let harness = Harness::new(completion.clone());
    let (orchestrator, mut events) = harness.open().await;

    let err = orchestrator.handle_answer(chat("fragile question")).await.unwrap_err();
    assert!(matches!(err, CycleError::Completion(_)));
    assert!(err.retryable());

    // A broken stream writes nothing to the store
    assert_eq!(harness.threads.put_count(), 0);

    let events = drain_events(&mut events);
    assert!(events.contains(&AnswerEvent::Failed {
        message: "Something went wrong. Please try again later.".to_string(),
        retryable: true,
    }));

    // Retrying replays the exact same request against the backend
    let retried = orchestrator.retry().await;
    assert!(retried.is_err());
    let requests = completion.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0], requests[1]);
    assert_eq!(orchestrator.thread().await.chats.len(), 1);
}

#[tokio::test]
async fn test_retry_without_failure_is_a_noop() {
    let harness = Harness::new(MockCompletionClient::new(vec!["fine"]));
    let (orchestrator, _events) = harness.open().await;

    orchestrator.handle_answer(chat("works")).await.unwrap();
    assert_eq!(orchestrator.retry().await.unwrap(), None);
}

#[tokio::test]
async fn test_persistence_failure_does_not_abort_the_cycle() {
    let harness = Harness::new(MockCompletionClient::new(vec!["still delivered"]));
    harness.threads.fail_puts();
    let (orchestrator, _events) = harness.open().await;

    let answer = orchestrator.handle_answer(chat("durable?")).await.unwrap();
    assert_eq!(answer, "still delivered");
    assert_eq!(harness.threads.put_count(), 1);
    assert_eq!(orchestrator.thread().await.chats[0].answer, "still delivered");
}

#[tokio::test]
async fn test_overlapping_cycles_are_rejected() {
    let completion = MockCompletionClient::new(vec!["slow", " answer"])
        .with_fragment_delay(Duration::from_millis(100));
    let harness = Harness::new(completion);
    let (orchestrator, _events) = harness.open().await;
    let orchestrator = Arc::new(orchestrator);

    let background = {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move { orchestrator.handle_answer(chat("first")).await })
    };
    tokio::time::sleep(Duration::from_millis(30)).await;

    let err = orchestrator.handle_answer(chat("second")).await.unwrap_err();
    assert!(matches!(err, CycleError::CycleInFlight));

    let first = background.await.unwrap().unwrap();
    assert_eq!(first, "slow answer");
}
