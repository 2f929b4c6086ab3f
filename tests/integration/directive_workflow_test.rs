//! Draft/send directive execution against the mock mail service

mod common;

use common::{drain_events, Harness};
use sunday_conversations::{AnswerEvent, AnswerRequest, TurnMode};
use sunday_gmail::MockMailService;
use sunday_llm::MockCompletionClient;

fn chat(question: &str) -> AnswerRequest {
    AnswerRequest::new(question, TurnMode::Chat)
}

fn inboxed_mail() -> MockMailService {
    MockMailService::with_inbox(vec![MockMailService::record(
        "msg-1",
        "alice@example.com",
        "Hello",
        "just checking in",
    )])
}

const DRAFT_ANSWER: &str =
    "I'll save that for you.\n\nDRAFT_CONTENT: {\"to\":\"a@b.com\",\"subject\":\"S\",\"body\":\"B\"}";

#[tokio::test]
async fn test_draft_directive_round_trip() {
    let mail = inboxed_mail();
    let harness = Harness::new(MockCompletionClient::new(vec![DRAFT_ANSWER])).with_mail(mail.clone());
    harness.grant_gmail().await;
    let (orchestrator, _events) = harness.open().await;

    let answer = orchestrator
        .handle_answer(chat("draft a reply to Alice"))
        .await
        .unwrap();

    // Exactly one draft, with the payload fields passed through verbatim
    let drafts = mail.drafts();
    assert_eq!(drafts.len(), 1);
    assert_eq!(drafts[0].to, "a@b.com");
    assert_eq!(drafts[0].subject, "S");
    assert_eq!(drafts[0].body, "B");

    assert!(answer.ends_with("\n\nDraft has been created in Gmail!"));
    assert_eq!(orchestrator.thread().await.chats[0].answer, answer);

    // Second write carries the suffixed answer
    assert_eq!(harness.threads.put_count(), 2);
    let stored = harness
        .threads
        .stored(harness.user_id, harness.thread_id)
        .unwrap();
    assert!(stored.chats[0].answer.contains("Draft has been created"));
}

#[tokio::test]
async fn test_draft_failure_appends_failure_suffix() {
    let mail = inboxed_mail().failing_writes();
    let harness = Harness::new(MockCompletionClient::new(vec![DRAFT_ANSWER])).with_mail(mail.clone());
    harness.grant_gmail().await;
    let (orchestrator, _events) = harness.open().await;

    let answer = orchestrator.handle_answer(chat("draft it")).await.unwrap();
    assert!(answer.ends_with("⚠️ Failed to create draft - please check Gmail connection"));
    assert!(mail.drafts().is_empty());
}

#[tokio::test]
async fn test_send_directive_round_trip() {
    let mail = inboxed_mail();
    let completion = MockCompletionClient::new(vec![
        "Sending now.\n\nSEND_CONTENT: {\"to\":\"bob@example.com\",\"subject\":\"Lunch\",\"body\":\"Noon?\"}",
    ]);
    let harness = Harness::new(completion).with_mail(mail.clone());
    harness.grant_gmail().await;
    let (orchestrator, _events) = harness.open().await;

    let answer = orchestrator
        .handle_answer(chat("send an email to Bob"))
        .await
        .unwrap();

    let sent = mail.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "bob@example.com");
    assert!(answer.ends_with("\n\nEmail has been sent successfully!"));
}

#[tokio::test]
async fn test_directive_without_credential_is_skipped() {
    let mail = MockMailService::new();
    let harness = Harness::new(MockCompletionClient::new(vec![DRAFT_ANSWER])).with_mail(mail.clone());
    // no grant_gmail: augmentation and directives are both silently skipped
    let (orchestrator, _events) = harness.open().await;

    let answer = orchestrator.handle_answer(chat("draft a note")).await.unwrap();
    assert!(mail.drafts().is_empty());
    assert!(!answer.contains("Draft has been created"));
    assert_eq!(harness.threads.put_count(), 1);
}

#[tokio::test]
async fn test_directive_failures_are_independent() {
    // Invalid draft recipient fails pre-flight; the send still goes out
    let completion = MockCompletionClient::new(vec![
        "DRAFT_CONTENT: {\"to\":\"not-an-address\",\"subject\":\"S\",\"body\":\"B\"}\n\
         SEND_CONTENT: {\"to\":\"ok@example.com\",\"subject\":\"S\",\"body\":\"B\"}",
    ]);
    let mail = inboxed_mail();
    let harness = Harness::new(completion).with_mail(mail.clone());
    harness.grant_gmail().await;
    let (orchestrator, _events) = harness.open().await;

    let answer = orchestrator.handle_answer(chat("mail please")).await.unwrap();
    assert!(mail.drafts().is_empty());
    assert_eq!(mail.sent().len(), 1);
    assert!(answer.contains("⚠️ Failed to create draft"));
    assert!(answer.ends_with("\n\nEmail has been sent successfully!"));
}

#[tokio::test]
async fn test_suffixes_are_streamed_as_deltas() {
    let harness =
        Harness::new(MockCompletionClient::new(vec![DRAFT_ANSWER])).with_mail(inboxed_mail());
    harness.grant_gmail().await;
    let (orchestrator, mut events) = harness.open().await;

    orchestrator.handle_answer(chat("draft something")).await.unwrap();

    let events = drain_events(&mut events);
    let last = events.last().unwrap();
    match last {
        AnswerEvent::Delta { answer } => {
            assert!(answer.ends_with("Draft has been created in Gmail!"))
        }
        other => panic!("expected a suffix delta, got {other:?}"),
    }
}
