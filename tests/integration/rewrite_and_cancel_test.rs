//! Rewrite and mid-stream cancellation behavior

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{drain_events, Harness};
use sunday_conversations::{AnswerEvent, AnswerRequest, TurnMode};
use sunday_gmail::MockMailService;
use sunday_llm::{MockCompletionClient, Role};

fn chat(question: &str) -> AnswerRequest {
    AnswerRequest::new(question, TurnMode::Chat)
}

#[tokio::test]
async fn test_cancel_keeps_partial_answer_and_persists_once() {
    let completion = MockCompletionClient::new(vec!["one ", "two ", "three ", "four ", "five"])
        .with_fragment_delay(Duration::from_millis(100));
    let harness = Harness::new(completion);
    let (orchestrator, mut events) = harness.open().await;
    let orchestrator = Arc::new(orchestrator);

    let cycle = {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move { orchestrator.handle_answer(chat("count to five")).await })
    };
    tokio::time::sleep(Duration::from_millis(150)).await;
    orchestrator.handle_cancel();

    let partial = cycle.await.unwrap().unwrap();
    assert!(partial.len() < "one two three four five".len());
    assert!("one two three four five".starts_with(&partial));

    let thread = orchestrator.thread().await;
    // The turn keeps exactly the text accumulated before cancellation
    assert_eq!(thread.chats[0].answer, partial);
    // No assistant message is appended for an aborted stream
    assert_eq!(thread.messages.len(), 2);
    assert_eq!(harness.threads.put_count(), 1);

    let events = drain_events(&mut events);
    assert_eq!(
        events.last(),
        Some(&AnswerEvent::Completed { answer: partial })
    );
}

#[tokio::test]
async fn test_rewrite_replaces_last_assistant_message() {
    let completion = MockCompletionClient::new(vec!["rewritten answer"]);
    let harness = Harness::new(completion);
    let (orchestrator, _events) = harness.open().await;

    orchestrator.handle_answer(chat("original question")).await.unwrap();
    let before = orchestrator.thread().await;

    let answer = orchestrator.handle_rewrite().await.unwrap();
    assert_eq!(answer, "rewritten answer");

    let after = orchestrator.thread().await;
    // Same shape, new content behind the last assistant message
    assert_eq!(after.messages.len(), before.messages.len());
    assert_eq!(after.messages.last().unwrap().role, Role::Assistant);
    assert_eq!(after.messages.last().unwrap().content, "rewritten answer");
    assert_eq!(after.chats.len(), 1);
    assert_eq!(after.chats[0].answer, "rewritten answer");
}

#[tokio::test]
async fn test_rewrite_never_reaugments() {
    let mail = MockMailService::with_inbox(vec![MockMailService::record(
        "msg-1",
        "carol@example.com",
        "Standup notes",
        "we shipped it",
    )]);
    let completion = MockCompletionClient::new(vec!["answer about email"]);
    let harness = Harness::new(completion.clone()).with_mail(mail);
    harness.grant_gmail().await;
    let (orchestrator, _events) = harness.open().await;

    // First cycle augments because of the email keyword
    orchestrator.handle_answer(chat("summarize my inbox")).await.unwrap();
    assert!(completion.requests()[0].messages[0]
        .content
        .contains("carol@example.com"));

    // The rewrite rebuilds history without touching Gmail
    orchestrator.handle_rewrite().await.unwrap();
    let rewrite_request = &completion.requests()[1];
    for message in &rewrite_request.messages {
        assert!(!message.content.contains("carol@example.com"));
    }
}

#[tokio::test]
async fn test_rewrite_inserts_custom_instruction_before_final_user_message() {
    let completion = MockCompletionClient::new(vec!["with instruction"]);
    let harness = Harness::new(completion.clone());
    let (orchestrator, events) = harness.open().await;
    drop(events);
    let orchestrator = orchestrator.with_custom_instruction("Answer in French.");

    orchestrator.handle_answer(chat("bonjour?")).await.unwrap();
    orchestrator.handle_rewrite().await.unwrap();

    let messages = &completion.requests()[1].messages;
    let len = messages.len();
    assert_eq!(messages[len - 1].role, Role::User);
    assert_eq!(messages[len - 2].role, Role::System);
    assert_eq!(messages[len - 2].content, "Answer in French.");
}

#[tokio::test]
async fn test_rewrite_history_includes_prior_turns() {
    let completion = MockCompletionClient::new(vec!["latest"]);
    let harness = Harness::new(completion.clone());
    let (orchestrator, _events) = harness.open().await;

    orchestrator.handle_answer(chat("first question")).await.unwrap();
    orchestrator.handle_answer(chat("second question")).await.unwrap();
    orchestrator.handle_rewrite().await.unwrap();

    let messages = &completion.requests()[2].messages;
    // system, first q, first a, final user message
    assert_eq!(messages[0].role, Role::System);
    assert_eq!(messages[1].content, "first question");
    assert_eq!(messages[2].content, "latest");
    assert_eq!(messages.last().unwrap().content, "second question");
}
