//! Streamed tutor replies through a conversation

use std::sync::Arc;
use std::time::Duration;

use fluente_core::core::traits::ServiceError;
use fluente_core::tutor::{MessageStatus, Role, TutorPhase, PENDING_TRANSLATION};
use fluente_core::{
    Conversation, Correction, ErrorClassification, FailurePolicy, MockTutor, RenderSink,
    StreamFailure, TutorError,
};

#[derive(Debug, PartialEq)]
enum Event {
    Correction(Option<Correction>),
    Chunk(String),
    Translation(String),
    Error(String),
}

#[derive(Default)]
struct RecordingSink {
    events: Vec<Event>,
}

impl RenderSink for RecordingSink {
    fn on_correction(&mut self, correction: Option<&Correction>) {
        self.events.push(Event::Correction(correction.cloned()));
    }

    fn on_chunk(&mut self, text: &str) {
        self.events.push(Event::Chunk(text.to_string()));
    }

    fn on_translation(&mut self, text: &str) {
        self.events.push(Event::Translation(text.to_string()));
    }

    fn on_stream_error(&mut self, error: &StreamFailure) {
        self.events.push(Event::Error(error.to_string()));
    }
}

fn coffee_tutor() -> MockTutor {
    MockTutor::new()
        .with_correction("Eu gosta de café", Correction::new("Eu gosto de café", "I like coffee"))
        .with_chunks(["Eu também ", "gosto ", "de café!"])
        .with_translation("I like coffee too!")
}

#[tokio::test]
async fn correction_precedes_chunks_and_one_translation() {
    let conversation = Conversation::new(Arc::new(coffee_tutor()), FailurePolicy::default(), 20);
    let mut sink = RecordingSink::default();

    let reply = conversation.send("Eu gosta de café", &mut sink).await.unwrap();

    assert_eq!(
        sink.events.first(),
        Some(&Event::Correction(Some(Correction::new(
            "Eu gosto de café",
            "I like coffee"
        ))))
    );
    let chunks = sink
        .events
        .iter()
        .filter(|e| matches!(e, Event::Chunk(_)))
        .count();
    assert!(chunks >= 1);
    let translations: Vec<usize> = sink
        .events
        .iter()
        .enumerate()
        .filter(|(_, e)| matches!(e, Event::Translation(_)))
        .map(|(i, _)| i)
        .collect();
    assert_eq!(translations, vec![sink.events.len() - 1]);

    assert_eq!(reply.text(), "Eu também gosto de café!");
    assert_eq!(reply.translation(), "I like coffee too!");
}

#[tokio::test(start_paused = true)]
async fn reply_message_grows_in_place() {
    let tutor = coffee_tutor().with_chunk_delay(Duration::from_millis(50));
    let conversation = Arc::new(Conversation::new(Arc::new(tutor), FailurePolicy::default(), 20));

    let sender = Arc::clone(&conversation);
    let handle = tokio::spawn(async move {
        sender
            .send("Eu gosta de café", &mut RecordingSink::default())
            .await
    });

    // Two chunks in: one reply message with partial text and the placeholder
    tokio::time::sleep(Duration::from_millis(120)).await;
    let messages = conversation.messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[1].role, Role::Tutor);
    assert_eq!(messages[1].text, "Eu também gosto ");
    assert_eq!(messages[1].translation.as_deref(), Some(PENDING_TRANSLATION));
    assert_eq!(messages[1].status, MessageStatus::Streaming);
    assert!(conversation.is_streaming());

    handle.await.unwrap().unwrap();
    let messages = conversation.messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[1].text, "Eu também gosto de café!");
    assert_eq!(messages[1].status, MessageStatus::Complete);
}

#[tokio::test]
async fn failed_translation_is_reported_and_cleaned_up() {
    let tutor = coffee_tutor().fail_at(
        TutorPhase::Translation,
        ServiceError::with_status(429, "RESOURCE_EXHAUSTED"),
    );
    let conversation = Conversation::new(Arc::new(tutor), FailurePolicy::RemoveUserMessage, 20);
    let mut sink = RecordingSink::default();

    let err = conversation.send("Eu gosta de café", &mut sink).await.unwrap_err();

    match err {
        TutorError::Stream(StreamFailure::Generation(e)) => {
            assert_eq!(e.classification, ErrorClassification::QuotaExceeded)
        },
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(matches!(sink.events.last(), Some(Event::Error(_))));
    assert!(!sink
        .events
        .iter()
        .any(|e| matches!(e, Event::Translation(_))));
    assert!(conversation.is_empty());

    // The active-stream guard was released
    let mut sink = RecordingSink::default();
    let result = conversation.send("Olá", &mut sink).await;
    assert!(!matches!(result, Err(TutorError::StreamInProgress)));
    assert!(!conversation.is_streaming());
}

#[tokio::test]
async fn correction_failure_emits_nothing_but_the_error() {
    let tutor = MockTutor::new().fail_at(TutorPhase::Correction, ServiceError::new("request timed out"));
    let conversation = Conversation::new(Arc::new(tutor), FailurePolicy::MarkFailed, 20);
    let mut sink = RecordingSink::default();

    conversation.send("Olá", &mut sink).await.unwrap_err();

    assert_eq!(sink.events.len(), 1);
    assert!(matches!(&sink.events[0], Event::Error(msg) if msg.contains("timeout")));
    let messages = conversation.messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].status, MessageStatus::Failed);
}
