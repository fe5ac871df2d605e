//! Phase ordering for one streamed reply

use futures::StreamExt;
use serde::{Deserialize, Serialize};
use strum::Display as StrumDisplay;

use super::{ChatTurn, Correction, StreamFailure, PENDING_TRANSLATION};
use crate::core::traits::{RenderSink, ServiceError, TutorBackend};
use crate::generation::GenerationError;

/// Where a reply is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, StrumDisplay, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SequencerState {
    /// Nothing received yet
    AwaitingFirstEvent,
    /// Correction phase finished, no reply text yet
    CorrectionKnown,
    /// At least one chunk received
    ReceivingChunks,
    /// Translation received
    Translated,
    /// Reply handed off; no further events
    Done,
    /// Stream failed
    Failed,
}

/// One protocol event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyEvent {
    /// Result of the correction phase
    Correction(Option<Correction>),
    /// Next fragment of reply text
    Chunk(String),
    /// Translation of the full reply
    Translation(String),
}

impl ReplyEvent {
    fn name(&self) -> &'static str {
        match self {
            ReplyEvent::Correction(_) => "correction",
            ReplyEvent::Chunk(_) => "chunk",
            ReplyEvent::Translation(_) => "translation",
        }
    }
}

/// A tutor answer as assembled so far
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamedReply {
    correction: Option<Correction>,
    text: String,
    translation: Option<String>,
}

impl StreamedReply {
    /// Correction of the learner's message, if one was needed
    pub fn correction(&self) -> Option<&Correction> {
        self.correction.as_ref()
    }

    /// Reply text accumulated so far
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Translation, or the placeholder until it arrives
    pub fn translation(&self) -> &str {
        self.translation.as_deref().unwrap_or(PENDING_TRANSLATION)
    }

    /// Whether the translation has arrived
    pub fn is_translated(&self) -> bool {
        self.translation.is_some()
    }
}

/// State machine validating the order of [`ReplyEvent`]s
#[derive(Debug, Clone)]
pub struct Sequencer {
    state: SequencerState,
    reply: StreamedReply,
}

impl Default for Sequencer {
    fn default() -> Self {
        Self::new()
    }
}

impl Sequencer {
    /// Start awaiting the first event
    pub fn new() -> Self {
        Self {
            state: SequencerState::AwaitingFirstEvent,
            reply: StreamedReply::default(),
        }
    }

    /// Current state
    pub fn state(&self) -> SequencerState {
        self.state
    }

    /// Reply assembled so far
    pub fn reply(&self) -> &StreamedReply {
        &self.reply
    }

    /// Apply an event, failing the sequencer if it is out of order
    pub fn apply(&mut self, event: &ReplyEvent) -> Result<(), StreamFailure> {
        use SequencerState::*;

        let next = match (self.state, event) {
            (AwaitingFirstEvent, ReplyEvent::Correction(correction)) => {
                self.reply.correction = correction.clone();
                CorrectionKnown
            },
            (CorrectionKnown | ReceivingChunks, ReplyEvent::Chunk(text)) => {
                self.reply.text.push_str(text);
                ReceivingChunks
            },
            (ReceivingChunks, ReplyEvent::Translation(text)) => {
                self.reply.translation = Some(text.clone());
                Translated
            },
            (CorrectionKnown, ReplyEvent::Translation(_)) => {
                return Err(self.fail(StreamFailure::EmptyReply));
            },
            (state, event) => {
                return Err(self.fail(StreamFailure::ProtocolViolation {
                    state,
                    event: event.name(),
                }));
            },
        };

        self.state = next;
        Ok(())
    }

    /// Move to `failed` and hand back the cause
    pub fn fail(&mut self, failure: StreamFailure) -> StreamFailure {
        self.state = SequencerState::Failed;
        failure
    }

    /// Close a translated reply and release it
    pub fn finish(&mut self) -> Result<StreamedReply, StreamFailure> {
        match self.state {
            SequencerState::Translated => {
                self.state = SequencerState::Done;
                Ok(std::mem::take(&mut self.reply))
            },
            SequencerState::CorrectionKnown => Err(self.fail(StreamFailure::EmptyReply)),
            state => Err(self.fail(StreamFailure::ProtocolViolation {
                state,
                event: "finish",
            })),
        }
    }
}

fn phase_failure(error: ServiceError) -> StreamFailure {
    StreamFailure::Generation(GenerationError::from(error))
}

fn forward<S>(sequencer: &mut Sequencer, sink: &mut S, event: ReplyEvent) -> Result<(), StreamFailure>
where
    S: RenderSink + ?Sized,
{
    sequencer.apply(&event)?;
    match &event {
        ReplyEvent::Correction(correction) => sink.on_correction(correction.as_ref()),
        ReplyEvent::Chunk(text) => sink.on_chunk(text),
        ReplyEvent::Translation(text) => sink.on_translation(text),
    }
    Ok(())
}

async fn run_phases<B, S>(
    backend: &B,
    history: &[ChatTurn],
    message: &str,
    sequencer: &mut Sequencer,
    sink: &mut S,
) -> Result<(), StreamFailure>
where
    B: TutorBackend + ?Sized,
    S: RenderSink + ?Sized,
{
    let correction = backend.correct(history, message).await.map_err(phase_failure)?;
    forward(sequencer, sink, ReplyEvent::Correction(correction))?;

    let mut chunks = backend
        .reply_stream(history, message)
        .await
        .map_err(phase_failure)?;
    while let Some(chunk) = chunks.next().await {
        let chunk = chunk.map_err(phase_failure)?;
        if chunk.is_empty() {
            continue;
        }
        forward(sequencer, sink, ReplyEvent::Chunk(chunk))?;
    }

    if sequencer.state() == SequencerState::CorrectionKnown {
        return Err(StreamFailure::EmptyReply);
    }

    let reply_text = sequencer.reply().text().to_string();
    let translation = backend.translate(&reply_text).await.map_err(phase_failure)?;
    forward(sequencer, sink, ReplyEvent::Translation(translation))
}

/// Produce one tutor reply, forwarding each phase to `sink` as it completes
///
/// The phases run strictly one after another. On failure the sink receives
/// `on_stream_error` and nothing after it.
pub async fn drive_reply<B, S>(
    backend: &B,
    history: &[ChatTurn],
    message: &str,
    sink: &mut S,
) -> Result<StreamedReply, StreamFailure>
where
    B: TutorBackend + ?Sized,
    S: RenderSink + ?Sized,
{
    let mut sequencer = Sequencer::new();

    let outcome = match run_phases(backend, history, message, &mut sequencer, sink).await {
        Ok(()) => sequencer.finish(),
        Err(failure) => Err(sequencer.fail(failure)),
    };

    match outcome {
        Ok(reply) => {
            tracing::debug!(
                corrected = reply.correction().is_some(),
                chars = reply.text().chars().count(),
                "Tutor reply complete"
            );
            Ok(reply)
        },
        Err(failure) => {
            tracing::warn!(error = %failure, "Tutor reply failed");
            sink.on_stream_error(&failure);
            Err(failure)
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tutor::{MockTutor, TutorPhase};

    #[derive(Debug, Default)]
    struct Recorder {
        events: Vec<String>,
    }

    impl RenderSink for Recorder {
        fn on_correction(&mut self, correction: Option<&Correction>) {
            let label = correction.map_or("none".to_string(), |c| c.corrected.clone());
            self.events.push(format!("correction:{label}"));
        }

        fn on_chunk(&mut self, text: &str) {
            self.events.push(format!("chunk:{text}"));
        }

        fn on_translation(&mut self, text: &str) {
            self.events.push(format!("translation:{text}"));
        }

        fn on_stream_error(&mut self, error: &StreamFailure) {
            self.events.push(format!("error:{error}"));
        }
    }

    #[test]
    fn test_valid_sequence() {
        let mut seq = Sequencer::new();
        seq.apply(&ReplyEvent::Correction(None)).unwrap();
        assert_eq!(seq.state(), SequencerState::CorrectionKnown);
        seq.apply(&ReplyEvent::Chunk("Olá, ".into())).unwrap();
        seq.apply(&ReplyEvent::Chunk("tudo bem?".into())).unwrap();
        assert_eq!(seq.reply().text(), "Olá, tudo bem?");
        assert_eq!(seq.reply().translation(), PENDING_TRANSLATION);

        seq.apply(&ReplyEvent::Translation("Hi, all good?".into())).unwrap();
        let reply = seq.finish().unwrap();
        assert_eq!(reply.translation(), "Hi, all good?");
        assert_eq!(seq.state(), SequencerState::Done);
    }

    #[test]
    fn test_chunk_before_correction_is_violation() {
        let mut seq = Sequencer::new();
        let err = seq.apply(&ReplyEvent::Chunk("cedo".into())).unwrap_err();
        assert!(matches!(err, StreamFailure::ProtocolViolation { event: "chunk", .. }));
        assert_eq!(seq.state(), SequencerState::Failed);
    }

    #[test]
    fn test_no_events_after_done() {
        let mut seq = Sequencer::new();
        seq.apply(&ReplyEvent::Correction(None)).unwrap();
        seq.apply(&ReplyEvent::Chunk("a".into())).unwrap();
        seq.apply(&ReplyEvent::Translation("a".into())).unwrap();
        seq.finish().unwrap();

        let err = seq.apply(&ReplyEvent::Chunk("b".into())).unwrap_err();
        assert!(matches!(
            err,
            StreamFailure::ProtocolViolation {
                state: SequencerState::Done,
                ..
            }
        ));
    }

    #[test]
    fn test_translation_without_chunks_is_empty_reply() {
        let mut seq = Sequencer::new();
        seq.apply(&ReplyEvent::Correction(None)).unwrap();
        let err = seq.apply(&ReplyEvent::Translation("x".into())).unwrap_err();
        assert_eq!(err, StreamFailure::EmptyReply);
    }

    #[tokio::test]
    async fn test_drive_reply_orders_phases() {
        let tutor = MockTutor::new()
            .with_correction("Eu gosta de café", Correction::new("Eu gosto de café", "I like coffee"))
            .with_chunks(["Que ", "bom!"])
            .with_translation("How nice!");
        let mut sink = Recorder::default();

        let reply = drive_reply(&tutor, &[], "Eu gosta de café", &mut sink).await.unwrap();

        assert_eq!(
            sink.events,
            vec![
                "correction:Eu gosto de café",
                "chunk:Que ",
                "chunk:bom!",
                "translation:How nice!",
            ]
        );
        assert_eq!(reply.text(), "Que bom!");
        assert_eq!(tutor.translated_texts(), vec!["Que bom!".to_string()]);
    }

    #[tokio::test]
    async fn test_mid_stream_failure_stops_events() {
        let tutor = MockTutor::new()
            .with_chunks(["um ", "dois ", "três"])
            .fail_at(TutorPhase::Reply { after_chunks: 1 }, ServiceError::new("connection reset"));
        let mut sink = Recorder::default();

        let err = drive_reply(&tutor, &[], "Olá", &mut sink).await.unwrap_err();

        assert!(matches!(err, StreamFailure::Generation(_)));
        assert_eq!(sink.events.len(), 3);
        assert_eq!(sink.events[1], "chunk:um ");
        assert!(sink.events[2].starts_with("error:"));
        assert_eq!(tutor.translated_texts().len(), 0);
    }

    #[tokio::test]
    async fn test_empty_stream_fails() {
        let tutor = MockTutor::new().with_chunks(Vec::<String>::new());
        let mut sink = Recorder::default();

        let err = drive_reply(&tutor, &[], "Olá", &mut sink).await.unwrap_err();
        assert_eq!(err, StreamFailure::EmptyReply);
        assert_eq!(sink.events, vec!["correction:none", "error:Tutor reply stream ended without any text"]);
    }
}
