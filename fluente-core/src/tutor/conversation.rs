//! Chat history with one active reply stream at a time

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use strum::Display as StrumDisplay;
use uuid::Uuid;

use super::sequencer::{drive_reply, StreamedReply};
use super::{ChatTurn, Correction, Role, StreamFailure, TutorError, PENDING_TRANSLATION};
use crate::core::traits::{RenderSink, TutorBackend};

/// Delivery state of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, StrumDisplay, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    /// Final
    Complete,
    /// Reply text still arriving
    Streaming,
    /// The reply to (or of) this message failed
    Failed,
}

/// What to do with the learner's message when its reply fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, StrumDisplay, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Drop the message and any partial reply, as if it was never sent
    #[default]
    RemoveUserMessage,
    /// Keep both and mark them failed
    MarkFailed,
}

/// One entry in the chat history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Stable identifier
    pub id: Uuid,
    /// Author
    pub role: Role,
    /// Message text
    pub text: String,
    /// Correction of a learner message
    pub correction: Option<Correction>,
    /// Translation of a tutor message
    pub translation: Option<String>,
    /// Creation time
    pub timestamp: DateTime<Utc>,
    /// Delivery state
    pub status: MessageStatus,
}

impl ChatMessage {
    fn new(role: Role, text: impl Into<String>, status: MessageStatus) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            text: text.into(),
            correction: None,
            translation: None,
            timestamp: Utc::now(),
            status,
        }
    }

    fn as_turn(&self) -> ChatTurn {
        ChatTurn {
            role: self.role,
            text: self.text.clone(),
        }
    }
}

/// Clears the active-stream flag when the send finishes, however it finishes
struct ActiveStream<'a> {
    flag: &'a AtomicBool,
}

impl<'a> ActiveStream<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for ActiveStream<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Applies the failure policy if a send is dropped before it settles
///
/// Only one reply streams at a time, so the `Streaming` message in the
/// history belongs to this exchange.
struct PendingExchange<'a> {
    conversation: &'a Conversation,
    user_id: Uuid,
    settled: bool,
}

impl PendingExchange<'_> {
    fn settle(mut self) {
        self.settled = true;
    }
}

impl Drop for PendingExchange<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let reply_id = self
            .conversation
            .messages
            .lock()
            .iter()
            .find(|m| m.status == MessageStatus::Streaming)
            .map(|m| m.id);
        self.conversation.apply_failure_policy(self.user_id, reply_id);
        tracing::warn!(policy = %self.conversation.policy, "Reply stream abandoned by caller");
    }
}

/// Mirrors reply events into the history before passing them on
struct HistorySink<'a, S: ?Sized> {
    messages: &'a Mutex<Vec<ChatMessage>>,
    user_id: Uuid,
    reply_id: Option<Uuid>,
    inner: &'a mut S,
}

impl<S: ?Sized> HistorySink<'_, S> {
    fn update(&self, id: Uuid, f: impl FnOnce(&mut ChatMessage)) {
        if let Some(message) = self.messages.lock().iter_mut().find(|m| m.id == id) {
            f(message);
        }
    }
}

impl<S: RenderSink + ?Sized> RenderSink for HistorySink<'_, S> {
    fn on_correction(&mut self, correction: Option<&Correction>) {
        let owned = correction.cloned();
        self.update(self.user_id, |m| m.correction = owned);
        self.inner.on_correction(correction);
    }

    fn on_chunk(&mut self, text: &str) {
        match self.reply_id {
            Some(id) => self.update(id, |m| m.text.push_str(text)),
            None => {
                let mut reply = ChatMessage::new(Role::Tutor, text, MessageStatus::Streaming);
                reply.translation = Some(PENDING_TRANSLATION.to_string());
                self.reply_id = Some(reply.id);
                self.messages.lock().push(reply);
            },
        }
        self.inner.on_chunk(text);
    }

    fn on_translation(&mut self, text: &str) {
        if let Some(id) = self.reply_id {
            self.update(id, |m| {
                m.translation = Some(text.to_string());
                m.status = MessageStatus::Complete;
            });
        }
        self.inner.on_translation(text);
    }

    fn on_stream_error(&mut self, error: &StreamFailure) {
        self.inner.on_stream_error(error);
    }
}

/// A tutor conversation
///
/// [`send`](Self::send) takes `&self`, so a conversation can be shared; a
/// second send while a reply is streaming is rejected.
pub struct Conversation {
    backend: Arc<dyn TutorBackend>,
    messages: Mutex<Vec<ChatMessage>>,
    active: AtomicBool,
    policy: FailurePolicy,
    history_limit: usize,
}

impl Conversation {
    /// Start an empty conversation
    pub fn new(backend: Arc<dyn TutorBackend>, policy: FailurePolicy, history_limit: usize) -> Self {
        Self {
            backend,
            messages: Mutex::new(Vec::new()),
            active: AtomicBool::new(false),
            policy,
            history_limit,
        }
    }

    /// Send a learner message and stream the tutor's reply into `sink`
    ///
    /// On failure the history is cleaned up per the [`FailurePolicy`].
    pub async fn send<S>(&self, text: &str, sink: &mut S) -> Result<StreamedReply, TutorError>
    where
        S: RenderSink + ?Sized,
    {
        let _active = ActiveStream::acquire(&self.active).ok_or(TutorError::StreamInProgress)?;

        let message = text.trim();
        let history = self.context_turns();
        let user = ChatMessage::new(Role::User, message, MessageStatus::Complete);
        let user_id = user.id;
        self.messages.lock().push(user);
        // Declared after `_active` so it runs first on drop
        let exchange = PendingExchange {
            conversation: self,
            user_id,
            settled: false,
        };

        let mut history_sink = HistorySink {
            messages: &self.messages,
            user_id,
            reply_id: None,
            inner: sink,
        };
        let outcome = drive_reply(self.backend.as_ref(), &history, message, &mut history_sink).await;
        let reply_id = history_sink.reply_id;

        exchange.settle();

        match outcome {
            Ok(reply) => Ok(reply),
            Err(failure) => {
                self.apply_failure_policy(user_id, reply_id);
                tracing::warn!(
                    policy = %self.policy,
                    error = %failure,
                    "Discarding failed exchange"
                );
                Err(TutorError::Stream(failure))
            },
        }
    }

    /// Snapshot of the history
    pub fn messages(&self) -> Vec<ChatMessage> {
        self.messages.lock().clone()
    }

    /// Number of messages in the history
    pub fn len(&self) -> usize {
        self.messages.lock().len()
    }

    /// Whether the history is empty
    pub fn is_empty(&self) -> bool {
        self.messages.lock().is_empty()
    }

    /// Whether a reply is streaming
    pub fn is_streaming(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Forget the history
    pub fn clear(&self) {
        self.messages.lock().clear();
    }

    fn context_turns(&self) -> Vec<ChatTurn> {
        let messages = self.messages.lock();
        let completed: Vec<&ChatMessage> = messages
            .iter()
            .filter(|m| m.status == MessageStatus::Complete)
            .collect();
        let skip = completed.len().saturating_sub(self.history_limit);
        completed[skip..].iter().map(|m| m.as_turn()).collect()
    }

    fn apply_failure_policy(&self, user_id: Uuid, reply_id: Option<Uuid>) {
        let mut messages = self.messages.lock();
        match self.policy {
            FailurePolicy::RemoveUserMessage => {
                messages.retain(|m| m.id != user_id && Some(m.id) != reply_id);
            },
            FailurePolicy::MarkFailed => {
                for message in messages
                    .iter_mut()
                    .filter(|m| m.id == user_id || Some(m.id) == reply_id)
                {
                    message.status = MessageStatus::Failed;
                }
            },
        }
    }
}

impl std::fmt::Debug for Conversation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Conversation")
            .field("messages", &self.len())
            .field("streaming", &self.is_streaming())
            .field("policy", &self.policy)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::core::traits::ServiceError;
    use crate::tutor::{MockTutor, TutorPhase};

    #[derive(Default)]
    struct Silent {
        chunks: usize,
        errors: usize,
    }

    impl RenderSink for Silent {
        fn on_correction(&mut self, _correction: Option<&Correction>) {}
        fn on_chunk(&mut self, _text: &str) {
            self.chunks += 1;
        }
        fn on_translation(&mut self, _text: &str) {}
        fn on_stream_error(&mut self, _error: &StreamFailure) {
            self.errors += 1;
        }
    }

    fn conversation(tutor: MockTutor, policy: FailurePolicy) -> Conversation {
        Conversation::new(Arc::new(tutor), policy, 20)
    }

    #[tokio::test]
    async fn test_send_records_both_turns() {
        let tutor = MockTutor::new()
            .with_correction("Eu gosta de café", Correction::new("Eu gosto de café", "I like coffee"))
            .with_chunks(["Eu ", "também!"])
            .with_translation("Me too!");
        let conv = conversation(tutor, FailurePolicy::default());

        conv.send("Eu gosta de café", &mut Silent::default()).await.unwrap();

        let messages = conv.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(
            messages[0].correction.as_ref().map(|c| c.corrected.as_str()),
            Some("Eu gosto de café")
        );
        assert_eq!(messages[1].text, "Eu também!");
        assert_eq!(messages[1].translation.as_deref(), Some("Me too!"));
        assert_eq!(messages[1].status, MessageStatus::Complete);
        assert!(!conv.is_streaming());
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_send_is_rejected_while_streaming() {
        let tutor = MockTutor::new().with_chunk_delay(Duration::from_millis(10));
        let conv = conversation(tutor, FailurePolicy::default());

        let mut first_sink = Silent::default();
        let mut second_sink = Silent::default();
        let (first, second) = tokio::join!(
            conv.send("Olá", &mut first_sink),
            conv.send("Tudo bem?", &mut second_sink),
        );

        assert!(first.is_ok());
        assert_eq!(second.unwrap_err(), TutorError::StreamInProgress);
        assert_eq!(second_sink.chunks, 0);
        assert_eq!(conv.len(), 2);
    }

    #[tokio::test]
    async fn test_failure_removes_user_message() {
        let tutor = MockTutor::new()
            .fail_at(TutorPhase::Reply { after_chunks: 1 }, ServiceError::with_status(504, "gateway timeout"));
        let conv = conversation(tutor, FailurePolicy::RemoveUserMessage);
        let mut sink = Silent::default();

        let err = conv.send("Olá", &mut sink).await.unwrap_err();

        assert!(matches!(err, TutorError::Stream(StreamFailure::Generation(_))));
        assert!(conv.is_empty());
        assert_eq!(sink.chunks, 1);
        assert_eq!(sink.errors, 1);
        // The guard was released; the next send goes through
        assert!(!conv.is_streaming());
    }

    #[tokio::test]
    async fn test_failure_marks_messages() {
        let tutor = MockTutor::new()
            .fail_at(TutorPhase::Translation, ServiceError::with_status(429, "quota"));
        let conv = conversation(tutor, FailurePolicy::MarkFailed);

        conv.send("Olá", &mut Silent::default()).await.unwrap_err();

        let messages = conv.messages();
        assert_eq!(messages.len(), 2);
        assert!(messages.iter().all(|m| m.status == MessageStatus::Failed));
        assert_eq!(messages[1].translation.as_deref(), Some(PENDING_TRANSLATION));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_send_removes_partial_exchange() {
        let tutor = MockTutor::new().with_chunk_delay(Duration::from_millis(10));
        let conv = conversation(tutor, FailurePolicy::RemoveUserMessage);
        let mut sink = Silent::default();

        let abandoned = conv.send("Olá", &mut sink);
        assert!(tokio::time::timeout(Duration::from_millis(15), abandoned).await.is_err());

        assert_eq!(sink.chunks, 1);
        assert!(conv.is_empty());
        assert!(!conv.is_streaming());
        conv.send("Olá de novo", &mut Silent::default()).await.unwrap();
        assert_eq!(conv.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_send_marks_partial_exchange() {
        let tutor = MockTutor::new().with_chunk_delay(Duration::from_millis(10));
        let conv = conversation(tutor, FailurePolicy::MarkFailed);
        let mut sink = Silent::default();

        let abandoned = conv.send("Olá", &mut sink);
        assert!(tokio::time::timeout(Duration::from_millis(15), abandoned).await.is_err());

        let messages = conv.messages();
        assert_eq!(messages.len(), 2);
        assert!(messages.iter().all(|m| m.status == MessageStatus::Failed));
        assert!(conv.context_turns().is_empty());
    }

    #[tokio::test]
    async fn test_history_excludes_failed_and_respects_limit() {
        let tutor = Arc::new(MockTutor::new());
        let conv = Conversation::new(tutor.clone(), FailurePolicy::MarkFailed, 2);

        conv.send("um", &mut Silent::default()).await.unwrap();
        conv.send("dois", &mut Silent::default()).await.unwrap();

        let turns = conv.context_turns();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0], ChatTurn::user("dois"));
        assert_eq!(turns[1].role, Role::Tutor);
    }
}
