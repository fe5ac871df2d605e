//! Scripted tutor backend for tests and offline use

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use parking_lot::Mutex;

use super::{ChatTurn, Correction};
use crate::core::traits::{ReplyStream, ServiceError, TutorBackend};

/// Point at which a [`MockTutor`] fails
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TutorPhase {
    /// The correction request fails
    Correction,
    /// The reply stream fails after yielding `after_chunks` chunks
    Reply {
        /// Chunks delivered before the error
        after_chunks: usize,
    },
    /// The translation request fails
    Translation,
}

/// Mock implementation of [`TutorBackend`]
///
/// Without scripted chunks the reply echoes the learner's message.
#[derive(Debug, Default)]
pub struct MockTutor {
    corrections: HashMap<String, Correction>,
    chunks: Option<Vec<String>>,
    translation: Option<String>,
    chunk_delay: Option<Duration>,
    failure: Mutex<Option<(TutorPhase, ServiceError)>>,
    replies: AtomicUsize,
    translated: Mutex<Vec<String>>,
}

impl MockTutor {
    /// Create a tutor that never corrects and echoes replies
    pub fn new() -> Self {
        Self::default()
    }

    /// Correct `message` with `correction`
    pub fn with_correction(mut self, message: impl Into<String>, correction: Correction) -> Self {
        self.corrections.insert(message.into(), correction);
        self
    }

    /// Stream exactly these chunks for every reply
    pub fn with_chunks<I, S>(mut self, chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.chunks = Some(chunks.into_iter().map(Into::into).collect());
        self
    }

    /// Answer every translation request with `text`
    pub fn with_translation(mut self, text: impl Into<String>) -> Self {
        self.translation = Some(text.into());
        self
    }

    /// Pause before each chunk
    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = Some(delay);
        self
    }

    /// Fail at `phase` until [`recover`](Self::recover)
    pub fn fail_at(self, phase: TutorPhase, error: ServiceError) -> Self {
        *self.failure.lock() = Some((phase, error));
        self
    }

    /// Stop failing
    pub fn recover(&self) {
        *self.failure.lock() = None;
    }

    /// Number of reply streams started
    pub fn reply_count(&self) -> usize {
        self.replies.load(Ordering::SeqCst)
    }

    /// Texts passed to `translate`, in call order
    pub fn translated_texts(&self) -> Vec<String> {
        self.translated.lock().clone()
    }

    fn failure_at(&self, wanted: impl Fn(TutorPhase) -> bool) -> Option<(TutorPhase, ServiceError)> {
        self.failure
            .lock()
            .as_ref()
            .filter(|(phase, _)| wanted(*phase))
            .cloned()
    }
}

#[async_trait]
impl TutorBackend for MockTutor {
    async fn correct(
        &self,
        _history: &[ChatTurn],
        message: &str,
    ) -> Result<Option<Correction>, ServiceError> {
        if let Some((_, error)) = self.failure_at(|p| p == TutorPhase::Correction) {
            return Err(error);
        }
        Ok(self.corrections.get(message.trim()).cloned())
    }

    async fn reply_stream(
        &self,
        _history: &[ChatTurn],
        message: &str,
    ) -> Result<ReplyStream, ServiceError> {
        self.replies.fetch_add(1, Ordering::SeqCst);

        let chunks = self.chunks.clone().unwrap_or_else(|| {
            vec![
                "Muito bem! ".to_string(),
                "Você disse: ".to_string(),
                message.trim().to_string(),
            ]
        });

        let mut items: Vec<Result<String, ServiceError>> = chunks.into_iter().map(Ok).collect();
        if let Some((TutorPhase::Reply { after_chunks }, error)) =
            self.failure_at(|p| matches!(p, TutorPhase::Reply { .. }))
        {
            items.truncate(after_chunks);
            items.push(Err(error));
        }

        let delay = self.chunk_delay;
        Ok(stream::iter(items)
            .then(move |item| async move {
                if let Some(delay) = delay {
                    tokio::time::sleep(delay).await;
                }
                item
            })
            .boxed())
    }

    async fn translate(&self, text: &str) -> Result<String, ServiceError> {
        if let Some((_, error)) = self.failure_at(|p| p == TutorPhase::Translation) {
            return Err(error);
        }
        self.translated.lock().push(text.to_string());
        Ok(self
            .translation
            .clone()
            .unwrap_or_else(|| format!("[en] {text}")))
    }
}
