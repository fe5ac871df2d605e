//! Core traits for Fluente's external collaborators
//!
//! The library never talks to a model, a disk or a screen directly. It goes
//! through the narrow contracts defined here:
//!
//! - [`ContentGenerator`]: the opaque generation capability
//! - [`TutorBackend`]: the three phases of a tutor reply
//! - [`KeyValueStore`]: durable namespace storage
//! - [`RenderSink`]: the consumer of streamed tutor replies

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::generation::ContentKind;
use crate::tutor::{ChatTurn, Correction, StreamFailure};

/// Failure signal reported by a generation service
///
/// Carries whatever the transport knows; the gateway turns it into an
/// [`ErrorClassification`](crate::generation::ErrorClassification).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ServiceError {
    /// HTTP-like status code when the transport exposes one
    pub status: Option<u16>,
    /// Raw failure message
    pub message: String,
}

impl ServiceError {
    /// Create a failure without a status code
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }

    /// Create a failure carrying a status code
    pub fn with_status(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
        }
    }
}

/// One request to the generation capability
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct GenerationRequest {
    /// What shape of content is requested
    pub kind: ContentKind,
    /// Structured parameters for the kind
    pub params: serde_json::Value,
    /// Items the result should avoid repeating (empty for cacheable requests)
    pub exclude: Vec<String>,
}

/// Opaque generation capability
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    /// Generate structured content for a request
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> std::result::Result<serde_json::Value, ServiceError>;

    /// Human-readable backend name for logs
    fn name(&self) -> &str {
        "generator"
    }
}

/// Stream of reply text fragments in emission order
pub type ReplyStream = BoxStream<'static, std::result::Result<String, ServiceError>>;

/// Tutor-side view of the generation capability
#[async_trait]
pub trait TutorBackend: Send + Sync {
    /// Check the learner's message; `None` means no correction is needed
    async fn correct(
        &self,
        history: &[ChatTurn],
        message: &str,
    ) -> std::result::Result<Option<Correction>, ServiceError>;

    /// Start streaming the tutor's reply
    async fn reply_stream(
        &self,
        history: &[ChatTurn],
        message: &str,
    ) -> std::result::Result<ReplyStream, ServiceError>;

    /// Translate the finished reply
    async fn translate(&self, text: &str) -> std::result::Result<String, ServiceError>;
}

/// Durable storage of one serialized blob per namespace
///
/// Implementations are synchronous and local.
pub trait KeyValueStore: Send + Sync {
    /// Read a namespace, `None` when it was never written
    fn read_namespace(&self, name: &str) -> std::io::Result<Option<String>>;

    /// Replace a namespace with a new blob
    fn write_namespace(&self, name: &str, blob: &str) -> std::io::Result<()>;

    /// Remove a namespace
    fn clear_namespace(&self, name: &str) -> std::io::Result<()>;
}

/// Consumer of a streamed tutor reply
///
/// Callbacks fire in protocol order: one `on_correction`, one or more
/// `on_chunk`, one `on_translation`. `on_stream_error` may replace any suffix
/// of that sequence.
pub trait RenderSink: Send {
    /// The correction phase finished (`None`: the message was fine)
    fn on_correction(&mut self, correction: Option<&Correction>);

    /// A reply fragment arrived; the first call creates the reply message
    fn on_chunk(&mut self, text: &str);

    /// The reply translation arrived
    fn on_translation(&mut self, text: &str);

    /// The stream failed and no further callbacks will fire
    fn on_stream_error(&mut self, error: &StreamFailure);
}
