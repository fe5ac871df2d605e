//! Conversational tutor: streamed replies in three strict phases
//!
//! A reply is produced as a correction of the learner's message, then the
//! reply text in chunks, then a translation of the full reply. The
//! [`Sequencer`] enforces that order and [`drive_reply`] feeds it from a
//! [`TutorBackend`](crate::core::traits::TutorBackend).

pub mod conversation;
pub mod mock;
pub mod sequencer;

use serde::{Deserialize, Serialize};
use strum::Display as StrumDisplay;
use thiserror::Error;

use crate::generation::GenerationError;

pub use conversation::{ChatMessage, Conversation, FailurePolicy, MessageStatus};
pub use mock::{MockTutor, TutorPhase};
pub use sequencer::{drive_reply, ReplyEvent, Sequencer, SequencerState, StreamedReply};

/// Placeholder shown in place of the translation while a reply streams
pub const PENDING_TRANSLATION: &str = "…";

/// Corrected form of a learner's sentence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Correction {
    /// Sentence as it should have been written
    pub corrected: String,
    /// English translation of the corrected sentence
    pub translation: String,
}

impl Correction {
    /// Build a correction
    pub fn new(corrected: impl Into<String>, translation: impl Into<String>) -> Self {
        Self {
            corrected: corrected.into(),
            translation: translation.into(),
        }
    }
}

/// Author of a conversation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, StrumDisplay, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The learner
    User,
    /// The tutor
    Tutor,
}

/// One prior turn handed to the backend as context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    /// Who said it
    pub role: Role,
    /// What was said
    pub text: String,
}

impl ChatTurn {
    /// A learner turn
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    /// A tutor turn
    pub fn tutor(text: impl Into<String>) -> Self {
        Self {
            role: Role::Tutor,
            text: text.into(),
        }
    }
}

/// Why a streamed reply failed
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StreamFailure {
    /// The backend failed during one of the phases
    #[error("{0}")]
    Generation(#[from] GenerationError),

    /// An event arrived out of protocol order
    #[error("Unexpected {event} event while {state}")]
    ProtocolViolation {
        /// Sequencer state when the event arrived
        state: SequencerState,
        /// Kind of the offending event
        event: &'static str,
    },

    /// The reply stream ended without producing any text
    #[error("Tutor reply stream ended without any text")]
    EmptyReply,
}

/// Errors from a [`Conversation`]
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TutorError {
    /// A reply is still streaming for this conversation
    #[error("A reply is already streaming; wait for it to finish")]
    StreamInProgress,

    /// The reply stream failed
    #[error("Reply stream failed: {0}")]
    Stream(#[from] StreamFailure),
}
