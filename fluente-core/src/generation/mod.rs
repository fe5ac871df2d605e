//! Content generation
//!
//! The [`GenerationGateway`] is the single choke point for calls to the
//! external generation capability. It classifies failures and embeds
//! exclusion sets, and it never touches a cache.

pub mod content;
pub mod gateway;
pub mod mock;

use std::collections::BTreeSet;

use strum::Display as StrumDisplay;

pub use content::{
    ConjugatedForm, ConjugationParams, ConjugationTable, Content, ContentKind, ExampleList,
    ExampleParams, ExampleSentence, Scene, SceneLine, SceneParams, SpeechClip, SpeechParams,
    Tense, VocabularyItem, VocabularyList, VocabularyParams,
};
pub use gateway::GenerationGateway;
pub use mock::MockGenerator;

use crate::core::traits::ServiceError;

/// Advisory category of a generation failure
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, StrumDisplay, serde::Serialize, serde::Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ErrorClassification {
    /// The service's quota or rate limit was hit
    QuotaExceeded,
    /// The credential was missing, wrong or lacks permission
    InvalidCredential,
    /// The call did not finish in time
    Timeout,
    /// Anything else
    Unclassified,
}

impl ErrorClassification {
    /// Classify a failure signal
    pub fn classify(error: &ServiceError) -> Self {
        match error.status {
            Some(429) => return ErrorClassification::QuotaExceeded,
            Some(401) | Some(403) => return ErrorClassification::InvalidCredential,
            Some(408) | Some(504) => return ErrorClassification::Timeout,
            _ => {},
        }

        let message = error.message.to_lowercase();
        if ["quota", "resource_exhausted", "resource exhausted", "rate limit", "too many requests"]
            .iter()
            .any(|needle| message.contains(needle))
        {
            ErrorClassification::QuotaExceeded
        } else if ["api key", "api_key", "credential", "unauthorized", "permission denied"]
            .iter()
            .any(|needle| message.contains(needle))
        {
            ErrorClassification::InvalidCredential
        } else if ["timeout", "timed out", "deadline"]
            .iter()
            .any(|needle| message.contains(needle))
        {
            ErrorClassification::Timeout
        } else {
            ErrorClassification::Unclassified
        }
    }

    /// Retry-friendly guidance for the user
    pub fn hint(&self) -> &'static str {
        match self {
            ErrorClassification::QuotaExceeded => {
                "The generation quota is used up; wait a moment and try again"
            },
            ErrorClassification::InvalidCredential => {
                "Check the configured API key or model credentials"
            },
            ErrorClassification::Timeout => "The service is slow right now; try again",
            ErrorClassification::Unclassified => "Try again; the request was not cached",
        }
    }
}

/// Failure returned by the gateway
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Generation failed ({classification}): {message}")]
pub struct GenerationError {
    /// Advisory category
    pub classification: ErrorClassification,
    /// Failure message from the service or the gateway
    pub message: String,
}

impl GenerationError {
    /// Create an error with an explicit classification
    pub fn new(classification: ErrorClassification, message: impl Into<String>) -> Self {
        Self {
            classification,
            message: message.into(),
        }
    }
}

impl From<ServiceError> for GenerationError {
    fn from(err: ServiceError) -> Self {
        Self {
            classification: ErrorClassification::classify(&err),
            message: err.message,
        }
    }
}

/// Previously-seen items a new generation should avoid repeating
///
/// Ordered so the embedded request is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ExclusionSet(BTreeSet<String>);

impl ExclusionSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an item
    pub fn insert(&mut self, item: impl Into<String>) -> bool {
        self.0.insert(item.into())
    }

    /// Whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of items
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether an item is present
    pub fn contains(&self, item: &str) -> bool {
        self.0.contains(item)
    }

    /// Items in sorted order
    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.0.iter()
    }

    /// Items as a sorted vector
    pub fn to_vec(&self) -> Vec<String> {
        self.0.iter().cloned().collect()
    }
}

impl<S: Into<String>> FromIterator<S> for ExclusionSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl<S: Into<String>> Extend<S> for ExclusionSet {
    fn extend<I: IntoIterator<Item = S>>(&mut self, iter: I) {
        self.0.extend(iter.into_iter().map(Into::into));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_by_status() {
        let cases = [
            (429, ErrorClassification::QuotaExceeded),
            (401, ErrorClassification::InvalidCredential),
            (403, ErrorClassification::InvalidCredential),
            (504, ErrorClassification::Timeout),
            (500, ErrorClassification::Unclassified),
        ];
        for (status, expected) in cases {
            let err = ServiceError::with_status(status, "request failed");
            assert_eq!(ErrorClassification::classify(&err), expected, "status {status}");
        }
    }

    #[test]
    fn test_classify_by_message() {
        let quota = ServiceError::new("RESOURCE_EXHAUSTED: Quota exceeded for model");
        assert_eq!(
            ErrorClassification::classify(&quota),
            ErrorClassification::QuotaExceeded
        );

        let key = ServiceError::new("API key not valid. Please pass a valid API key.");
        assert_eq!(
            ErrorClassification::classify(&key),
            ErrorClassification::InvalidCredential
        );

        let slow = ServiceError::new("connection timed out");
        assert_eq!(ErrorClassification::classify(&slow), ErrorClassification::Timeout);

        let other = ServiceError::new("model returned garbage");
        assert_eq!(
            ErrorClassification::classify(&other),
            ErrorClassification::Unclassified
        );
    }

    #[test]
    fn test_exclusion_set_is_sorted_and_deduplicated() {
        let mut set: ExclusionSet = ["pão", "água", "pão"].into_iter().collect();
        set.insert("café");
        assert_eq!(set.len(), 3);
        assert_eq!(set.to_vec(), vec!["café", "pão", "água"]);
    }

    #[test]
    fn test_generation_error_display() {
        let err = GenerationError::new(ErrorClassification::Timeout, "no reply after 60s");
        assert_eq!(err.to_string(), "Generation failed (timeout): no reply after 60s");
    }
}
