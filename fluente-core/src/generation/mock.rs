//! Deterministic mock generator for tests and offline use
//!
//! Responses are built from the request parameters, so equal requests get
//! equal content. Every request is recorded for later inspection.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};

use super::ContentKind;
use crate::core::traits::{ContentGenerator, GenerationRequest, ServiceError};

const PEOPLE: [&str; 6] = ["eu", "tu", "ele/ela", "nós", "vós", "eles/elas"];

const PANTRY: [(&str, &str); 8] = [
    ("pão", "bread"),
    ("queijo", "cheese"),
    ("leite", "milk"),
    ("maçã", "apple"),
    ("arroz", "rice"),
    ("feijão", "beans"),
    ("café", "coffee"),
    ("água", "water"),
];

/// Mock implementation of [`ContentGenerator`]
#[derive(Debug, Default)]
pub struct MockGenerator {
    calls: Mutex<HashMap<ContentKind, usize>>,
    requests: Mutex<Vec<GenerationRequest>>,
    overrides: Mutex<HashMap<ContentKind, Value>>,
    failure: Mutex<Option<ServiceError>>,
    delay: Option<Duration>,
}

impl MockGenerator {
    /// Create a generator that answers immediately
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate service latency
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Fail every request with `error` until [`recover`](Self::recover)
    pub fn fail_with(&self, error: ServiceError) {
        *self.failure.lock() = Some(error);
    }

    /// Stop failing
    pub fn recover(&self) {
        *self.failure.lock() = None;
    }

    /// Answer every request of `kind` with a fixed value
    pub fn respond_with(&self, kind: ContentKind, value: Value) {
        self.overrides.lock().insert(kind, value);
    }

    /// Number of requests received for a kind
    pub fn call_count(&self, kind: ContentKind) -> usize {
        self.calls.lock().get(&kind).copied().unwrap_or(0)
    }

    /// Number of requests received for all kinds
    pub fn total_calls(&self) -> usize {
        self.calls.lock().values().sum()
    }

    /// All requests received, in arrival order
    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().clone()
    }

    fn build_response(request: &GenerationRequest) -> Value {
        let param = |name: &str| {
            request.params[name]
                .as_str()
                .unwrap_or_default()
                .to_string()
        };

        match request.kind {
            ContentKind::Conjugation => {
                let verb = param("verb");
                let stem = verb
                    .strip_suffix("ar")
                    .or_else(|| verb.strip_suffix("er"))
                    .or_else(|| verb.strip_suffix("ir"))
                    .unwrap_or(verb.as_str())
                    .to_string();
                let endings = ["o", "as", "a", "amos", "ais", "am"];
                let forms: Vec<Value> = PEOPLE
                    .iter()
                    .zip(endings)
                    .map(|(person, ending)| json!({"person": person, "form": format!("{stem}{ending}")}))
                    .collect();
                json!({
                    "verb": verb,
                    "translation": format!("to {verb}"),
                    "tenses": [{"name": "presente", "forms": forms}],
                })
            },
            ContentKind::Examples => {
                let verb = param("verb");
                let form = param("form");
                let sentences: Vec<Value> = (1..=3)
                    .filter(|i| !request.exclude.contains(&format!("{form} ({i})")))
                    .map(|i| {
                        json!({
                            "text": format!("{form} ({i})"),
                            "translation": format!("example {i} of {verb}"),
                        })
                    })
                    .collect();
                json!({ "sentences": sentences })
            },
            ContentKind::Vocabulary => {
                let words: Vec<Value> = PANTRY
                    .iter()
                    .filter(|(word, _)| !request.exclude.iter().any(|e| e.as_str() == *word))
                    .take(5)
                    .map(|(word, translation)| json!({"word": word, "translation": translation}))
                    .collect();
                json!({ "category": param("category"), "words": words })
            },
            ContentKind::Scene => json!({
                "title": format!("{} / {}", param("domain"), param("subtopic")),
                "lines": [
                    {"speaker": "A", "text": "Bom dia!", "translation": "Good morning!"},
                    {"speaker": "B", "text": format!("Vamos praticar: {}.", param("function")), "translation": "Let's practise."},
                ],
            }),
            ContentKind::Speech => json!({
                "text": param("text"),
                "mime_type": "audio/wav",
                "audio_base64": "UklGRgAAAABXQVZF",
            }),
        }
    }
}

#[async_trait]
impl ContentGenerator for MockGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<Value, ServiceError> {
        *self.calls.lock().entry(request.kind).or_insert(0) += 1;
        self.requests.lock().push(request.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(error) = self.failure.lock().clone() {
            return Err(error);
        }

        if let Some(value) = self.overrides.lock().get(&request.kind).cloned() {
            return Ok(value);
        }

        Ok(Self::build_response(request))
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(kind: ContentKind, params: Value, exclude: &[&str]) -> GenerationRequest {
        GenerationRequest {
            kind,
            params,
            exclude: exclude.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn test_mock_honors_exclusions() {
        let mock = MockGenerator::new();
        let value = mock
            .generate(&request(
                ContentKind::Vocabulary,
                json!({"category": "Food"}),
                &["pão"],
            ))
            .await
            .unwrap();

        let words: Vec<&str> = value["words"]
            .as_array()
            .unwrap()
            .iter()
            .map(|w| w["word"].as_str().unwrap())
            .collect();
        assert!(!words.contains(&"pão"));
        assert_eq!(mock.call_count(ContentKind::Vocabulary), 1);
    }

    #[tokio::test]
    async fn test_mock_failure_injection() {
        let mock = MockGenerator::new();
        mock.fail_with(ServiceError::new("boom"));
        let result = mock
            .generate(&request(ContentKind::Scene, json!({}), &[]))
            .await;
        assert!(result.is_err());

        mock.recover();
        let result = mock
            .generate(&request(ContentKind::Scene, json!({}), &[]))
            .await;
        assert!(result.is_ok());
        assert_eq!(mock.total_calls(), 2);
    }
}
