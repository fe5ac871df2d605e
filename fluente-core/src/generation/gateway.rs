//! Generation gateway: the only path to the external generator

use std::sync::Arc;
use std::time::{Duration, Instant};

use super::{Content, ContentKind, ErrorClassification, ExclusionSet, GenerationError};
use crate::core::traits::{ContentGenerator, GenerationRequest};

/// Uniform `fetch(kind, params, exclude)` over a [`ContentGenerator`]
///
/// Cheap to clone; clones share the generator.
#[derive(Clone)]
pub struct GenerationGateway {
    generator: Arc<dyn ContentGenerator>,
    timeout: Duration,
}

impl GenerationGateway {
    /// Wrap a generator with a per-request deadline
    pub fn new(generator: Arc<dyn ContentGenerator>, timeout: Duration) -> Self {
        Self { generator, timeout }
    }

    /// Fetch typed content
    ///
    /// The generator's JSON must match `C`'s declared shape; a mismatch is an
    /// unclassified failure.
    pub async fn fetch<C: Content>(
        &self,
        params: &C::Params,
        exclude: Option<&ExclusionSet>,
    ) -> Result<C, GenerationError> {
        let params = serde_json::to_value(params).map_err(|e| {
            GenerationError::new(
                ErrorClassification::Unclassified,
                format!("Failed to encode {} parameters: {e}", C::KIND),
            )
        })?;

        let raw = self.fetch_raw(C::KIND, params, exclude).await?;

        serde_json::from_value(raw).map_err(|e| {
            tracing::warn!(kind = %C::KIND, error = %e, "Generator returned malformed content");
            GenerationError::new(
                ErrorClassification::Unclassified,
                format!("Malformed {} content: {e}", C::KIND),
            )
        })
    }

    /// Fetch untyped content
    pub async fn fetch_raw(
        &self,
        kind: ContentKind,
        params: serde_json::Value,
        exclude: Option<&ExclusionSet>,
    ) -> Result<serde_json::Value, GenerationError> {
        let request = GenerationRequest {
            kind,
            params,
            exclude: exclude.map(ExclusionSet::to_vec).unwrap_or_default(),
        };

        let start = Instant::now();
        let outcome = tokio::time::timeout(self.timeout, self.generator.generate(&request)).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        match outcome {
            Ok(Ok(value)) => {
                tracing::debug!(
                    kind = %kind,
                    generator = self.generator.name(),
                    excluded = request.exclude.len(),
                    elapsed_ms,
                    "Generation succeeded"
                );
                Ok(value)
            },
            Ok(Err(service_error)) => {
                let error = GenerationError::from(service_error);
                tracing::warn!(
                    kind = %kind,
                    generator = self.generator.name(),
                    classification = %error.classification,
                    error = %error.message,
                    elapsed_ms,
                    "Generation failed"
                );
                Err(error)
            },
            Err(_) => {
                tracing::warn!(
                    kind = %kind,
                    generator = self.generator.name(),
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Generation timed out"
                );
                Err(GenerationError::new(
                    ErrorClassification::Timeout,
                    format!("No {kind} content after {}s", self.timeout.as_secs()),
                ))
            },
        }
    }

    /// Name of the wrapped generator
    pub fn generator_name(&self) -> &str {
        self.generator.name()
    }
}

impl std::fmt::Debug for GenerationGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationGateway")
            .field("generator", &self.generator.name())
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::traits::ServiceError;
    use crate::generation::{MockGenerator, VocabularyList, VocabularyParams};

    fn food() -> VocabularyParams {
        VocabularyParams {
            category: "Food".to_string(),
        }
    }

    #[tokio::test]
    async fn test_fetch_typed_content() {
        let generator = Arc::new(MockGenerator::new());
        let gateway = GenerationGateway::new(generator.clone(), Duration::from_secs(5));

        let list: VocabularyList = gateway.fetch(&food(), None).await.unwrap();
        assert_eq!(list.category, "Food");
        assert!(!list.words.is_empty());
        assert_eq!(generator.call_count(ContentKind::Vocabulary), 1);
    }

    #[tokio::test]
    async fn test_exclusion_set_is_embedded() {
        let generator = Arc::new(MockGenerator::new());
        let gateway = GenerationGateway::new(generator.clone(), Duration::from_secs(5));
        let exclude: ExclusionSet = ["pão", "queijo"].into_iter().collect();

        let _: VocabularyList = gateway.fetch(&food(), Some(&exclude)).await.unwrap();

        let requests = generator.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].exclude, vec!["pão", "queijo"]);
        assert_eq!(requests[0].params["category"], "Food");
    }

    #[tokio::test]
    async fn test_failure_is_classified() {
        let generator = Arc::new(MockGenerator::new());
        generator.fail_with(ServiceError::with_status(429, "Too Many Requests"));
        let gateway = GenerationGateway::new(generator, Duration::from_secs(5));

        let err = gateway.fetch::<VocabularyList>(&food(), None).await.unwrap_err();
        assert_eq!(err.classification, ErrorClassification::QuotaExceeded);
    }

    #[tokio::test]
    async fn test_malformed_content_is_unclassified_error() {
        let generator = Arc::new(MockGenerator::new());
        generator.respond_with(ContentKind::Vocabulary, serde_json::json!({"oops": true}));
        let gateway = GenerationGateway::new(generator, Duration::from_secs(5));

        let err = gateway.fetch::<VocabularyList>(&food(), None).await.unwrap_err();
        assert_eq!(err.classification, ErrorClassification::Unclassified);
        assert!(err.message.contains("Malformed vocabulary"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_maps_to_timeout() {
        let generator = Arc::new(MockGenerator::new().with_delay(Duration::from_secs(120)));
        let gateway = GenerationGateway::new(generator, Duration::from_secs(60));

        let err = gateway.fetch::<VocabularyList>(&food(), None).await.unwrap_err();
        assert_eq!(err.classification, ErrorClassification::Timeout);
    }
}
