//! Coalescing, predictive warm-up and background failure handling

mod common;

use std::time::Duration;

use common::{fixture, fixture_with, verbs};
use fluente_core::generation::ConjugationParams;
use fluente_core::{CacheKey, ContentKind, MemoryStore, MockGenerator, ServiceError};

#[tokio::test(start_paused = true)]
async fn concurrent_requests_share_one_generation() {
    let f = fixture_with(
        common::config(),
        std::sync::Arc::new(MemoryStore::new()),
        MockGenerator::new().with_delay(Duration::from_millis(200)),
    );

    let (a, b) = tokio::join!(f.library.conjugation("falar"), f.library.conjugation("falar"));

    assert_eq!(f.generator.call_count(ContentKind::Conjugation), 1);
    assert_eq!(a.unwrap(), b.unwrap());
}

#[tokio::test(start_paused = true)]
async fn user_request_joins_background_warmup() {
    let f = fixture_with(
        common::config(),
        std::sync::Arc::new(MemoryStore::new()),
        MockGenerator::new().with_delay(Duration::from_millis(200)),
    );
    let list = verbs(&["ser", "ter"]);

    f.library.on_verb_selected(&list, 0);
    // Let the warm-up register before the user asks
    tokio::time::sleep(Duration::from_millis(10)).await;
    let table = f.library.conjugation("ter").await.unwrap();
    f.library.quiesce().await;

    assert_eq!(table.verb, "ter");
    assert_eq!(f.generator.call_count(ContentKind::Conjugation), 1);
}

#[tokio::test]
async fn selecting_a_verb_warms_the_next_ones() {
    let f = fixture();
    let list = verbs(&["A", "B", "C", "D"]);

    f.library.conjugation("B").await.unwrap();
    assert_eq!(f.generator.call_count(ContentKind::Conjugation), 1);

    // Select B: it is cached, C and D are warmed
    f.library.conjugation("B").await.unwrap();
    f.library.on_verb_selected(&list, 1);
    f.library.quiesce().await;

    let requested: Vec<String> = f
        .generator
        .requests()
        .iter()
        .map(|r| r.params["verb"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(requested.len(), 3);
    assert_eq!(requested.iter().filter(|v| *v == "B").count(), 1);
    assert!(requested.contains(&"C".to_string()));
    assert!(requested.contains(&"D".to_string()));

    let cache = f.library.conjugations().cache();
    assert!(cache.contains(&CacheKey::for_verb("C")));
    assert!(cache.contains(&CacheKey::for_verb("D")));
    assert!(!cache.contains(&CacheKey::for_verb("A")));
}

#[tokio::test]
async fn background_failures_are_silent() {
    let f = fixture();
    f.generator.fail_with(ServiceError::with_status(429, "Too Many Requests"));

    f.library.on_verb_selected(&verbs(&["ser", "estar", "ir"]), 0);
    f.library.warm_startup(verbs(&["ter"]), None);
    f.library.quiesce().await;

    assert_eq!(f.generator.call_count(ContentKind::Conjugation), 3);
    assert!(f.library.conjugations().cache().is_empty());
    assert_eq!(
        f.library
            .conjugations()
            .coordinator()
            .statistics()
            .background_failures,
        3
    );
    assert_eq!(f.library.conjugations().coordinator().in_flight_count(), 0);

    // A later user request retries instead of seeing a cached failure
    f.generator.recover();
    let table = f.library.conjugation("estar").await.unwrap();
    assert_eq!(table.verb, "estar");
}

#[tokio::test]
async fn user_request_failure_propagates_classified() {
    let f = fixture();
    f.generator.fail_with(ServiceError::new("API key not valid"));

    let err = f.library.conjugation("falar").await.unwrap_err();

    assert_eq!(
        err.classification,
        fluente_core::ErrorClassification::InvalidCredential
    );
    assert!(!f
        .library
        .conjugations()
        .cache()
        .contains(&CacheKey::for_verb("falar")));
}

#[tokio::test]
async fn regenerate_goes_to_the_generator() {
    let f = fixture();
    let params = ConjugationParams {
        verb: "comer".to_string(),
    };

    f.library.conjugation("comer").await.unwrap();
    f.library.conjugations().regenerate(params).await.unwrap();

    assert_eq!(f.generator.call_count(ContentKind::Conjugation), 2);
}
