//! Content library: caches, coordinator and gateway wired together
//!
//! This is the surface the front end talks to. User-facing methods return
//! generation errors; the `on_*` and `warm_*` triggers schedule background
//! work and never fail.

use std::sync::Arc;

use crate::caching::{CacheMetrics, ContentCache, FileStore, MemoryStore, NamespaceStore};
use crate::config::{Config, PrefetchConfig};
use crate::core::traits::{ContentGenerator, KeyValueStore};
use crate::core::{ErrorContext, Result};
use crate::generation::{
    ConjugationParams, ConjugationTable, Content, ExampleList, ExampleParams, ExclusionSet,
    GenerationError, GenerationGateway, Scene, SceneParams, SpeechClip, SpeechParams,
    VocabularyList, VocabularyParams,
};
use crate::prefetch::{drill_target, lookahead_targets, startup_targets, PrefetchCoordinator, TaskTracker};

/// Cached, coalesced access to one content kind
pub struct ContentSource<C> {
    coordinator: PrefetchCoordinator<C>,
    gateway: GenerationGateway,
}

impl<C> Clone for ContentSource<C> {
    fn clone(&self) -> Self {
        Self {
            coordinator: self.coordinator.clone(),
            gateway: self.gateway.clone(),
        }
    }
}

impl<C: Content> ContentSource<C> {
    /// Serve `cache` from `gateway`, tracking warm-ups in `tasks`
    pub fn new(cache: ContentCache<C>, gateway: GenerationGateway, tasks: Arc<TaskTracker>) -> Self {
        Self {
            coordinator: PrefetchCoordinator::new(Arc::new(cache), tasks),
            gateway,
        }
    }

    /// Cached value, generating it once on a miss
    pub async fn get(&self, params: C::Params) -> std::result::Result<C, GenerationError> {
        let key = C::cache_key(&params);
        let gateway = self.gateway.clone();
        self.coordinator
            .ensure(key, move || async move { gateway.fetch::<C>(&params, None).await })
            .await
    }

    /// Fresh value steered away from `exclude`
    ///
    /// With a non-empty exclusion set the cache is neither read nor written:
    /// the result is a variation for this caller, not the canonical entry.
    pub async fn get_excluding(
        &self,
        params: C::Params,
        exclude: &ExclusionSet,
    ) -> std::result::Result<C, GenerationError> {
        if exclude.is_empty() {
            return self.get(params).await;
        }
        tracing::debug!(kind = %C::KIND, excluded = exclude.len(), "Bypassing cache for exclusion request");
        self.gateway.fetch::<C>(&params, Some(exclude)).await
    }

    /// Replace the cached value with a fresh generation
    pub async fn regenerate(&self, params: C::Params) -> std::result::Result<C, GenerationError> {
        let key = C::cache_key(&params);
        let gateway = self.gateway.clone();
        self.coordinator
            .refresh(key, move || async move { gateway.fetch::<C>(&params, None).await })
            .await
    }

    /// Warm in the background
    pub fn warm(&self, params: C::Params) {
        let key = C::cache_key(&params);
        let gateway = self.gateway.clone();
        self.coordinator
            .warm(key, move || async move { gateway.fetch::<C>(&params, None).await });
    }

    /// Warm on the current task, swallowing failures
    pub async fn warm_now(&self, params: C::Params) {
        let key = C::cache_key(&params);
        let gateway = self.gateway.clone();
        self.coordinator
            .warm_now(key, move || async move { gateway.fetch::<C>(&params, None).await })
            .await;
    }

    /// The coordinator in front of the cache
    pub fn coordinator(&self) -> &PrefetchCoordinator<C> {
        &self.coordinator
    }

    /// The backing cache
    pub fn cache(&self) -> &Arc<ContentCache<C>> {
        self.coordinator.cache()
    }
}

/// All content kinds behind one facade
pub struct ContentLibrary {
    prefetch: PrefetchConfig,
    tasks: Arc<TaskTracker>,
    conjugations: ContentSource<ConjugationTable>,
    examples: ContentSource<ExampleList>,
    vocabulary: ContentSource<VocabularyList>,
    scenes: ContentSource<Scene>,
    speech: ContentSource<SpeechClip>,
}

impl ContentLibrary {
    /// Build the library over `store`, loading every namespace
    pub fn new(config: &Config, store: Arc<dyn KeyValueStore>, generator: Arc<dyn ContentGenerator>) -> Self {
        let gateway = GenerationGateway::new(generator, config.generation.timeout());
        let tasks = Arc::new(TaskTracker::new());
        let namespaces = NamespaceStore::new(store);
        let speech_namespaces = if config.store.persist_speech {
            namespaces.clone()
        } else {
            NamespaceStore::new(Arc::new(MemoryStore::new()))
        };

        fn source<C: Content>(
            namespaces: &NamespaceStore,
            gateway: &GenerationGateway,
            tasks: &Arc<TaskTracker>,
        ) -> ContentSource<C> {
            let cache = ContentCache::load(C::KIND.namespace(), namespaces.clone());
            ContentSource::new(cache, gateway.clone(), Arc::clone(tasks))
        }

        Self {
            prefetch: config.prefetch.clone(),
            conjugations: source(&namespaces, &gateway, &tasks),
            examples: source(&namespaces, &gateway, &tasks),
            vocabulary: source(&namespaces, &gateway, &tasks),
            scenes: source(&namespaces, &gateway, &tasks),
            speech: source(&speech_namespaces, &gateway, &tasks),
            tasks,
        }
    }

    /// Build the library over the configured cache directory
    pub fn open(config: &Config, generator: Arc<dyn ContentGenerator>) -> Result<Self> {
        let store = FileStore::open(&config.store.directory).with_context(&format!(
            "Cannot open cache directory {}",
            config.store.directory.display()
        ))?;
        tracing::info!(directory = %config.store.directory.display(), "Opened content store");
        Ok(Self::new(config, Arc::new(store), generator))
    }

    /// Conjugation table for a verb
    pub async fn conjugation(&self, verb: &str) -> std::result::Result<ConjugationTable, GenerationError> {
        self.conjugations
            .get(ConjugationParams {
                verb: verb.to_string(),
            })
            .await
    }

    /// Example sentences for a conjugated form; speech for them is warmed
    pub async fn examples(&self, verb: &str, form: &str) -> std::result::Result<ExampleList, GenerationError> {
        let list = self.examples.get(example_params(verb, form)).await?;
        self.on_sentences(list.sentences.iter().map(|s| s.text.as_str()));
        Ok(list)
    }

    /// Further examples avoiding sentences already shown
    pub async fn more_examples(
        &self,
        verb: &str,
        form: &str,
        seen: &ExclusionSet,
    ) -> std::result::Result<ExampleList, GenerationError> {
        let list = self.examples.get_excluding(example_params(verb, form), seen).await?;
        self.on_sentences(list.sentences.iter().map(|s| s.text.as_str()));
        Ok(list)
    }

    /// Vocabulary for a category, avoiding `exclude` when non-empty
    pub async fn vocabulary(
        &self,
        category: &str,
        exclude: &ExclusionSet,
    ) -> std::result::Result<VocabularyList, GenerationError> {
        let params = VocabularyParams {
            category: category.to_string(),
        };
        self.vocabulary.get_excluding(params, exclude).await
    }

    /// Scripted scene
    pub async fn scene(
        &self,
        domain: &str,
        subtopic: &str,
        function: &str,
    ) -> std::result::Result<Scene, GenerationError> {
        let params = SceneParams {
            domain: domain.to_string(),
            subtopic: subtopic.to_string(),
            function: function.to_string(),
        };
        let scene = self.scenes.get(params).await?;
        self.on_sentences(scene.lines.iter().map(|l| l.text.as_str()));
        Ok(scene)
    }

    /// Speech for a sentence
    pub async fn speech(&self, text: &str) -> std::result::Result<SpeechClip, GenerationError> {
        self.speech.get(speech_params(text)).await
    }

    /// After an idle delay, warm the working set except the active verb
    ///
    /// The active verb is left to the foreground fetch and never retried here.
    /// Targets are fetched one at a time so startup does not burst the
    /// generator.
    pub fn warm_startup(&self, working_set: Vec<String>, active: Option<String>) {
        let delay = self.prefetch.startup_delay();
        let conjugations = self.conjugations.clone();
        self.tasks.spawn(async move {
            tokio::time::sleep(delay).await;
            let targets = startup_targets(&working_set, active.as_deref());
            tracing::debug!(targets = targets.len(), "Startup warm-up");
            for verb in targets {
                conjugations
                    .warm_now(ConjugationParams {
                        verb: verb.to_string(),
                    })
                    .await;
            }
        });
    }

    /// Warm the verbs following `selected` in `list`
    pub fn on_verb_selected(&self, list: &[String], selected: usize) {
        for verb in lookahead_targets(list, selected, self.prefetch.lookahead) {
            self.conjugations.warm(ConjugationParams { verb: verb.clone() });
        }
    }

    /// Warm speech for sentences being shown
    pub fn on_sentences<'a>(&self, sentences: impl IntoIterator<Item = &'a str>) {
        if !self.prefetch.warm_speech {
            return;
        }
        for text in sentences {
            self.speech.warm(speech_params(text));
        }
    }

    /// Warm speech for the next item of a drill
    pub fn on_drill_item(&self, sentences: &[String], index: usize) {
        if !self.prefetch.warm_speech {
            return;
        }
        if let Some(next) = drill_target(sentences, index) {
            self.speech.warm(speech_params(next));
        }
    }

    /// Wait for all background work
    pub async fn quiesce(&self) {
        self.tasks.quiesce().await;
    }

    /// Conjugation source
    pub fn conjugations(&self) -> &ContentSource<ConjugationTable> {
        &self.conjugations
    }

    /// Example sentence source
    pub fn example_source(&self) -> &ContentSource<ExampleList> {
        &self.examples
    }

    /// Vocabulary source
    pub fn vocabulary_source(&self) -> &ContentSource<VocabularyList> {
        &self.vocabulary
    }

    /// Scene source
    pub fn scene_source(&self) -> &ContentSource<Scene> {
        &self.scenes
    }

    /// Speech source
    pub fn speech_source(&self) -> &ContentSource<SpeechClip> {
        &self.speech
    }

    /// Per-namespace cache counters
    pub fn cache_metrics(&self) -> Vec<(&str, CacheMetrics)> {
        vec![
            (self.conjugations.cache().namespace(), self.conjugations.cache().statistics()),
            (self.examples.cache().namespace(), self.examples.cache().statistics()),
            (self.vocabulary.cache().namespace(), self.vocabulary.cache().statistics()),
            (self.scenes.cache().namespace(), self.scenes.cache().statistics()),
            (self.speech.cache().namespace(), self.speech.cache().statistics()),
        ]
    }
}

impl std::fmt::Debug for ContentLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentLibrary")
            .field("prefetch", &self.prefetch)
            .field("tasks", &self.tasks)
            .finish_non_exhaustive()
    }
}

fn example_params(verb: &str, form: &str) -> ExampleParams {
    ExampleParams {
        verb: verb.to_string(),
        form: form.to_string(),
    }
}

fn speech_params(text: &str) -> SpeechParams {
    SpeechParams {
        text: text.to_string(),
    }
}
