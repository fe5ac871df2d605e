//! Content kinds and their declared shapes

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use strum::{Display as StrumDisplay, EnumString};

use crate::caching::CacheKey;

/// Kinds of generated content, one cache namespace each
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, StrumDisplay, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    /// Full conjugation table of a verb
    Conjugation,
    /// Example sentences for one conjugated form
    Examples,
    /// Vocabulary list for a category
    Vocabulary,
    /// Scripted conversational scene
    Scene,
    /// Synthesized speech for one sentence
    Speech,
}

impl ContentKind {
    /// Store namespace backing this kind's cache
    pub fn namespace(&self) -> &'static str {
        match self {
            ContentKind::Conjugation => "conjugation_cache",
            ContentKind::Examples => "examples_cache",
            ContentKind::Vocabulary => "vocabulary_cache",
            ContentKind::Scene => "scene_cache",
            ContentKind::Speech => "speech_cache",
        }
    }
}

/// A generated value with a declared shape
pub trait Content: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Kind requested from the generator
    const KIND: ContentKind;

    /// Structured request parameters
    type Params: Serialize + Clone + Send + Sync + 'static;

    /// Cache key for a request with these parameters
    fn cache_key(params: &Self::Params) -> CacheKey;
}

/// Parameters for a conjugation table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConjugationParams {
    /// Infinitive, e.g. `falar`
    pub verb: String,
}

/// One person/number slot of a tense
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConjugatedForm {
    /// Grammatical person, e.g. `eu`, `nós`
    pub person: String,
    /// Inflected form, e.g. `falo`
    pub form: String,
}

/// All forms of one tense
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tense {
    /// Tense name, e.g. `presente`
    pub name: String,
    /// Forms in person order
    pub forms: Vec<ConjugatedForm>,
}

/// Conjugation table for a verb
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConjugationTable {
    /// Infinitive
    pub verb: String,
    /// English gloss of the infinitive
    #[serde(default)]
    pub translation: String,
    /// Tenses in presentation order
    pub tenses: Vec<Tense>,
}

impl Content for ConjugationTable {
    const KIND: ContentKind = ContentKind::Conjugation;
    type Params = ConjugationParams;

    fn cache_key(params: &Self::Params) -> CacheKey {
        CacheKey::for_verb(&params.verb)
    }
}

/// Parameters for example sentences
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExampleParams {
    /// Infinitive
    pub verb: String,
    /// Conjugated form the examples must use
    pub form: String,
}

/// A sentence with its translation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExampleSentence {
    /// Sentence in the target language
    pub text: String,
    /// English translation
    pub translation: String,
}

/// Example sentences for a conjugated form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExampleList {
    /// Sentences in presentation order
    pub sentences: Vec<ExampleSentence>,
}

impl Content for ExampleList {
    const KIND: ContentKind = ContentKind::Examples;
    type Params = ExampleParams;

    fn cache_key(params: &Self::Params) -> CacheKey {
        CacheKey::for_verb_form(&params.verb, &params.form)
    }
}

/// Parameters for a vocabulary list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VocabularyParams {
    /// Category, e.g. `Food`
    pub category: String,
}

/// One vocabulary word
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VocabularyItem {
    /// Word in the target language
    pub word: String,
    /// English translation
    pub translation: String,
    /// Optional usage example
    #[serde(default)]
    pub example: Option<String>,
}

/// Vocabulary for a category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VocabularyList {
    /// Category the words belong to
    pub category: String,
    /// Words in presentation order
    pub words: Vec<VocabularyItem>,
}

impl Content for VocabularyList {
    const KIND: ContentKind = ContentKind::Vocabulary;
    type Params = VocabularyParams;

    fn cache_key(params: &Self::Params) -> CacheKey {
        CacheKey::for_category(&params.category)
    }
}

/// Parameters for a scripted scene
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneParams {
    /// Broad domain, e.g. `travel`
    pub domain: String,
    /// Subtopic within the domain
    pub subtopic: String,
    /// Communicative function practised
    pub function: String,
}

/// One line of dialogue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneLine {
    /// Who speaks
    pub speaker: String,
    /// Line in the target language
    pub text: String,
    /// English translation
    pub translation: String,
}

/// A short scripted conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scene {
    /// Scene title
    pub title: String,
    /// Dialogue lines in order
    pub lines: Vec<SceneLine>,
}

impl Content for Scene {
    const KIND: ContentKind = ContentKind::Scene;
    type Params = SceneParams;

    fn cache_key(params: &Self::Params) -> CacheKey {
        CacheKey::for_scene(&params.domain, &params.subtopic, &params.function)
    }
}

/// Parameters for speech synthesis
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeechParams {
    /// Sentence to speak
    pub text: String,
}

/// Synthesized audio, opaque to this crate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeechClip {
    /// Sentence that was spoken
    pub text: String,
    /// Audio container, e.g. `audio/wav`
    pub mime_type: String,
    /// Base64 audio payload as returned by the service
    pub audio_base64: String,
}

impl Content for SpeechClip {
    const KIND: ContentKind = ContentKind::Speech;
    type Params = SpeechParams;

    fn cache_key(params: &Self::Params) -> CacheKey {
        CacheKey::for_speech(&params.text)
    }
}
