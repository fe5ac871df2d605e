//! Deterministic cache keys derived from a request's semantic identity

use std::fmt;

use sha2::{Digest, Sha256};

/// Key identifying one generation request inside a cache namespace
///
/// Two requests that normalise to the same key are treated as the same
/// request; the constructors below are the only way keys are built.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    /// Key for a verb's conjugation table
    pub fn for_verb(verb: &str) -> Self {
        Self(normalize_component(verb, true))
    }

    /// Key for example sentences of one conjugated form
    pub fn for_verb_form(verb: &str, form: &str) -> Self {
        Self::join(&[verb, form], true)
    }

    /// Key for a vocabulary category
    pub fn for_category(category: &str) -> Self {
        Self(normalize_component(category, true))
    }

    /// Key for a scripted scene
    pub fn for_scene(domain: &str, subtopic: &str, function: &str) -> Self {
        Self::join(&[domain, subtopic, function], true)
    }

    /// Key for the synthesized speech of a sentence
    ///
    /// Case is preserved; the normalised text is hashed to bound key length.
    pub fn for_speech(text: &str) -> Self {
        let normalized = normalize_component(text, false);
        let mut hasher = Sha256::new();
        hasher.update(normalized.as_bytes());
        Self(format!("{:x}", hasher.finalize()))
    }

    /// Wrap a key read back from a persisted namespace
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// The key as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn join(components: &[&str], lowercase: bool) -> Self {
        let parts: Vec<String> = components
            .iter()
            .map(|c| normalize_component(c, lowercase))
            .collect();
        Self(parts.join("|"))
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Collapse whitespace, trim, and optionally lower-case one key component
///
/// `|` is the component separator, so it is escaped as `\|` (and `\` as
/// `\\`) inside components. The escape is reversible, so distinct
/// components never share a key.
fn normalize_component(text: &str, lowercase: bool) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let collapsed = if lowercase {
        collapsed.to_lowercase()
    } else {
        collapsed
    };

    let mut escaped = String::with_capacity(collapsed.len());
    for c in collapsed.chars() {
        if c == '|' || c == '\\' {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_verb_key_normalization() {
        assert_eq!(CacheKey::for_verb("  Falar "), CacheKey::for_verb("falar"));
        assert_eq!(CacheKey::for_verb("falar").as_str(), "falar");
    }

    #[test]
    fn test_composite_keys() {
        assert_eq!(CacheKey::for_verb_form("Falar", "falo").as_str(), "falar|falo");
        assert_eq!(
            CacheKey::for_scene("Travel", "At the  airport", "asking directions").as_str(),
            "travel|at the airport|asking directions"
        );
    }

    #[test]
    fn test_separator_cannot_forge_components() {
        assert_ne!(
            CacheKey::for_verb_form("a|b", "c"),
            CacheKey::for_verb_form("a", "b|c")
        );
    }

    #[test]
    fn test_separator_is_not_conflated_with_slash() {
        assert_ne!(
            CacheKey::for_scene("travel", "greetings|farewells", "x"),
            CacheKey::for_scene("travel", "greetings/farewells", "x")
        );
        assert_eq!(
            CacheKey::for_scene("travel", "greetings|farewells", "x").as_str(),
            r"travel|greetings\|farewells|x"
        );
        assert_ne!(CacheKey::for_verb_form(r"a\", "b"), CacheKey::for_verb_form("a", r"\b"));
    }

    #[test]
    fn test_speech_key_is_case_sensitive_digest() {
        let key = CacheKey::for_speech("Eu gosto de café.");
        assert_eq!(key.as_str().len(), 64);
        assert_eq!(key, CacheKey::for_speech("Eu  gosto de café. "));
        assert_ne!(key, CacheKey::for_speech("eu gosto de café."));
    }

    proptest! {
        #[test]
        fn prop_key_derivation_is_deterministic(verb in "[a-zA-Z ]{1,20}", form in "[a-zA-Z ]{1,20}") {
            prop_assert_eq!(
                CacheKey::for_verb_form(&verb, &form),
                CacheKey::for_verb_form(&verb.to_uppercase(), &format!("  {form}  "))
            );
        }
    }
}
