//! Concept registry.

use std::collections::BTreeMap;

use super::builtin;
use super::concept::{Concept, Keyword};
use crate::errors::{BiasError, Result};
use crate::pipeline::error_code::ErrorCode;
use crate::pipeline::errors::ConfigError;

/// Named concepts available to a detection run.
///
/// Names are unique. Keywords may appear in more than one concept.
#[derive(Debug, Clone, Default)]
pub struct ConceptRegistry {
    concepts: Vec<Concept>,
}

impl ConceptRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the built-in concepts for a language (`"en"`).
    pub fn builtin(lang: &str) -> Result<Self> {
        let concepts = builtin::concepts_for(lang).ok_or_else(|| {
            BiasError::from(
                ConfigError::new(
                    ErrorCode::UnsupportedLanguage,
                    "/lang",
                    format!("no built-in concepts for language '{lang}'"),
                )
                .with_hint("Use \"en\" or build a registry with ConceptRegistry::from_json"),
            )
        })?;
        let mut registry = Self::new();
        for concept in concepts {
            registry.register(concept)?;
        }
        Ok(registry)
    }

    /// Load concepts from a JSON object mapping concept names to keyword
    /// lists:
    ///
    /// ```json
    /// { "gender": [ { "keyword": "he", "function": ["subject"] },
    ///               { "text": "she", "alternates": [] } ] }
    /// ```
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: BTreeMap<String, Vec<Keyword>> = serde_json::from_str(json)?;
        let mut registry = Self::new();
        for (name, keywords) in raw {
            registry.register(Concept::new(name, keywords))?;
        }
        Ok(registry)
    }

    /// Add a concept. Fails if the name is empty or already registered.
    pub fn register(&mut self, concept: Concept) -> Result<()> {
        if concept.name.trim().is_empty() {
            return Err(BiasError::invalid_config(
                "/concepts",
                "concept name must not be empty",
            ));
        }
        if self.contains(&concept.name) {
            return Err(ConfigError::new(
                ErrorCode::DuplicateConcept,
                format!("/concepts/{}", concept.name),
                format!("concept '{}' already registered", concept.name),
            )
            .into());
        }
        self.concepts.push(concept);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Concept> {
        self.concepts.iter().find(|c| c.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.concepts.iter().map(|c| c.name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Concept> {
        self.concepts.iter()
    }

    pub fn len(&self) -> usize {
        self.concepts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.concepts.is_empty()
    }

    /// Resolve the concepts a run should consider.
    ///
    /// An empty selection means every registered concept. Unknown names are
    /// a configuration error; repeated names are collapsed. Registry order
    /// is preserved.
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<&Concept>> {
        if names.is_empty() {
            return Ok(self.concepts.iter().collect());
        }
        for (idx, name) in names.iter().enumerate() {
            let name = name.as_ref();
            if !self.contains(name) {
                let known: Vec<&str> = self.names().collect();
                return Err(ConfigError::new(
                    ErrorCode::UnknownConcept,
                    format!("/concepts_to_consider/{idx}"),
                    format!("concept '{name}' is not registered"),
                )
                .with_hint(format!("Known concepts: {}", known.join(", ")))
                .into());
            }
        }
        Ok(self
            .concepts
            .iter()
            .filter(|c| names.iter().any(|n| n.as_ref() == c.name))
            .collect())
    }
}
