//! Keywords and concepts.

use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;

/// A protected-concept term.
///
/// `text` is the canonical surface form inserted into counterfactuals;
/// `alternates` are additional surface forms that also count as a match.
/// `functions` tags the grammatical role(s) of the term (`"subject"`,
/// `"possessive"`, ...) so substitution can stay grammatical.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keyword {
    #[serde(alias = "keyword")]
    pub text: String,
    #[serde(default)]
    pub alternates: Vec<String>,
    #[serde(default, alias = "function")]
    pub functions: Vec<String>,
}

impl Keyword {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            alternates: Vec::new(),
            functions: Vec::new(),
        }
    }

    pub fn with_alternates<I, S>(mut self, alternates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.alternates.extend(alternates.into_iter().map(Into::into));
        self
    }

    pub fn with_functions<I, S>(mut self, functions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.functions.extend(functions.into_iter().map(Into::into));
        self
    }

    /// Lower-cased canonical text, used as the keyword's identity.
    pub fn key(&self) -> String {
        self.text.to_lowercase()
    }

    /// All lower-cased forms (canonical first), deduplicated.
    pub fn forms(&self) -> Vec<String> {
        let mut forms = vec![self.key()];
        for alt in &self.alternates {
            let alt = alt.to_lowercase();
            if !alt.trim().is_empty() && !forms.contains(&alt) {
                forms.push(alt);
            }
        }
        forms
    }

    /// Whether `other` may replace this keyword under function-respecting
    /// substitution. Keywords without declared functions are compatible
    /// with everything.
    pub fn shares_function(&self, other: &Keyword) -> bool {
        if self.functions.is_empty() || other.functions.is_empty() {
            return true;
        }
        self.functions.iter().any(|f| other.functions.contains(f))
    }
}

/// Split a lower-cased keyword form into the word segments a tokenizer
/// would produce for it.
pub(crate) fn form_parts(form: &str) -> Vec<String> {
    form.split_word_bounds()
        .filter(|segment| !segment.trim().is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// A named set of keywords describing one protected attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Concept {
    pub name: String,
    keywords: Vec<Keyword>,
}

impl Concept {
    /// Create a concept. Keywords with the same canonical text
    /// (case-insensitive) are merged: the first one wins and later
    /// duplicates contribute their alternates and functions.
    pub fn new(name: impl Into<String>, keywords: impl IntoIterator<Item = Keyword>) -> Self {
        let mut merged: Vec<Keyword> = Vec::new();
        for keyword in keywords {
            if keyword.text.trim().is_empty() {
                continue;
            }
            match merged.iter_mut().find(|k| k.key() == keyword.key()) {
                Some(existing) => {
                    for alt in keyword.alternates {
                        if !existing.alternates.contains(&alt) {
                            existing.alternates.push(alt);
                        }
                    }
                    for function in keyword.functions {
                        if !existing.functions.contains(&function) {
                            existing.functions.push(function);
                        }
                    }
                }
                None => merged.push(keyword),
            }
        }
        Self {
            name: name.into(),
            keywords: merged,
        }
    }

    /// Convenience constructor from bare keyword texts.
    pub fn from_words<I, S>(name: impl Into<String>, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(name, words.into_iter().map(Keyword::new))
    }

    pub fn keywords(&self) -> &[Keyword] {
        &self.keywords
    }

    pub fn keyword(&self, idx: usize) -> Option<&Keyword> {
        self.keywords.get(idx)
    }

    /// Index of the keyword with the given canonical text (case-insensitive).
    pub fn position(&self, text: &str) -> Option<usize> {
        let key = text.to_lowercase();
        self.keywords.iter().position(|k| k.key() == key)
    }

    pub fn len(&self) -> usize {
        self.keywords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forms_lowercase_and_dedup() {
        let kw = Keyword::new("Muslim").with_alternates(["muslim", "Moslem", " "]);
        assert_eq!(kw.key(), "muslim");
        assert_eq!(kw.forms(), vec!["muslim".to_string(), "moslem".to_string()]);
    }

    #[test]
    fn test_shares_function() {
        let he = Keyword::new("he").with_functions(["subject"]);
        let him = Keyword::new("him").with_functions(["object"]);
        let her = Keyword::new("her").with_functions(["object", "possessive"]);
        let plain = Keyword::new("person");

        assert!(!he.shares_function(&him));
        assert!(him.shares_function(&her));
        assert!(he.shares_function(&plain));
        assert!(plain.shares_function(&he));
    }

    #[test]
    fn test_concept_merges_duplicate_keywords() {
        let concept = Concept::new(
            "gender",
            [
                Keyword::new("she").with_functions(["subject"]),
                Keyword::new("he"),
                Keyword::new("She").with_alternates(["s/he"]).with_functions(["subject"]),
                Keyword::new("  "),
            ],
        );
        assert_eq!(concept.len(), 2);
        assert_eq!(concept.keywords()[0].text, "she");
        assert_eq!(concept.keywords()[0].alternates.len(), 1);
        assert_eq!(concept.keywords()[0].functions, vec!["subject".to_string()]);
        assert_eq!(concept.position("HE"), Some(1));
    }

    #[test]
    fn test_form_parts_multiword() {
        assert_eq!(form_parts("african american"), vec!["african", "american"]);
        assert_eq!(form_parts("african-american"), vec!["african", "-", "american"]);
        assert_eq!(form_parts("she"), vec!["she"]);
    }

    #[test]
    fn test_keyword_deserialize_aliases() {
        let kw: Keyword =
            serde_json::from_str(r#"{ "keyword": "Hans", "function": ["name"] }"#).unwrap();
        assert_eq!(kw.text, "Hans");
        assert_eq!(kw.functions, vec!["name".to_string()]);
        assert!(kw.alternates.is_empty());
    }
}
