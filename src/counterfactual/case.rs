//! Case preservation for substituted keywords.
//!
//! The pattern of the matched surface text decides how the substitute's
//! canonical text is cased:
//!
//! | matched surface        | pattern    | `she` becomes |
//! |------------------------|------------|---------------|
//! | `HE`, `MUSLIM`         | `Upper`    | `SHE`         |
//! | `He`, `I`, `McKenzie`  | `Title`    | `She`         |
//! | `he`, `iPhone`         | `Verbatim` | `she`         |
//!
//! `Upper` needs at least two cased letters, so a single capital (`I`, a
//! sentence-initial `A`) counts as `Title`. `Verbatim` inserts the canonical
//! text unchanged, which keeps proper nouns such as `Muslim` capitalized.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CasePattern {
    Upper,
    Title,
    Verbatim,
}

impl CasePattern {
    /// Classify the casing of a matched surface span.
    pub fn detect(surface: &str) -> Self {
        let cased: Vec<char> = surface
            .chars()
            .filter(|c| c.is_uppercase() || c.is_lowercase())
            .collect();

        match cased.first() {
            None => CasePattern::Verbatim,
            Some(_) if cased.len() >= 2 && cased.iter().all(|c| c.is_uppercase()) => {
                CasePattern::Upper
            }
            Some(first) if first.is_uppercase() => CasePattern::Title,
            Some(_) => CasePattern::Verbatim,
        }
    }

    /// Apply the pattern to a substitute's canonical text.
    pub fn apply(self, canonical: &str) -> String {
        match self {
            CasePattern::Upper => canonical.to_uppercase(),
            CasePattern::Title => {
                let mut chars = canonical.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect(),
                    None => String::new(),
                }
            }
            CasePattern::Verbatim => canonical.to_string(),
        }
    }
}
