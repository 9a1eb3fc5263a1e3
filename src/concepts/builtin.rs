//! Built-in concept keyword lists.
//!
//! Each entry is `(canonical text, alternates, functions)`. The lists are
//! deliberately small; callers with a curated taxonomy load their own via
//! [`ConceptRegistry::from_json`](super::registry::ConceptRegistry::from_json).

use super::concept::{Concept, Keyword};

type KeywordRow = (&'static str, &'static [&'static str], &'static [&'static str]);

const GENDER_EN: &[KeywordRow] = &[
    ("he", &[], &["subject"]),
    ("she", &[], &["subject"]),
    ("him", &[], &["object"]),
    ("her", &[], &["object", "possessive"]),
    ("his", &[], &["possessive", "possessive_pronoun"]),
    ("hers", &[], &["possessive_pronoun"]),
    ("himself", &[], &["reflexive"]),
    ("herself", &[], &["reflexive"]),
    ("man", &[], &["noun"]),
    ("woman", &[], &["noun"]),
    ("men", &[], &["noun_plural"]),
    ("women", &[], &["noun_plural"]),
    ("boy", &[], &["noun"]),
    ("girl", &[], &["noun"]),
    ("boys", &[], &["noun_plural"]),
    ("girls", &[], &["noun_plural"]),
    ("father", &["dad"], &["noun"]),
    ("mother", &["mom", "mum"], &["noun"]),
    ("son", &[], &["noun"]),
    ("daughter", &[], &["noun"]),
    ("brother", &[], &["noun"]),
    ("sister", &[], &["noun"]),
    ("husband", &[], &["noun"]),
    ("wife", &[], &["noun"]),
    ("gentleman", &[], &["noun"]),
    ("lady", &[], &["noun"]),
    ("male", &[], &["adjective"]),
    ("female", &[], &["adjective"]),
    ("mr", &[], &["title"]),
    ("mrs", &["ms"], &["title"]),
];

const RELIGION_EN: &[KeywordRow] = &[
    ("Christian", &[], &["adjective", "noun"]),
    ("Muslim", &["moslem"], &["adjective", "noun"]),
    ("Jewish", &[], &["adjective"]),
    ("Jew", &[], &["noun"]),
    ("Hindu", &[], &["adjective", "noun"]),
    ("Buddhist", &[], &["adjective", "noun"]),
    ("Sikh", &[], &["adjective", "noun"]),
    ("atheist", &[], &["adjective", "noun"]),
    ("Christians", &[], &["noun_plural"]),
    ("Muslims", &[], &["noun_plural"]),
    ("Jews", &[], &["noun_plural"]),
    ("Hindus", &[], &["noun_plural"]),
    ("Buddhists", &[], &["noun_plural"]),
    ("Sikhs", &[], &["noun_plural"]),
    ("atheists", &[], &["noun_plural"]),
    ("Christianity", &[], &["religion"]),
    ("Islam", &[], &["religion"]),
    ("Judaism", &[], &["religion"]),
    ("Hinduism", &[], &["religion"]),
    ("Buddhism", &[], &["religion"]),
    ("Sikhism", &[], &["religion"]),
    ("church", &[], &["place_of_worship"]),
    ("mosque", &[], &["place_of_worship"]),
    ("synagogue", &[], &["place_of_worship"]),
    ("temple", &[], &["place_of_worship"]),
    ("gurdwara", &[], &["place_of_worship"]),
];

const NATIONALITY_EN: &[KeywordRow] = &[
    ("American", &[], &["adjective"]),
    ("British", &[], &["adjective"]),
    ("Canadian", &[], &["adjective"]),
    ("Chinese", &[], &["adjective"]),
    ("French", &[], &["adjective"]),
    ("German", &[], &["adjective"]),
    ("Indian", &[], &["adjective"]),
    ("Italian", &[], &["adjective"]),
    ("Japanese", &[], &["adjective"]),
    ("Mexican", &[], &["adjective"]),
    ("Nigerian", &[], &["adjective"]),
    ("Polish", &[], &["adjective"]),
    ("Russian", &[], &["adjective"]),
    ("Turkish", &[], &["adjective"]),
];

const AGE_EN: &[KeywordRow] = &[
    ("young", &[], &["adjective"]),
    ("old", &[], &["adjective"]),
    ("elderly", &[], &["adjective"]),
    ("teenage", &[], &["adjective"]),
    ("teenager", &[], &["noun"]),
    ("pensioner", &["retiree"], &["noun"]),
    ("child", &["kid"], &["noun"]),
    ("adult", &[], &["noun"]),
];

fn build(name: &str, rows: &[KeywordRow]) -> Concept {
    Concept::new(
        name,
        rows.iter().map(|(text, alternates, functions)| {
            Keyword::new(*text)
                .with_alternates(alternates.iter().copied())
                .with_functions(functions.iter().copied())
        }),
    )
}

/// Built-in concepts for a language code, or `None` if unsupported.
pub(crate) fn concepts_for(lang: &str) -> Option<Vec<Concept>> {
    match lang.to_lowercase().as_str() {
        "en" | "english" => Some(vec![
            build("gender", GENDER_EN),
            build("religion", RELIGION_EN),
            build("nationality", NATIONALITY_EN),
            build("age", AGE_EN),
        ]),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_english_concepts_present() {
        let concepts = concepts_for("en").unwrap();
        let names: Vec<&str> = concepts.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["gender", "religion", "nationality", "age"]);
        assert!(concepts.iter().all(|c| c.len() >= 2));
    }

    #[test]
    fn test_builtin_keywords_unique_per_concept() {
        for concept in concepts_for("en").unwrap() {
            let rows = match concept.name.as_str() {
                "gender" => GENDER_EN.len(),
                "religion" => RELIGION_EN.len(),
                "nationality" => NATIONALITY_EN.len(),
                _ => AGE_EN.len(),
            };
            assert_eq!(concept.len(), rows, "duplicate keyword in {}", concept.name);
        }
    }

    #[test]
    fn test_unsupported_language() {
        assert!(concepts_for("xx").is_none());
    }
}
