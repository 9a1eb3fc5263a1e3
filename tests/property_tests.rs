//! Property-based tests using proptest

use proptest::prelude::*;
use rapid_counterfactual::*;

fn gender() -> Concept {
    Concept::from_words("gender", ["he", "she", "they", "man", "woman"])
}

/// Sentences built from a small vocabulary mixing keywords, case variants,
/// punctuation and irregular whitespace.
fn sentence() -> impl Strategy<Value = String> {
    let word = prop::sample::select(vec![
        "he", "He", "HE", "she", "She", "they", "man", "Woman", "doctor", "the", "shell",
        "theme", "hesitant", ",", ".", "!", "42", "café",
    ]);
    let gap = prop::sample::select(vec![" ", "  ", "\t", "\n", ""]);
    (
        gap.clone(),
        prop::collection::vec((word, gap), 0..20),
    )
        .prop_map(|(lead, parts)| {
            let mut text = lead.to_string();
            for (w, g) in parts {
                text.push_str(w);
                text.push_str(if g.is_empty() { " " } else { g });
            }
            text
        })
}

fn scored(keyword: &str, delta: f64) -> CounterfactualSample {
    CounterfactualSample {
        text: String::new(),
        source_id: 0,
        concept: "gender".to_string(),
        orig_keyword: "he".to_string(),
        keyword: keyword.to_string(),
        label: None,
        source_span: (0, 0),
        replacement_span: (0, 0),
        score: SampleScore::Scored(delta),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn test_tokenization_reconstructs_input(text in "\\PC{0,80}") {
        let tokens = Tokenizer::new().tokenize(&text);
        let rebuilt: String = tokens
            .iter()
            .map(|t| format!("{}{}", t.text, t.whitespace))
            .collect();
        prop_assert_eq!(rebuilt, text);
    }

    #[test]
    fn test_tokenization_of_unicode_words_with_suffixes(
        stem in "\\p{Alphabetic}{1,6}",
        doubled in "\\p{Alphabetic}",
        suffix in prop::sample::select(vec!["ing", "ed", "ied", "ies", "es", "s"]),
    ) {
        let word = format!("{stem}{doubled}{doubled}{suffix}");
        let text = format!("she {word} he");
        let repr = Tokenizer::new().represent(0, &text).unwrap();
        prop_assert!(repr.verify(0, &text).is_ok());
        for token in &repr.tokens {
            prop_assert!(!token.lemma.is_empty());
        }
    }

    #[test]
    fn test_token_offsets_point_into_text(text in sentence()) {
        let repr = Tokenizer::new().represent(0, &text).unwrap();
        for token in &repr.tokens {
            prop_assert_eq!(&text[token.start..token.end()], token.text.as_str());
        }
    }

    #[test]
    fn test_substitution_is_local(text in sentence()) {
        let repr = Tokenizer::new().represent(0, &text).unwrap();
        let concept = gender();
        let matches = detect(std::slice::from_ref(&repr), &[&concept]);
        let samples = CounterfactualGenerator::new().generate_corpus(
            std::slice::from_ref(&repr),
            &matches,
            &concept,
            None,
        );

        for sample in &samples {
            let (from, to) = sample.source_span;
            let (rep_from, rep_end) = sample.replacement_span;
            prop_assert_eq!(rep_from, from);
            prop_assert_eq!(&sample.text[..from], &text[..from]);
            prop_assert_eq!(&sample.text[rep_end..], &text[to..]);
            // no-op substitutions are never emitted
            prop_assert_ne!(sample.text.as_str(), text.as_str());
            prop_assert_ne!(&sample.keyword, &sample.orig_keyword);
        }
    }

    #[test]
    fn test_budget_respected(
        texts in prop::collection::vec(sentence(), 1..15),
        budget in 1usize..20,
        seed in any::<u64>(),
    ) {
        let tokenizer = Tokenizer::new();
        let reprs: Vec<_> = texts
            .iter()
            .enumerate()
            .map(|(id, t)| tokenizer.represent(id, t).unwrap())
            .collect();
        let concept = gender();
        let matches = detect(&reprs, &[&concept]);

        let unbounded = CounterfactualGenerator::new().generate_corpus(&reprs, &matches, &concept, None);
        let bounded = CounterfactualGenerator::new()
            .with_max_samples(budget)
            .with_seed(seed)
            .generate_corpus(&reprs, &matches, &concept, None);

        prop_assert_eq!(bounded.len(), unbounded.len().min(budget));
        // every kept sample is one of the candidates, in corpus order
        let mut cursor = unbounded.iter();
        for sample in &bounded {
            prop_assert!(cursor.any(|c| c == sample));
        }
    }

    #[test]
    fn test_aggregation_order_independent(
        deltas in prop::collection::vec(-1.0f64..1.0, 1..60),
        rotate in 0usize..60,
    ) {
        let concept = gender();
        let keywords = ["she", "they", "man"];
        let samples: Vec<_> = deltas
            .iter()
            .enumerate()
            .map(|(i, &d)| scored(keywords[i % keywords.len()], d))
            .collect();
        let mut shuffled = samples.clone();
        shuffled.reverse();
        let len = shuffled.len();
        shuffled.rotate_left(rotate % len);

        let a = aggregate(samples, &concept, 2);
        let b = aggregate(shuffled, &concept, 2);

        prop_assert_eq!(a.max_mean.map(f64::to_bits), b.max_mean.map(f64::to_bits));
        prop_assert_eq!(a.max_std.map(f64::to_bits), b.max_std.map(f64::to_bits));
        prop_assert_eq!(a.overall.mean.to_bits(), b.overall.mean.to_bits());
        prop_assert_eq!(a.keyword_stats, b.keyword_stats);
        prop_assert_eq!(a.omitted_keywords, b.omitted_keywords);
    }

    #[test]
    fn test_significance_filter(
        counts in prop::collection::vec(0usize..8, 3),
        min in 1usize..8,
    ) {
        let concept = gender();
        let keywords = ["she", "they", "man"];
        let mut samples = Vec::new();
        for (keyword, &count) in keywords.iter().zip(&counts) {
            for i in 0..count {
                samples.push(scored(keyword, i as f64 * 0.1));
            }
        }
        let result = aggregate(samples, &concept, min);

        for (keyword, &count) in keywords.iter().zip(&counts) {
            let omitted = result.omitted_keywords.iter().any(|k| k == keyword);
            prop_assert_eq!(omitted, count < min);
        }
        // keywords that never received a sample are always omitted
        prop_assert!(result.omitted_keywords.iter().any(|k| k == "he"));
        prop_assert!(result.omitted_keywords.iter().any(|k| k == "woman"));

        let significant: Vec<f64> = keywords
            .iter()
            .zip(&counts)
            .filter(|(_, count)| **count >= min)
            .map(|(k, _)| result.keyword_stats[*k].mean.abs())
            .collect();
        let expected = significant.into_iter().max_by(f64::total_cmp);
        prop_assert_eq!(result.max_mean, expected);
    }
}
