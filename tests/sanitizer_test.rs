//! Integration tests for the response sanitizer.

use insight_core::insights::sanitizer::split_sentences;
use insight_core::insights::{ResponseSanitizer, SanitizerPolicy, ToneRule, DEFAULT_GLYPH};

fn sanitize(raw: &str) -> insight_core::insights::ParsedInsightResponse {
    ResponseSanitizer::default().sanitize(raw)
}

// === Clean responses ===

#[test]
fn clean_response_passes_untouched() {
    let parsed = sanitize("🥗 Nice balance of protein and carbs today.");
    assert_eq!(parsed.leading_glyph, "🥗");
    assert_eq!(parsed.narrative, "Nice balance of protein and carbs today.");
    assert!(parsed.is_valid);
    assert!(parsed.validation_issues.is_empty());
}

#[test]
fn surrounding_whitespace_is_trimmed() {
    let parsed = sanitize("\n  🍎   An apple a day keeps things steady.  \n");
    assert_eq!(parsed.leading_glyph, "🍎");
    assert_eq!(parsed.narrative, "An apple a day keeps things steady.");
    assert!(parsed.is_valid);
}

// === Glyph handling ===

#[test]
fn missing_glyph_uses_default_and_is_invalid() {
    let parsed = sanitize("Protein is on track today.");
    assert_eq!(parsed.leading_glyph, DEFAULT_GLYPH);
    assert_eq!(parsed.narrative, "Protein is on track today.");
    assert!(!parsed.is_valid);
    assert!(parsed.validation_issues.iter().any(|i| i.contains("default")));
}

#[test]
fn zwj_sequence_is_one_glyph() {
    let parsed = sanitize("👩\u{200D}🍳 Cooking at home helps.");
    assert_eq!(parsed.leading_glyph, "👩\u{200D}🍳");
    assert_eq!(parsed.narrative, "Cooking at home helps.");
}

#[test]
fn variation_selector_stays_with_glyph() {
    let parsed = sanitize("❤\u{FE0F} Hydration looks good.");
    assert_eq!(parsed.leading_glyph, "❤\u{FE0F}");
    assert_eq!(parsed.narrative, "Hydration looks good.");
}

#[test]
fn skin_tone_modifier_stays_with_glyph() {
    let parsed = sanitize("👍🏽 Solid logging.");
    assert_eq!(parsed.leading_glyph, "👍🏽");
    assert_eq!(parsed.narrative, "Solid logging.");
}

// === Degenerate input ===

#[test]
fn empty_input_yields_empty_narrative() {
    for raw in ["", "   ", "\n\t"] {
        let parsed = sanitize(raw);
        assert_eq!(parsed.leading_glyph, DEFAULT_GLYPH);
        assert_eq!(parsed.narrative, "");
        assert!(!parsed.is_valid);
        assert!(parsed.validation_issues.iter().any(|i| i.contains("empty")));
    }
}

#[test]
fn glyph_only_input_has_empty_narrative() {
    let parsed = sanitize("🔥");
    assert_eq!(parsed.leading_glyph, "🔥");
    assert_eq!(parsed.narrative, "");
    assert!(!parsed.is_valid);
    assert_eq!(parsed.validation_issues, vec!["narrative is empty".to_string()]);
}

// === Length ===

#[test]
fn four_sentences_are_trimmed_to_three() {
    let parsed = sanitize("🍎 One here. Two here. Three here. Four here.");
    assert_eq!(parsed.narrative, "One here. Two here. Three here.");
    assert!(parsed.validation_issues.iter().any(|i| i.contains("trimmed 4 sentences")));
}

#[test]
fn over_hard_limit_is_reported_as_such() {
    let parsed = sanitize("🍎 A one. A two. A three. A four. A five. A six.");
    assert_eq!(split_sentences(&parsed.narrative).len(), 3);
    assert!(parsed
        .validation_issues
        .iter()
        .any(|i| i.contains("6 sentences") && i.contains("limit 5")));
}

#[test]
fn abbreviation_like_dots_do_not_split_inside_words() {
    let sentences = split_sentences("Aim for 1.5 litres. Then rest.");
    assert_eq!(sentences, vec!["Aim for 1.5 litres.", "Then rest."]);
}

// === Tone ===

#[test]
fn harsh_long_response_is_fully_corrected() {
    let parsed = sanitize("You failed badly! One. Two. Three. Four. Five. Six.");
    assert!(parsed.validation_issues.len() > 1);
    assert!(!parsed.narrative.contains("failed"));
    assert!(!parsed.narrative.contains('!'));
    assert!(split_sentences(&parsed.narrative).len() <= 3);
    assert_eq!(parsed.leading_glyph, DEFAULT_GLYPH);
    assert!(!parsed.is_valid);
}

#[test]
fn protein_miss_is_softened() {
    let parsed = sanitize("🎯 You failed to hit protein!");
    assert_eq!(parsed.leading_glyph, "🎯");
    assert_eq!(parsed.narrative, "You fell short of protein.");
    assert!(parsed
        .validation_issues
        .iter()
        .any(|i| i == "replaced banned term 'failed to hit' with 'fell short of'"));
    assert!(parsed
        .validation_issues
        .iter()
        .any(|i| i == "replaced 1 exclamation mark(s) with periods"));
}

#[test]
fn replacement_keeps_leading_capital() {
    let parsed = sanitize("📉 Terrible start. Should have eaten breakfast.");
    assert_eq!(parsed.narrative, "Tough start. Could eaten breakfast.");
}

#[test]
fn terms_only_match_whole_words() {
    let parsed = sanitize("🥦 Broccoli is badass and behindhand fans agree.");
    assert_eq!(parsed.narrative, "Broccoli is badass and behindhand fans agree.");
    assert!(parsed.is_valid);
}

#[test]
fn each_exclamation_mark_becomes_a_period() {
    let parsed = sanitize("🎉 Great job!!! Keep it up!");
    assert_eq!(parsed.narrative, "Great job... Keep it up.");
    assert_eq!(parsed.narrative.matches('.').count(), 4);
    assert!(parsed.validation_issues.iter().any(|i| i.contains("4 exclamation")));
}

#[test]
fn decomposed_input_is_normalized() {
    let parsed = sanitize("🍵 Cafe\u{301} latte counts toward fluids.");
    assert_eq!(parsed.narrative, "Caf\u{e9} latte counts toward fluids.");
    assert!(parsed.is_valid);
}

#[test]
fn sanitizing_is_deterministic() {
    let raw = "🥩 You cheated on a bad day! Poor choices. Behind on protein. Warning.";
    assert_eq!(sanitize(raw), sanitize(raw));
}

// === Custom policy ===

#[test]
fn custom_policy_overrides_rules_and_limits() {
    let policy = SanitizerPolicy {
        retained_sentences: 1,
        hard_sentence_limit: 2,
        default_glyph: "⭐".into(),
        tone_rules: vec![ToneRule { term: "Snack".into(), replacement: "bite".into(), case_sensitive: true }],
    };
    let sanitizer = ResponseSanitizer::new(policy).unwrap();

    let parsed = sanitizer.sanitize("A snack helps. Another Snack too.");
    assert_eq!(parsed.leading_glyph, "⭐");
    assert_eq!(parsed.narrative, "A snack helps.", "case-sensitive rule skips lowercase");
    assert!(parsed.validation_issues.iter().any(|i| i.contains("trimmed 2 sentences to 1")));
}

#[test]
fn policy_round_trips_through_toml_with_defaults() {
    let policy: SanitizerPolicy = toml::from_str("retained_sentences = 2").unwrap();
    assert_eq!(policy.retained_sentences, 2);
    assert_eq!(policy.hard_sentence_limit, 5);
    assert_eq!(policy.default_glyph, DEFAULT_GLYPH);
    assert!(!policy.tone_rules.is_empty());
}
