//! Fuzz target for model response sanitizing.
//!
//! Arbitrary model text must never panic the sanitizer, and the result must
//! respect the sentence cap and carry no exclamation marks.

#![no_main]

use insight_core::insights::sanitizer::split_sentences;
use insight_core::insights::ResponseSanitizer;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    let sanitizer = ResponseSanitizer::default();
    let parsed = sanitizer.sanitize(data);

    assert!(!parsed.leading_glyph.is_empty());
    assert!(!parsed.narrative.contains('!'));
    assert_eq!(parsed.is_valid, parsed.validation_issues.is_empty());

    // Longest substitution is "bad" -> "less ideal".
    assert!(
        parsed.narrative.len() <= data.len() * 4 + 16,
        "sanitized narrative unexpectedly large"
    );

    // A second pass must not find more sentences than the policy keeps.
    let sentences = split_sentences(&parsed.narrative).len();
    assert!(sentences <= sanitizer.policy().retained_sentences.max(1));
});
