//! Sanitizing of raw model output into a bounded, gentle narrative.
//!
//! Pure and deterministic. Every correction is recorded as a validation
//! issue; the response is valid only when nothing had to be corrected.
//! Input is NFC-normalized first so decomposed characters cannot slip past
//! the tone rules.

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

use crate::engine::InferenceError;

/// Glyph used when the model did not lead with one.
pub const DEFAULT_GLYPH: &str = "💡";

const VARIATION_SELECTOR: char = '\u{FE0F}';
const ZERO_WIDTH_JOINER: char = '\u{200D}';

/// One term → euphemism substitution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToneRule {
    pub term: String,
    pub replacement: String,
    #[serde(default)]
    pub case_sensitive: bool,
}

impl ToneRule {
    fn new(term: &str, replacement: &str) -> Self {
        Self { term: term.into(), replacement: replacement.into(), case_sensitive: false }
    }
}

/// Length and tone policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SanitizerPolicy {
    /// Sentences kept when the narrative runs long.
    #[serde(default = "default_retained")]
    pub retained_sentences: usize,
    /// Sentence count above which the response is reported as over-long.
    #[serde(default = "default_hard_limit")]
    pub hard_sentence_limit: usize,
    #[serde(default = "default_glyph")]
    pub default_glyph: String,
    /// Applied in order; earlier rules win on overlapping text.
    #[serde(default = "default_tone_rules")]
    pub tone_rules: Vec<ToneRule>,
}

fn default_retained() -> usize {
    3
}

fn default_hard_limit() -> usize {
    5
}

fn default_glyph() -> String {
    DEFAULT_GLYPH.to_string()
}

fn default_tone_rules() -> Vec<ToneRule> {
    vec![
        ToneRule::new("failed to hit", "fell short of"),
        ToneRule::new("failed to reach", "fell short of"),
        ToneRule::new("failed to meet", "fell short of"),
        ToneRule::new("failed", "fell short of"),
        ToneRule::new("failure", "setback"),
        ToneRule::new("falling short", "room to grow"),
        ToneRule::new("cheated", "deviated from"),
        ToneRule::new("cheat meal", "flexible meal"),
        ToneRule::new("warning", "note"),
        ToneRule::new("terrible", "tough"),
        ToneRule::new("bad", "less ideal"),
        ToneRule::new("poor", "limited"),
        ToneRule::new("behind", "below"),
        ToneRule::new("should have", "could"),
    ]
}

impl Default for SanitizerPolicy {
    fn default() -> Self {
        Self {
            retained_sentences: default_retained(),
            hard_sentence_limit: default_hard_limit(),
            default_glyph: default_glyph(),
            tone_rules: default_tone_rules(),
        }
    }
}

/// Sanitized model response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedInsightResponse {
    pub leading_glyph: String,
    pub narrative: String,
    pub is_valid: bool,
    pub validation_issues: Vec<String>,
}

/// Applies a [`SanitizerPolicy`] to raw model text.
pub struct ResponseSanitizer {
    policy: SanitizerPolicy,
    rules: Vec<(Regex, ToneRule)>,
}

impl ResponseSanitizer {
    /// Compile the tone rules of `policy`.
    pub fn new(policy: SanitizerPolicy) -> Result<Self, InferenceError> {
        let rules = policy
            .tone_rules
            .iter()
            .map(|rule| compile_rule(rule).map(|re| (re, rule.clone())))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| InferenceError::InputValidation(format!("invalid tone rule: {}", e)))?;
        Ok(Self { policy, rules })
    }

    pub fn policy(&self) -> &SanitizerPolicy {
        &self.policy
    }

    /// Turn raw model text into a glyph + narrative pair.
    pub fn sanitize(&self, raw: &str) -> ParsedInsightResponse {
        let normalized: String = raw.nfc().collect();
        let text = normalized.trim();
        let mut issues = Vec::new();

        if text.is_empty() {
            issues.push("empty response".to_string());
            issues.push(self.default_glyph_issue());
            return self.finish(self.policy.default_glyph.clone(), String::new(), issues);
        }

        let (glyph, rest) = match split_leading_glyph(text) {
            Some((glyph, rest)) => (glyph.to_string(), rest),
            None => {
                issues.push(self.default_glyph_issue());
                (self.policy.default_glyph.clone(), text)
            }
        };

        let mut narrative = rest.trim().to_string();
        if narrative.is_empty() {
            issues.push("narrative is empty".to_string());
            return self.finish(glyph, narrative, issues);
        }

        let sentences = split_sentences(&narrative);
        let retained = self.policy.retained_sentences.max(1);
        if sentences.len() > retained {
            if sentences.len() > self.policy.hard_sentence_limit {
                issues.push(format!(
                    "response has {} sentences (limit {}), truncated to {}",
                    sentences.len(),
                    self.policy.hard_sentence_limit,
                    retained
                ));
            } else {
                issues.push(format!("trimmed {} sentences to {}", sentences.len(), retained));
            }
            narrative = sentences[..retained].join(" ");
        }

        for (re, rule) in &self.rules {
            if re.is_match(&narrative) {
                narrative = re
                    .replace_all(&narrative, |caps: &regex::Captures<'_>| {
                        match_case(&caps[0], &rule.replacement)
                    })
                    .into_owned();
                issues.push(format!(
                    "replaced banned term '{}' with '{}'",
                    rule.term, rule.replacement
                ));
            }
        }

        let bangs = narrative.matches('!').count();
        if bangs > 0 {
            narrative = narrative.replace('!', ".");
            issues.push(format!("replaced {} exclamation mark(s) with periods", bangs));
        }

        self.finish(glyph, narrative, issues)
    }

    fn default_glyph_issue(&self) -> String {
        format!("no glyph prefix found, using default {}", self.policy.default_glyph)
    }

    fn finish(&self, glyph: String, narrative: String, issues: Vec<String>) -> ParsedInsightResponse {
        ParsedInsightResponse {
            leading_glyph: glyph,
            narrative,
            is_valid: issues.is_empty(),
            validation_issues: issues,
        }
    }
}

impl Default for ResponseSanitizer {
    fn default() -> Self {
        let policy = SanitizerPolicy::default();
        match Self::new(policy.clone()) {
            Ok(sanitizer) => sanitizer,
            Err(e) => {
                tracing::error!(error = %e, "built-in tone rules failed to compile; sanitizing without them");
                Self { policy, rules: Vec::new() }
            }
        }
    }
}

fn compile_rule(rule: &ToneRule) -> Result<Regex, regex::Error> {
    RegexBuilder::new(&format!(r"\b{}\b", regex::escape(&rule.term)))
        .case_insensitive(!rule.case_sensitive)
        .build()
}

/// Capitalize `replacement` when `original` started with a capital.
fn match_case(original: &str, replacement: &str) -> String {
    let starts_upper = original.chars().next().is_some_and(char::is_uppercase);
    if !starts_upper {
        return replacement.to_string();
    }
    let mut chars = replacement.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn is_glyph_char(c: char) -> bool {
    matches!(
        c as u32,
        0x1F000..=0x1FAFF
            | 0x2600..=0x27BF
            | 0x2300..=0x23FF
            | 0x2B00..=0x2BFF
            | 0x2190..=0x21FF
            | 0x25A0..=0x25FF
            | 0x2934..=0x2935
            | 0x3030
            | 0x303D
            | 0x3297
            | 0x3299
            | 0x00A9
            | 0x00AE
            | 0x203C
            | 0x2049
            | 0x2122
            | 0x2139
    )
}

fn is_skin_tone(c: char) -> bool {
    matches!(c as u32, 0x1F3FB..=0x1F3FF)
}

/// Split off one leading emoji (with selector, skin tone and ZWJ parts).
pub fn split_leading_glyph(text: &str) -> Option<(&str, &str)> {
    let mut chars = text.char_indices().peekable();
    let (_, first) = chars.next()?;
    if !is_glyph_char(first) {
        return None;
    }
    let mut end = first.len_utf8();
    while let Some(&(idx, c)) = chars.peek() {
        if c == VARIATION_SELECTOR || is_skin_tone(c) {
            end = idx + c.len_utf8();
            chars.next();
        } else if c == ZERO_WIDTH_JOINER {
            chars.next();
            match chars.next() {
                Some((joined_idx, joined)) if is_glyph_char(joined) => {
                    end = joined_idx + joined.len_utf8();
                }
                _ => break,
            }
        } else {
            break;
        }
    }
    Some((&text[..end], &text[end..]))
}

/// Split on sentence-ending punctuation followed by whitespace or the end.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();
    while let Some((idx, c)) = chars.next() {
        if !matches!(c, '.' | '!' | '?' | '…') {
            continue;
        }
        let mut end = idx + c.len_utf8();
        while let Some(&(next_idx, next)) = chars.peek() {
            if matches!(next, '.' | '!' | '?' | '…' | '"' | '\'' | ')' | '”' | '’') {
                end = next_idx + next.len_utf8();
                chars.next();
            } else {
                break;
            }
        }
        let at_boundary = chars.peek().map_or(true, |&(_, next)| next.is_whitespace());
        if at_boundary {
            let sentence = text[start..end].trim();
            if !sentence.is_empty() {
                sentences.push(sentence);
            }
            start = end;
        }
    }
    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail);
    }
    sentences
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_glyph_with_variation_selector() {
        let (glyph, rest) = split_leading_glyph("❤\u{FE0F} Nice work.").unwrap();
        assert_eq!(glyph, "❤\u{FE0F}");
        assert_eq!(rest, " Nice work.");
    }

    #[test]
    fn splits_zwj_sequence_as_one_glyph() {
        let (glyph, _) = split_leading_glyph("👩\u{200D}🍳 Cooking at home.").unwrap();
        assert_eq!(glyph, "👩\u{200D}🍳");
    }

    #[test]
    fn plain_text_has_no_glyph() {
        assert!(split_leading_glyph("Hello there").is_none());
    }

    #[test]
    fn sentences_ignore_decimal_points() {
        let sentences = split_sentences("You averaged 3.5 meals. Nice pace! Keep going");
        assert_eq!(sentences, vec!["You averaged 3.5 meals.", "Nice pace!", "Keep going"]);
    }

    #[test]
    fn every_exclamation_mark_becomes_a_period() {
        let parsed = ResponseSanitizer::default().sanitize("🎉 Great!!! Keep it up!");
        assert_eq!(parsed.narrative, "Great... Keep it up.");
        assert_eq!(split_sentences(&parsed.narrative).len(), 2);
    }

    #[test]
    fn match_case_capitalizes_replacement() {
        assert_eq!(match_case("Bad", "less ideal"), "Less ideal");
        assert_eq!(match_case("bad", "less ideal"), "less ideal");
    }

    #[test]
    fn tone_rules_respect_word_boundaries() {
        let sanitizer = ResponseSanitizer::default();
        let parsed = sanitizer.sanitize("🥗 Your badminton session paired well with lunch.");
        assert!(parsed.is_valid, "{:?}", parsed.validation_issues);
        assert!(parsed.narrative.contains("badminton"));
    }

    #[test]
    fn case_sensitive_rule_skips_other_casing() {
        let policy = SanitizerPolicy {
            tone_rules: vec![ToneRule {
                term: "Warning".into(),
                replacement: "Note".into(),
                case_sensitive: true,
            }],
            ..SanitizerPolicy::default()
        };
        let sanitizer = ResponseSanitizer::new(policy).unwrap();
        assert!(sanitizer.sanitize("📝 a warning sign.").is_valid);
        assert_eq!(sanitizer.sanitize("📝 Warning: drink water.").narrative, "Note: drink water.");
    }
}
