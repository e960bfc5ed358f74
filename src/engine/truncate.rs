//! Prompt budgeting against the model context window.
//!
//! The budget reserves `n_predict` tokens for the completion and converts the
//! rest to characters with a fixed chars-per-token estimate. When the prompt
//! is over budget the system prompt loses its tail first; the user message
//! (live nutrition data) is only cut once the system prompt is gone.
//!
//! The estimate can undercount for a given tokenizer; [`fit_tokens`] is the
//! exact second pass once the prompt is tokenized.

use std::borrow::Cow;

/// Character budget for one prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptBudget {
    max_chars: usize,
}

/// System and user text after fitting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FittedPrompt<'a> {
    pub system: Cow<'a, str>,
    pub user: Cow<'a, str>,
    pub truncated: bool,
}

impl PromptBudget {
    pub fn new(context_size: u32, n_predict: u32, chars_per_token: f32) -> Self {
        let tokens = context_size.saturating_sub(n_predict);
        let max_chars = (f64::from(tokens) * f64::from(chars_per_token)).floor();
        Self { max_chars: max_chars.max(0.0) as usize }
    }

    pub fn max_chars(&self) -> usize {
        self.max_chars
    }

    /// Fit `system` and `user` so that `overhead + system + user` stays
    /// within the budget (counted in chars).
    pub fn fit<'a>(&self, system: &'a str, user: &'a str, overhead: usize) -> FittedPrompt<'a> {
        let available = self.max_chars.saturating_sub(overhead);
        let system_len = system.chars().count();
        let user_len = user.chars().count();

        if system_len + user_len <= available {
            return FittedPrompt {
                system: Cow::Borrowed(system),
                user: Cow::Borrowed(user),
                truncated: false,
            };
        }

        let system_keep = available.saturating_sub(user_len);
        let user_keep = available.saturating_sub(system_keep).min(user_len);
        FittedPrompt {
            system: Cow::Borrowed(head_chars(system, system_keep)),
            user: Cow::Borrowed(head_chars(user, user_keep)),
            truncated: true,
        }
    }
}

/// First `n` chars of `s`, cut on a char boundary.
pub fn head_chars(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Drop tokens from the middle until at most `limit` remain.
///
/// The first quarter of the budget keeps the template header and the start
/// of the system prompt; the rest comes from the end, where the user turn
/// and the assistant cue live.
pub fn fit_tokens<T>(mut tokens: Vec<T>, limit: usize) -> Vec<T> {
    if tokens.len() <= limit {
        return tokens;
    }
    let head = limit / 4;
    let tail = limit - head;
    let cut_end = tokens.len() - tail;
    tokens.drain(head..cut_end);
    tokens
}
