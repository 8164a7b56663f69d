//! Token-name matching for real tokens and their decoys.

#[cfg(test)]
#[path = "matching_test.rs"]
mod matching_test;

use frames::Token;

use crate::consts::FAKE_SUFFIX;

/// How token names are compared against the base name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NameMatch {
    /// Case-sensitive equality, no normalization.
    #[default]
    Exact,
    /// Trimmed, lower-cased comparison.
    Relaxed,
}

impl NameMatch {
    /// Parse a setting value (`"exact"` or `"relaxed"`).
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "exact" => Some(Self::Exact),
            "relaxed" => Some(Self::Relaxed),
            _ => None,
        }
    }
}

/// True iff `name` is `base` or `"<base> (Fake)"` under the given mode.
#[must_use]
pub fn is_matching_name(name: &str, base: &str, mode: NameMatch) -> bool {
    match mode {
        NameMatch::Exact => name == base || name.strip_suffix(FAKE_SUFFIX) == Some(base),
        NameMatch::Relaxed => {
            let name = name.trim().to_lowercase();
            let base = base.trim().to_lowercase();
            let fake = format!("{base}{}", FAKE_SUFFIX.to_lowercase());
            name == base || name == fake
        }
    }
}

#[must_use]
pub fn is_matching_token(token: &Token, base: &str, mode: NameMatch) -> bool {
    is_matching_name(&token.name, base, mode)
}

/// The tokens taking part in a shuffle for `base`, in scene order.
#[must_use]
pub fn matching_tokens(tokens: &[Token], base: &str, mode: NameMatch) -> Vec<Token> {
    tokens
        .iter()
        .filter(|t| is_matching_token(t, base, mode))
        .cloned()
        .collect()
}

/// Decoy name for `name`; already-suffixed names are returned unchanged.
#[must_use]
pub fn decoy_name(name: &str) -> String {
    if name.ends_with(FAKE_SUFFIX) {
        name.to_owned()
    } else {
        format!("{name}{FAKE_SUFFIX}")
    }
}
