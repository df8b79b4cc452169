use lazy_static::lazy_static;
use regex::Regex;
use std::collections::BTreeMap;
use unicode_normalization::UnicodeNormalization;

pub const MIN_TERM_CHARS: usize = 3;
pub const MAX_TERM_CHARS: usize = 32;

lazy_static! {
    static ref TAG_RE: Regex = Regex::new(r"<[^>]*>").expect("valid regex");
    static ref NON_WORD_RE: Regex = Regex::new(r"[^\w\s]").expect("valid regex");
}

/// True when `term` has an indexable length, counted in characters.
pub fn is_indexable_len(term: &str) -> bool {
    let n = term.chars().count();
    (MIN_TERM_CHARS..=MAX_TERM_CHARS).contains(&n)
}

/// Replace every `<...>` span with a single space.
pub fn strip_tags(html: &str) -> String {
    TAG_RE.replace_all(html, " ").into_owned()
}

/// Tokenize query text: punctuation to spaces, NFC + lowercase, split on whitespace,
/// keep terms of 3..=32 characters. Duplicates are kept in order.
pub fn tokenize(text: &str) -> Vec<String> {
    let cleaned = NON_WORD_RE.replace_all(text, " ");
    let normalized = cleaned.nfc().collect::<String>().to_lowercase();
    normalized
        .split_whitespace()
        .filter(|t| is_indexable_len(t))
        .map(str::to_string)
        .collect()
}

/// Tokenize page content; same as [`tokenize`] after tag stripping.
pub fn tokenize_document(html: &str) -> Vec<String> {
    tokenize(&strip_tags(html))
}

/// Fold a token sequence into term -> occurrence count.
pub fn term_frequencies<I>(tokens: I) -> BTreeMap<String, u32>
where
    I: IntoIterator<Item = String>,
{
    let mut counts = BTreeMap::new();
    for token in tokens {
        *counts.entry(token).or_insert(0) += 1;
    }
    counts
}
