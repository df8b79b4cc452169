use sift_core::tokenizer::{term_frequencies, tokenize, tokenize_document};

#[test]
fn it_filters_by_length_bounds() {
    let two = "ab";
    let three = "abc";
    let thirty_two = "a".repeat(32);
    let thirty_three = "b".repeat(33);
    let text = format!("{two} {three} {thirty_two} {thirty_three}");
    let words = tokenize(&text);
    assert_eq!(words, vec![three.to_string(), thirty_two]);
}

#[test]
fn it_counts_characters_not_bytes() {
    // two Cyrillic letters are four bytes but still too short
    let words = tokenize("да мир привет");
    assert_eq!(words, vec!["мир", "привет"]);
}

#[test]
fn it_lowercases_unicode_and_keeps_underscores() {
    let words = tokenize("ÉCOLE snake_case ΣΟΦΙΑ");
    assert_eq!(words, vec!["école", "snake_case", "σοφια"]);
}

#[test]
fn it_collapses_delimiters() {
    let words = tokenize("  alpha,,,\t\n--beta  ");
    assert_eq!(words, vec!["alpha", "beta"]);
}

#[test]
fn it_strips_markup_only_for_documents() {
    let html = "<html><head><title>Cats</title></head><body class=\"main\">cat<br>cat dog</body></html>";
    let words = tokenize_document(html);
    assert_eq!(words, vec!["cats", "cat", "cat", "dog"]);
    let counts = term_frequencies(words);
    assert_eq!(counts["cat"], 2);
    assert!(!counts.contains_key("body"));
    assert!(!counts.contains_key("main"));
}
