//! Lexical tokenization for coherence scoring.
//!
//! Tokens are lowercase runs of alphanumerics that may carry internal
//! `$`, `.`, `_` or `-`. Cashtags such as `$btc` survive stopword and
//! length filtering.

use std::collections::HashSet;

/// Token set of one item.
pub type TokenSet = HashSet<String>;

/// Default cap on distinct tokens kept per item.
pub const DEFAULT_TOKEN_CAP: usize = 240;

const MIN_WORD_LEN: usize = 3;

/// Tokenize text into a de-duplicated set of at most `cap` tokens.
pub fn tokenize(text: &str, cap: usize) -> TokenSet {
    let mut tokens = TokenSet::new();
    if cap == 0 {
        return tokens;
    }

    let lowered = text.to_lowercase();
    for run in lowered.split(|c: char| !is_token_char(c)) {
        let token = trim_separators(run);
        if token.is_empty() || !keep_token(token) {
            continue;
        }
        tokens.insert(token.to_string());
        if tokens.len() >= cap {
            break;
        }
    }
    tokens
}

/// Jaccard similarity of two token sets; 0.0 when either is empty.
pub fn jaccard(a: &TokenSet, b: &TokenSet) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    let intersection = small.iter().filter(|t| large.contains(*t)).count();
    let union = a.len() + b.len() - intersection;
    intersection as f64 / union as f64
}

/// Whether a token is a `$`-prefixed ticker such as `$eth`.
pub fn is_ticker(token: &str) -> bool {
    let mut chars = token.chars();
    chars.next() == Some('$') && chars.next().is_some_and(|c| c.is_alphabetic())
}

fn is_numeric(token: &str) -> bool {
    token.chars().any(|c| c.is_ascii_digit())
        && token.chars().all(|c| c.is_ascii_digit() || c == '.')
}

fn is_token_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '$' | '.' | '_' | '-')
}

fn trim_separators(run: &str) -> &str {
    run.trim_matches(|c: char| matches!(c, '.' | '_' | '-'))
        .trim_end_matches('$')
        .trim_end_matches(|c: char| matches!(c, '.' | '_' | '-'))
}

fn keep_token(token: &str) -> bool {
    if is_ticker(token) {
        return true;
    }
    if is_stop_word(token) {
        return false;
    }
    is_numeric(token) || token.chars().count() >= MIN_WORD_LEN
}

/// Check if a word is a stop word.
fn is_stop_word(word: &str) -> bool {
    const STOP_WORDS: &[&str] = &[
        "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "has", "he", "in", "is",
        "it", "its", "of", "on", "or", "that", "the", "to", "was", "were", "will", "with", "this",
        "they", "but", "have", "had", "what", "when", "where", "who", "which", "why", "how", "all",
        "each", "every", "both", "few", "more", "most", "other", "some", "such", "no", "nor",
        "not", "only", "own", "same", "so", "than", "too", "very", "can", "just", "should", "now",
        "also", "been", "being", "do", "does", "did", "doing", "would", "could", "might", "must",
        "shall", "about", "above", "after", "again", "against", "am", "any", "before", "below",
        "between", "into", "through", "during", "out", "over", "under", "up", "down", "then",
        "once", "here", "there", "if", "else", "while", "because", "until", "we", "you", "your",
        "our", "their", "him", "her", "them", "me", "my", "myself", "itself", "those", "these",
        "his", "she", "via", "get", "got", "new", "says", "said", "rt", "amp", "https", "http",
    ];

    STOP_WORDS.contains(&word)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(tokens: &[&str]) -> TokenSet {
        tokens.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn test_tokenize_basic() {
        let tokens = tokenize("Hello World", DEFAULT_TOKEN_CAP);
        assert_eq!(tokens, set(&["hello", "world"]));
    }

    #[test]
    fn test_tokenize_drops_stop_words_and_short_words() {
        let tokens = tokenize("The fed is at it ok", DEFAULT_TOKEN_CAP);
        assert_eq!(tokens, set(&["fed"]));
    }

    #[test]
    fn test_tokenize_keeps_tickers_and_numbers() {
        let tokens = tokenize("$BTC hits 70k, up 5.2% on $eth news", DEFAULT_TOKEN_CAP);
        assert!(tokens.contains("$btc"));
        assert!(tokens.contains("$eth"));
        assert!(tokens.contains("5.2"));
        assert!(tokens.contains("70k"));
        assert!(tokens.contains("hits"));
        assert!(tokens.contains("news"));
        assert!(!tokens.contains("up"));
    }

    #[test]
    fn test_tokenize_trims_separators() {
        let tokens = tokenize("...launch-day__ -- u.s. state_of_art.", DEFAULT_TOKEN_CAP);
        assert_eq!(tokens, set(&["launch-day", "u.s", "state_of_art"]));
    }

    #[test]
    fn test_tokenize_short_numbers_kept() {
        let tokens = tokenize("vote 7 to 2", DEFAULT_TOKEN_CAP);
        assert_eq!(tokens, set(&["vote", "7", "2"]));
    }

    #[test]
    fn test_tokenize_dedupes() {
        let tokens = tokenize("rates rates RATES", DEFAULT_TOKEN_CAP);
        assert_eq!(tokens.len(), 1);
    }

    #[test]
    fn test_tokenize_respects_cap() {
        let tokens = tokenize("alpha bravo charlie delta echo foxtrot", 3);
        assert_eq!(tokens.len(), 3);
        assert!(tokenize("alpha", 0).is_empty());
    }

    #[test]
    fn test_is_ticker() {
        assert!(is_ticker("$aapl"));
        assert!(!is_ticker("$100"));
        assert!(!is_ticker("aapl"));
        assert!(!is_ticker("$"));
    }

    #[test]
    fn test_jaccard() {
        let a = set(&["rate", "cut", "fed"]);
        let b = set(&["rate", "cut", "ecb"]);
        assert!((jaccard(&a, &b) - 0.5).abs() < 1e-9);
        assert_eq!(jaccard(&a, &a), 1.0);
        assert_eq!(jaccard(&a, &TokenSet::new()), 0.0);
        assert_eq!(jaccard(&a, &set(&["other"])), 0.0);
    }
}
