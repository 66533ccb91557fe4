//! Small text utilities shared by the detectors.

use std::collections::HashSet;

/// Truncate to at most `max_chars` characters on a char boundary.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Lowercased word tokens. Keeps inner apostrophes, dots and digits so
/// "v2.1" and "don't" survive as single tokens.
pub fn words(text: &str) -> Vec<String> {
    text.split(|c: char| c.is_whitespace() || matches!(c, ',' | ';' | ':' | '!' | '?' | '(' | ')' | '"'))
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .collect()
}

/// Split into sentences on terminal punctuation. Dots between digits
/// ("v2.1", "3.5") do not end a sentence.
pub fn sentences(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut out = Vec::new();
    let mut current = String::new();

    for (i, &c) in chars.iter().enumerate() {
        current.push(c);
        let terminal = match c {
            '!' | '?' | '\n' => true,
            '.' => {
                let prev_digit = i > 0 && chars[i - 1].is_ascii_digit();
                let next_digit = chars.get(i + 1).is_some_and(|n| n.is_ascii_digit());
                !(prev_digit && next_digit)
            }
            _ => false,
        };
        if terminal {
            let trimmed = current.trim();
            if trimmed.chars().any(|c| c.is_alphanumeric()) {
                out.push(trimmed.to_string());
            }
            current.clear();
        }
    }

    let trimmed = current.trim();
    if trimmed.chars().any(|c| c.is_alphanumeric()) {
        out.push(trimmed.to_string());
    }

    out
}

/// Whether `haystack` (already lowercased) contains `phrase` on word boundaries.
pub fn contains_phrase(haystack: &str, phrase: &str) -> bool {
    let mut start = 0;
    while let Some(pos) = haystack[start..].find(phrase) {
        let begin = start + pos;
        let end = begin + phrase.len();
        let before_ok = haystack[..begin]
            .chars()
            .next_back()
            .map_or(true, |c| !c.is_alphanumeric());
        let after_ok = haystack[end..]
            .chars()
            .next()
            .map_or(true, |c| !c.is_alphanumeric());
        if before_ok && after_ok {
            return true;
        }
        start = begin + phrase.chars().next().map_or(1, char::len_utf8);
    }
    false
}

/// Phrases from `table` present in `lowered`.
pub fn matched_phrases<'a>(lowered: &str, table: &[&'a str]) -> Vec<&'a str> {
    table
        .iter()
        .copied()
        .filter(|p| contains_phrase(lowered, p))
        .collect()
}

/// Word-level shingles of length `n`.
pub fn shingles(tokens: &[String], n: usize) -> HashSet<String> {
    if tokens.len() < n {
        return tokens.iter().cloned().collect();
    }
    tokens.windows(n).map(|w| w.join(" ")).collect()
}

/// Jaccard similarity of two sets; 0.0 when both are empty.
pub fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}
