//! Text helpers shared by the analyzer and the aggregator.

use std::collections::HashSet;

const STOPWORDS: &[&str] = &[
    "a", "about", "after", "all", "also", "am", "an", "and", "any", "are", "as", "at", "be",
    "been", "but", "by", "can", "did", "do", "does", "for", "from", "get", "got", "had", "has",
    "have", "he", "her", "his", "how", "i", "if", "in", "into", "is", "it", "its", "just", "me",
    "my", "no", "not", "of", "on", "one", "or", "our", "out", "she", "so", "some", "than", "that",
    "the", "their", "them", "then", "there", "these", "they", "this", "to", "too", "up", "us",
    "very", "was", "we", "were", "what", "when", "which", "while", "who", "why", "will", "with",
    "would", "you", "your",
];

/// Lowercase, strip punctuation, and collapse whitespace.
pub fn normalize(text: &str) -> String {
    tokenize(text).join(" ")
}

/// Lowercase word tokens. Apostrophes stay inside words ("can't").
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .map(|t| t.trim_matches('\'').to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Distinct non-stopword tokens in first-seen order, at most `limit`.
pub fn keywords(text: &str, limit: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    tokenize(text)
        .into_iter()
        .filter(|t| t.len() > 2 && !STOPWORDS.contains(&t.as_str()))
        .filter(|t| seen.insert(t.clone()))
        .take(limit)
        .collect()
}

/// Jaccard similarity of two keyword sets. Two empty sets are dissimilar.
pub fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f32 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f32 / union as f32
}

/// Split text into sentences on `.`, `!`, `?` and newlines.
pub fn sentences(text: &str) -> impl Iterator<Item = &str> {
    text.split(['.', '!', '?', '\n'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Collapse whitespace and cut to at most `max_chars` characters.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= max_chars {
        return collapsed;
    }
    let cut: String = collapsed.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{}...", cut.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(
            normalize("  Battery   DIES fast!! "),
            "battery dies fast"
        );
        assert_eq!(normalize("Can't pair, won't connect."), "can't pair won't connect");
    }

    #[test]
    fn test_keywords_skip_stopwords_and_duplicates() {
        let kws = keywords("The battery is dead and the battery won't charge", 5);
        assert_eq!(kws, vec!["battery", "dead", "won't", "charge"]);
        assert_eq!(keywords("battery charge case", 2).len(), 2);
    }

    #[test]
    fn test_jaccard() {
        let a: HashSet<String> = ["battery", "drains"].iter().map(|s| s.to_string()).collect();
        let b: HashSet<String> = ["battery", "dies"].iter().map(|s| s.to_string()).collect();
        assert!((jaccard(&a, &b) - 1.0 / 3.0).abs() < 1e-6);
        assert_eq!(jaccard(&HashSet::new(), &HashSet::new()), 0.0);
    }

    #[test]
    fn test_sentences() {
        let parts: Vec<_> = sentences("Love the sound. Hate the case!\nWhy?").collect();
        assert_eq!(parts, vec!["Love the sound", "Hate the case", "Why"]);
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("short   text", 20), "short text");
        let long = "word ".repeat(50);
        let cut = truncate_chars(&long, 20);
        assert!(cut.chars().count() <= 20);
        assert!(cut.ends_with("..."));
    }
}
