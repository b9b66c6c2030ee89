use chrono::NaiveDate;
use serde::Serialize;

use crate::models::Review;

pub const TRUNCATION_MARKER: &str = "...";
pub const DEFAULT_EXCERPT_CHARS: usize = 200;

/// Longest prefix of `s` holding at most `max_chars` characters.
pub fn clip(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &s[..byte_idx],
        None => s,
    }
}

/// Clip to `max_chars` and append the marker when anything was cut.
pub fn truncate_with_marker(s: &str, max_chars: usize) -> (String, bool) {
    let clipped = clip(s, max_chars);
    if clipped.len() == s.len() {
        (s.to_string(), false)
    } else {
        (format!("{clipped}{TRUNCATION_MARKER}"), true)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Excerpt {
    pub id: String,
    pub date: NaiveDate,
    pub rating: u8,
    pub comment: String,
    pub truncated: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub link: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
}

impl Excerpt {
    pub fn from_review(r: &Review, max_chars: usize) -> Self {
        let (comment, truncated) = truncate_with_marker(&r.comment, max_chars);
        Self {
            id: r.id.clone(),
            date: r.date,
            rating: r.rating,
            comment,
            truncated,
            link: r.link.clone(),
            author: r.author.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_untouched() {
        assert_eq!(truncate_with_marker("fine", 10), ("fine".to_string(), false));
        assert_eq!(truncate_with_marker("exact", 5), ("exact".to_string(), false));
    }

    #[test]
    fn long_text_gets_marker() {
        let (s, cut) = truncate_with_marker("abcdefgh", 3);
        assert_eq!(s, "abc...");
        assert!(cut);
    }

    #[test]
    fn clipping_counts_characters_not_bytes() {
        assert_eq!(clip("héllo wörld", 7), "héllo w");
        assert_eq!(clip("日本語テキスト", 3), "日本語");
    }
}
