use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use tracing::{debug, info};
use unicode_normalization::UnicodeNormalization;

use crate::api_types::{RawRating, RawReview};
use crate::error::{Result, ReviewError};
use crate::models::{Review, MAX_STARS};

pub const DATE_FORMAT: &str = "%Y-%m-%d";

static HTML_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").expect("static tag pattern"));

/// Turn loosely-typed records into canonical reviews, preserving order.
///
/// A missing or unparseable `date` is fatal, as is a missing `id`, a repeated `id`
/// or a rating outside 0..=5. Missing rating/comment/reply flag/link are coerced.
pub fn normalize(raw: Vec<RawReview>) -> Result<Vec<Review>> {
    let start = std::time::Instant::now();
    let total = raw.len();
    debug!("Normalization started - records={}", total);

    let mut seen: HashSet<String> = HashSet::with_capacity(total);
    let mut out = Vec::with_capacity(total);
    let mut coerced_ratings = 0usize;

    for (index, r) in raw.into_iter().enumerate() {
        let id = r
            .id
            .map(|id| id.into_string())
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| ReviewError::malformed(index, "missing id"))?;

        if !seen.insert(id.clone()) {
            return Err(ReviewError::DuplicateId { index, id });
        }

        let date_str = r
            .date
            .ok_or_else(|| ReviewError::malformed(index, "missing date"))?;
        let date = parse_date(&date_str)
            .ok_or_else(|| ReviewError::malformed(index, format!("unparseable date {date_str:?}")))?;

        if r.rating.is_none() {
            coerced_ratings += 1;
        }
        let rating = coerce_rating(r.rating, index)?;

        out.push(Review {
            id,
            date,
            rating,
            comment: clean_comment(r.comment.as_deref().unwrap_or_default()),
            has_replies: r.has_replies.unwrap_or(false),
            link: r.link.unwrap_or_default().trim().to_string(),
            author: r.author.map(|a| a.trim().to_string()).filter(|a| !a.is_empty()),
            categories: r.categories.map(|c| c.into_vec()),
        });
    }

    info!(
        "Normalization completed - duration={:.3}s, reviews={}, unrated_defaults={}",
        start.elapsed().as_secs_f32(),
        out.len(),
        coerced_ratings
    );
    Ok(out)
}

/// Strict `YYYY-MM-DD`: chrono alone would take `2024-1-5`, signs and wide years.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    let shape_ok = s.len() == 10
        && s.bytes().enumerate().all(|(i, b)| match i {
            4 | 7 => b == b'-',
            _ => b.is_ascii_digit(),
        });
    if !shape_ok {
        return None;
    }
    NaiveDate::parse_from_str(s, DATE_FORMAT).ok()
}

fn coerce_rating(raw: Option<RawRating>, index: usize) -> Result<u8> {
    let value: i64 = match raw {
        None => return Ok(0),
        Some(RawRating::Int(n)) => n,
        Some(RawRating::Float(f)) if f.fract() == 0.0 => f as i64,
        Some(RawRating::Float(f)) => {
            return Err(ReviewError::malformed(index, format!("non-integer rating {f}")));
        }
        Some(RawRating::Text(s)) if s.trim().is_empty() => return Ok(0),
        Some(RawRating::Text(s)) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| ReviewError::malformed(index, format!("unparseable rating {s:?}")))?,
    };

    u8::try_from(value)
        .ok()
        .filter(|v| *v <= MAX_STARS)
        .ok_or_else(|| ReviewError::malformed(index, format!("rating {value} outside 0..=5")))
}

/// Strip markup left over from the marketplace HTML, then NFC-normalize and trim.
pub fn clean_comment(raw: &str) -> String {
    let stripped = HTML_TAG.replace_all(raw, "");
    stripped.nfc().collect::<String>().trim().to_string()
}
