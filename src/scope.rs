use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::models::Review;

/// Inclusive upper bound (in days) of the span that still gets daily buckets.
pub const SHORT_MAX_SPAN_DAYS: i64 = 30;
/// Inclusive upper bound (in days) of the span that still gets weekly buckets.
pub const MEDIUM_MAX_SPAN_DAYS: i64 = 365;

/// Aggregation granularity chosen from the date span of a review set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    #[default]
    Short, // daily
    Medium, // ISO week, Monday start
    Long,   // calendar month
}

impl Scope {
    pub fn from_span_days(span: i64) -> Self {
        if span <= SHORT_MAX_SPAN_DAYS {
            Scope::Short
        } else if span <= MEDIUM_MAX_SPAN_DAYS {
            Scope::Medium
        } else {
            Scope::Long
        }
    }

    /// `YYYY-MM-DD`, `YYYY-W##` or `YYYY-MM`.
    pub fn bucket_key(self, date: NaiveDate) -> String {
        match self {
            Scope::Short => date.format("%Y-%m-%d").to_string(),
            Scope::Medium => {
                let iso = date.iso_week();
                format!("{}-W{:02}", iso.year(), iso.week())
            }
            Scope::Long => date.format("%Y-%m").to_string(),
        }
    }

    /// Where the bucket containing `date` sits on a date axis.
    pub fn bucket_anchor(self, date: NaiveDate) -> NaiveDate {
        match self {
            Scope::Short => date,
            Scope::Medium => {
                date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
            }
            Scope::Long => date.with_day(15).unwrap_or(date),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Scope::Short => "Daily",
            Scope::Medium => "Weekly",
            Scope::Long => "Monthly",
        }
    }

    /// strftime pattern the renderer uses for date-axis ticks.
    pub fn axis_format(self) -> &'static str {
        match self {
            Scope::Short => "%m/%d",
            Scope::Medium | Scope::Long => "%Y-%m",
        }
    }
}

/// Earliest and latest review date, or `None` for an empty set.
pub fn date_span(reviews: &[Review]) -> Option<(NaiveDate, NaiveDate)> {
    reviews.iter().fold(None, |acc, r| match acc {
        None => Some((r.date, r.date)),
        Some((lo, hi)) => Some((lo.min(r.date), hi.max(r.date))),
    })
}

pub fn detect(reviews: &[Review]) -> Scope {
    match date_span(reviews) {
        Some((first, last)) => Scope::from_span_days((last - first).num_days()),
        None => Scope::Short,
    }
}
