//! Smoothed rating series.
//!
//! Two unrelated window shapes live here: a sample-indexed trailing mean (window
//! measured in reviews) and a calendar-indexed trailing mean (window measured in
//! days). A centered mean over bucket averages smooths the per-bucket trend line.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::{CategoryGroup, Review, RollingPoint};

/// `window = max(floor, n / divisor)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSizing {
    pub floor: usize,
    pub divisor: usize,
}

impl WindowSizing {
    pub const fn new(floor: usize, divisor: usize) -> Self {
        Self { floor, divisor }
    }

    pub fn window(&self, n: usize) -> usize {
        self.floor.max(n / self.divisor.max(1)).max(1)
    }
}

/// Sizing for the all-reviews trailing trend.
pub const SAMPLE_TREND: WindowSizing = WindowSizing::new(10, 40);
/// Sizing for the adaptive bucket smoothing line.
pub const BUCKET_SMOOTHING: WindowSizing = WindowSizing::new(3, 10);

pub const SAMPLE_TREND_MIN_RATED: usize = 10;
pub const DEFAULT_SMOOTHING_WIDTH: usize = 5;
pub const CALENDAR_WINDOW_DAYS: i64 = 28;
pub const CALENDAR_MIN_RATED: usize = 5;
pub const CATEGORY_MIN_RATED: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SampleTrend {
    pub window: usize,
    pub points: Vec<RollingPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryTrend {
    pub name: String,
    pub rated_count: usize,
    pub points: Vec<RollingPoint>,
}

/// Rated `(date, rating)` pairs sorted by date; the sort is stable so ties keep input order.
fn rated_by_date<'a>(reviews: impl IntoIterator<Item = &'a Review>) -> Vec<(NaiveDate, u8)> {
    let mut rated: Vec<(NaiveDate, u8)> = reviews
        .into_iter()
        .filter(|r| r.is_rated())
        .map(|r| (r.date, r.rating))
        .collect();
    rated.sort_by_key(|(d, _)| *d);
    rated
}

/// Causal trailing mean over the last `window` rated reviews, one point per review.
/// `None` below `SAMPLE_TREND_MIN_RATED` rated reviews.
pub fn sample_trend(reviews: &[Review]) -> Option<SampleTrend> {
    let rated = rated_by_date(reviews);
    if rated.len() < SAMPLE_TREND_MIN_RATED {
        debug!("Sample trend skipped - rated={}", rated.len());
        return None;
    }
    let window = SAMPLE_TREND.window(rated.len());
    let ratings: Vec<u8> = rated.iter().map(|(_, r)| *r).collect();
    let points = trailing_means(&ratings, window)
        .into_iter()
        .zip(&rated)
        .enumerate()
        .map(|(i, ((mean, count), (date, _)))| RollingPoint {
            date: *date,
            index: Some(i),
            average_rating: mean,
            sample_count: count,
        })
        .collect();
    Some(SampleTrend { window, points })
}

/// `(mean, samples)` of `values[i+1-window ..= i]`, truncated at the start.
pub fn trailing_means(values: &[u8], window: usize) -> Vec<(f64, usize)> {
    let window = window.max(1);
    let mut sum = 0u64;
    let mut out = Vec::with_capacity(values.len());
    for (i, v) in values.iter().enumerate() {
        sum += u64::from(*v);
        if i >= window {
            sum -= u64::from(values[i - window]);
        }
        let count = (i + 1).min(window);
        out.push((sum as f64 / count as f64, count));
    }
    out
}

/// Centered mean over `[i - width/2, i + width/2]`, skipping buckets with no average.
pub fn centered_means(values: &[Option<f64>], width: usize) -> Vec<Option<f64>> {
    let half = width.max(1) / 2;
    (0..values.len())
        .map(|i| {
            let lo = i.saturating_sub(half);
            let hi = (i + half + 1).min(values.len());
            let defined: Vec<f64> = values[lo..hi].iter().flatten().copied().collect();
            (!defined.is_empty()).then(|| defined.iter().sum::<f64>() / defined.len() as f64)
        })
        .collect()
}

/// One point per calendar day between the first and last rated date whose
/// trailing 28-day window is non-empty. Empty below `CALENDAR_MIN_RATED`.
pub fn calendar_trend(reviews: &[Review]) -> Vec<RollingPoint> {
    calendar_trend_with(reviews, CALENDAR_MIN_RATED)
}

pub fn calendar_trend_with<'a>(
    reviews: impl IntoIterator<Item = &'a Review>,
    min_rated: usize,
) -> Vec<RollingPoint> {
    let rated = rated_by_date(reviews);
    if rated.len() < min_rated.max(1) {
        return Vec::new();
    }
    let (first, last) = (rated[0].0, rated[rated.len() - 1].0);
    let reach = Duration::days(CALENDAR_WINDOW_DAYS - 1);

    let mut points = Vec::new();
    let (mut lo, mut hi, mut sum) = (0usize, 0usize, 0u64);
    for day in first.iter_days().take_while(|d| *d <= last) {
        while hi < rated.len() && rated[hi].0 <= day {
            sum += u64::from(rated[hi].1);
            hi += 1;
        }
        let window_start = day - reach;
        while lo < hi && rated[lo].0 < window_start {
            sum -= u64::from(rated[lo].1);
            lo += 1;
        }
        let count = hi - lo;
        if count > 0 {
            points.push(RollingPoint {
                date: day,
                index: None,
                average_rating: sum as f64 / count as f64,
                sample_count: count,
            });
        }
    }
    points
}

/// Calendar trend per group, for groups with at least `CATEGORY_MIN_RATED` rated members.
pub fn category_trends(groups: &[CategoryGroup]) -> Vec<CategoryTrend> {
    groups
        .iter()
        .filter(|g| g.rated_count() >= CATEGORY_MIN_RATED)
        .map(|g| CategoryTrend {
            name: g.name.clone(),
            rated_count: g.rated_count(),
            points: calendar_trend_with(&g.members, CATEGORY_MIN_RATED),
        })
        .collect()
}
