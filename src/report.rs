use anyhow::{Context, Result};
use chrono::NaiveDate;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::{fs, path::Path};
use tracing::debug;

use crate::aggregate::{aggregate, rating_distribution, reply_rates, yearly_rollup, ReplyRate};
use crate::classify::{Classification, ClassificationMode};
use crate::excerpt::{Excerpt, DEFAULT_EXCERPT_CHARS};
use crate::models::{mean_rating, Review, RollingPoint, TimeBucket};
use crate::scope::{date_span, Scope};
use crate::trend::{
    calendar_trend, category_trends, centered_means, sample_trend, CategoryTrend, SampleTrend,
    BUCKET_SMOOTHING, DEFAULT_SMOOTHING_WIDTH,
};

/// Width of the centered smoothing line drawn over bucket averages.
///
/// In YAML a bare integer is a fixed width and `adaptive` selects the adaptive sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "SmoothingRepr", into = "SmoothingRepr")]
pub enum Smoothing {
    Fixed(usize),
    /// `BUCKET_SMOOTHING` sized from the bucket count.
    Adaptive,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(untagged)]
enum SmoothingRepr {
    Width(usize),
    Mode(SmoothingMode),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum SmoothingMode {
    Adaptive,
}

impl From<SmoothingRepr> for Smoothing {
    fn from(r: SmoothingRepr) -> Self {
        match r {
            SmoothingRepr::Width(w) => Smoothing::Fixed(w),
            SmoothingRepr::Mode(SmoothingMode::Adaptive) => Smoothing::Adaptive,
        }
    }
}

impl From<Smoothing> for SmoothingRepr {
    fn from(s: Smoothing) -> Self {
        match s {
            Smoothing::Fixed(w) => SmoothingRepr::Width(w),
            Smoothing::Adaptive => SmoothingRepr::Mode(SmoothingMode::Adaptive),
        }
    }
}

impl Default for Smoothing {
    fn default() -> Self {
        Smoothing::Fixed(DEFAULT_SMOOTHING_WIDTH)
    }
}

impl Smoothing {
    pub fn width(self, buckets: usize) -> usize {
        match self {
            Smoothing::Fixed(w) => w.max(1),
            Smoothing::Adaptive => BUCKET_SMOOTHING.window(buckets),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// How many trailing buckets count as "recent".
    pub recent_buckets: usize,
    pub negative_excerpts: usize,
    pub positive_excerpts: usize,
    pub excerpt_chars: usize,
    pub smoothing: Smoothing,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            recent_buckets: 3,
            negative_excerpts: 8,
            positive_excerpts: 5,
            excerpt_chars: DEFAULT_EXCERPT_CHARS,
            smoothing: Smoothing::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub title: String,
    pub scope: Scope,
    pub scope_label: String,
    pub axis_format: String,
    pub date_range: Option<DateRange>,
    pub totals: Totals,
    pub average_rating: Option<f64>,
    pub rating_distribution: BTreeMap<u8, u32>,
    pub reply_rates: Vec<ReplyRate>,
    pub recent: RecentWindow,
    pub buckets: Vec<BucketView>,
    pub bucket_trend: BucketTrend,
    pub yearly: Vec<BucketView>,
    pub classification_mode: ClassificationMode,
    pub categories: Vec<CategorySummary>,
    pub sample_trend: Option<SampleTrend>,
    pub calendar_trend: Vec<RollingPoint>,
    pub category_trends: Vec<CategoryTrend>,
    pub recent_negative: Vec<Excerpt>,
    pub recent_positive: Vec<Excerpt>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub first: NaiveDate,
    pub last: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Totals {
    pub reviews: usize,
    pub rated: usize,
    pub unrated: usize,
    pub with_replies: usize,
    pub reply_rate_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentWindow {
    pub bucket_keys: Vec<String>,
    pub reviews: usize,
    pub rated: usize,
    pub average_rating: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketView {
    #[serde(flatten)]
    pub bucket: TimeBucket,
    pub average_rating: Option<f64>,
}

impl From<TimeBucket> for BucketView {
    fn from(bucket: TimeBucket) -> Self {
        let average_rating = bucket.average();
        Self {
            bucket,
            average_rating,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketTrend {
    pub width: usize,
    pub points: Vec<BucketTrendPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketTrendPoint {
    pub key: String,
    pub anchor: NaiveDate,
    pub average: Option<f64>,
    pub smoothed: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorySummary {
    pub name: String,
    pub count: usize,
    pub rated_count: usize,
    pub average_rating: Option<f64>,
    /// Review ids in input order.
    pub member_ids: Vec<String>,
}

/// Assemble everything a renderer needs from one classified review set.
pub fn build_report(
    reviews: &[Review],
    scope: Scope,
    classification: &Classification,
    cfg: &ReportConfig,
    title: &str,
) -> ReportSummary {
    let buckets = aggregate(reviews, scope);
    let bucket_trend = build_bucket_trend(&buckets, cfg.smoothing);

    let recent_keys: Vec<String> = buckets
        .iter()
        .rev()
        .take(cfg.recent_buckets)
        .rev()
        .map(|b| b.key.clone())
        .collect();
    let key_set: HashSet<&str> = recent_keys.iter().map(String::as_str).collect();
    let recent_reviews: Vec<&Review> = reviews
        .iter()
        .filter(|r| key_set.contains(scope.bucket_key(r.date).as_str()))
        .collect();

    let recent = RecentWindow {
        bucket_keys: recent_keys.clone(),
        reviews: recent_reviews.len(),
        rated: recent_reviews.iter().filter(|r| r.is_rated()).count(),
        average_rating: mean_rating(recent_reviews.iter().copied()),
    };
    let recent_negative = pick_excerpts(
        &recent_reviews,
        |r| (1..=2).contains(&r.rating),
        cfg.negative_excerpts,
        cfg.excerpt_chars,
    );
    let recent_positive = pick_excerpts(
        &recent_reviews,
        |r| r.rating == 5,
        cfg.positive_excerpts,
        cfg.excerpt_chars,
    );

    let categories = classification
        .groups
        .iter()
        .map(|g| CategorySummary {
            name: g.name.clone(),
            count: g.count(),
            rated_count: g.rated_count(),
            average_rating: g.average_rating(),
            member_ids: g.members.iter().map(|r| r.id.clone()).collect(),
        })
        .sorted_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)))
        .collect();

    let rated = reviews.iter().filter(|r| r.is_rated()).count();
    let with_replies = reviews.iter().filter(|r| r.has_replies).count();
    let totals = Totals {
        reviews: reviews.len(),
        rated,
        unrated: reviews.len() - rated,
        with_replies,
        reply_rate_pct: if reviews.is_empty() {
            0.0
        } else {
            with_replies as f64 / reviews.len() as f64 * 100.0
        },
    };

    debug!(
        "Report assembled - buckets={}, recent_keys={:?}, categories={}, negative={}, positive={}",
        buckets.len(),
        recent_keys,
        classification.groups.len(),
        recent_negative.len(),
        recent_positive.len()
    );

    ReportSummary {
        title: title.to_string(),
        scope,
        scope_label: scope.label().to_string(),
        axis_format: scope.axis_format().to_string(),
        date_range: date_span(reviews).map(|(first, last)| DateRange { first, last }),
        totals,
        average_rating: mean_rating(reviews),
        rating_distribution: rating_distribution(reviews),
        reply_rates: reply_rates(reviews),
        recent,
        buckets: buckets.into_iter().map(BucketView::from).collect(),
        bucket_trend,
        yearly: yearly_rollup(reviews).into_iter().map(BucketView::from).collect(),
        classification_mode: classification.mode,
        categories,
        sample_trend: sample_trend(reviews),
        calendar_trend: calendar_trend(reviews),
        category_trends: category_trends(&classification.groups),
        recent_negative,
        recent_positive,
    }
}

fn build_bucket_trend(buckets: &[TimeBucket], smoothing: Smoothing) -> BucketTrend {
    let width = smoothing.width(buckets.len());
    let averages: Vec<Option<f64>> = buckets.iter().map(TimeBucket::average).collect();
    let smoothed = centered_means(&averages, width);
    let points = buckets
        .iter()
        .zip(averages)
        .zip(smoothed)
        .map(|((b, average), smoothed)| BucketTrendPoint {
            key: b.key.clone(),
            anchor: b.anchor,
            average,
            smoothed,
        })
        .collect();
    BucketTrend { width, points }
}

/// Newest first (ties keep input order), commented reviews only.
fn pick_excerpts<F>(recent: &[&Review], keep: F, limit: usize, max_chars: usize) -> Vec<Excerpt>
where
    F: Fn(&Review) -> bool,
{
    let mut picked: Vec<&Review> = recent
        .iter()
        .copied()
        .filter(|r| r.has_comment() && keep(*r))
        .collect();
    picked.sort_by(|a, b| b.date.cmp(&a.date));
    picked
        .into_iter()
        .take(limit)
        .map(|r| Excerpt::from_review(r, max_chars))
        .collect()
}

pub fn write_json<P: AsRef<Path>, T: ?Sized + Serialize>(path: P, value: &T) -> Result<()> {
    let path = path.as_ref();
    fs::write(path, serde_json::to_vec_pretty(value)?)
        .with_context(|| format!("writing {}", path.display()))
}
