use anyhow::{Context, Result};
use std::path::Path;
use tracing::info;

use crate::api_types::RawReview;
use crate::classify::Classifier;
use crate::config::AppConfig;
use crate::labeler::{label_reviews, CategoryDefinition, ClassificationBackend, LabelingStats};
use crate::models::Review;
use crate::normalize::normalize;
use crate::report::{build_report, ReportSummary};
use crate::scope;

/// Parse a JSON array of review records and normalize it.
pub fn parse_reviews(json: &str) -> Result<Vec<Review>> {
    let raw: Vec<RawReview> =
        serde_json::from_str(json).context("decoding review JSON (expected an array of records)")?;
    Ok(normalize(raw)?)
}

pub fn load_reviews(path: &Path) -> Result<Vec<Review>> {
    let start = std::time::Instant::now();
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading reviews from {}", path.display()))?;
    let reviews =
        parse_reviews(&text).with_context(|| format!("loading reviews from {}", path.display()))?;
    info!(
        "Reviews loaded - duration={:.2}s, reviews={}, source={}",
        start.elapsed().as_secs_f32(),
        reviews.len(),
        path.display()
    );
    Ok(reviews)
}

/// Scope → classify → bucket/trend → summary, over an already-normalized set.
pub fn run_report(cfg: &AppConfig, mut reviews: Vec<Review>, title: &str) -> Result<ReportSummary> {
    let pipeline_start = std::time::Instant::now();

    let scope = scope::detect(&reviews);
    info!("Scope detected - scope={:?}, reviews={}", scope, reviews.len());

    let classifier = Classifier::from_table(&cfg.rules).context("compiling rule table")?;
    let classification = classifier.classify(&mut reviews);

    let report = build_report(&reviews, scope, &classification, &cfg.report, title);
    info!(
        "Report completed - total_duration={:.2}s, buckets={}, average={:?}",
        pipeline_start.elapsed().as_secs_f32(),
        report.buckets.len(),
        report.average_rating
    );
    Ok(report)
}

/// Label reviews through `backend`; reviews come back carrying `categories`.
pub async fn run_classify<B>(
    cfg: &AppConfig,
    backend: &B,
    reviews: &mut [Review],
    categories: &[CategoryDefinition],
) -> LabelingStats
where
    B: ClassificationBackend + ?Sized,
{
    info!(
        "Classification run started - reviews={}, categories={}, model={}",
        reviews.len(),
        categories.len(),
        cfg.backend.model
    );
    label_reviews(
        backend,
        reviews,
        categories,
        cfg.backend.batch_size,
        &cfg.backend.retry,
    )
    .await
}
