use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::excerpt::clip;
use crate::models::Review;

/// Label assigned when the backend gives nothing usable for a review.
pub const OTHERS: &str = "Others";
pub const DEFAULT_BATCH_SIZE: usize = 40;
/// Characters of comment text sent per review.
pub const PROMPT_COMMENT_CHARS: usize = 500;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryDefinition {
    pub name: String,
    pub description: String,
}

impl CategoryDefinition {
    pub fn new(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
        }
    }
}

/// Parses `"Name: Description"`; a bare name gets a generic description.
impl FromStr for CategoryDefinition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, description) = match s.split_once(':') {
            Some((n, d)) => (n.trim().to_string(), d.trim().to_string()),
            None => {
                let n = s.trim().to_string();
                let d = format!("Reviews related to {n}");
                (n, d)
            }
        };
        if name.is_empty() {
            return Err(format!("category {s:?} has an empty name"));
        }
        Ok(Self { name, description })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabelRequest {
    pub id: String,
    pub comment: String,
}

/// Review id → category names.
pub type LabelMap = HashMap<String, Vec<String>>;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("rate limited by classification backend")]
    RateLimited,
    #[error("classification backend returned HTTP {0}")]
    Status(u16),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("malformed backend response: {0}")]
    MalformedResponse(String),
}

#[async_trait]
pub trait ClassificationBackend: Send + Sync {
    async fn classify_batch(
        &self,
        batch: &[LabelRequest],
        categories: &[CategoryDefinition],
    ) -> Result<LabelMap, BackendError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Rate-limit wait grows by this much per attempt...
    pub rate_limit_step_ms: u64,
    /// ...up to this cap.
    pub rate_limit_cap_ms: u64,
    pub failure_delay_ms: u64,
    pub batch_pause_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            rate_limit_step_ms: 5_000,
            rate_limit_cap_ms: 30_000,
            failure_delay_ms: 3_000,
            batch_pause_ms: 500,
        }
    }
}

impl RetryPolicy {
    /// No waiting anywhere; same attempt budget.
    pub fn immediate() -> Self {
        Self {
            rate_limit_step_ms: 0,
            rate_limit_cap_ms: 0,
            failure_delay_ms: 0,
            batch_pause_ms: 0,
            ..Self::default()
        }
    }

    /// Wait before retrying after `err` on zero-based `attempt`.
    pub fn backoff(&self, attempt: u32, err: &BackendError) -> Duration {
        match err {
            BackendError::RateLimited => {
                let grown = self.rate_limit_step_ms.saturating_mul(u64::from(attempt) + 1);
                Duration::from_millis(grown.min(self.rate_limit_cap_ms))
            }
            _ => Duration::from_millis(self.failure_delay_ms),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelingStats {
    pub batches: usize,
    pub degraded_batches: usize,
    /// Reviews that got at least one category other than `Others`.
    pub categorized: usize,
    pub fell_back: usize,
    /// Empty-comment reviews, never sent.
    pub skipped: usize,
}

/// Label every commented review through `backend`, in sequential batches.
///
/// Empty-comment reviews are not sent and get an empty label list, so they join no
/// group (same outcome as the rule classifier). Reviews the backend does not answer
/// for get `["Others"]`. Never fails: a batch that exhausts its retries degrades.
pub async fn label_reviews<B>(
    backend: &B,
    reviews: &mut [Review],
    categories: &[CategoryDefinition],
    batch_size: usize,
    policy: &RetryPolicy,
) -> LabelingStats
where
    B: ClassificationBackend + ?Sized,
{
    let start = std::time::Instant::now();
    let mut stats = LabelingStats::default();

    let (commented, empty): (Vec<usize>, Vec<usize>) =
        (0..reviews.len()).partition(|&i| reviews[i].has_comment());
    for &i in &empty {
        reviews[i].categories = Some(Vec::new());
    }
    stats.skipped = empty.len();

    let batch_size = batch_size.max(1);
    let total_batches = commented.len().div_ceil(batch_size);
    info!(
        "Labeling started - to_classify={}, without_comment={}, batches={}, batch_size={}",
        commented.len(),
        empty.len(),
        total_batches,
        batch_size
    );

    for (batch_idx, chunk) in commented.chunks(batch_size).enumerate() {
        let batch_start = std::time::Instant::now();
        let requests: Vec<LabelRequest> = chunk
            .iter()
            .map(|&i| LabelRequest {
                id: reviews[i].id.clone(),
                comment: clip(&reviews[i].comment, PROMPT_COMMENT_CHARS).to_string(),
            })
            .collect();

        let result = classify_with_retry(backend, &requests, categories, policy).await;
        if result.is_empty() {
            stats.degraded_batches += 1;
        }

        let mut matched = 0usize;
        for &i in chunk {
            let labels = result
                .get(&reviews[i].id)
                .cloned()
                .unwrap_or_else(|| vec![OTHERS.to_string()]);
            if labels.iter().any(|l| l != OTHERS) {
                matched += 1;
            } else {
                stats.fell_back += 1;
            }
            reviews[i].categories = Some(labels);
        }
        stats.categorized += matched;
        stats.batches += 1;

        info!(
            "Batch {}/{} completed - reviews={}, categorized={}, duration={:.2}s",
            batch_idx + 1,
            total_batches,
            chunk.len(),
            matched,
            batch_start.elapsed().as_secs_f32()
        );

        if batch_idx + 1 < total_batches {
            tokio::time::sleep(Duration::from_millis(policy.batch_pause_ms)).await;
        }
    }

    info!(
        "Labeling completed - duration={:.2}s, batches={}, degraded={}, categorized={}, others={}",
        start.elapsed().as_secs_f32(),
        stats.batches,
        stats.degraded_batches,
        stats.categorized,
        stats.fell_back
    );
    stats
}

async fn classify_with_retry<B>(
    backend: &B,
    batch: &[LabelRequest],
    categories: &[CategoryDefinition],
    policy: &RetryPolicy,
) -> LabelMap
where
    B: ClassificationBackend + ?Sized,
{
    let attempts = policy.max_attempts.max(1);
    for attempt in 0..attempts {
        match backend.classify_batch(batch, categories).await {
            Ok(map) => return map,
            // An unparseable answer is not retried; the batch degrades.
            Err(BackendError::MalformedResponse(msg)) => {
                warn!("Failed to parse backend response, skipping batch - {}", msg);
                return LabelMap::new();
            }
            Err(err) if attempt + 1 < attempts => {
                let wait = policy.backoff(attempt, &err);
                warn!(
                    "Backend call failed - attempt={}/{}, error={}, retry_in={:.1}s",
                    attempt + 1,
                    attempts,
                    err,
                    wait.as_secs_f32()
                );
                tokio::time::sleep(wait).await;
            }
            Err(err) => {
                warn!("Backend retries exhausted - attempts={}, error={}", attempts, err);
            }
        }
    }
    debug!("Batch degraded to empty result - size={}", batch.len());
    LabelMap::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays scripted outcomes and records every batch it sees.
    struct ScriptedBackend {
        script: Mutex<VecDeque<Result<LabelMap, BackendError>>>,
        seen: Mutex<Vec<Vec<String>>>,
    }

    impl ScriptedBackend {
        fn new(script: Vec<Result<LabelMap, BackendError>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<Vec<String>> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ClassificationBackend for ScriptedBackend {
        async fn classify_batch(
            &self,
            batch: &[LabelRequest],
            _categories: &[CategoryDefinition],
        ) -> Result<LabelMap, BackendError> {
            self.seen
                .lock()
                .unwrap()
                .push(batch.iter().map(|r| r.id.clone()).collect());
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(BackendError::Transport("script exhausted".into())))
        }
    }

    fn review(id: &str, comment: &str) -> Review {
        Review {
            id: id.into(),
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            rating: 3,
            comment: comment.into(),
            has_replies: false,
            link: String::new(),
            author: None,
            categories: None,
        }
    }

    fn labels(pairs: &[(&str, &[&str])]) -> LabelMap {
        pairs
            .iter()
            .map(|(id, cats)| (id.to_string(), cats.iter().map(|c| c.to_string()).collect()))
            .collect()
    }

    fn cats() -> Vec<CategoryDefinition> {
        vec![CategoryDefinition::new("Crash", "IDE crashes")]
    }

    #[test]
    fn category_definitions_parse_from_cli_form() {
        let c: CategoryDefinition = "Freeze / Hang: IDE becomes unresponsive".parse().unwrap();
        assert_eq!(c.name, "Freeze / Hang");
        assert_eq!(c.description, "IDE becomes unresponsive");
        let bare: CategoryDefinition = "Crash".parse().unwrap();
        assert_eq!(bare.description, "Reviews related to Crash");
        assert!(":nothing".parse::<CategoryDefinition>().is_err());
    }

    #[test]
    fn rate_limit_backoff_grows_and_caps() {
        let p = RetryPolicy::default();
        assert_eq!(p.backoff(0, &BackendError::RateLimited), Duration::from_secs(5));
        assert_eq!(p.backoff(1, &BackendError::RateLimited), Duration::from_secs(10));
        assert_eq!(p.backoff(9, &BackendError::RateLimited), Duration::from_secs(30));
        assert_eq!(p.backoff(2, &BackendError::Status(500)), Duration::from_secs(3));
    }

    #[tokio::test]
    async fn sequential_batches_in_input_order() {
        let backend = ScriptedBackend::new(vec![
            Ok(labels(&[("1", &["Crash"])])),
            Ok(labels(&[("3", &["Crash"])])),
        ]);
        let mut reviews = vec![review("1", "boom"), review("2", "ok"), review("3", "boom")];
        let stats =
            label_reviews(&backend, &mut reviews, &cats(), 2, &RetryPolicy::immediate()).await;

        assert_eq!(backend.calls(), vec![vec!["1", "2"], vec!["3"]]);
        assert_eq!(stats.batches, 2);
        assert_eq!(stats.categorized, 2);
        assert_eq!(reviews[1].categories, Some(vec![OTHERS.to_string()]));
    }

    #[tokio::test]
    async fn rate_limited_batch_is_retried() {
        let backend = ScriptedBackend::new(vec![
            Err(BackendError::RateLimited),
            Ok(labels(&[("1", &["Crash"])])),
        ]);
        let mut reviews = vec![review("1", "boom")];
        let stats =
            label_reviews(&backend, &mut reviews, &cats(), 40, &RetryPolicy::immediate()).await;

        assert_eq!(backend.calls().len(), 2);
        assert_eq!(stats.degraded_batches, 0);
        assert_eq!(reviews[0].categories, Some(vec!["Crash".to_string()]));
    }

    #[tokio::test]
    async fn exhausted_batch_falls_back_to_others_after_three_tries() {
        let backend = ScriptedBackend::new(vec![
            Err(BackendError::Status(500)),
            Err(BackendError::Transport("reset".into())),
            Err(BackendError::RateLimited),
            Ok(labels(&[("1", &["Crash"])])), // never reached
        ]);
        let mut reviews = vec![review("1", "boom"), review("2", "meh")];
        let stats =
            label_reviews(&backend, &mut reviews, &cats(), 40, &RetryPolicy::immediate()).await;

        assert_eq!(backend.calls().len(), 3);
        assert_eq!(stats.degraded_batches, 1);
        assert_eq!(stats.fell_back, 2);
        for r in &reviews {
            assert_eq!(r.categories, Some(vec![OTHERS.to_string()]));
        }
    }

    #[tokio::test]
    async fn malformed_response_degrades_without_retry() {
        let backend = ScriptedBackend::new(vec![
            Err(BackendError::MalformedResponse("not json".into())),
            Ok(labels(&[("1", &["Crash"])])),
        ]);
        let mut reviews = vec![review("1", "boom")];
        label_reviews(&backend, &mut reviews, &cats(), 40, &RetryPolicy::immediate()).await;
        assert_eq!(backend.calls().len(), 1);
        assert_eq!(reviews[0].categories, Some(vec![OTHERS.to_string()]));
    }

    #[tokio::test]
    async fn empty_comments_are_never_sent() {
        let backend = ScriptedBackend::new(vec![Ok(labels(&[("1", &["Crash"])]))]);
        let mut reviews = vec![review("1", "boom"), review("2", "  ")];
        let stats =
            label_reviews(&backend, &mut reviews, &cats(), 40, &RetryPolicy::immediate()).await;

        assert_eq!(backend.calls(), vec![vec!["1"]]);
        assert_eq!(stats.skipped, 1);
        assert_eq!(reviews[1].categories, Some(Vec::new()));
    }

    #[tokio::test]
    async fn long_comments_are_clipped_before_sending() {
        struct LengthCheck;

        #[async_trait]
        impl ClassificationBackend for LengthCheck {
            async fn classify_batch(
                &self,
                batch: &[LabelRequest],
                _categories: &[CategoryDefinition],
            ) -> Result<LabelMap, BackendError> {
                assert!(batch.iter().all(|r| r.comment.chars().count() <= PROMPT_COMMENT_CHARS));
                Ok(LabelMap::new())
            }
        }

        let mut reviews = vec![review("1", &"x".repeat(2_000))];
        label_reviews(&LengthCheck, &mut reviews, &cats(), 40, &RetryPolicy::immediate()).await;
    }
}
