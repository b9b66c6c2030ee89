use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Highest star value a review can carry; 0 means "no rating given".
pub const MAX_STARS: u8 = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: String,
    pub date: NaiveDate,
    pub rating: u8, // 0..=5, 0 = unrated
    pub comment: String,
    pub has_replies: bool,
    pub link: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// Topic labels. Set upstream (pre-classified input) or by the rule classifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categories: Option<Vec<String>>,
}

impl Review {
    pub fn is_rated(&self) -> bool {
        self.rating > 0
    }

    pub fn has_comment(&self) -> bool {
        !self.comment.trim().is_empty()
    }

    pub fn has_labels(&self) -> bool {
        self.categories.as_ref().is_some_and(|c| !c.is_empty())
    }
}

/// One aggregation unit (day, ISO week, month or year).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeBucket {
    pub key: String,
    pub anchor: NaiveDate, // plotting position for the renderer
    pub total: u32,
    pub rated_count: u32,
    pub rating_sum: u32,
    pub per_star: BTreeMap<u8, u32>,
}

impl TimeBucket {
    pub fn new(key: String, anchor: NaiveDate) -> Self {
        Self {
            key,
            anchor,
            total: 0,
            rated_count: 0,
            rating_sum: 0,
            per_star: (0..=MAX_STARS).map(|s| (s, 0)).collect(),
        }
    }

    pub fn record(&mut self, rating: u8) {
        self.total += 1;
        *self.per_star.entry(rating).or_insert(0) += 1;
        if rating > 0 {
            self.rated_count += 1;
            self.rating_sum += u32::from(rating);
        }
    }

    /// `None` when the bucket holds no rated reviews; never defaults to 0.
    pub fn average(&self) -> Option<f64> {
        (self.rated_count > 0).then(|| f64::from(self.rating_sum) / f64::from(self.rated_count))
    }
}

/// Reviews sharing a topic label. Groups may overlap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryGroup {
    pub name: String,
    pub members: Vec<Review>, // input order
}

impl CategoryGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            members: Vec::new(),
        }
    }

    pub fn count(&self) -> usize {
        self.members.len()
    }

    pub fn rated_count(&self) -> usize {
        self.members.iter().filter(|r| r.is_rated()).count()
    }

    pub fn average_rating(&self) -> Option<f64> {
        mean_rating(&self.members)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.members.iter().any(|r| r.id == id)
    }
}

/// A single point of a smoothed rating series.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RollingPoint {
    pub date: NaiveDate,
    /// Position in the date-sorted rated sequence (sample-indexed series only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
    pub average_rating: f64,
    pub sample_count: usize,
}

/// Mean over rated reviews only.
pub fn mean_rating<'a>(reviews: impl IntoIterator<Item = &'a Review>) -> Option<f64> {
    let (sum, n) = reviews
        .into_iter()
        .filter(|r| r.is_rated())
        .fold((0u64, 0u64), |(s, n), r| (s + u64::from(r.rating), n + 1));
    (n > 0).then(|| sum as f64 / n as f64)
}
