use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

use crate::models::{Review, TimeBucket, MAX_STARS};
use crate::scope::Scope;

/// Group reviews into buckets at `scope` granularity, ascending by key.
pub fn aggregate(reviews: &[Review], scope: Scope) -> Vec<TimeBucket> {
    let buckets = aggregate_by(reviews, |d| (scope.bucket_key(d), scope.bucket_anchor(d)));
    debug!(
        "Bucketing completed - scope={:?}, reviews={}, buckets={}",
        scope,
        reviews.len(),
        buckets.len()
    );
    buckets
}

/// Same accumulation keyed by 4-digit year, regardless of scope.
pub fn yearly_rollup(reviews: &[Review]) -> Vec<TimeBucket> {
    aggregate_by(reviews, |d| {
        let anchor = NaiveDate::from_ymd_opt(d.year(), 1, 1).unwrap_or(d);
        (format!("{:04}", d.year()), anchor)
    })
}

fn aggregate_by<F>(reviews: &[Review], key_of: F) -> Vec<TimeBucket>
where
    F: Fn(NaiveDate) -> (String, NaiveDate),
{
    let mut by_key: BTreeMap<String, TimeBucket> = BTreeMap::new();
    for r in reviews {
        let (key, anchor) = key_of(r.date);
        by_key
            .entry(key)
            .or_insert_with_key(|k| TimeBucket::new(k.clone(), anchor))
            .record(r.rating);
    }
    by_key.into_values().collect()
}

/// Count of reviews per star value, 0 (unrated) through 5.
pub fn rating_distribution(reviews: &[Review]) -> BTreeMap<u8, u32> {
    let mut dist: BTreeMap<u8, u32> = (0..=MAX_STARS).map(|s| (s, 0)).collect();
    for r in reviews {
        *dist.entry(r.rating).or_insert(0) += 1;
    }
    dist
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyRate {
    pub stars: u8,
    pub total: u32,
    pub replied: u32,
    pub rate_pct: f64,
}

/// Share of reviews that got a reply, per star value present in the set.
pub fn reply_rates(reviews: &[Review]) -> Vec<ReplyRate> {
    let mut groups: BTreeMap<u8, (u32, u32)> = BTreeMap::new();
    for r in reviews {
        let e = groups.entry(r.rating).or_insert((0, 0));
        e.0 += 1;
        if r.has_replies {
            e.1 += 1;
        }
    }
    groups
        .into_iter()
        .map(|(stars, (total, replied))| ReplyRate {
            stars,
            total,
            replied,
            rate_pct: f64::from(replied) / f64::from(total) * 100.0,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn review(id: &str, date: &str, rating: u8) -> Review {
        Review {
            id: id.into(),
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            rating,
            comment: String::new(),
            has_replies: false,
            link: String::new(),
            author: None,
            categories: None,
        }
    }

    fn sample() -> Vec<Review> {
        vec![
            review("1", "2024-03-04", 5),
            review("2", "2024-03-02", 0),
            review("3", "2024-03-04", 2),
            review("4", "2024-02-27", 4),
            review("5", "2023-12-31", 1),
        ]
    }

    #[test]
    fn buckets_are_sorted_and_unique() {
        let buckets = aggregate(&sample(), Scope::Short);
        let keys: Vec<_> = buckets.iter().map(|b| b.key.as_str()).collect();
        assert_eq!(keys, vec!["2023-12-31", "2024-02-27", "2024-03-02", "2024-03-04"]);
    }

    #[test]
    fn per_star_sums_match_totals() {
        for scope in [Scope::Short, Scope::Medium, Scope::Long] {
            let buckets = aggregate(&sample(), scope);
            assert_eq!(buckets.iter().map(|b| b.total).sum::<u32>(), 5);
            for b in &buckets {
                assert_eq!(b.per_star.values().sum::<u32>(), b.total);
                assert_eq!(b.rated_count, b.total - b.per_star[&0]);
            }
        }
    }

    #[test]
    fn unrated_bucket_has_no_average() {
        let buckets = aggregate(&sample(), Scope::Short);
        let unrated = buckets.iter().find(|b| b.key == "2024-03-02").unwrap();
        assert_eq!(unrated.average(), None);
        let mixed = buckets.iter().find(|b| b.key == "2024-03-04").unwrap();
        assert_eq!(mixed.average(), Some(3.5));
    }

    #[test]
    fn weekly_buckets_group_by_iso_week() {
        let buckets = aggregate(&sample(), Scope::Medium);
        let keys: Vec<_> = buckets.iter().map(|b| b.key.as_str()).collect();
        // 2023-12-31 is the Sunday closing ISO week 52 of 2023.
        assert_eq!(keys, vec!["2023-W52", "2024-W09", "2024-W10"]);
        assert_eq!(buckets[1].total, 2); // 02-27 and 03-02
    }

    #[test]
    fn yearly_rollup_ignores_scope() {
        let years = yearly_rollup(&sample());
        assert_eq!(years.len(), 2);
        assert_eq!(years[0].key, "2023");
        assert_eq!(years[1].key, "2024");
        assert_eq!(years[1].total, 4);
        assert_eq!(years[1].rated_count, 3);
        assert_eq!(years[1].rating_sum, 11);
    }

    #[test]
    fn empty_input_yields_empty_series() {
        assert!(aggregate(&[], Scope::Short).is_empty());
        assert!(yearly_rollup(&[]).is_empty());
        assert!(reply_rates(&[]).is_empty());
        assert_eq!(rating_distribution(&[]).values().sum::<u32>(), 0);
    }

    #[test]
    fn reply_rates_per_star() {
        let mut reviews = sample();
        reviews[0].has_replies = true;
        let rates = reply_rates(&reviews);
        let five = rates.iter().find(|r| r.stars == 5).unwrap();
        assert_eq!((five.total, five.replied), (1, 1));
        assert!((five.rate_pct - 100.0).abs() < 1e-9);
        assert!(rates.iter().all(|r| r.stars != 3));
    }
}
