use itertools::Itertools;
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, info};

use crate::error::Result;
use crate::models::{CategoryGroup, Review};
use crate::rules::{CompiledRules, RuleTable, UNCATEGORIZED};

/// How a whole batch gets its labels. Decided once per run, never per review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ClassificationMode {
    /// Labels supplied upstream are trusted as-is.
    PreClassified,
    /// The rule table is applied to comment text.
    RuleBased,
}

impl ClassificationMode {
    pub fn detect(reviews: &[Review]) -> Self {
        if reviews.iter().any(Review::has_labels) {
            ClassificationMode::PreClassified
        } else {
            ClassificationMode::RuleBased
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub mode: ClassificationMode,
    /// Non-empty groups only. Rule order (catch-all last) or first appearance.
    pub groups: Vec<CategoryGroup>,
}

impl Classification {
    pub fn group(&self, name: &str) -> Option<&CategoryGroup> {
        self.groups.iter().find(|g| g.name == name)
    }
}

pub struct Classifier {
    rules: CompiledRules,
}

impl Classifier {
    pub fn new(rules: CompiledRules) -> Self {
        Self { rules }
    }

    pub fn from_table(table: &RuleTable) -> Result<Self> {
        Ok(Self::new(table.compile()?))
    }

    /// Group reviews by topic. In rule mode the match set (or the catch-all) is
    /// written back to each commented review's `categories`.
    pub fn classify(&self, reviews: &mut [Review]) -> Classification {
        let mode = ClassificationMode::detect(reviews);
        let groups = match mode {
            ClassificationMode::PreClassified => group_by_labels(reviews),
            ClassificationMode::RuleBased => self.apply_rules(reviews),
        };
        info!(
            "Classification completed - mode={:?}, reviews={}, groups={}",
            mode,
            reviews.len(),
            groups.len()
        );
        Classification { mode, groups }
    }

    fn apply_rules(&self, reviews: &mut [Review]) -> Vec<CategoryGroup> {
        let mut groups: Vec<CategoryGroup> = self
            .rules
            .names()
            .chain(std::iter::once(UNCATEGORIZED))
            .map(CategoryGroup::new)
            .collect();
        let catch_all = groups.len() - 1;
        let mut skipped = 0usize;

        for review in reviews.iter_mut() {
            if !review.has_comment() {
                skipped += 1;
                continue;
            }
            let mut hits = self.rules.match_indices(&review.comment);
            if hits.is_empty() {
                hits.push(catch_all);
            }

            review.categories = Some(hits.iter().map(|&i| groups[i].name.clone()).collect());
            for i in hits {
                groups[i].members.push(review.clone());
            }
        }

        debug!("Rule matching - skipped_without_comment={}", skipped);
        groups.retain(|g| !g.members.is_empty());
        groups
    }
}

fn group_by_labels(reviews: &[Review]) -> Vec<CategoryGroup> {
    let mut groups: Vec<CategoryGroup> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for review in reviews {
        let labels = review.categories.iter().flatten();
        for label in labels.map(|l| l.trim()).filter(|l| !l.is_empty()).unique() {
            let slot = *index.entry(label.to_string()).or_insert_with(|| {
                groups.push(CategoryGroup::new(label));
                groups.len() - 1
            });
            groups[slot].members.push(review.clone());
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::default_rules;
    use chrono::NaiveDate;

    fn review(id: &str, rating: u8, comment: &str) -> Review {
        Review {
            id: id.into(),
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            rating,
            comment: comment.into(),
            has_replies: false,
            link: String::new(),
            author: None,
            categories: None,
        }
    }

    fn labeled(id: &str, labels: &[&str]) -> Review {
        let mut r = review(id, 3, "text");
        r.categories = Some(labels.iter().map(|s| s.to_string()).collect());
        r
    }

    fn classifier() -> Classifier {
        Classifier::from_table(&default_rules()).unwrap()
    }

    fn ids(g: &CategoryGroup) -> Vec<&str> {
        g.members.iter().map(|r| r.id.as_str()).collect()
    }

    #[test]
    fn rule_mode_fans_out_to_every_matching_category() {
        let mut reviews = vec![review("1", 2, "Keeps crashing and is very slow")];
        let c = classifier().classify(&mut reviews);
        assert_eq!(c.mode, ClassificationMode::RuleBased);
        assert_eq!(ids(c.group("Bugs & Crashes").unwrap()), vec!["1"]);
        assert_eq!(ids(c.group("Performance").unwrap()), vec!["1"]);
        assert!(c.group(UNCATEGORIZED).is_none());
    }

    #[test]
    fn unmatched_comment_lands_once_in_catch_all() {
        let mut reviews = vec![review("1", 5, "great"), review("2", 1, "crashes constantly")];
        let c = classifier().classify(&mut reviews);
        let catch_all = c.group(UNCATEGORIZED).unwrap();
        assert_eq!(ids(catch_all), vec!["1"]);
        let appearances = c.groups.iter().filter(|g| g.contains("1")).count();
        assert_eq!(appearances, 1);
        assert_eq!(c.groups.last().map(|g| g.name.as_str()), Some(UNCATEGORIZED));
    }

    #[test]
    fn empty_comments_join_no_group() {
        let mut reviews = vec![review("1", 0, ""), review("2", 4, "   ")];
        let c = classifier().classify(&mut reviews);
        assert!(c.groups.is_empty());
        assert!(reviews.iter().all(|r| r.categories.is_none()));
    }

    #[test]
    fn match_set_is_recorded_on_review() {
        let mut reviews = vec![review("1", 2, "login fails"), review("2", 5, "great")];
        classifier().classify(&mut reviews);
        assert_eq!(
            reviews[0].categories,
            Some(vec!["Bugs & Crashes".to_string(), "Authentication & Account".to_string()])
        );
        assert_eq!(reviews[1].categories, Some(vec![UNCATEGORIZED.to_string()]));
    }

    #[test]
    fn any_label_switches_whole_batch_to_pre_classified() {
        let mut reviews = vec![
            labeled("1", &["Crash", "Freeze / Hang"]),
            review("2", 1, "crashes constantly"),
            labeled("3", &["Crash"]),
        ];
        let c = classifier().classify(&mut reviews);
        assert_eq!(c.mode, ClassificationMode::PreClassified);
        assert_eq!(ids(c.group("Crash").unwrap()), vec!["1", "3"]);
        assert_eq!(ids(c.group("Freeze / Hang").unwrap()), vec!["1"]);
        // rule table not consulted: no rule groups, no catch-all, review 2 untouched
        assert!(c.group("Bugs & Crashes").is_none());
        assert!(c.group(UNCATEGORIZED).is_none());
        assert!(reviews[1].categories.is_none());
    }

    #[test]
    fn repeated_label_counts_once() {
        let mut reviews = vec![labeled("1", &["Crash", "Crash", " "])];
        let c = classifier().classify(&mut reviews);
        assert_eq!(c.groups.len(), 1);
        assert_eq!(c.groups[0].count(), 1);
    }

    #[test]
    fn empty_label_lists_do_not_trigger_pre_classified_mode() {
        let mut r = review("1", 1, "crashes constantly");
        r.categories = Some(vec![]);
        let mut reviews = vec![r];
        let c = classifier().classify(&mut reviews);
        assert_eq!(c.mode, ClassificationMode::RuleBased);
        assert!(c.group("Bugs & Crashes").is_some());
    }

    #[test]
    fn rerun_yields_identical_membership() {
        let mut reviews = vec![
            review("1", 5, "great"),
            review("2", 1, "crashes constantly"),
            review("3", 0, ""),
            review("4", 2, "slow and buggy"),
        ];
        let first = classifier().classify(&mut reviews);
        let second = classifier().classify(&mut reviews);

        let membership = |c: &Classification| {
            let mut m: Vec<(String, Vec<String>)> = c
                .groups
                .iter()
                .map(|g| (g.name.clone(), g.members.iter().map(|r| r.id.clone()).collect()))
                .collect();
            m.sort();
            m
        };
        assert_eq!(membership(&first), membership(&second));
    }

    #[test]
    fn group_averages_use_rated_members_only() {
        let mut reviews = vec![review("1", 0, "crash"), review("2", 2, "crash"), review("3", 4, "bug")];
        let c = classifier().classify(&mut reviews);
        let bugs = c.group("Bugs & Crashes").unwrap();
        assert_eq!(bugs.count(), 3);
        assert_eq!(bugs.rated_count(), 2);
        assert_eq!(bugs.average_rating(), Some(3.0));
    }
}
