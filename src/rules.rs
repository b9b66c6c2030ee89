use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, ReviewError};

/// Catch-all group for commented reviews that match no rule.
pub const UNCATEGORIZED: &str = "General / Uncategorized";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRule {
    pub name: String,
    /// Case-insensitive regex alternatives; any one matching anywhere is a hit.
    pub patterns: Vec<String>,
}

impl CategoryRule {
    pub fn new<S: Into<String>>(name: &str, patterns: impl IntoIterator<Item = S>) -> Self {
        Self {
            name: name.to_string(),
            patterns: patterns.into_iter().map(Into::into).collect(),
        }
    }
}

/// Ordered category → patterns table. Plain data; compile it before matching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleTable {
    rules: Vec<CategoryRule>,
}

impl Default for RuleTable {
    fn default() -> Self {
        default_rules()
    }
}

impl RuleTable {
    pub fn new(rules: Vec<CategoryRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[CategoryRule] {
        &self.rules
    }

    pub fn compile(&self) -> Result<CompiledRules> {
        let mut categories = Vec::with_capacity(self.rules.len());
        for rule in &self.rules {
            let mut regexes = Vec::with_capacity(rule.patterns.len());
            for pat in &rule.patterns {
                let re = RegexBuilder::new(pat)
                    .case_insensitive(true)
                    .build()
                    .map_err(|source| ReviewError::InvalidPattern {
                        category: rule.name.clone(),
                        pattern: pat.clone(),
                        source,
                    })?;
                regexes.push(re);
            }
            categories.push(CompiledCategory {
                name: rule.name.clone(),
                regexes,
            });
        }
        debug!(
            "Rule table compiled - categories={}, patterns={}",
            categories.len(),
            self.rules.iter().map(|r| r.patterns.len()).sum::<usize>()
        );
        Ok(CompiledRules { categories })
    }
}

#[derive(Debug, Clone)]
struct CompiledCategory {
    name: String,
    regexes: Vec<Regex>,
}

#[derive(Debug, Clone)]
pub struct CompiledRules {
    categories: Vec<CompiledCategory>,
}

impl CompiledRules {
    /// Names of every category with at least one matching pattern, in table order.
    pub fn matches(&self, text: &str) -> Vec<&str> {
        self.match_indices(text)
            .into_iter()
            .map(|i| self.categories[i].name.as_str())
            .collect()
    }

    /// Table positions of the matching categories, ascending.
    pub fn match_indices(&self, text: &str) -> Vec<usize> {
        self.categories
            .iter()
            .enumerate()
            .filter(|(_, c)| c.regexes.iter().any(|re| re.is_match(text)))
            .map(|(i, _)| i)
            .collect()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.categories.iter().map(|c| c.name.as_str())
    }
}

/// Topics seen in IDE plugin reviews.
pub fn default_rules() -> RuleTable {
    RuleTable::new(vec![
        CategoryRule::new(
            "Bugs & Crashes",
            [
                r"\bcrash",
                r"\bbug",
                r"\bbroken\b",
                r"\berrors?\b",
                r"\bexceptions?\b",
                r"not work",
                r"doesn'?t work",
                r"\bfail",
            ],
        ),
        CategoryRule::new(
            "Performance",
            [
                r"\bslow",
                r"\blag",
                r"\bfreez",
                r"\bhang",
                r"unresponsive",
                r"\bcpu\b",
                r"\bmemory\b",
                r"\bsluggish",
            ],
        ),
        CategoryRule::new(
            "Authentication & Account",
            [
                r"\blog ?in\b",
                r"\bsign ?in\b",
                r"\bauth",
                r"\baccount\b",
                r"\bsubscription",
                r"\blicen[cs]e",
            ],
        ),
        CategoryRule::new(
            "Suggestion Quality",
            [
                r"\bsuggestions?\b",
                r"\bcompletions?\b",
                r"autocomplete",
                r"hallucinat",
                r"\bwrong code\b",
                r"\birrelevant\b",
            ],
        ),
        CategoryRule::new(
            "Chat & Agent",
            [r"\bchat", r"\bagent", r"\bconversation", r"\bprompts?\b"],
        ),
        CategoryRule::new(
            "Compatibility & Updates",
            [
                r"\bupdat",
                r"\bupgrad",
                r"\bcompatib",
                r"\bversion\b",
                r"\binstall",
            ],
        ),
        CategoryRule::new(
            "UI & Usability",
            [
                r"\bui\b",
                r"\binterface\b",
                r"\bbuttons?\b",
                r"\bshortcuts?\b",
                r"\bkeybind",
                r"\bsettings?\b",
            ],
        ),
        CategoryRule::new(
            "Pricing",
            [
                r"\bpric",
                r"\bpaid\b",
                r"\bpay\b",
                r"\bexpensive\b",
                r"\bcost",
                r"\brefund",
            ],
        ),
    ])
}
