use serde::Deserialize;

/// A review record as it arrives from the fetcher or the labeler, before normalization.
/// Every field is optional here; `normalize` decides what is fatal and what is coerced.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawReview {
    #[serde(default)]
    pub id: Option<RawId>,
    #[serde(default)]
    pub date: Option<String>, // "YYYY-MM-DD"
    #[serde(default)]
    pub rating: Option<RawRating>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default, alias = "hasReplies")]
    pub has_replies: Option<bool>,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default, alias = "category")]
    pub categories: Option<RawLabels>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawId {
    Text(String),
    Number(i64),
}

impl RawId {
    pub fn into_string(self) -> String {
        match self {
            RawId::Text(s) => s,
            RawId::Number(n) => n.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawRating {
    Int(i64),
    Float(f64),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawLabels {
    One(String),
    Many(Vec<String>),
}

impl RawLabels {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            RawLabels::One(s) => vec![s],
            RawLabels::Many(v) => v,
        }
    }
}
