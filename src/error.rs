use thiserror::Error;

/// Errors raised by the analytics engine itself. Everything past normalization is
/// infallible; these surface only from malformed input or bad configuration.
#[derive(Debug, Error)]
pub enum ReviewError {
    #[error("malformed review record #{index}: {reason}")]
    MalformedRecord { index: usize, reason: String },

    #[error("duplicate review id {id:?} at record #{index}")]
    DuplicateId { index: usize, id: String },

    #[error("invalid pattern {pattern:?} for category {category:?}: {source}")]
    InvalidPattern {
        category: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ReviewError {
    pub(crate) fn malformed(index: usize, reason: impl Into<String>) -> Self {
        ReviewError::MalformedRecord {
            index,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ReviewError>;
