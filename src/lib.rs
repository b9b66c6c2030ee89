//! Review analytics: normalize raw store reviews, pick a time granularity, bucket
//! ratings, group reviews by topic and compute smoothed rating trends, then hand a
//! single summary object to a renderer.

pub mod aggregate;
pub mod api_types;
pub mod backend;
pub mod classify;
pub mod config;
pub mod error;
pub mod excerpt;
pub mod labeler;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod prompts;
pub mod render;
pub mod report;
pub mod rules;
pub mod scope;
pub mod trend;
