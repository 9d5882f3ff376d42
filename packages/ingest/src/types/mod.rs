//! Domain types for the ingestion engine.

pub mod analysis;
pub mod board;
pub mod canonical;
pub mod metrics;
pub mod raw;
pub mod run;

pub use analysis::{FitAnalysis, FitVerdict};
pub use board::DiscoveredBoard;
pub use canonical::{
    fuzzy_key, CanonicalJob, JobStatus, NewCanonicalJob, PostedAtConfidence, ScoreBand, Scores,
    TitleBucket, WorkMode,
};
pub use metrics::SourceMetric;
pub use raw::RawJob;
pub use run::{RunLog, RunStatus, RunType};
