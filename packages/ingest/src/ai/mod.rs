//! LLM resume-fit analysis: key pool, streamed calls, response parsing.

pub mod analyzer;
pub mod key_pool;
pub mod parse;
pub mod resume;

pub use analyzer::{clean_description, AnalysisOutcome, AnalyzerConfig, FitAnalyzer};
pub use key_pool::{KeyLease, KeyPool};
pub use parse::{parse_fit_response, ParsedFit};
