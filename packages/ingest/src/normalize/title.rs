//! Title bucketing against the include/maybe/reject filter lists.

use crate::config::TitleFilters;
use crate::types::TitleBucket;

/// Classify a title. Reject substrings win regardless of order; then
/// include, then maybe; titles matching nothing are rejected.
pub fn bucket_title(title: &str, filters: &TitleFilters) -> TitleBucket {
    let title = title.to_lowercase();

    if filters.reject.iter().any(|p| title.contains(p.as_str())) {
        return TitleBucket::Reject;
    }
    if filters.include.iter().any(|p| title.contains(p.as_str())) {
        return TitleBucket::Include;
    }
    if filters.maybe.iter().any(|p| title.contains(p.as_str())) {
        return TitleBucket::Maybe;
    }
    TitleBucket::Reject
}
