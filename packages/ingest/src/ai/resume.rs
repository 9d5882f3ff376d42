//! Process-wide resume cache.
//!
//! The resume is read from disk once and reused by every analysis in the
//! process. Tests can inject or clear the cached value.

use std::path::Path;
use std::sync::Mutex;

use crate::error::{IngestError, Result};

static RESUME: Mutex<Option<String>> = Mutex::new(None);

/// Load the resume text, reading the file only on first call.
pub fn load(path: impl AsRef<Path>) -> Result<String> {
    let mut cached = RESUME.lock().expect("resume cache lock");
    if let Some(text) = cached.as_ref() {
        return Ok(text.clone());
    }

    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .map_err(|e| IngestError::Config(format!("resume file {}: {e}", path.display())))?;
    *cached = Some(text.clone());
    Ok(text)
}

/// Inject a resume for tests.
pub fn set_for_tests(text: impl Into<String>) {
    *RESUME.lock().expect("resume cache lock") = Some(text.into());
}

/// Clear the cache so the next `load` re-reads the file.
pub fn reset_for_tests() {
    *RESUME.lock().expect("resume cache lock") = None;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_round_trip() {
        reset_for_tests();
        set_for_tests("my resume");
        // A bogus path is fine once the cache is warm
        assert_eq!(load("/nonexistent/resume.md").unwrap(), "my resume");

        reset_for_tests();
        assert!(load("/nonexistent/resume.md").is_err());
    }
}
