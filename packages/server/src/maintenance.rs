//! Maintenance tasks: archive/purge and dead-link expiry.

use anyhow::Result;
use chrono::Utc;
use std::time::Duration;
use tracing::{debug, info, warn};

use jobscout_ingest::stores::JobStore;
use jobscout_ingest::types::JobStatus;

/// Phrases in a posting page that mean the role is gone.
const EXPIRED_INDICATORS: &[&str] = &[
    "no longer accepting applications",
    "this position has been filled",
    "this job is no longer available",
    "job not found",
    "posting has expired",
    "this posting is closed",
];

/// How many recent active jobs one cleanup pass probes.
const CLEANUP_PROBE_LIMIT: i64 = 200;

/// Archive active jobs older than 30 days and purge raw rows older than
/// 90, in one transaction. Returns `(archived, purged)`.
pub async fn archive_old_jobs(store: &JobStore) -> Result<(u64, u64)> {
    let (archived, purged) = store.archive_and_purge(Utc::now()).await?;
    info!(archived, purged, "archive and purge complete");
    Ok((archived, purged))
}

/// Probe recent active jobs' URLs and mark dead ones expired.
///
/// HEAD first; 404/410 is decisive. Otherwise GET the body and look for
/// expired-posting phrases.
pub async fn cleanup_expired(store: &JobStore) -> Result<usize> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(15))
        .redirect(reqwest::redirect::Policy::limited(5))
        .build()?;

    let jobs = store.recent_active_jobs(Utc::now(), 30, CLEANUP_PROBE_LIMIT).await?;
    let mut expired = 0;

    for job in jobs {
        let gone = match probe_url(&client, &job.url).await {
            Some(gone) => gone,
            // Network trouble is not evidence the posting is gone
            None => continue,
        };
        if gone {
            if store.update_status(job.id, JobStatus::Expired).await? {
                debug!(id = job.id, url = %job.url, "marked expired");
                expired += 1;
            }
        }
    }

    info!(expired, "expiry cleanup complete");
    Ok(expired)
}

/// `Some(true)` = posting gone, `Some(false)` = alive, `None` =
/// inconclusive.
async fn probe_url(client: &reqwest::Client, url: &str) -> Option<bool> {
    let head = client.head(url).send().await;
    match head {
        Ok(response) => {
            let status = response.status().as_u16();
            if status == 404 || status == 410 {
                return Some(true);
            }
        }
        Err(e) => {
            warn!(url, error = %e, "HEAD probe failed");
            return None;
        }
    }

    match client.get(url).send().await {
        Ok(response) => {
            let status = response.status().as_u16();
            if status == 404 || status == 410 {
                return Some(true);
            }
            match response.text().await {
                Ok(body) => Some(body_indicates_expired(&body)),
                Err(_) => None,
            }
        }
        Err(e) => {
            warn!(url, error = %e, "GET probe failed");
            None
        }
    }
}

/// Whether a page body says the posting is gone.
pub fn body_indicates_expired(body: &str) -> bool {
    let lower = body.to_lowercase();
    EXPIRED_INDICATORS.iter().any(|phrase| lower.contains(phrase))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_indicators() {
        assert!(body_indicates_expired(
            "<p>Sorry, this job is NO LONGER accepting applications.</p>"
        ));
        assert!(body_indicates_expired("Job not found"));
        assert!(!body_indicates_expired("<h1>Software Engineer</h1><p>Apply below</p>"));
    }
}
