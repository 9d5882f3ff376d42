//! Telegram callback-query handler for inline alert buttons.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use jobscout_ingest::types::JobStatus;

use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct CallbackUpdate {
    callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    #[serde(default)]
    data: String,
}

/// Handle `applied_<id>` / `skip_<id>` button presses.
pub async fn telegram_callback(
    State(state): State<AppState>,
    Json(update): Json<CallbackUpdate>,
) -> (StatusCode, Json<serde_json::Value>) {
    let Some(query) = update.callback_query else {
        return (StatusCode::OK, Json(json!({ "ok": true, "ignored": true })));
    };

    let Some((action, id)) = parse_action(&query.data) else {
        warn!(data = %query.data, "unrecognized callback action");
        return (StatusCode::OK, Json(json!({ "ok": true, "ignored": true })));
    };

    let updated = match state.store.update_status(id, action).await {
        Ok(updated) => updated,
        Err(e) => {
            warn!(id, error = %e, "callback transition failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "ok": false })),
            );
        }
    };

    debug!(id, status = action.as_str(), updated, "callback handled");
    (
        StatusCode::OK,
        Json(json!({ "ok": true, "id": id, "status": action.as_str(), "updated": updated })),
    )
}

/// `applied_<id>` marks applied; `skip_<id>` dismisses.
fn parse_action(data: &str) -> Option<(JobStatus, i64)> {
    if let Some(id) = data.strip_prefix("applied_") {
        return Some((JobStatus::Applied, id.parse().ok()?));
    }
    if let Some(id) = data.strip_prefix("skip_") {
        return Some((JobStatus::Dismissed, id.parse().ok()?));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_action() {
        assert_eq!(parse_action("applied_42"), Some((JobStatus::Applied, 42)));
        assert_eq!(parse_action("skip_7"), Some((JobStatus::Dismissed, 7)));
        assert_eq!(parse_action("applied_x"), None);
        assert_eq!(parse_action("other_1"), None);
    }
}
