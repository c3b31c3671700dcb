use axum::{ extract::State, Json };
use chrono::Utc;

use crate::error::Result;
use crate::scheduler::RunSummary;

use super::AppState;

/// Trigger for an external cron. Not behind user auth; expose on the
/// internal network only.
pub async fn run_scheduled_topups(State(state): State<AppState>) -> Result<Json<RunSummary>> {
    let summary = state.scheduler.run_due(Utc::now()).await?;
    tracing::info!(
        "Triggered run: processed {}, succeeded {}, failed {}, skipped {}",
        summary.processed,
        summary.succeeded,
        summary.failed,
        summary.skipped
    );

    Ok(Json(summary))
}
