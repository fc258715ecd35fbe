/// Tools for running and inspecting syncs
///
/// This module holds the parameters of sync_run, sync_cancel and sync_status
/// and renders the status report. Running the sync itself is left to the
/// server, which streams its progress.

use schemars::JsonSchema;
use serde::Deserialize;

use crate::sync::SyncStatus;

/// sync_run takes no arguments
#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct SyncRunParams {}

/// sync_cancel takes no arguments
#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct SyncCancelParams {}

/// sync_status takes no arguments
#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct SyncStatusParams {}

/// Human-readable sync status
pub fn format_sync_status(status: &SyncStatus) -> String {
    let user = match &status.user {
        Some(user) => format!("Signed in as {}", user),
        None => "No user signed in; health data will not be sent".to_string(),
    };

    let metrics: Vec<String> = status
        .watermarks
        .iter()
        .map(|(metric, day)| match day {
            Some(day) => format!("- {}: uploaded through {}", metric.display_name(), day),
            None => format!("- {}: nothing uploaded yet", metric.display_name()),
        })
        .collect();

    format!(
        "{}\nQuestionnaires waiting for upload: {}\nHealth data:\n{}",
        user,
        status.pending_questionnaires,
        metrics.join("\n")
    )
}
