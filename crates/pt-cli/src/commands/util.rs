//! Shared utilities for CLI commands.

use anyhow::{Context, Result};

use pt_core::{ActivityEvent, UserId};

/// Parses one JSONL line into an activity event.
///
/// Returns `None` for blank lines and for unroutable lines (malformed
/// JSON, unknown event kind, empty user ID), which are logged and dropped
/// so one bad event never blocks tracking for other users.
pub fn parse_event_line(line: &str) -> Option<ActivityEvent> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match serde_json::from_str(line) {
        Ok(event) => Some(event),
        Err(e) => {
            tracing::warn!(error = %e, "dropping unroutable event line");
            None
        }
    }
}

/// Validates `--seed` user IDs.
///
/// A bad seed list is a startup error, not a per-event fault.
pub fn parse_seed_users(seed: &[String]) -> Result<Vec<UserId>> {
    seed.iter()
        .map(|id| UserId::new(id.clone()).with_context(|| format!("invalid seed user ID {id:?}")))
        .collect()
}
