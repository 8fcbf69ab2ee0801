//! Implementation of the `pt replay` command.
//!
//! Reads activity events as JSONL, sorts them by timestamp, and reprocesses
//! them deterministically using event time as the clock: policy deadlines
//! that elapse between events fire exactly at their deadline, with no
//! wall-clock involved. Closed periods are written as JSONL to stdout.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write, stdout};
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

use pt_core::{ActivityEvent, ClosedPeriod, Tracker, TrackerConfig, UserId};

use super::util::{parse_event_line, parse_seed_users};
use crate::Config;

/// Run the replay command.
pub fn run(
    file: Option<&Path>,
    seed: &[String],
    seed_at: Option<DateTime<Utc>>,
    config: &Config,
) -> Result<()> {
    let seed = parse_seed_users(seed)?;
    let events = read_events(file)?;
    let closed = replay_events(&events, &seed, seed_at, config.tracker_config());

    let stdout = stdout();
    let mut writer = BufWriter::new(stdout.lock());
    for period in &closed {
        serde_json::to_writer(&mut writer, period).context("failed to serialize closed period")?;
        // Handle broken pipe gracefully (e.g., when piped to `head`)
        if writeln!(writer).is_err() {
            break;
        }
    }

    Ok(())
}

/// Loads events from the file (or stdin), dropping unroutable lines and
/// sorting by timestamp.
fn read_events(file: Option<&Path>) -> Result<Vec<ActivityEvent>> {
    let reader: Box<dyn BufRead> = match file {
        Some(path) => Box::new(BufReader::new(
            File::open(path).with_context(|| format!("failed to open {}", path.display()))?,
        )),
        None => Box::new(std::io::stdin().lock()),
    };

    let mut events = Vec::new();
    for line in reader.lines() {
        let line = line.context("failed to read input line")?;
        if let Some(event) = parse_event_line(&line) {
            events.push(event);
        }
    }

    events.sort_by_key(|e| e.occurred_at);
    Ok(events)
}

/// Replays timestamp-sorted events through a fresh tracker.
///
/// `seed_at` defaults to the first event's timestamp. After the last event,
/// remaining online periods are allowed to lapse past their deadlines, so
/// the output ends on offline periods only (which stay open and are not
/// reported).
pub fn replay_events(
    events: &[ActivityEvent],
    seed: &[UserId],
    seed_at: Option<DateTime<Utc>>,
    config: TrackerConfig,
) -> Vec<ClosedPeriod> {
    let mut tracker = Tracker::new(config);
    let mut out = Vec::new();

    let Some(first) = events.first() else {
        return out;
    };
    let seed_at = seed_at.unwrap_or(first.occurred_at);
    for user in seed {
        tracker.seed_inactive(user.clone(), seed_at);
    }

    let mut cursor = seed_at.min(first.occurred_at);
    for event in events {
        let at = event.occurred_at;
        fire_deadlines_before(&mut tracker, &mut cursor, at, &mut out);
        out.extend(tracker.submit(event.clone(), at));
        cursor = at;
    }

    // Let remaining online periods lapse. The empty-close guard bounds the
    // loop for policies that never fire.
    while let Some(wakeup) = tracker.next_wakeup(cursor) {
        let closed = tracker.tick(wakeup);
        cursor = wakeup;
        if closed.is_empty() {
            break;
        }
        out.extend(closed);
    }

    out
}

/// Fires policy deadlines that elapse strictly before `until`.
///
/// An event at exactly its period's deadline refreshes the period rather
/// than splitting it with a zero-length offline span.
fn fire_deadlines_before(
    tracker: &mut Tracker,
    cursor: &mut DateTime<Utc>,
    until: DateTime<Utc>,
    out: &mut Vec<ClosedPeriod>,
) {
    while let Some(wakeup) = tracker.next_wakeup(*cursor) {
        if wakeup >= until {
            break;
        }
        out.extend(tracker.tick(wakeup));
        *cursor = wakeup;
    }
}
