//! Implementation of the `pt run` command.
//!
//! Live mode: JSONL activity events on stdin are submitted to a spawned
//! engine with wall-clock time, and closed periods stream to stdout as
//! they happen. EOF or Ctrl-C shuts the engine down.

use std::io::{BufRead, Write};

use anyhow::{Context, Result};
use chrono::Utc;
use tokio::sync::mpsc;

use pt_core::ClosedPeriod;
use pt_engine::{ChannelNotifier, EngineHandle};

use super::util::{parse_event_line, parse_seed_users};
use crate::Config;

/// Run the live tracking command.
pub fn run(seed: &[String], config: &Config) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new().context("failed to start tokio runtime")?;
    runtime.block_on(track_live(seed, config))
}

async fn track_live(seed: &[String], config: &Config) -> Result<()> {
    let seed = parse_seed_users(seed)?;

    let (notifier, mut closed_rx) = ChannelNotifier::channel();
    let engine = pt_engine::spawn(config.tracker_config(), notifier);

    let started_at = Utc::now();
    for user in seed {
        engine
            .seed_inactive(user, started_at)
            .context("engine stopped during seeding")?;
    }

    // Stdin is read on a plain thread; the line channel closing marks EOF.
    let mut line_rx = spawn_stdin_reader();

    let stdout = std::io::stdout();
    loop {
        tokio::select! {
            line = line_rx.recv() => match line {
                Some(line) => submit_line(&engine, &line)?,
                None => break,
            },
            closed = closed_rx.recv() => match closed {
                Some(period) => {
                    if write_closed(&mut stdout.lock(), &period).is_err() {
                        break;
                    }
                }
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted; shutting down");
                break;
            }
        }
    }

    engine.shutdown().await;

    // Forward anything that closed while we were stopping.
    while let Ok(period) = closed_rx.try_recv() {
        if write_closed(&mut stdout.lock(), &period).is_err() {
            break;
        }
    }

    Ok(())
}

fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

fn submit_line(engine: &EngineHandle, line: &str) -> Result<()> {
    if let Some(event) = parse_event_line(line) {
        engine
            .submit(event.user, event.kind, event.occurred_at)
            .context("engine stopped")?;
    }
    Ok(())
}

fn write_closed<W: Write>(writer: &mut W, period: &ClosedPeriod) -> std::io::Result<()> {
    let line = serde_json::to_string(period).map_err(std::io::Error::other)?;
    writeln!(writer, "{line}")
}
