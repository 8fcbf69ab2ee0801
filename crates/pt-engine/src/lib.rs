//! Tokio service wrapping the core tracker.
//!
//! One spawned task owns the [`Tracker`] and is the single serialization
//! point for both mutation sources: inbound events from [`EngineHandle`]
//! and the timer wakeups that evaluate close policies. No state is shared
//! across tasks, so a timer-driven close can never race a concurrently
//! arriving event.
//!
//! The task sleeps until the tracker's next wakeup (the earliest policy
//! deadline, or one cadence out as a fallback) and not at all while no
//! online period is open. Dropping the task on shutdown cancels every
//! outstanding check, since the task owns all scheduling.

use std::time::Duration as StdDuration;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

use pt_core::{ActivityEvent, ClosedPeriod, EventKind, Tracker, TrackerConfig, UserId};

/// Consumes closed-period notifications.
///
/// Delivery is fire-and-forget: implementations must not block, and a
/// failed delivery is logged and never retried. The closed state of the
/// period is already committed when `notify` runs and is never rolled
/// back.
pub trait Notifier: Send + 'static {
    fn notify(&mut self, closed: &ClosedPeriod);
}

impl<F> Notifier for F
where
    F: FnMut(&ClosedPeriod) + Send + 'static,
{
    fn notify(&mut self, closed: &ClosedPeriod) {
        self(closed);
    }
}

/// Notifier that forwards snapshots over an unbounded channel.
///
/// A dropped receiver is a delivery fault, not an engine fault: the send
/// failure is logged and processing continues.
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<ClosedPeriod>,
}

impl ChannelNotifier {
    /// Creates a notifier and the receiving half for the collaborator.
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ClosedPeriod>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&mut self, closed: &ClosedPeriod) {
        if self.tx.send(closed.clone()).is_err() {
            tracing::warn!(
                user = %closed.user,
                presence = %closed.presence,
                "notification receiver dropped; period remains closed"
            );
        }
    }
}

/// Errors surfaced by [`EngineHandle`].
#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine task has stopped and no longer accepts commands.
    #[error("engine is stopped")]
    Stopped,
}

enum Command {
    Submit(ActivityEvent),
    SeedInactive(UserId, DateTime<Utc>),
    Shutdown(oneshot::Sender<()>),
}

/// Handle for submitting events to a running engine.
///
/// Cheap to clone; all clones feed the same engine task.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::UnboundedSender<Command>,
}

impl EngineHandle {
    /// Queues an activity event for processing.
    pub fn submit(
        &self,
        user: UserId,
        kind: EventKind,
        occurred_at: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        self.tx
            .send(Command::Submit(ActivityEvent::new(user, kind, occurred_at)))
            .map_err(|_| EngineError::Stopped)
    }

    /// Seeds a user into an open offline period as of `at`.
    pub fn seed_inactive(&self, user: UserId, at: DateTime<Utc>) -> Result<(), EngineError> {
        self.tx
            .send(Command::SeedInactive(user, at))
            .map_err(|_| EngineError::Stopped)
    }

    /// Stops the engine, cancelling every outstanding inactivity check.
    ///
    /// Resolves once the engine task has acknowledged the shutdown; an
    /// already-stopped engine resolves immediately.
    pub async fn shutdown(self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.tx.send(Command::Shutdown(ack_tx)).is_ok() {
            let _ = ack_rx.await;
        }
    }
}

/// Spawns the engine task with the canonical policy from `config`.
///
/// Must be called from within a tokio runtime.
pub fn spawn<N: Notifier>(config: TrackerConfig, notifier: N) -> EngineHandle {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(run(Tracker::new(config), rx, notifier));
    EngineHandle { tx }
}

async fn run<N: Notifier>(
    mut tracker: Tracker,
    mut rx: mpsc::UnboundedReceiver<Command>,
    mut notifier: N,
) {
    loop {
        let now = Utc::now();
        // None while no online period is open: sleep on the mailbox alone.
        let wakeup = tracker
            .next_wakeup(now)
            .map(|at| (at - now).to_std().unwrap_or(StdDuration::ZERO));

        tokio::select! {
            cmd = rx.recv() => match cmd {
                Some(Command::Submit(event)) => {
                    let closed = tracker.submit(event, Utc::now());
                    deliver(&mut notifier, &closed);
                }
                Some(Command::SeedInactive(user, at)) => {
                    tracker.seed_inactive(user, at);
                }
                Some(Command::Shutdown(ack)) => {
                    // Close the mailbox before acknowledging so a submit
                    // racing the shutdown fails rather than vanishing.
                    rx.close();
                    let _ = ack.send(());
                    break;
                }
                None => break,
            },
            () = tokio::time::sleep(wakeup.unwrap_or(StdDuration::ZERO)), if wakeup.is_some() => {
                let closed = tracker.tick(Utc::now());
                deliver(&mut notifier, &closed);
            }
        }
    }
    tracing::debug!("engine stopped");
}

fn deliver<N: Notifier>(notifier: &mut N, closed: &[ClosedPeriod]) {
    for period in closed {
        notifier.notify(period);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use pt_core::Presence;

    const RECV_TIMEOUT: StdDuration = StdDuration::from_secs(5);

    fn user(id: &str) -> UserId {
        UserId::new(id).unwrap()
    }

    async fn recv(
        rx: &mut mpsc::UnboundedReceiver<ClosedPeriod>,
    ) -> ClosedPeriod {
        tokio::time::timeout(RECV_TIMEOUT, rx.recv())
            .await
            .expect("timed out waiting for a closed period")
            .expect("notification channel closed")
    }

    #[tokio::test]
    async fn force_close_flows_through_the_engine() {
        let (notifier, mut rx) = ChannelNotifier::channel();
        let engine = spawn(
            TrackerConfig {
                inactivity_threshold: Duration::minutes(15),
                check_cadence: Duration::milliseconds(20),
            },
            notifier,
        );

        let t0 = Utc::now();
        engine.seed_inactive(user("alice"), t0).unwrap();
        engine
            .submit(user("alice"), EventKind::MessageSent, Utc::now())
            .unwrap();

        let offline = recv(&mut rx).await;
        assert_eq!(offline.presence, Presence::Offline);
        assert_eq!(offline.started_at, t0);

        engine
            .submit(user("alice"), EventKind::VoiceLeft, Utc::now())
            .unwrap();
        let online = recv(&mut rx).await;
        assert_eq!(online.presence, Presence::Online);
        assert!(online.ended_at >= online.started_at);

        engine.shutdown().await;
    }

    #[tokio::test]
    async fn inactivity_timeout_closes_within_bounded_latency() {
        let (notifier, mut rx) = ChannelNotifier::channel();
        let engine = spawn(
            TrackerConfig {
                inactivity_threshold: Duration::milliseconds(50),
                check_cadence: Duration::milliseconds(10),
            },
            notifier,
        );

        engine
            .submit(user("alice"), EventKind::MessageSent, Utc::now())
            .unwrap();

        // No further activity: the online period must close on its own.
        let closed = recv(&mut rx).await;
        assert_eq!(closed.presence, Presence::Online);
        assert!(closed.duration_ms >= 40, "closed too early: {closed:?}");

        engine.shutdown().await;
    }

    #[tokio::test]
    async fn submit_after_shutdown_errors() {
        let (notifier, _rx) = ChannelNotifier::channel();
        let engine = spawn(TrackerConfig::default(), notifier);

        engine.clone().shutdown().await;
        let result = engine.submit(user("alice"), EventKind::MessageSent, Utc::now());
        assert!(matches!(result, Err(EngineError::Stopped)));
    }

    #[tokio::test]
    async fn dropped_receiver_does_not_stop_the_engine() {
        let (notifier, rx) = ChannelNotifier::channel();
        let engine = spawn(
            TrackerConfig {
                inactivity_threshold: Duration::minutes(15),
                check_cadence: Duration::milliseconds(20),
            },
            notifier,
        );
        drop(rx);

        engine.seed_inactive(user("alice"), Utc::now()).unwrap();
        engine
            .submit(user("alice"), EventKind::MessageSent, Utc::now())
            .unwrap();

        // The delivery fault above must not take the engine down.
        engine
            .submit(user("alice"), EventKind::VoiceLeft, Utc::now())
            .unwrap();
        engine.shutdown().await;
    }

    #[tokio::test]
    async fn closures_arrive_in_order_for_a_user() {
        let (notifier, mut rx) = ChannelNotifier::channel();
        let engine = spawn(
            TrackerConfig {
                inactivity_threshold: Duration::minutes(15),
                check_cadence: Duration::milliseconds(20),
            },
            notifier,
        );

        engine.seed_inactive(user("alice"), Utc::now()).unwrap();
        engine
            .submit(user("alice"), EventKind::MessageSent, Utc::now())
            .unwrap();
        engine
            .submit(user("alice"), EventKind::VoiceLeft, Utc::now())
            .unwrap();

        assert_eq!(recv(&mut rx).await.presence, Presence::Offline);
        assert_eq!(recv(&mut rx).await.presence, Presence::Online);

        engine.shutdown().await;
    }
}
