//! Live event loop
//!
//! Wires a [`ClientSession`] to the WebSocket transport and wall-clock timers
//! and drives it from a single task until shutdown. Transport events and
//! fired timers are handled one at a time, in arrival order.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep, Instant};
use tracing::info;

use crate::config::ClientConfig;
use crate::display::DisplaySurface;
use crate::notify::Notifier;
use crate::scheduler::{Scheduler, TimerEvent, TimerToken};
use crate::session::ClientSession;
use crate::websocket::WsTransport;

/// Fired timers produced by [`TokioScheduler`]
pub type FiredTimers = mpsc::UnboundedReceiver<(TimerToken, TimerEvent)>;

/// Session wired to live collaborators
pub type LiveSession<D, N> = ClientSession<TokioScheduler, D, N, WsTransport>;

/// Scheduler backed by tokio timers
///
/// Each timer is a task that sleeps and then posts its event; cancelling
/// aborts the task.
pub struct TokioScheduler {
    next_seq: u64,
    tasks: HashMap<TimerToken, JoinHandle<()>>,
    fired_tx: mpsc::UnboundedSender<(TimerToken, TimerEvent)>,
}

impl TokioScheduler {
    /// Create a scheduler and the receiver fired timers arrive on
    pub fn new() -> (Self, FiredTimers) {
        let (fired_tx, fired_rx) = mpsc::unbounded_channel();
        (
            Self {
                next_seq: 0,
                tasks: HashMap::new(),
                fired_tx,
            },
            fired_rx,
        )
    }

    /// Number of timer tasks still tracked
    pub fn active(&self) -> usize {
        self.tasks.len()
    }

    fn next_token(&mut self) -> TimerToken {
        self.tasks.retain(|_, task| !task.is_finished());
        self.next_seq += 1;
        TimerToken::new(self.next_seq)
    }
}

impl Scheduler for TokioScheduler {
    fn schedule_once(&mut self, delay: Duration, event: TimerEvent) -> TimerToken {
        let token = self.next_token();
        let tx = self.fired_tx.clone();
        let task = tokio::spawn(async move {
            sleep(delay).await;
            let _ = tx.send((token, event));
        });
        self.tasks.insert(token, task);
        token
    }

    fn schedule_every(&mut self, period: Duration, event: TimerEvent) -> TimerToken {
        let token = self.next_token();
        let tx = self.fired_tx.clone();
        let task = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            loop {
                ticker.tick().await;
                if tx.send((token, event.clone())).is_err() {
                    break;
                }
            }
        });
        self.tasks.insert(token, task);
        token
    }

    fn cancel(&mut self, token: TimerToken) {
        if let Some(task) = self.tasks.remove(&token) {
            task.abort();
        }
    }
}

impl Drop for TokioScheduler {
    fn drop(&mut self) {
        for (_, task) in self.tasks.drain() {
            task.abort();
        }
    }
}

/// Run a session against the configured server until `shutdown` resolves
///
/// Returns the session so callers can inspect its final state.
pub async fn run<D, N, F>(
    config: ClientConfig,
    display: D,
    notifier: N,
    shutdown: F,
) -> LiveSession<D, N>
where
    D: DisplaySurface,
    N: Notifier,
    F: Future<Output = ()>,
{
    let (scheduler, mut timers) = TokioScheduler::new();
    let (transport, mut events) = WsTransport::new();
    let mut session = ClientSession::new(&config, scheduler, display, notifier, transport);

    info!("Probe server address: {}", config.server_address);
    session.start();

    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutdown requested");
                break;
            }
            Some((id, event)) = events.recv() => session.handle(id, event),
            Some((token, event)) = timers.recv() => session.on_timer(token, event),
            else => break,
        }
    }

    session.shutdown();
    session
}
