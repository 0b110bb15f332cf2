//! Client session
//!
//! `ClientSession` owns the registry, connection state, watchdog timers and
//! the notification dispatcher for one logical session. Reconnects mutate it
//! in place. Every method runs to completion inside a single event-loop turn,
//! so nothing here needs locking.

#![warn(missing_docs)]

use std::time::Duration;
use tracing::{debug, info, warn};

use crate::codec::{self, Decoded};
use crate::config::ClientConfig;
use crate::connection::{ConnectionId, ConnectionManager, Transport, TransportEvent};
use crate::display::DisplaySurface;
use crate::notify::{NotificationDispatcher, Notifier};
use crate::registry::{TagFilter, TargetRegistry};
use crate::scheduler::{ManualScheduler, Scheduler, TimerEvent, TimerToken};
use crate::types::{StatusUpdate, Target};
use crate::watchdog::StalenessWatchdog;

/// Message counters for the session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Text frames received on the live connection
    pub messages: u64,
    /// Frames dropped because they failed to decode or arrived out of order
    pub dropped: u64,
    /// Updates for hosts that are not registered
    pub ignored_updates: u64,
}

/// One logical client session
pub struct ClientSession<S, D, N, T> {
    scheduler: S,
    display: D,
    transport: T,
    connection: ConnectionManager,
    registry: TargetRegistry,
    watchdog: StalenessWatchdog,
    notifications: NotificationDispatcher<N>,
    filter: TagFilter,
    request_notifications: bool,
    stats: SessionStats,
}

impl<S, D, N, T> ClientSession<S, D, N, T>
where
    S: Scheduler,
    D: DisplaySurface,
    N: Notifier,
    T: Transport,
{
    /// Build a session from its configuration and collaborators
    pub fn new(config: &ClientConfig, scheduler: S, display: D, notifier: N, transport: T) -> Self {
        Self {
            scheduler,
            display,
            transport,
            connection: ConnectionManager::new(
                config.server_address.clone(),
                config.reconnect_interval,
            ),
            registry: TargetRegistry::new(),
            watchdog: StalenessWatchdog::new(config.stale_margin),
            notifications: NotificationDispatcher::new(notifier),
            filter: config.filter.clone(),
            request_notifications: config.notifications,
            stats: SessionStats::default(),
        }
    }

    /// Request notification permission if enabled and issue the first
    /// connection attempt
    pub fn start(&mut self) -> ConnectionId {
        if self.request_notifications {
            self.notifications.request_permission();
        }
        info!("Using tag filter: {}", self.filter);
        self.connection.connect(&mut self.transport)
    }

    /// Route a transport event
    pub fn handle(&mut self, id: ConnectionId, event: TransportEvent) {
        match event {
            TransportEvent::Open => self.on_open(id),
            TransportEvent::Message(payload) => self.on_message(id, &payload),
            TransportEvent::Error(error) => self.on_error(id, &error),
            TransportEvent::Close => self.on_close(id),
        }
    }

    /// Socket opened: start a fresh connection epoch
    pub fn on_open(&mut self, id: ConnectionId) {
        if !self.connection.on_open(id, &mut self.scheduler) {
            return;
        }
        self.watchdog.disarm_all(&mut self.scheduler);
        self.registry.clear();
        self.display.clear_all();
    }

    /// Text frame received
    pub fn on_message(&mut self, id: ConnectionId, payload: &str) {
        if !self.connection.is_current(id) {
            debug!("Ignoring message from superseded connection {}", id);
            return;
        }
        self.stats.messages += 1;
        debug!("Message received on {}: {} bytes", id, payload.len());

        let decoded = match codec::decode(payload) {
            Ok(decoded) => decoded,
            Err(e) => {
                warn!("Invalid message: {}", e);
                self.stats.dropped += 1;
                return;
            }
        };

        match (self.registry.is_awaiting_snapshot(), decoded) {
            (true, Decoded::Snapshot(targets)) => self.apply_snapshot(targets),
            (false, Decoded::Update(update)) => self.apply_update(&update),
            (awaiting, decoded) => {
                warn!(
                    "Dropping unexpected {} (awaiting snapshot: {})",
                    decoded.kind(),
                    awaiting
                );
                self.stats.dropped += 1;
            }
        }
    }

    /// Socket error; treated like a close
    pub fn on_error(&mut self, id: ConnectionId, error: &str) {
        if self.connection.is_current(id) {
            warn!("Connection error on {}: {}", id, error);
        }
        self.connection.on_disconnect(id, &mut self.scheduler);
    }

    /// Socket closed
    pub fn on_close(&mut self, id: ConnectionId) {
        if self.connection.on_disconnect(id, &mut self.scheduler) {
            info!("Connection closed ({})", id);
        }
    }

    /// A scheduled timer fired
    pub fn on_timer(&mut self, token: TimerToken, event: TimerEvent) {
        match event {
            TimerEvent::Reconnect => {
                self.connection.on_retry_tick(token, &mut self.transport);
            }
            TimerEvent::Stale { host } => {
                if self.watchdog.expire(&mut self.scheduler, token, &host)
                    && self.registry.mark_stale(&host, &mut self.display)
                {
                    info!("Target {} is stale", host);
                }
            }
        }
    }

    /// Cancel every timer and drop the connection
    pub fn shutdown(&mut self) {
        self.watchdog.disarm_all(&mut self.scheduler);
        self.connection
            .shutdown(&mut self.scheduler, &mut self.transport);
    }

    fn apply_snapshot(&mut self, targets: Vec<Target>) {
        let announced = targets.len();
        let registered = self
            .registry
            .apply_snapshot(targets, &self.filter, &mut self.display);
        info!(
            "Snapshot received: {} targets, {} registered",
            announced, registered
        );
    }

    fn apply_update(&mut self, update: &StatusUpdate) {
        let Some((entry, previous)) = self.registry.apply_update(update, &mut self.display) else {
            debug!("Ignoring update for unregistered host {}", update.target.host);
            self.stats.ignored_updates += 1;
            return;
        };

        self.watchdog
            .arm(&mut self.scheduler, &entry.target.host, entry.target.interval_s);
        self.notifications.dispatch(entry, previous);
    }

    /// Target registry for the current epoch
    pub fn registry(&self) -> &TargetRegistry {
        &self.registry
    }

    /// Connection state and counters
    pub fn connection(&self) -> &ConnectionManager {
        &self.connection
    }

    /// Staleness timers
    pub fn watchdog(&self) -> &StalenessWatchdog {
        &self.watchdog
    }

    /// Notification dispatcher
    pub fn notifications(&self) -> &NotificationDispatcher<N> {
        &self.notifications
    }

    /// Display surface
    pub fn display(&self) -> &D {
        &self.display
    }

    /// Transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Scheduler
    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    /// Message counters
    pub fn stats(&self) -> SessionStats {
        self.stats
    }
}

impl<D, N, T> ClientSession<ManualScheduler, D, N, T>
where
    D: DisplaySurface,
    N: Notifier,
    T: Transport,
{
    /// Advance the virtual clock by `by`, handling every timer that comes due
    pub fn advance(&mut self, by: Duration) {
        let until = self.scheduler.now() + by;
        while let Some((token, event)) = self.scheduler.next_due(until) {
            self.on_timer(token, event);
        }
        self.scheduler.set_now(until);
    }
}
