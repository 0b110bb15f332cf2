//! Connection manager
//!
//! Drives the socket lifecycle `Disconnected -> Connecting -> Connected ->
//! Disconnected` and the fixed-interval reconnect loop. Retries are not
//! capped and do not back off.
//!
//! Every attempt gets a fresh [`ConnectionId`]. Events carrying any other id
//! belong to a superseded socket and are ignored.

#![warn(missing_docs)]

use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use crate::scheduler::{Scheduler, TimerEvent, TimerToken};

/// Delay between reconnect attempts
pub const RECONNECT_INTERVAL: Duration = Duration::from_secs(10);

/// Identifier for one connection attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Build an id from a sequence number
    pub fn new(seq: u64) -> Self {
        Self(seq)
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Socket lifecycle event reported by a transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Connection established
    Open,
    /// Text frame received
    Message(String),
    /// Connection failed or broke
    Error(String),
    /// Connection closed
    Close,
}

/// Message-oriented transport to the probe server
///
/// Implementations report lifecycle events for `id` back to the event loop.
pub trait Transport {
    /// Start connecting to `address`
    fn connect(&mut self, id: ConnectionId, address: &Url);

    /// Drop the connection `id`; no further events are expected for it
    fn disconnect(&mut self, id: ConnectionId);
}

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No socket; a reconnect timer may be armed
    Disconnected,
    /// An attempt is in flight
    Connecting,
    /// Socket open and receiving
    Connected,
}

/// Counters kept across the session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectionStats {
    /// Connection attempts issued
    pub attempts: u64,
    /// Attempts that opened successfully
    pub connects: u64,
    /// Transitions into Disconnected
    pub disconnects: u64,
}

/// Socket lifecycle and reconnect bookkeeping
#[derive(Debug)]
pub struct ConnectionManager {
    address: Url,
    retry_interval: Duration,
    state: ConnectionState,
    current: Option<ConnectionId>,
    next_seq: u64,
    retry_timer: Option<TimerToken>,
    stats: ConnectionStats,
}

impl ConnectionManager {
    /// Create a manager for `address`
    pub fn new(address: Url, retry_interval: Duration) -> Self {
        Self {
            address,
            retry_interval,
            state: ConnectionState::Disconnected,
            current: None,
            next_seq: 0,
            retry_timer: None,
            stats: ConnectionStats::default(),
        }
    }

    /// Server address
    pub fn address(&self) -> &Url {
        &self.address
    }

    /// Current state
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Live connection attempt, if any
    pub fn current(&self) -> Option<ConnectionId> {
        self.current
    }

    /// Whether `id` is the live connection attempt
    pub fn is_current(&self, id: ConnectionId) -> bool {
        self.current == Some(id)
    }

    /// Armed reconnect timer, if any
    pub fn retry_timer(&self) -> Option<TimerToken> {
        self.retry_timer
    }

    /// Lifetime counters
    pub fn stats(&self) -> ConnectionStats {
        self.stats
    }

    /// Issue a new connection attempt, superseding any attempt in flight
    pub fn connect<T: Transport>(&mut self, transport: &mut T) -> ConnectionId {
        if let Some(previous) = self.current.take() {
            debug!("Superseding connection {}", previous);
            transport.disconnect(previous);
        }

        self.next_seq += 1;
        let id = ConnectionId(self.next_seq);
        self.current = Some(id);
        self.state = ConnectionState::Connecting;
        self.stats.attempts += 1;

        info!("Connecting to {} ({})", self.address, id);
        transport.connect(id, &self.address);
        id
    }

    /// Handle a successful open
    ///
    /// Cancels the reconnect timer. Returns false for superseded sockets; the
    /// caller must only reset the session when this returns true.
    pub fn on_open<S: Scheduler>(&mut self, id: ConnectionId, scheduler: &mut S) -> bool {
        if !self.is_current(id) {
            debug!("Ignoring open from superseded connection {}", id);
            return false;
        }

        if let Some(token) = self.retry_timer.take() {
            scheduler.cancel(token);
        }
        self.state = ConnectionState::Connected;
        self.stats.connects += 1;
        info!("Connection to {} established ({})", self.address, id);
        true
    }

    /// Handle a close or error
    ///
    /// Arms the reconnect timer unless one is already armed. Returns false for
    /// superseded sockets.
    pub fn on_disconnect<S: Scheduler>(&mut self, id: ConnectionId, scheduler: &mut S) -> bool {
        if !self.is_current(id) {
            debug!("Ignoring close from superseded connection {}", id);
            return false;
        }

        self.current = None;
        self.state = ConnectionState::Disconnected;
        self.stats.disconnects += 1;

        if self.retry_timer.is_none() {
            info!(
                "Starting reconnect process, retrying every {:?}",
                self.retry_interval
            );
            self.retry_timer =
                Some(scheduler.schedule_every(self.retry_interval, TimerEvent::Reconnect));
        }
        true
    }

    /// Handle a reconnect timer tick
    ///
    /// Returns the new attempt, or `None` if the tick came from a timer that
    /// is no longer armed.
    pub fn on_retry_tick<T: Transport>(
        &mut self,
        token: TimerToken,
        transport: &mut T,
    ) -> Option<ConnectionId> {
        if self.retry_timer != Some(token) {
            debug!("Ignoring tick from cancelled reconnect timer");
            return None;
        }
        if self.state == ConnectionState::Connected {
            warn!("Reconnect timer fired while connected");
            return None;
        }

        info!("Attempting reconnect...");
        Some(self.connect(transport))
    }

    /// Cancel the reconnect timer and drop the live connection
    pub fn shutdown<S: Scheduler, T: Transport>(&mut self, scheduler: &mut S, transport: &mut T) {
        if let Some(token) = self.retry_timer.take() {
            scheduler.cancel(token);
        }
        if let Some(id) = self.current.take() {
            transport.disconnect(id);
        }
        self.state = ConnectionState::Disconnected;
    }
}
