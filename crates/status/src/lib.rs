//! Canarywatch Status - live status client core
//!
//! This crate mirrors a canary probe server's view of its monitored targets.
//! It handles:
//! - Decoding the snapshot/update feed the server pushes over WebSocket
//! - A host-keyed target registry rebuilt on every (re)connection
//! - A per-target staleness watchdog (two probe intervals plus a 30s margin)
//! - Status transition notifications through a pluggable notifier
//! - A fixed-interval reconnect state machine with at most one retry timer
//!
//! Rendering and platform notifications are collaborators behind the
//! [`DisplaySurface`] and [`Notifier`] traits. Timers go through the
//! [`Scheduler`] trait, so the whole session can be driven deterministically
//! with [`ManualScheduler`].
//!
//! # Examples
//!
//! ```no_run
//! use canarywatch_status::{
//!     ClientConfig, ClientSession, ManualScheduler, MemoryDisplay, NoopNotifier,
//!     TransportEvent, WsTransport,
//! };
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let page = url::Url::parse("http://dashboard.local/?filter=prod")?;
//! let config = ClientConfig::from_page_url(&page)?;
//! let (transport, _events) = WsTransport::new();
//! let mut session = ClientSession::new(
//!     &config,
//!     ManualScheduler::new(),
//!     MemoryDisplay::new(),
//!     NoopNotifier,
//!     transport,
//! );
//!
//! let id = session.start();
//! session.handle(id, TransportEvent::Open);
//! session.handle(id, TransportEvent::Message(r#"{"http":[]}"#.to_string()));
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod config;
pub mod connection;
pub mod display;
pub mod notify;
pub mod registry;
pub mod runtime;
pub mod scheduler;
pub mod session;
pub mod types;
pub mod watchdog;
pub mod websocket;

// Re-export commonly used types
pub use codec::{decode, CodecError, Decoded};
pub use config::{ClientConfig, ConfigError, ConfigLayer, DEFAULT_SERVER_PORT};
pub use connection::{
    ConnectionId, ConnectionManager, ConnectionState, ConnectionStats, Transport, TransportEvent,
    RECONNECT_INTERVAL,
};
pub use display::{DisplaySurface, MemoryDisplay, RenderedView, ViewHandle, ViewUpdate};
pub use notify::{Notification, NotificationDispatcher, Notifier, NoopNotifier, Permission};
pub use registry::{RegistryEntry, TagFilter, TargetRegistry};
pub use runtime::{run, LiveSession, TokioScheduler};
pub use scheduler::{ManualScheduler, Scheduler, TimerEvent, TimerToken};
pub use session::{ClientSession, SessionStats};
pub use types::{Snapshot, Status, StatusCode, StatusUpdate, Target};
pub use watchdog::{StalenessWatchdog, STALE_TIMEOUT_MARGIN};
pub use websocket::{TransportEvents, WsTransport};
