//! Status transition notifications
//!
//! A notification is raised when a target that already had a status moves to
//! a different one. The first status a target reports is never announced.

#![warn(missing_docs)]

use tracing::{debug, info};

use crate::registry::RegistryEntry;
use crate::types::{Status, StatusCode};

/// Notification capability state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    /// Permission was never requested
    NotRequested,
    /// The platform allows notifications
    Granted,
    /// The platform refused, or cannot show notifications
    Denied,
}

/// A status transition alert
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Target name
    pub title: String,
    /// New status
    pub status: Status,
    /// New status code
    pub status_code: StatusCode,
    /// Status before the transition
    pub previous: Status,
}

impl Notification {
    /// Two-line alert body, e.g. `🔥 Fire: 500` / `was Okay`
    pub fn body(&self) -> String {
        format!(
            "{} {}: {}\nwas {}",
            self.status.icon(),
            self.status,
            self.status_code,
            self.previous
        )
    }
}

/// Platform notification capability
pub trait Notifier {
    /// Ask the platform for permission to show notifications
    fn request_permission(&mut self) -> Permission;

    /// Show a notification; only called once permission is granted
    fn show(&mut self, notification: &Notification);
}

/// Notifier for platforms without notification support
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn request_permission(&mut self) -> Permission {
        Permission::Denied
    }

    fn show(&mut self, _notification: &Notification) {}
}

/// Detect a status transition on an updated entry
pub fn transition(entry: &RegistryEntry, previous: Option<Status>) -> Option<Notification> {
    let previous = previous?;
    let current = entry.last_status?;
    if previous == current {
        return None;
    }

    Some(Notification {
        title: entry.target.name.clone(),
        status: current,
        status_code: entry
            .last_status_code
            .clone()
            .unwrap_or(StatusCode::Text(String::new())),
        previous,
    })
}

/// Raises transition notifications through a [`Notifier`]
#[derive(Debug)]
pub struct NotificationDispatcher<N> {
    notifier: N,
    permission: Permission,
    raised: u64,
}

impl<N: Notifier> NotificationDispatcher<N> {
    /// Create a dispatcher; nothing is shown until permission is granted
    pub fn new(notifier: N) -> Self {
        Self {
            notifier,
            permission: Permission::NotRequested,
            raised: 0,
        }
    }

    /// Request the platform capability
    pub fn request_permission(&mut self) -> Permission {
        self.permission = self.notifier.request_permission();
        info!("Notification permission: {:?}", self.permission);
        self.permission
    }

    /// Current capability state
    pub fn permission(&self) -> Permission {
        self.permission
    }

    /// Notifications shown so far
    pub fn raised(&self) -> u64 {
        self.raised
    }

    /// Underlying notifier
    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    /// Raise a notification if the update changed the entry's status
    ///
    /// Returns true when a notification was shown.
    pub fn dispatch(&mut self, entry: &RegistryEntry, previous: Option<Status>) -> bool {
        let Some(notification) = transition(entry, previous) else {
            return false;
        };

        if self.permission != Permission::Granted {
            debug!(
                "Skipping notification for {} ({} -> {}): permission {:?}",
                entry.target.host, notification.previous, notification.status, self.permission
            );
            return false;
        }

        self.notifier.show(&notification);
        self.raised += 1;
        true
    }
}
