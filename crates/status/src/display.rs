//! Display surface contract
//!
//! The session never renders anything itself. It asks a [`DisplaySurface`] to
//! create one view per registered target and keeps the returned
//! [`ViewHandle`] in the registry entry, so later updates address the view
//! directly instead of looking it up by host.

#![warn(missing_docs)]

use chrono::{DateTime, Local, TimeZone};

use crate::types::{Status, StatusUpdate, Target};

/// Opaque reference to a rendered target view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ViewHandle(u64);

impl ViewHandle {
    /// Build a handle from a surface-local identifier
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Surface-local identifier
    pub fn id(self) -> u64 {
        self.0
    }
}

/// Everything a view shows after a status update
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewUpdate {
    /// New status
    pub status: Status,
    /// Status code as text
    pub status_code: String,
    /// Probe time formatted for the local timezone
    pub time: String,
    /// Link to the probed address
    pub link: String,
    /// `Last OK: ...` line; only present when the status is Okay, otherwise
    /// the view keeps whatever it showed before
    pub last_ok_text: Option<String>,
    /// Probe latency, when reported
    pub latency_ms: Option<u64>,
    /// Reason phrase, when reported
    pub status_reason: Option<String>,
}

impl ViewUpdate {
    /// Build the view update for a status update
    pub fn from_update(update: &StatusUpdate) -> Self {
        let time = format_time(&update.time);
        let last_ok_text = match update.status {
            Status::Okay => Some(format!("Last OK: {}", time)),
            _ => None,
        };

        Self {
            status: update.status,
            status_code: update.status_code.to_string(),
            time,
            link: update.target.host.clone(),
            last_ok_text,
            latency_ms: update.latency_ms,
            status_reason: update.status_reason.clone(),
        }
    }
}

/// Sink for rendered target views
pub trait DisplaySurface {
    /// Create a view for a newly registered target
    fn create_view(&mut self, target: &Target) -> ViewHandle;

    /// Show the latest status on a view; clears any stale marker
    fn update_view(&mut self, view: ViewHandle, update: &ViewUpdate);

    /// Show that a view's data has gone stale
    fn mark_stale(&mut self, view: ViewHandle);

    /// Remove every view
    fn clear_all(&mut self);
}

/// Format an ISO-8601 timestamp in the local timezone
///
/// Unparsable input is returned unchanged.
pub fn format_time(raw: &str) -> String {
    format_time_in(raw, &Local)
}

/// Format an ISO-8601 timestamp in `tz`
pub fn format_time_in<Tz>(raw: &str, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    match DateTime::parse_from_rfc3339(raw) {
        Ok(parsed) => parsed
            .with_timezone(tz)
            .format("%Y-%m-%d %H:%M:%S %Z")
            .to_string(),
        Err(_) => raw.to_string(),
    }
}

/// View state kept by [`MemoryDisplay`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedView {
    /// Handle returned by `create_view`
    pub handle: ViewHandle,
    /// Target name
    pub name: String,
    /// Target host
    pub host: String,
    /// Last status shown
    pub status: Option<Status>,
    /// Last status code shown
    pub status_code: Option<String>,
    /// Last formatted probe time shown
    pub time: Option<String>,
    /// Link target
    pub link: Option<String>,
    /// Most recent `Last OK` line
    pub last_ok_text: Option<String>,
    /// Whether the view is currently marked stale
    pub stale: bool,
    /// Number of updates applied to this view
    pub updates: usize,
}

/// Headless display surface that keeps rendered views in memory
#[derive(Debug, Default)]
pub struct MemoryDisplay {
    next_id: u64,
    views: Vec<RenderedView>,
    clears: usize,
}

impl MemoryDisplay {
    /// Create an empty surface
    pub fn new() -> Self {
        Self::default()
    }

    /// Views in creation order
    pub fn views(&self) -> &[RenderedView] {
        &self.views
    }

    /// View rendered for `host`
    pub fn view_for(&self, host: &str) -> Option<&RenderedView> {
        self.views.iter().find(|v| v.host == host)
    }

    /// Number of `clear_all` calls so far
    pub fn clear_count(&self) -> usize {
        self.clears
    }

    fn view_mut(&mut self, handle: ViewHandle) -> Option<&mut RenderedView> {
        self.views.iter_mut().find(|v| v.handle == handle)
    }
}

impl DisplaySurface for MemoryDisplay {
    fn create_view(&mut self, target: &Target) -> ViewHandle {
        self.next_id += 1;
        let handle = ViewHandle::new(self.next_id);
        self.views.push(RenderedView {
            handle,
            name: target.name.clone(),
            host: target.host.clone(),
            status: None,
            status_code: None,
            time: None,
            link: None,
            last_ok_text: None,
            stale: false,
            updates: 0,
        });
        handle
    }

    fn update_view(&mut self, view: ViewHandle, update: &ViewUpdate) {
        if let Some(rendered) = self.view_mut(view) {
            rendered.status = Some(update.status);
            rendered.status_code = Some(update.status_code.clone());
            rendered.time = Some(update.time.clone());
            rendered.link = Some(update.link.clone());
            if let Some(last_ok) = &update.last_ok_text {
                rendered.last_ok_text = Some(last_ok.clone());
            }
            rendered.stale = false;
            rendered.updates += 1;
        }
    }

    fn mark_stale(&mut self, view: ViewHandle) {
        if let Some(rendered) = self.view_mut(view) {
            rendered.stale = true;
        }
    }

    fn clear_all(&mut self) {
        self.views.clear();
        self.clears += 1;
    }
}
