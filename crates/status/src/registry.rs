//! Target registry
//!
//! Authoritative local copy of every target the server announced in the
//! current connection epoch, keyed by host.

#![warn(missing_docs)]

use regex::Regex;
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, warn};

use crate::display::{DisplaySurface, ViewHandle, ViewUpdate};
use crate::types::{Status, StatusCode, StatusUpdate, Target};

/// Tag predicate applied to snapshot targets
#[derive(Debug, Clone, Default)]
pub struct TagFilter(Option<Regex>);

impl TagFilter {
    /// Filter that accepts every tag
    pub fn match_all() -> Self {
        Self(None)
    }

    /// Filter accepting tags that contain a match for `pattern`
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self(Some(Regex::new(pattern)?)))
    }

    /// Whether `tag` passes the filter
    pub fn matches(&self, tag: &str) -> bool {
        match &self.0 {
            Some(regex) => regex.is_match(tag),
            None => true,
        }
    }
}

impl fmt::Display for TagFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(regex) => write!(f, "/{}/", regex.as_str()),
            None => f.write_str("/.*/"),
        }
    }
}

/// Local state for one registered target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryEntry {
    /// Target as announced in the snapshot
    pub target: Target,
    /// Status from the most recent update, `None` before the first one
    pub last_status: Option<Status>,
    /// Status code from the most recent update
    pub last_status_code: Option<StatusCode>,
    /// Probe time of the most recent update
    pub last_updated: Option<String>,
    /// Set by the watchdog when updates stop arriving
    pub stale: bool,
    /// View created for this target
    pub view: ViewHandle,
}

/// Host-keyed registry for the current connection epoch
#[derive(Debug, Default)]
pub struct TargetRegistry {
    entries: Vec<RegistryEntry>,
    index: HashMap<String, usize>,
    initialized: bool,
}

impl TargetRegistry {
    /// Create an empty registry awaiting its snapshot
    pub fn new() -> Self {
        Self::default()
    }

    /// True until a snapshot has been applied in this epoch
    pub fn is_awaiting_snapshot(&self) -> bool {
        !self.initialized
    }

    /// Replace the registry with the targets passing `filter`
    ///
    /// Creates one view per registered target. Returns how many targets were
    /// registered.
    pub fn apply_snapshot<D: DisplaySurface>(
        &mut self,
        targets: Vec<Target>,
        filter: &TagFilter,
        display: &mut D,
    ) -> usize {
        self.clear();
        self.initialized = true;

        for target in targets {
            if !filter.matches(&target.tag) {
                debug!("Target {} filtered out by tag {:?}", target.host, target.tag);
                continue;
            }
            if self.index.contains_key(&target.host) {
                warn!("Duplicate host {} in snapshot, keeping first", target.host);
                continue;
            }

            let view = display.create_view(&target);
            self.index.insert(target.host.clone(), self.entries.len());
            self.entries.push(RegistryEntry {
                target,
                last_status: None,
                last_status_code: None,
                last_updated: None,
                stale: false,
                view,
            });
        }

        self.entries.len()
    }

    /// Apply a status update to its target
    ///
    /// Returns the updated entry together with its previous status, or `None`
    /// when the host is not registered.
    pub fn apply_update<D: DisplaySurface>(
        &mut self,
        update: &StatusUpdate,
        display: &mut D,
    ) -> Option<(&RegistryEntry, Option<Status>)> {
        let idx = *self.index.get(&update.target.host)?;
        let entry = &mut self.entries[idx];

        let previous = entry.last_status;
        entry.last_status = Some(update.status);
        entry.last_status_code = Some(update.status_code.clone());
        entry.last_updated = Some(update.time.clone());
        entry.stale = false;

        display.update_view(entry.view, &ViewUpdate::from_update(update));

        Some((&self.entries[idx], previous))
    }

    /// Mark `host` stale. Returns false when the host is not registered.
    pub fn mark_stale<D: DisplaySurface>(&mut self, host: &str, display: &mut D) -> bool {
        let Some(&idx) = self.index.get(host) else {
            return false;
        };
        let entry = &mut self.entries[idx];
        entry.stale = true;
        display.mark_stale(entry.view);
        true
    }

    /// Discard every entry and wait for a new snapshot
    pub fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
        self.initialized = false;
    }

    /// Entry for `host`
    pub fn get(&self, host: &str) -> Option<&RegistryEntry> {
        self.index.get(host).map(|&idx| &self.entries[idx])
    }

    /// Entries in snapshot order
    pub fn iter(&self) -> impl Iterator<Item = &RegistryEntry> {
        self.entries.iter()
    }

    /// Number of registered targets
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no target is registered
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
