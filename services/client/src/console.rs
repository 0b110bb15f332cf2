//! Line-oriented terminal rendering for target views and notifications

use canarywatch_status::{DisplaySurface, Notification, Notifier, Permission, Target, ViewHandle, ViewUpdate};
use std::collections::HashMap;
use std::io::{IsTerminal, Write};
use tracing::warn;

/// Writes one line per view change
pub struct ConsoleDisplay<W: Write> {
    out: W,
    next_id: u64,
    names: HashMap<ViewHandle, String>,
}

impl<W: Write> ConsoleDisplay<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            next_id: 0,
            names: HashMap::new(),
        }
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out
    }

    fn name(&self, view: ViewHandle) -> &str {
        self.names.get(&view).map(String::as_str).unwrap_or("?")
    }

    fn emit(&mut self, line: String) {
        if let Err(e) = writeln!(self.out, "{}", line) {
            warn!("Failed to write view line: {}", e);
        }
    }
}

impl<W: Write> DisplaySurface for ConsoleDisplay<W> {
    fn create_view(&mut self, target: &Target) -> ViewHandle {
        self.next_id += 1;
        let handle = ViewHandle::new(self.next_id);
        self.names.insert(handle, target.name.clone());

        let tag = if target.tag.is_empty() { "-" } else { target.tag.as_str() };
        self.emit(format!(
            "+ {} <{}> [{}] every {}s",
            target.name, target.host, tag, target.interval_s
        ));
        handle
    }

    fn update_view(&mut self, view: ViewHandle, update: &ViewUpdate) {
        let mut line = format!(
            "{} {}: {} {} at {}",
            update.status.icon(),
            self.name(view),
            update.status,
            update.status_code,
            update.time
        );
        if let Some(latency) = update.latency_ms {
            line.push_str(&format!(" ({}ms)", latency));
        }
        if let Some(reason) = &update.status_reason {
            line.push_str(&format!(" {}", reason));
        }
        if let Some(last_ok) = &update.last_ok_text {
            line.push_str(&format!(" | {}", last_ok));
        }
        self.emit(line);
    }

    fn mark_stale(&mut self, view: ViewHandle) {
        let line = format!("~ {}: stale", self.name(view));
        self.emit(line);
    }

    fn clear_all(&mut self) {
        self.names.clear();
        self.emit("-- cleared --".to_string());
    }
}

/// Rings the terminal bell and prints notifications to stderr
///
/// Permission is only granted when stderr is attached to a terminal.
#[derive(Debug, Default)]
pub struct TerminalNotifier;

impl Notifier for TerminalNotifier {
    fn request_permission(&mut self) -> Permission {
        if std::io::stderr().is_terminal() {
            Permission::Granted
        } else {
            Permission::Denied
        }
    }

    fn show(&mut self, notification: &Notification) {
        eprintln!("\x07{}\n{}", notification.title, notification.body());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use canarywatch_status::{Status, StatusCode, StatusUpdate};

    fn target() -> Target {
        Target {
            name: "A".to_string(),
            host: "h1".to_string(),
            tag: String::new(),
            interval_s: 5,
        }
    }

    #[test]
    fn test_console_lines() {
        let mut display = ConsoleDisplay::new(Vec::new());
        let handle = display.create_view(&target());

        let update = StatusUpdate {
            target: target(),
            status: Status::Fire,
            status_code: StatusCode::Numeric(500),
            time: "not-a-time".to_string(),
            latency_ms: Some(42),
            status_reason: Some("Internal Server Error".to_string()),
        };
        display.update_view(handle, &ViewUpdate::from_update(&update));
        display.mark_stale(handle);
        display.clear_all();

        let text = String::from_utf8(display.into_inner()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "+ A <h1> [-] every 5s");
        assert_eq!(
            lines[1],
            "🔥 A: Fire 500 at not-a-time (42ms) Internal Server Error"
        );
        assert_eq!(lines[2], "~ A: stale");
        assert_eq!(lines[3], "-- cleared --");
    }

    #[test]
    fn test_okay_line_has_last_ok() {
        let mut display = ConsoleDisplay::new(Vec::new());
        let handle = display.create_view(&target());

        let update = StatusUpdate {
            target: target(),
            status: Status::Okay,
            status_code: StatusCode::Numeric(200),
            time: "t0".to_string(),
            latency_ms: None,
            status_reason: None,
        };
        display.update_view(handle, &ViewUpdate::from_update(&update));

        let text = String::from_utf8(display.into_inner()).unwrap();
        assert!(text.lines().nth(1).unwrap().ends_with("| Last OK: t0"));
    }
}
