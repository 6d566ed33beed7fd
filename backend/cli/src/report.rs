//! Terminal output for the `analyze` command: ANSI styling and the insights report.

use std::fmt::Write as _;

use taxwise_core::Notification;
use taxwise_session::{InsightsView, SectionBody, TabView};

pub const RESET: &str = "\x1b[0m";
pub const BOLD: &str = "\x1b[1m";
pub const DIM: &str = "\x1b[2m";

pub const RED: &str = "\x1b[31m";
pub const GREEN: &str = "\x1b[32m";
pub const YELLOW: &str = "\x1b[33m";
pub const CYAN: &str = "\x1b[36m";

/// Check if the terminal supports color output.
pub fn supports_color() -> bool {
    std::env::var("NO_COLOR").is_err()
        && (std::env::var("COLORTERM").is_ok()
            || std::env::var("TERM")
                .map(|t| t != "dumb")
                .unwrap_or(false))
}

/// Strip ANSI escape codes from a string.
pub fn strip_ansi(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\x1b' {
            // Skip until 'm'
            for next in chars.by_ref() {
                if next == 'm' {
                    break;
                }
            }
        } else {
            result.push(c);
        }
    }
    result
}

/// Print a formatted INFO note to stdout.
pub fn note_info(msg: &str) {
    if supports_color() {
        println!("{CYAN}{BOLD}ℹ{RESET} {msg}");
    } else {
        println!("INFO: {msg}");
    }
}

/// Print a formatted ERROR note.
pub fn note_error(msg: &str) {
    if supports_color() {
        eprintln!("{RED}{BOLD}✗{RESET} {msg}");
    } else {
        eprintln!("ERROR: {msg}");
    }
}

/// Print a notification the way the page would toast it.
pub fn print_notification(notification: &Notification) {
    let line = format!("{}: {}", notification.title, notification.description);
    if notification.is_error() {
        note_error(&line);
    } else {
        note_info(&line);
    }
}

struct Style {
    color: bool,
}

impl Style {
    fn paint(&self, codes: &str, text: &str) -> String {
        if self.color {
            format!("{codes}{text}{RESET}")
        } else {
            text.to_string()
        }
    }
}

fn write_tab(out: &mut String, tab: &TabView, style: &Style) {
    let _ = writeln!(out, "{}", style.paint(&format!("{BOLD}{CYAN}"), tab.title));
    let _ = writeln!(out, "{}", style.paint(DIM, tab.description));
    let _ = writeln!(out, "{}", "-".repeat(strip_ansi(tab.title).chars().count().max(20)));

    for section in &tab.sections {
        match &section.body {
            SectionBody::Error { heading, message } => {
                let _ = writeln!(out, "{}", style.paint(&format!("{BOLD}{RED}"), heading));
                let _ = writeln!(out, "  {message}");
            }
            body => {
                let _ = writeln!(out, "{}", style.paint(BOLD, section.title));
                match body {
                    SectionBody::Loading => {
                        let _ = writeln!(out, "  {}", style.paint(YELLOW, "Loading..."));
                    }
                    SectionBody::Text { text } => {
                        for line in text.lines() {
                            let _ = writeln!(out, "  {line}");
                        }
                    }
                    SectionBody::List { items } => {
                        for item in items {
                            let _ = writeln!(out, "  {} {item}", style.paint(GREEN, "•"));
                        }
                    }
                    SectionBody::Error { .. } => {}
                }
            }
        }
        out.push('\n');
    }
}

/// Render the insights panel as terminal text.
pub fn format_insights(view: &InsightsView, color: bool) -> String {
    let style = Style { color };
    let mut out = String::new();

    if let Some(placeholder) = &view.placeholder {
        let _ = writeln!(out, "{}", style.paint(BOLD, placeholder.title));
        let _ = writeln!(out, "{}", placeholder.description);
        let _ = writeln!(out, "{}", style.paint(DIM, placeholder.body));
        return out;
    }

    for tab in &view.tabs {
        write_tab(&mut out, tab, &style);
    }
    out
}
