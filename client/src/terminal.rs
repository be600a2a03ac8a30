//! Line-oriented text surface.

use std::fmt;
use std::io::Write;

use crate::view::{
    Direction, Notice, RosterEntry, RosterItem, RosterView, Surface, TranscriptLine,
    TranscriptView,
};

const ACTIVE_PREFIX: &str = ">";
const INACTIVE_PREFIX: &str = " ";
const UNREAD_MARKER: &str = "*";
const SEPARATOR: &str = "  --";

/// Writes every view change to `out` as plain text
pub struct TerminalSurface<W> {
    out: W,
    send_form_visible: bool,
}

impl<W: Write> TerminalSurface<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            send_form_visible: false,
        }
    }

    pub fn send_form_visible(&self) -> bool {
        self.send_form_visible
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn line(&mut self, args: fmt::Arguments<'_>) {
        if let Err(e) = writeln!(self.out, "{args}") {
            tracing::warn!(error = %e, "Failed to write to terminal");
        }
    }

    fn flush(&mut self) {
        if let Err(e) = self.out.flush() {
            tracing::warn!(error = %e, "Failed to flush terminal");
        }
    }
}

fn format_entry(entry: &RosterEntry) -> String {
    let prefix = if entry.active {
        ACTIVE_PREFIX
    } else {
        INACTIVE_PREFIX
    };
    let badge = if entry.badge_visible() {
        format!(" {UNREAD_MARKER}{}", entry.unread_count)
    } else {
        String::new()
    };

    format!("{prefix} {} ({}){badge}", entry.full_name, entry.nick_name)
}

fn format_line(line: &TranscriptLine) -> String {
    match line.direction {
        Direction::Sent => format!("  me > {}", line.content),
        Direction::Received => format!("  {} < {}", line.sender_id, line.content),
    }
}

impl<W: Write> Surface for TerminalSurface<W> {
    fn show_login(&mut self) {
        self.send_form_visible = false;
        self.line(format_args!("Logged out."));
        self.flush();
    }

    fn show_chat(&mut self) {
        self.line(format_args!("Joining chat..."));
    }

    fn show_notice(&mut self, notice: Option<Notice>) {
        if let Some(notice) = notice {
            self.line(format_args!("[{}]", notice.text()));
            self.flush();
        }
    }

    fn show_identity(&mut self, full_name: &str) {
        self.line(format_args!("Signed in as {full_name}"));
    }

    fn render_roster(&mut self, view: &RosterView) {
        if view.is_empty() {
            self.line(format_args!("Nobody else is online."));
        } else {
            self.line(format_args!("Online users:"));
            for item in &view.items {
                match item {
                    RosterItem::Entry(entry) => {
                        let text = format_entry(entry);
                        self.line(format_args!("{text}"));
                    }
                    RosterItem::Separator => self.line(format_args!("{SEPARATOR}")),
                }
            }
        }
        self.flush();
    }

    fn render_transcript(&mut self, view: &TranscriptView) {
        self.line(format_args!("---- conversation ----"));
        for line in &view.lines {
            let text = format_line(line);
            self.line(format_args!("{text}"));
        }
    }

    fn append_message(&mut self, line: &TranscriptLine) {
        let text = format_line(line);
        self.line(format_args!("{text}"));
    }

    fn set_send_form_visible(&mut self, visible: bool) {
        if self.send_form_visible != visible && !visible {
            self.line(format_args!("(pick someone with /open <nickname> to reply)"));
        }
        self.send_form_visible = visible;
    }

    fn clear_input(&mut self) {}

    fn scroll_to_latest(&mut self) {
        self.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(nick: &str, unread_count: u32, active: bool) -> RosterItem {
        RosterItem::Entry(RosterEntry {
            nick_name: nick.to_string(),
            full_name: nick.to_uppercase(),
            avatar: crate::view::AVATAR_PLACEHOLDER,
            unread_count,
            active,
        })
    }

    fn output(surface: TerminalSurface<Vec<u8>>) -> String {
        String::from_utf8(surface.into_inner()).unwrap()
    }

    #[test]
    fn test_roster_markers() {
        let mut surface = TerminalSurface::new(Vec::new());
        let view = RosterView {
            items: vec![entry("bob", 0, true), RosterItem::Separator, entry("carol", 3, false)],
        };

        surface.render_roster(&view);

        assert_eq!(
            output(surface),
            "Online users:\n> BOB (bob)\n  --\n  CAROL (carol) *3\n"
        );
    }

    #[test]
    fn test_empty_roster() {
        let mut surface = TerminalSurface::new(Vec::new());
        surface.render_roster(&RosterView::default());

        assert_eq!(output(surface), "Nobody else is online.\n");
    }

    #[test]
    fn test_transcript_lines() {
        let mut surface = TerminalSurface::new(Vec::new());
        surface.append_message(&TranscriptLine {
            direction: Direction::Sent,
            sender_id: "alice".into(),
            content: "hello".into(),
        });
        surface.append_message(&TranscriptLine {
            direction: Direction::Received,
            sender_id: "bob".into(),
            content: "hi".into(),
        });

        assert_eq!(output(surface), "  me > hello\n  bob < hi\n");
    }

    #[test]
    fn test_hiding_send_form_prints_hint_once() {
        let mut surface = TerminalSurface::new(Vec::new());
        surface.set_send_form_visible(true);
        surface.set_send_form_visible(false);
        surface.set_send_form_visible(false);

        assert!(!surface.send_form_visible());
        assert_eq!(
            output(surface),
            "(pick someone with /open <nickname> to reply)\n"
        );
    }
}
