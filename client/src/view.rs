//! View models and the surface they are drawn on.
//!
//! [`render_roster`] and [`render_transcript`] are pure: they turn the
//! controller's model into what a [`Surface`] should show, so the layout
//! rules can be tested without any front end.

use chatline_protocol::{ChatMessage, User};

use crate::session::Session;

/// Avatar shown for every user; the server has no pictures
pub const AVATAR_PLACEHOLDER: &str = "img/user_icon.png";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterEntry {
    /// Unique, doubles as the entry's id
    pub nick_name: String,
    pub full_name: String,
    pub avatar: &'static str,
    pub unread_count: u32,
    pub active: bool,
}

impl RosterEntry {
    pub fn badge_visible(&self) -> bool {
        self.unread_count > 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RosterItem {
    Entry(RosterEntry),
    Separator,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RosterView {
    pub items: Vec<RosterItem>,
}

impl RosterView {
    pub fn entries(&self) -> impl Iterator<Item = &RosterEntry> {
        self.items.iter().filter_map(|item| match item {
            RosterItem::Entry(entry) => Some(entry),
            RosterItem::Separator => None,
        })
    }

    pub fn entry(&self, nick_name: &str) -> Option<&RosterEntry> {
        self.entries().find(|entry| entry.nick_name == nick_name)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Build the roster from a user list, in the order given.
///
/// The session's own user never appears. Consecutive entries are divided by
/// a separator, with none after the last.
pub fn render_roster(users: &[User], session: &Session) -> RosterView {
    let mut items = Vec::with_capacity(users.len() * 2);

    for user in users.iter().filter(|u| u.nick_name != session.nickname()) {
        if !items.is_empty() {
            items.push(RosterItem::Separator);
        }
        items.push(RosterItem::Entry(RosterEntry {
            nick_name: user.nick_name.clone(),
            full_name: user.full_name.clone(),
            avatar: AVATAR_PLACEHOLDER,
            unread_count: session.unread(&user.nick_name),
            active: session.selected_peer() == Some(user.nick_name.as_str()),
        }));
    }

    RosterView { items }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Sent,
    Received,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptLine {
    pub direction: Direction,
    pub sender_id: String,
    pub content: String,
}

impl TranscriptLine {
    pub fn from_message(message: &ChatMessage, own_id: &str) -> Self {
        let direction = if message.sender_id == own_id {
            Direction::Sent
        } else {
            Direction::Received
        };

        Self {
            direction,
            sender_id: message.sender_id.clone(),
            content: message.content.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranscriptView {
    pub lines: Vec<TranscriptLine>,
}

/// Build a transcript from history, keeping the server's order
pub fn render_transcript(messages: &[ChatMessage], own_id: &str) -> TranscriptView {
    TranscriptView {
        lines: messages
            .iter()
            .map(|message| TranscriptLine::from_message(message, own_id))
            .collect(),
    }
}

/// Status line messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    Connecting,
    ConnectionFailed,
    ConnectionLost,
}

impl Notice {
    pub fn text(&self) -> &'static str {
        match self {
            Self::Connecting => "Connecting...",
            Self::ConnectionFailed => {
                "Could not connect to the chat server. Reload to try again!"
            }
            Self::ConnectionLost => "Connection to the chat server was lost. Reload to reconnect.",
        }
    }
}

/// Everything the controller does to the screen.
///
/// Calls arrive one at a time from the controller's single event loop.
pub trait Surface {
    /// Back to the nickname form, everything else cleared
    fn show_login(&mut self);

    fn show_chat(&mut self);

    /// Persistent status line; `None` clears it
    fn show_notice(&mut self, notice: Option<Notice>);

    fn show_identity(&mut self, full_name: &str);

    /// Replace the whole roster
    fn render_roster(&mut self, view: &RosterView);

    /// Replace the whole transcript
    fn render_transcript(&mut self, view: &TranscriptView);

    /// Add one line under the current transcript
    fn append_message(&mut self, line: &TranscriptLine);

    fn set_send_form_visible(&mut self, visible: bool);

    fn clear_input(&mut self);

    fn scroll_to_latest(&mut self);
}

#[cfg(test)]
mod tests {
    use chatline_protocol::Status;

    use super::*;

    fn users(ids: &[&str]) -> Vec<User> {
        ids.iter()
            .map(|id| User::new(id, &id.to_uppercase(), Status::Online))
            .collect()
    }

    #[test]
    fn test_roster_excludes_self_and_separates_entries() {
        let session = Session::new("alice", "Alice").unwrap();
        let view = render_roster(&users(&["bob", "alice", "carol", "dave"]), &session);

        let ids: Vec<_> = view.entries().map(|e| e.nick_name.as_str()).collect();
        assert_eq!(ids, ["bob", "carol", "dave"]);

        assert_eq!(view.items.len(), 5);
        assert!(matches!(view.items[1], RosterItem::Separator));
        assert!(matches!(view.items[3], RosterItem::Separator));
        assert!(matches!(view.items.last(), Some(RosterItem::Entry(_))));
    }

    #[test]
    fn test_roster_of_only_self_is_empty() {
        let session = Session::new("alice", "Alice").unwrap();

        assert!(render_roster(&users(&["alice"]), &session).is_empty());
    }

    #[test]
    fn test_roster_marks_selection_and_unread() {
        let mut session = Session::new("alice", "Alice").unwrap();
        session.select("bob");
        session.mark_unread("carol");

        let view = render_roster(&users(&["bob", "carol"]), &session);

        let bob = view.entry("bob").unwrap();
        assert!(bob.active);
        assert!(!bob.badge_visible());
        assert_eq!(bob.avatar, AVATAR_PLACEHOLDER);

        let carol = view.entry("carol").unwrap();
        assert!(!carol.active);
        assert!(carol.badge_visible());
        assert_eq!(carol.unread_count, 1);
        assert_eq!(carol.full_name, "CAROL");
    }

    #[test]
    fn test_transcript_tags_direction() {
        let history = vec![
            ChatMessage::outgoing("alice", "bob", "hello", chrono::Utc::now()),
            ChatMessage::outgoing("bob", "alice", "hi", chrono::Utc::now()),
        ];

        let view = render_transcript(&history, "alice");

        assert_eq!(view.lines[0].direction, Direction::Sent);
        assert_eq!(view.lines[1].direction, Direction::Received);
        assert_eq!(view.lines[1].content, "hi");
    }
}
