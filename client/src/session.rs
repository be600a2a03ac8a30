use std::collections::HashMap;

use chatline_protocol::{Status, User};

use crate::error::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Who we are and who we are talking to.
///
/// Lives from a valid connect request until logout; the controller owns it
/// and is the only one mutating it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    nickname: String,
    full_name: String,
    selected_peer: Option<String>,
    unread: HashMap<String, u32>,
}

impl Session {
    pub fn new(nickname: &str, full_name: &str) -> Result<Self, ValidationError> {
        let nickname = nickname.trim();
        let full_name = full_name.trim();

        if nickname.is_empty() {
            return Err(ValidationError::EmptyNickname);
        }
        if full_name.is_empty() {
            return Err(ValidationError::EmptyFullName);
        }

        Ok(Self {
            nickname: nickname.to_string(),
            full_name: full_name.to_string(),
            selected_peer: None,
            unread: HashMap::new(),
        })
    }

    pub fn nickname(&self) -> &str {
        &self.nickname
    }

    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    pub fn selected_peer(&self) -> Option<&str> {
        self.selected_peer.as_deref()
    }

    pub fn unread(&self, peer_id: &str) -> u32 {
        self.unread.get(peer_id).copied().unwrap_or(0)
    }

    /// Our own presence announcement
    pub fn presence(&self, status: Status) -> User {
        User::new(&self.nickname, &self.full_name, status)
    }

    pub(crate) fn select(&mut self, peer_id: &str) {
        self.selected_peer = Some(peer_id.to_string());
        self.unread.remove(peer_id);
    }

    pub(crate) fn mark_unread(&mut self, peer_id: &str) {
        *self.unread.entry(peer_id.to_string()).or_insert(0) += 1;
    }

    /// Forget everything about peers missing from `roster`.
    ///
    /// Returns true when the selected peer was among them.
    pub(crate) fn retain_peers(&mut self, roster: &[User]) -> bool {
        let present = |id: &str| roster.iter().any(|user| user.nick_name == id);

        self.unread.retain(|id, _| present(id.as_str()));

        let departed = self
            .selected_peer
            .as_deref()
            .is_some_and(|peer| !present(peer));
        if departed {
            self.selected_peer = None;
        }
        departed
    }
}
