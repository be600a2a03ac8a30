//! Fixed STOMP destinations of the chat server.

/// Presence announcement when a user comes online
pub const ADD_USER: &str = "/app/user.addUser";

/// Presence announcement when a user leaves
pub const DISCONNECT_USER: &str = "/app/user.disconnectUser";

/// Outbound chat messages
pub const CHAT: &str = "/app/chat";

/// Broadcast topic carrying presence changes
pub const PUBLIC: &str = "/user/public";

/// Per-user queue that receives chat notifications addressed to `nickname`
pub fn private_queue(nickname: &str) -> String {
    format!("/user/{nickname}/queue/messages")
}
