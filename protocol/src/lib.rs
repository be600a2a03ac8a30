use thiserror::Error;

pub mod client;
pub mod destination;
pub mod frame;
pub mod payload;
pub mod server;

pub use client::ClientCommand;
pub use frame::{Command, Frame, parse_frames};
pub use payload::{BusEvent, ChatMessage, Status, User, parse_bus_event};
pub use server::{Delivery, ServerMessage, parse_server_frames};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Invalid frame format: {0}")]
    InvalidFormat(String),

    #[error("Missing required header: {0}")]
    MissingField(String),

    #[error("Unknown STOMP command: {0}")]
    UnknownCommand(String),

    #[error("Invalid header escape sequence in: {0}")]
    InvalidEscape(String),

    #[error("Invalid content-length: {0}")]
    InvalidContentLength(String),

    #[error("Frame is missing its NUL terminator")]
    MissingTerminator,
}
