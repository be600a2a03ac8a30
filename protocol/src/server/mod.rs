
use anyhow::Result;

use crate::ParseError;
use crate::frame::{Command, Frame, parse_frames};

/// A MESSAGE frame delivered on one of our subscriptions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub destination: String,
    pub subscription: String,
    pub message_id: Option<String>,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    Connected {
        version: Option<String>,
        heart_beat: Option<String>,
    },
    Message(Delivery),
    Receipt {
        receipt_id: String,
    },
    Error {
        message: String,
        body: String,
    },
}

/// Parse a complete websocket message from the broker into server messages.
///
/// Heart-beats produce no messages.
pub fn parse_server_frames(text: &str) -> Result<Vec<ServerMessage>> {
    parse_frames(text)?
        .into_iter()
        .map(parse_server_message)
        .collect()
}

/// Interpret one decoded frame as a server message
pub fn parse_server_message(frame: Frame) -> Result<ServerMessage> {
    match frame.command {
        Command::Connected => Ok(ServerMessage::Connected {
            version: frame.get("version").map(str::to_string),
            heart_beat: frame.get("heart-beat").map(str::to_string),
        }),
        Command::Message => parse_message(frame),
        Command::Receipt => Ok(ServerMessage::Receipt {
            receipt_id: required(&frame, "receipt-id")?,
        }),
        Command::Error => Ok(ServerMessage::Error {
            message: frame.get("message").unwrap_or("unspecified error").to_string(),
            body: frame.body,
        }),
        other => Err(ParseError::InvalidFormat(format!(
            "unexpected client frame from server: {other}"
        ))
        .into()),
    }
}

fn parse_message(frame: Frame) -> Result<ServerMessage> {
    let destination = required(&frame, "destination")?;
    let subscription = required(&frame, "subscription")?;
    let message_id = frame.get("message-id").map(str::to_string);

    Ok(ServerMessage::Message(Delivery {
        destination,
        subscription,
        message_id,
        body: frame.body,
    }))
}

fn required(frame: &Frame, name: &str) -> Result<String> {
    frame
        .get(name)
        .map(str::to_string)
        .ok_or_else(|| ParseError::MissingField(format!("{} {}", frame.command, name)).into())
}
