use anyhow::Result;
use serde::Serialize;

use crate::frame::{Command, Frame};

pub const STOMP_VERSION: &str = "1.2";
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Frames that clients send to the broker
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCommand {
    /// CONNECT with heart-beats disabled
    Connect { host: String },

    /// SUBSCRIBE id:ID destination:DEST
    Subscribe { id: String, destination: String },

    /// SEND destination:DEST with a JSON body
    Send { destination: String, body: String },

    /// DISCONNECT, optionally asking for a receipt
    Disconnect { receipt: Option<String> },
}

impl ClientCommand {
    /// Build a SEND carrying `payload` encoded as JSON
    pub fn send_json<T: Serialize>(destination: &str, payload: &T) -> Result<Self> {
        Ok(Self::Send {
            destination: destination.to_string(),
            body: serde_json::to_string(payload)?,
        })
    }

    pub fn to_frame(&self) -> Frame {
        match self {
            Self::Connect { host } => Frame::new(Command::Connect)
                .header("accept-version", STOMP_VERSION)
                .header("host", host.as_str())
                .header("heart-beat", "0,0"),
            Self::Subscribe { id, destination } => Frame::new(Command::Subscribe)
                .header("id", id.as_str())
                .header("destination", destination.as_str()),
            Self::Send { destination, body } => Frame::new(Command::Send)
                .header("destination", destination.as_str())
                .header("content-type", JSON_CONTENT_TYPE)
                .header("content-length", body.len().to_string())
                .body(body.as_str()),
            Self::Disconnect { receipt } => {
                let frame = Frame::new(Command::Disconnect);
                match receipt {
                    Some(receipt) => frame.header("receipt", receipt.as_str()),
                    None => frame,
                }
            }
        }
    }

    /// Serialize to the text that goes into a websocket message
    pub fn to_wire_format(&self) -> String {
        self.to_frame().to_wire_format()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::{Status, User};

    #[test]
    fn test_connect_wire_format() {
        let cmd = ClientCommand::Connect {
            host: "localhost".into(),
        };

        assert_eq!(
            cmd.to_wire_format(),
            "CONNECT\naccept-version:1.2\nhost:localhost\nheart-beat:0,0\n\n\0"
        );
    }

    #[test]
    fn test_subscribe_wire_format() {
        let cmd = ClientCommand::Subscribe {
            id: "sub-0".into(),
            destination: "/user/public".into(),
        };

        assert_eq!(
            cmd.to_wire_format(),
            "SUBSCRIBE\nid:sub-0\ndestination:/user/public\n\n\0"
        );
    }

    #[test]
    fn test_send_json_sets_length_and_type() {
        let user = User {
            nick_name: "alice".into(),
            full_name: "Alice Liddell".into(),
            status: Status::Online,
        };
        let frame = ClientCommand::send_json("/app/user.addUser", &user)
            .unwrap()
            .to_frame();

        let body = r#"{"nickName":"alice","fullName":"Alice Liddell","status":"ONLINE"}"#;
        assert_eq!(frame.body, body);
        assert_eq!(frame.get("content-type"), Some("application/json"));
        assert_eq!(frame.get("content-length"), Some(body.len().to_string().as_str()));
    }

    #[test]
    fn test_disconnect_with_receipt() {
        let cmd = ClientCommand::Disconnect {
            receipt: Some("bye".into()),
        };

        assert_eq!(cmd.to_wire_format(), "DISCONNECT\nreceipt:bye\n\n\0");
    }
}
