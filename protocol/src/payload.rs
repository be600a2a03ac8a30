use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ParseError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Online,
    Offline,
}

/// A user as listed by `/users` and announced on the presence topic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub nick_name: String,
    pub full_name: String,
    pub status: Status,
}

impl User {
    pub fn new(nick_name: &str, full_name: &str, status: Status) -> Self {
        Self {
            nick_name: nick_name.to_string(),
            full_name: full_name.to_string(),
            status,
        }
    }
}

/// Chat message as sent to `/app/chat`, returned by the history endpoint and
/// delivered on the private queue.
///
/// `id` and `chat_id` are assigned by the server; the notification pushed to
/// the recipient carries no timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<String>,
    pub sender_id: String,
    #[serde(default)]
    pub recipient_id: Option<String>,
    pub content: String,
    #[serde(default, with = "timestamp", skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl ChatMessage {
    /// A message composed locally, not yet seen by the server
    pub fn outgoing(sender_id: &str, recipient_id: &str, content: &str, at: DateTime<Utc>) -> Self {
        Self {
            id: None,
            chat_id: None,
            sender_id: sender_id.to_string(),
            recipient_id: Some(recipient_id.to_string()),
            content: content.to_string(),
            timestamp: Some(at),
        }
    }
}

/// Body of a frame delivered on one of the client's subscriptions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BusEvent {
    Chat(ChatMessage),
    Presence(User),
}

pub fn parse_bus_event(body: &str) -> Result<BusEvent> {
    serde_json::from_str(body).map_err(|e| {
        ParseError::InvalidFormat(format!("unrecognised bus payload: {e}")).into()
    })
}

/// Timestamps go out as RFC 3339 with millisecond precision and come back
/// either in that form or as epoch milliseconds.
mod timestamp {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer, de};

    pub fn serialize<S: Serializer>(
        value: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(ts) => serializer.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Millis, true)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Millis(i64),
            Text(String),
        }

        match Option::<Raw>::deserialize(deserializer)? {
            None => Ok(None),
            Some(Raw::Millis(ms)) => DateTime::from_timestamp_millis(ms)
                .map(Some)
                .ok_or_else(|| de::Error::custom(format!("timestamp out of range: {ms}"))),
            Some(Raw::Text(text)) => DateTime::parse_from_rfc3339(&text)
                .map(|ts| Some(ts.with_timezone(&Utc)))
                .map_err(de::Error::custom),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_outgoing_message_json() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
        let message = ChatMessage::outgoing("alice", "bob", "hello", at);
        let json = serde_json::to_string(&message).unwrap();

        assert_eq!(
            json,
            r#"{"senderId":"alice","recipientId":"bob","content":"hello","timestamp":"2024-03-01T12:30:00.000Z"}"#
        );
    }

    #[test]
    fn test_history_entry_with_epoch_millis() {
        let json = r#"{"id":"65f0","chatId":"alice_bob","senderId":"bob","recipientId":"alice","content":"hi","timestamp":1709296200000}"#;
        let message: ChatMessage = serde_json::from_str(json).unwrap();

        assert_eq!(message.chat_id.as_deref(), Some("alice_bob"));
        assert_eq!(
            message.timestamp,
            Some(Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap())
        );
    }

    #[test]
    fn test_chat_notification_is_chat_event() {
        let body = r#"{"id":"1","senderId":"bob","recipientId":"alice","content":"hi"}"#;

        match parse_bus_event(body).unwrap() {
            BusEvent::Chat(message) => {
                assert_eq!(message.sender_id, "bob");
                assert_eq!(message.content, "hi");
                assert_eq!(message.timestamp, None);
            }
            other => panic!("expected chat, got {other:?}"),
        }
    }

    #[test]
    fn test_presence_is_presence_event() {
        let body = r#"{"nickName":"carol","fullName":"Carol Danvers","status":"OFFLINE"}"#;

        assert_eq!(
            parse_bus_event(body).unwrap(),
            BusEvent::Presence(User::new("carol", "Carol Danvers", Status::Offline))
        );
    }

    #[test]
    fn test_malformed_payload() {
        let err = parse_bus_event("{\"unexpected\":true}").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ParseError>(),
            Some(ParseError::InvalidFormat(_))
        ));

        assert!(parse_bus_event("not json").is_err());
    }
}
