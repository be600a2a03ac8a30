use std::collections::VecDeque;

use anyhow::{Context, Result, anyhow, bail};
use chatline_protocol::{ClientCommand, Delivery, ServerMessage, parse_server_frames};

use crate::config::ClientConfig;
use crate::connection::Connection;

/// Publish/subscribe session with the chat server's broker.
#[allow(async_fn_in_trait)]
pub trait Bus {
    /// Subscribe to a destination, returning the subscription id
    async fn subscribe(&mut self, destination: &str) -> Result<String>;

    /// Publish a JSON body to a destination
    async fn publish(&mut self, destination: &str, body: String) -> Result<()>;

    /// Next message delivered on any subscription, `None` once the broker is gone.
    ///
    /// An error means the session is over: the transport failed or the
    /// broker sent ERROR.
    async fn next_delivery(&mut self) -> Option<Result<Delivery>>;

    async fn disconnect(self) -> Result<()>;
}

/// Opens bus sessions. No retries: a failed `open` is final.
#[allow(async_fn_in_trait)]
pub trait Connector {
    type Bus: Bus;

    async fn open(&self) -> Result<Self::Bus>;
}

/// STOMP 1.2 over a plain websocket
pub struct StompBus {
    connection: Connection,
    next_subscription: u32,
    pending: VecDeque<Delivery>,
}

impl StompBus {
    /// Send CONNECT and wait for the broker's CONNECTED
    pub async fn handshake(mut connection: Connection, host: &str) -> Result<Self> {
        let connect = ClientCommand::Connect {
            host: host.to_string(),
        };
        connection.send_text(connect.to_wire_format()).await?;

        loop {
            let text = connection
                .next_text()
                .await?
                .context("Connection closed while waiting for CONNECTED")?;

            for message in parse_server_frames(&text).context("Failed to parse broker frame")? {
                match message {
                    ServerMessage::Connected { version, .. } => {
                        tracing::debug!(version = ?version, "STOMP session established");
                        return Ok(Self {
                            connection,
                            next_subscription: 0,
                            pending: VecDeque::new(),
                        });
                    }
                    ServerMessage::Error { message, body } => {
                        bail!("Broker rejected connection: {message} {body}");
                    }
                    other => tracing::debug!(frame = ?other, "Ignoring frame before CONNECTED"),
                }
            }
        }
    }

    async fn send(&mut self, command: ClientCommand) -> Result<()> {
        self.connection.send_text(command.to_wire_format()).await
    }
}

impl Bus for StompBus {
    async fn subscribe(&mut self, destination: &str) -> Result<String> {
        let id = format!("sub-{}", self.next_subscription);
        self.next_subscription += 1;

        self.send(ClientCommand::Subscribe {
            id: id.clone(),
            destination: destination.to_string(),
        })
        .await
        .with_context(|| format!("Failed to subscribe to {destination}"))?;

        tracing::debug!(id = %id, destination = %destination, "Subscribed");
        Ok(id)
    }

    async fn publish(&mut self, destination: &str, body: String) -> Result<()> {
        self.send(ClientCommand::Send {
            destination: destination.to_string(),
            body,
        })
        .await
        .with_context(|| format!("Failed to publish to {destination}"))
    }

    async fn next_delivery(&mut self) -> Option<Result<Delivery>> {
        loop {
            if let Some(delivery) = self.pending.pop_front() {
                return Some(Ok(delivery));
            }

            let text = match self.connection.next_text().await {
                Ok(Some(text)) => text,
                Ok(None) => return None,
                Err(e) => return Some(Err(e)),
            };

            let messages = match parse_server_frames(&text) {
                Ok(messages) => messages,
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping unparseable broker frame");
                    continue;
                }
            };

            for message in messages {
                match message {
                    ServerMessage::Message(delivery) => self.pending.push_back(delivery),
                    ServerMessage::Error { message, body } => {
                        return Some(Err(anyhow!("Broker error: {message} {body}")));
                    }
                    ServerMessage::Receipt { receipt_id } => {
                        tracing::debug!(receipt_id = %receipt_id, "Receipt");
                    }
                    ServerMessage::Connected { .. } => {
                        tracing::debug!("Ignoring repeated CONNECTED");
                    }
                }
            }
        }
    }

    async fn disconnect(mut self) -> Result<()> {
        self.send(ClientCommand::Disconnect { receipt: None }).await?;
        self.connection.close().await
    }
}

/// Opens [`StompBus`] sessions against the configured server
pub struct StompConnector {
    ws_url: String,
    host: String,
}

impl StompConnector {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        Ok(Self {
            ws_url: config.ws_url()?.to_string(),
            host: config.host(),
        })
    }
}

impl Connector for StompConnector {
    type Bus = StompBus;

    async fn open(&self) -> Result<StompBus> {
        tracing::info!(url = %self.ws_url, "Opening bus connection");
        let connection = Connection::connect(&self.ws_url).await?;
        StompBus::handshake(connection, &self.host).await
    }
}

#[cfg(test)]
mod tests {
    use futures_util::{SinkExt, StreamExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;
    use tokio_tungstenite::{accept_async, tungstenite::Message};

    use super::*;

    const CONNECTED: &str = "CONNECTED\nversion:1.2\nheart-beat:0,0\n\n\0";

    fn text(frame: &str) -> Message {
        Message::Text(frame.to_string())
    }

    fn message(destination: &str, body: &str) -> String {
        format!(
            "MESSAGE\ndestination:{destination}\nsubscription:sub-0\nmessage-id:1\ncontent-length:{}\n\n{body}\0",
            body.len()
        )
    }

    /// Accept one websocket client and answer its first frame with `replies`.
    /// The task yields every text frame the client sent.
    async fn broker(replies: Vec<Message>) -> (String, JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}/web-socket/websocket", listener.local_addr().unwrap());

        let task = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(stream).await.unwrap();
            let mut received = Vec::new();
            let mut replies = replies.into_iter();

            while let Some(Ok(frame)) = ws.next().await {
                match frame {
                    Message::Text(text) => {
                        received.push(text);
                        for reply in replies.by_ref() {
                            if ws.send(reply).await.is_err() {
                                break;
                            }
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            received
        });

        (url, task)
    }

    async fn open(url: &str) -> Result<StompBus> {
        StompBus::handshake(Connection::connect(url).await?, "localhost:8080").await
    }

    #[tokio::test]
    async fn test_handshake_then_disconnect() {
        let (url, broker) = broker(vec![text(CONNECTED)]).await;

        let bus = open(&url).await.unwrap();
        bus.disconnect().await.unwrap();

        let received = broker.await.unwrap();
        assert_eq!(
            received,
            vec![
                "CONNECT\naccept-version:1.2\nhost:localhost:8080\nheart-beat:0,0\n\n\0".to_string(),
                "DISCONNECT\n\n\0".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_error_frame_rejects_connect() {
        let (url, _broker) = broker(vec![text("ERROR\nmessage:bad login\n\nnope\0")]).await;

        let err = open(&url).await.err().unwrap();

        assert!(err.to_string().contains("bad login"), "{err:#}");
    }

    #[tokio::test]
    async fn test_close_before_connected_fails_connect() {
        let (url, _broker) = broker(vec![Message::Close(None)]).await;

        assert!(open(&url).await.is_err());
    }

    #[tokio::test]
    async fn test_subscription_ids_count_up() {
        let (url, broker) = broker(vec![text(CONNECTED)]).await;
        let mut bus = open(&url).await.unwrap();

        assert_eq!(bus.subscribe("/user/alice/queue/messages").await.unwrap(), "sub-0");
        assert_eq!(bus.subscribe("/user/public").await.unwrap(), "sub-1");
        bus.publish("/app/chat", "{}".to_string()).await.unwrap();
        bus.disconnect().await.unwrap();

        let received = broker.await.unwrap();
        assert_eq!(received[1], "SUBSCRIBE\nid:sub-0\ndestination:/user/alice/queue/messages\n\n\0");
        assert_eq!(received[2], "SUBSCRIBE\nid:sub-1\ndestination:/user/public\n\n\0");
        assert_eq!(
            received[3],
            "SEND\ndestination:/app/chat\ncontent-type:application/json\ncontent-length:2\n\n{}\0"
        );
    }

    #[tokio::test]
    async fn test_frames_in_one_message_are_queued_in_order() {
        let batch = format!("{}{}", message("/user/public", "a"), message("/user/public", "b"));
        let (url, _broker) = broker(vec![
            text(CONNECTED),
            Message::Text(batch),
            Message::Text(message("/user/alice/queue/messages", "c")),
        ])
        .await;
        let mut bus = open(&url).await.unwrap();

        let mut bodies = Vec::new();
        for _ in 0..3 {
            bodies.push(bus.next_delivery().await.unwrap().unwrap().body);
        }

        assert_eq!(bodies, ["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_unparseable_frame_is_skipped() {
        let (url, _broker) = broker(vec![
            text(CONNECTED),
            text("MESSAGE\ndestination:/user/public\nsubscription:sub-1\nbad:\\t\n\n{}\0"),
            Message::Text(message("/user/public", "{\"ok\":1}")),
        ])
        .await;
        let mut bus = open(&url).await.unwrap();

        let delivery = bus.next_delivery().await.unwrap().unwrap();

        assert_eq!(delivery.body, "{\"ok\":1}");
        assert_eq!(delivery.message_id.as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn test_broker_error_is_reported() {
        let (url, _broker) = broker(vec![
            text(CONNECTED),
            text("ERROR\nmessage:subscription refused\n\n\0"),
        ])
        .await;
        let mut bus = open(&url).await.unwrap();

        let err = bus.next_delivery().await.unwrap().unwrap_err();

        assert!(err.to_string().contains("subscription refused"), "{err:#}");
    }

    #[tokio::test]
    async fn test_close_ends_deliveries() {
        let (url, _broker) = broker(vec![text(CONNECTED), Message::Close(None)]).await;
        let mut bus = open(&url).await.unwrap();

        assert!(bus.next_delivery().await.is_none());
    }
}
