use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Low-level websocket connection carrying STOMP text frames
pub struct Connection {
    ws: WsStream,
}

impl Connection {
    /// Connect to a websocket URL
    pub async fn connect(url: &str) -> Result<Self> {
        let (ws, _response) = connect_async(url)
            .await
            .with_context(|| format!("Failed to connect to {url}"))?;

        Ok(Self { ws })
    }

    /// Receive the next text message, or `None` once the server closed
    pub async fn next_text(&mut self) -> Result<Option<String>> {
        while let Some(message) = self.ws.next().await {
            let message = message.context("WebSocket error")?;

            match message {
                Message::Text(text) => return Ok(Some(text)),
                Message::Binary(data) => {
                    let text = String::from_utf8(data).context("Binary frame is not UTF-8")?;
                    return Ok(Some(text));
                }
                Message::Close(_) => return Ok(None),
                Message::Ping(data) => self
                    .ws
                    .send(Message::Pong(data))
                    .await
                    .context("Failed to send pong")?,
                _ => {}
            }
        }

        Ok(None)
    }

    /// Send a raw string
    pub async fn send_text(&mut self, text: String) -> Result<()> {
        self.ws
            .send(Message::Text(text))
            .await
            .context("Failed to send message")
    }

    pub async fn close(&mut self) -> Result<()> {
        self.ws
            .close(None)
            .await
            .context("Failed to close websocket")
    }
}
