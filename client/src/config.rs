use anyhow::{Context, Result, anyhow, bail};
use reqwest::Url;

pub const DEFAULT_SERVER_URL: &str = "http://localhost:8080";

/// Path of the server's SockJS endpoint
const WS_ENDPOINT: &str = "web-socket";

/// SockJS serves a plain websocket under this suffix of its endpoint
const RAW_WEBSOCKET_SUFFIX: &str = "websocket";

/// Where the chat server lives. Every endpoint is derived from one base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    base: Url,
}

impl ClientConfig {
    pub fn new(server_url: &str) -> Result<Self> {
        let base = Url::parse(server_url)
            .with_context(|| format!("Invalid server URL: {server_url}"))?;

        match base.scheme() {
            "http" | "https" => {}
            other => bail!("Unsupported server URL scheme '{other}', expected http or https"),
        }
        if base.cannot_be_a_base() || base.host_str().is_none() {
            bail!("Server URL has no host: {server_url}");
        }

        Ok(Self { base })
    }

    /// `host[:port]`, as sent in the STOMP CONNECT frame
    pub fn host(&self) -> String {
        let host = self.base.host_str().unwrap_or_default();
        match self.base.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        }
    }

    /// `ws(s)://host/web-socket/websocket`
    pub fn ws_url(&self) -> Result<Url> {
        let mut url = self.endpoint(&[WS_ENDPOINT, RAW_WEBSOCKET_SUFFIX])?;
        let scheme = if self.base.scheme() == "https" { "wss" } else { "ws" };
        url.set_scheme(scheme)
            .map_err(|()| anyhow!("Cannot derive websocket URL from {}", self.base))?;
        Ok(url)
    }

    /// `GET /users`
    pub fn users_url(&self) -> Result<Url> {
        self.endpoint(&["users"])
    }

    /// `GET /messages/{own}/{peer}`
    pub fn conversation_url(&self, own_id: &str, peer_id: &str) -> Result<Url> {
        self.endpoint(&["messages", own_id, peer_id])
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| anyhow!("Server URL cannot be a base: {}", self.base))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoints_from_default() {
        let config = ClientConfig::new(DEFAULT_SERVER_URL).unwrap();

        assert_eq!(config.host(), "localhost:8080");
        assert_eq!(
            config.ws_url().unwrap().as_str(),
            "ws://localhost:8080/web-socket/websocket"
        );
        assert_eq!(config.users_url().unwrap().as_str(), "http://localhost:8080/users");
    }

    #[test]
    fn test_https_maps_to_wss_and_keeps_prefix() {
        let config = ClientConfig::new("https://chat.example.com/app/").unwrap();

        assert_eq!(config.host(), "chat.example.com");
        assert_eq!(
            config.ws_url().unwrap().as_str(),
            "wss://chat.example.com/app/web-socket/websocket"
        );
    }

    #[test]
    fn test_conversation_url_encodes_ids() {
        let config = ClientConfig::new("http://localhost:8080").unwrap();

        assert_eq!(
            config.conversation_url("alice", "bob smith").unwrap().as_str(),
            "http://localhost:8080/messages/alice/bob%20smith"
        );
    }

    #[test]
    fn test_rejects_non_http_scheme() {
        assert!(ClientConfig::new("ftp://localhost").is_err());
        assert!(ClientConfig::new("not a url").is_err());
    }
}
