use anyhow::{Context, Result};
use chatline_protocol::{ChatMessage, User};
use reqwest::Url;
use serde::de::DeserializeOwned;

use crate::config::ClientConfig;

/// The server's REST side: who is online, and what was said so far.
#[allow(async_fn_in_trait)]
pub trait Directory {
    /// Everyone the server lists as online, the caller included
    async fn online_users(&self) -> Result<Vec<User>>;

    /// Messages exchanged between two users, oldest first
    async fn conversation(&self, own_id: &str, peer_id: &str) -> Result<Vec<ChatMessage>>;
}

pub struct HttpDirectory {
    http: reqwest::Client,
    config: ClientConfig,
}

impl HttpDirectory {
    pub fn new(config: ClientConfig) -> Self {
        Self::with_client(reqwest::Client::new(), config)
    }

    /// Use a preconfigured HTTP client (proxies, timeouts, TLS roots)
    pub fn with_client(http: reqwest::Client, config: ClientConfig) -> Self {
        Self { http, config }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        tracing::debug!(url = %url, "GET");

        let response = self
            .http
            .get(url.clone())
            .send()
            .await
            .with_context(|| format!("Request to {url} failed"))?
            .error_for_status()
            .with_context(|| format!("Request to {url} was rejected"))?;

        response
            .json::<T>()
            .await
            .with_context(|| format!("Failed to decode response from {url}"))
    }
}

impl Directory for HttpDirectory {
    async fn online_users(&self) -> Result<Vec<User>> {
        self.get_json(self.config.users_url()?).await
    }

    async fn conversation(&self, own_id: &str, peer_id: &str) -> Result<Vec<ChatMessage>> {
        self.get_json(self.config.conversation_url(own_id, peer_id)?)
            .await
    }
}
