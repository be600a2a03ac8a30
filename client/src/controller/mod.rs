
use anyhow::{Context, Result, anyhow};
use chatline_protocol::{
    BusEvent, ChatMessage, Delivery, Status, User, destination, parse_bus_event,
};
use chrono::Utc;

use crate::bus::{Bus, Connector};
use crate::directory::Directory;
use crate::error::ValidationError;
use crate::session::{ConnectionState, Session};
use crate::view::{
    Notice, Surface, TranscriptLine, TranscriptView, render_roster, render_transcript,
};

/// Bus handle, present only once the connect handshake went through
enum Link<B> {
    Idle,
    Pending,
    Live(B),
}

/// Drives one chat session: connect, roster, conversation, send, logout.
///
/// Every method runs to completion on the caller's task; inbound bus
/// deliveries are fed in through [`ChatController::on_message_received`].
pub struct ChatController<C: Connector, D, S> {
    connector: C,
    directory: D,
    surface: S,
    link: Link<C::Bus>,
    session: Option<Session>,
    roster: Vec<User>,
    transcript: TranscriptView,
}

impl<C, D, S> ChatController<C, D, S>
where
    C: Connector,
    D: Directory,
    S: Surface,
{
    pub fn new(connector: C, directory: D, surface: S) -> Self {
        Self {
            connector,
            directory,
            surface,
            link: Link::Idle,
            session: None,
            roster: Vec::new(),
            transcript: TranscriptView::default(),
        }
    }

    pub fn state(&self) -> ConnectionState {
        match self.link {
            Link::Idle => ConnectionState::Disconnected,
            Link::Pending => ConnectionState::Connecting,
            Link::Live(_) => ConnectionState::Connected,
        }
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Latest roster snapshot, own user excluded
    pub fn roster(&self) -> &[User] {
        &self.roster
    }

    pub fn transcript(&self) -> &TranscriptView {
        &self.transcript
    }

    pub fn directory(&self) -> &D {
        &self.directory
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    /// Validate, open the bus, then join
    pub async fn connect(&mut self, nickname: &str, full_name: &str) -> Result<()> {
        self.begin_connect(nickname, full_name)?;
        let opened = self.connector.open().await;
        self.complete_connect(opened).await
    }

    /// First half of [`connect`](Self::connect): create the session and
    /// switch to the chat screen while the bus is being opened.
    pub fn begin_connect(&mut self, nickname: &str, full_name: &str) -> Result<(), ValidationError> {
        if !matches!(self.link, Link::Idle) {
            return Err(ValidationError::AlreadyConnected);
        }

        let session = Session::new(nickname, full_name)?;
        tracing::info!(nickname = %session.nickname(), "Connecting");

        self.session = Some(session);
        self.link = Link::Pending;
        self.surface.show_chat();
        self.surface.show_notice(Some(Notice::Connecting));
        Ok(())
    }

    /// Second half of [`connect`](Self::connect), run with the outcome of
    /// opening the bus. A failure is reported on the surface and not retried.
    pub async fn complete_connect(&mut self, opened: Result<C::Bus>) -> Result<()> {
        if !matches!(self.link, Link::Pending) {
            return Err(anyhow!("No connect in progress"));
        }
        let session = self
            .session
            .as_ref()
            .ok_or(ValidationError::NotConnected)?;

        let joined = match opened {
            Ok(mut bus) => join(&mut bus, session).await.map(|()| bus),
            Err(e) => Err(e),
        };

        let bus = match joined {
            Ok(bus) => bus,
            Err(e) => {
                tracing::error!(error = %e, "Connection failed");
                self.link = Link::Idle;
                self.session = None;
                self.surface.show_notice(Some(Notice::ConnectionFailed));
                return Ok(());
            }
        };

        self.link = Link::Live(bus);
        self.surface.show_notice(None);
        self.surface.show_identity(session.full_name());
        tracing::info!(nickname = %session.nickname(), "Connected");

        if let Err(e) = self.refresh_roster().await {
            tracing::warn!(error = %e, "Initial roster refresh failed");
        }
        Ok(())
    }

    /// Fetch the online users and redraw the roster from scratch
    pub async fn refresh_roster(&mut self) -> Result<()> {
        if self.session.is_none() {
            return Err(ValidationError::NotConnected.into());
        }

        let users = self
            .directory
            .online_users()
            .await
            .context("Failed to fetch online users")?;
        self.apply_roster(users);
        Ok(())
    }

    fn apply_roster(&mut self, users: Vec<User>) {
        let Some(session) = self.session.as_mut() else {
            return;
        };

        self.roster = users
            .into_iter()
            .filter(|user| user.nick_name != session.nickname() && user.status == Status::Online)
            .collect();

        if session.retain_peers(&self.roster) {
            tracing::debug!("Selected peer went offline");
            self.transcript = TranscriptView::default();
            self.surface.render_transcript(&self.transcript);
            self.surface.set_send_form_visible(false);
        }

        let view = render_roster(&self.roster, session);
        self.surface.render_roster(&view);
    }

    fn redraw_roster(&mut self) {
        if let Some(session) = &self.session {
            let view = render_roster(&self.roster, session);
            self.surface.render_roster(&view);
        }
    }

    /// Open the conversation with `peer_id`
    pub async fn select_peer(&mut self, peer_id: &str) -> Result<()> {
        let session = self
            .session
            .as_mut()
            .ok_or(ValidationError::NotConnected)?;
        if !self.roster.iter().any(|user| user.nick_name == peer_id) {
            return Err(ValidationError::UnknownPeer(peer_id.to_string()).into());
        }

        session.select(peer_id);
        self.transcript = TranscriptView::default();
        self.surface.render_transcript(&self.transcript);
        self.redraw_roster();
        self.surface.set_send_form_visible(true);

        self.render_transcript(peer_id).await
    }

    /// Load the history with `peer_id` and replace the transcript with it
    pub async fn render_transcript(&mut self, peer_id: &str) -> Result<()> {
        let own_id = self
            .session
            .as_ref()
            .ok_or(ValidationError::NotConnected)?
            .nickname()
            .to_string();

        let history = self
            .directory
            .conversation(&own_id, peer_id)
            .await
            .with_context(|| format!("Failed to load conversation with {peer_id}"))?;

        self.transcript = render_transcript(&history, &own_id);
        self.surface.render_transcript(&self.transcript);
        self.surface.scroll_to_latest();
        Ok(())
    }

    /// Handle one delivery from either subscription.
    ///
    /// The roster is refreshed first so presence changes show up. A body
    /// that is neither a chat message nor a presence update is skipped and
    /// returned as an error.
    pub async fn on_message_received(&mut self, delivery: &Delivery) -> Result<()> {
        if self.session.is_none() {
            tracing::debug!(destination = %delivery.destination, "Dropping delivery without a session");
            return Ok(());
        }

        if let Err(e) = self.refresh_roster().await {
            tracing::warn!(error = %e, "Roster refresh failed");
        }

        let event = parse_bus_event(&delivery.body).map_err(|e| {
            tracing::warn!(destination = %delivery.destination, error = %e, "Skipping malformed payload");
            e.context(format!("Malformed payload on {}", delivery.destination))
        })?;

        match event {
            BusEvent::Chat(message) => self.on_chat(message),
            BusEvent::Presence(user) => {
                tracing::debug!(nickname = %user.nick_name, status = ?user.status, "Presence");
            }
        }
        Ok(())
    }

    fn on_chat(&mut self, message: ChatMessage) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let sender = message.sender_id.as_str();

        match session.selected_peer() {
            Some(peer) if peer == sender => {
                let line = TranscriptLine::from_message(&message, session.nickname());
                self.surface.append_message(&line);
                self.surface.scroll_to_latest();
                self.transcript.lines.push(line);
            }
            Some(_) => self.mark_unread(sender),
            None => {
                self.surface.set_send_form_visible(false);
                self.mark_unread(sender);
            }
        }
    }

    fn mark_unread(&mut self, sender: &str) {
        if !self.roster.iter().any(|user| user.nick_name == sender) {
            tracing::debug!(sender = %sender, "Message from user outside the roster");
            return;
        }
        if let Some(session) = self.session.as_mut() {
            session.mark_unread(sender);
        }
        self.redraw_roster();
    }

    /// Send `content` to the selected peer and show it right away
    pub async fn send_message(&mut self, content: &str) -> Result<()> {
        let content = content.trim();
        if content.is_empty() {
            return Err(ValidationError::EmptyMessage.into());
        }

        let (Link::Live(bus), Some(session)) = (&mut self.link, &self.session) else {
            return Err(ValidationError::NotConnected.into());
        };
        let peer = session
            .selected_peer()
            .ok_or(ValidationError::NoPeerSelected)?;

        let message = ChatMessage::outgoing(session.nickname(), peer, content, Utc::now());
        let body = serde_json::to_string(&message).context("Failed to encode chat message")?;
        bus.publish(destination::CHAT, body).await?;

        let line = TranscriptLine::from_message(&message, session.nickname());
        self.surface.append_message(&line);
        self.transcript.lines.push(line);
        self.surface.clear_input();
        self.surface.scroll_to_latest();
        Ok(())
    }

    /// Wait for the next bus delivery. Never resolves while disconnected.
    pub async fn next_delivery(&mut self) -> Option<Result<Delivery>> {
        match &mut self.link {
            Link::Live(bus) => bus.next_delivery().await,
            Link::Idle | Link::Pending => std::future::pending().await,
        }
    }

    /// The broker went away underneath us
    pub fn on_connection_lost(&mut self) {
        tracing::warn!("Bus connection lost");
        self.link = Link::Idle;
        self.reset();
        self.surface.show_notice(Some(Notice::ConnectionLost));
    }

    /// Announce that we are leaving and return to the login screen.
    ///
    /// Delivery of the announcement is best effort; the local reset always
    /// happens.
    pub async fn logout(&mut self) {
        let link = std::mem::replace(&mut self.link, Link::Idle);

        if let (Link::Live(mut bus), Some(session)) = (link, &self.session) {
            match serde_json::to_string(&session.presence(Status::Offline)) {
                Ok(body) => {
                    if let Err(e) = bus.publish(destination::DISCONNECT_USER, body).await {
                        tracing::warn!(error = %e, "Failed to announce logout");
                    }
                }
                Err(e) => tracing::warn!(error = %e, "Failed to encode presence"),
            }
            if let Err(e) = bus.disconnect().await {
                tracing::debug!(error = %e, "Disconnect was not clean");
            }
            tracing::info!(nickname = %session.nickname(), "Logged out");
        }

        self.reset();
    }

    fn reset(&mut self) {
        self.session = None;
        self.roster.clear();
        self.transcript = TranscriptView::default();
        self.surface.show_login();
    }
}

/// Subscribe to our queue and the presence topic, then announce ourselves
async fn join<B: Bus>(bus: &mut B, session: &Session) -> Result<()> {
    bus.subscribe(&destination::private_queue(session.nickname()))
        .await?;
    bus.subscribe(destination::PUBLIC).await?;

    let presence = serde_json::to_string(&session.presence(Status::Online))
        .context("Failed to encode presence")?;
    bus.publish(destination::ADD_USER, presence).await
}
