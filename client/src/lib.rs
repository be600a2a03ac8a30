//! Chat client for a STOMP-over-websocket chat server.
//!
//! [`ChatController`] owns the session and does the talking: it opens the
//! bus through a [`Connector`], queries a [`Directory`] for the roster and
//! conversation history, and draws everything on a [`Surface`].
//!
//! ```ignore
//! let config = ClientConfig::new("http://localhost:8080")?;
//! let mut controller = ChatController::new(
//!     StompConnector::new(&config)?,
//!     HttpDirectory::new(config),
//!     TerminalSurface::new(std::io::stdout()),
//! );
//! controller.connect("alice", "Alice Liddell").await?;
//! ```

mod bus;
mod config;
mod connection;
mod controller;
mod directory;
mod error;
mod session;
mod terminal;
pub mod view;

pub use chatline_protocol::{BusEvent, ChatMessage, Delivery, Status, User, destination};

pub use bus::{Bus, Connector, StompBus, StompConnector};
pub use config::{ClientConfig, DEFAULT_SERVER_URL};
pub use connection::Connection;
pub use controller::ChatController;
pub use directory::{Directory, HttpDirectory};
pub use error::{ValidationError, user_message};
pub use session::{ConnectionState, Session};
pub use terminal::TerminalSurface;
pub use view::{Notice, Surface};
