//! Inbound frame decoding and routing.
//!
//! Every text frame is decoded into an [`InboundMessage`] and turned into zero
//! or more [`Route`]s. The dispatcher never fails: malformed frames become a
//! console error line and unknown message types are dropped.

use serde::Deserialize;
use serde_json::Value;

use crate::{
    domain::{BanEntry, WorldSnapshot},
    error::ClientError,
    protocol::{InboundMessage, StatusPayload},
};

/// Command whose textual response lists pending friend requests
pub const FRIEND_REQUESTS_COMMAND: &str = "friendRequests";

/// Category of a console line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleKind {
    /// Streamed output of the remote host
    Output,
    /// Echo of a command typed by the operator
    Command,
    /// Response to a command
    Response,
    /// Local or remote error
    Error,
}

/// One line destined for the operator console
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleLine {
    pub kind: ConsoleKind,
    pub text: String,
}

impl ConsoleLine {
    pub fn new(kind: ConsoleKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self::new(ConsoleKind::Error, text)
    }
}

/// Destination of a decoded message
#[derive(Debug, Clone, PartialEq)]
pub enum Route {
    Console(ConsoleLine),
    Status(StatusPayload),
    Worlds(Vec<WorldSnapshot>),
    Bans(Vec<BanEntry>),
    FriendRequests(Vec<String>),
    FocusAck(usize),
}

/// Extracts pending friend-request usernames from a command's text output
pub trait FriendRequestParser: Send + Sync {
    fn parse(&self, output: &str) -> Vec<String>;
}

/// Scrapes the host's human-readable `friendRequests` listing.
///
/// The first line echoes the command; blank lines and prompt lines (`>`)
/// are noise. Every other line is a username.
#[derive(Debug, Clone, Copy, Default)]
pub struct PromptScrapingParser;

impl FriendRequestParser for PromptScrapingParser {
    fn parse(&self, output: &str) -> Vec<String> {
        output
            .split('\n')
            .skip(1)
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.contains('>'))
            .map(str::to_string)
            .collect()
    }
}

/// Decodes frames and decides where each one goes
pub struct Dispatcher {
    parser: Box<dyn FriendRequestParser>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(Box::new(PromptScrapingParser))
    }
}

impl Dispatcher {
    pub fn new(parser: Box<dyn FriendRequestParser>) -> Self {
        Self { parser }
    }

    /// Decode a raw text frame
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Decode`] when the frame is not JSON or a known
    /// message type carries a malformed payload.
    pub fn decode(frame: &str) -> Result<InboundMessage, ClientError> {
        let value: Value =
            serde_json::from_str(frame).map_err(|e| ClientError::Decode(e.to_string()))?;
        let message =
            InboundMessage::deserialize(&value).map_err(|e| ClientError::Decode(e.to_string()))?;

        if message == InboundMessage::Unknown {
            let kind = value.get("type").cloned().unwrap_or_default();
            tracing::debug!("Ignoring unknown message type: {}", kind);
        }

        Ok(message)
    }

    /// Route a raw text frame
    pub fn dispatch(&self, frame: &str) -> Vec<Route> {
        match Self::decode(frame) {
            Ok(message) => self.route(message),
            Err(e) => {
                tracing::warn!("Failed to decode frame: {}", e);
                vec![Route::Console(ConsoleLine::error(e.to_string()))]
            }
        }
    }

    /// Route an already decoded message
    pub fn route(&self, message: InboundMessage) -> Vec<Route> {
        match message {
            InboundMessage::ContainerOutput { output } => {
                vec![Route::Console(ConsoleLine::new(ConsoleKind::Output, output))]
            }
            InboundMessage::CommandResponse { command, output } => {
                let mut routes = Vec::with_capacity(2);
                if command.as_deref() == Some(FRIEND_REQUESTS_COMMAND) {
                    routes.push(Route::FriendRequests(self.parser.parse(&output)));
                }
                if !output.is_empty() {
                    routes.push(Route::Console(ConsoleLine::new(
                        ConsoleKind::Response,
                        output,
                    )));
                }
                routes
            }
            InboundMessage::StatusUpdate { status } => vec![Route::Status(status)],
            InboundMessage::WorldsUpdate { output } => vec![Route::Worlds(output)],
            InboundMessage::BansUpdate { output } => vec![Route::Bans(output)],
            InboundMessage::Error { message } => {
                vec![Route::Console(ConsoleLine::error(
                    ClientError::Remote(message).to_string(),
                ))]
            }
            InboundMessage::FocusAck { world } => vec![Route::FocusAck(world)],
            InboundMessage::Unknown => Vec::new(),
        }
    }
}
