//! Persistent WebSocket transport with unconditional reconnection.
//!
//! The transport task owns the socket. Everyone else talks to it through a
//! cloneable [`ChannelHandle`], which only forwards messages while the link is
//! open. Messages sent in any other state are dropped, never queued.

use std::{
    pin::Pin,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use futures_util::{Sink, SinkExt, Stream, StreamExt, future};
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
};
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};

use crate::{error::ClientError, protocol::OutboundMessage};

/// Fixed delay before every reconnect attempt
pub const RECONNECT_DELAY: Duration = Duration::from_secs(1);

pub type FrameSink = Pin<Box<dyn Sink<String, Error = ClientError> + Send>>;
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<String, ClientError>> + Send>>;

/// Opens one connection to the backend
#[async_trait]
pub trait Dialer: Send + Sync {
    async fn dial(&self, url: &str) -> Result<(FrameSink, FrameStream), ClientError>;
}

/// Dialer backed by `tokio-tungstenite`
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketDialer;

#[async_trait]
impl Dialer for WebSocketDialer {
    async fn dial(&self, url: &str) -> Result<(FrameSink, FrameStream), ClientError> {
        let (ws_stream, response) = connect_async(url)
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;
        tracing::debug!("Handshake completed with status {}", response.status());

        let (write, read) = ws_stream.split();

        let sink = write
            .sink_map_err(|e| ClientError::Transport(e.to_string()))
            .with(|text: String| future::ready(Ok::<_, ClientError>(Message::Text(text.into()))));

        let stream = read.filter_map(|message| {
            future::ready(match message {
                Ok(Message::Text(text)) => Some(Ok(text.as_str().to_owned())),
                Ok(Message::Close(_)) => Some(Err(ClientError::Transport(
                    "Server closed the connection".to_string(),
                ))),
                Ok(Message::Binary(data)) => {
                    tracing::debug!("Ignoring binary frame ({} bytes)", data.len());
                    None
                }
                Ok(_) => None,
                Err(e) => Some(Err(ClientError::Transport(e.to_string()))),
            })
        });

        Ok((Box::pin(sink), Box::pin(stream)))
    }
}

/// Observable state of the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed,
}

/// Lifecycle notifications emitted by the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Connection established (`attempt` counts dials since start, from 1)
    Ready { attempt: u64 },
    /// Text frame received
    Frame(String),
    /// Connection lost or handshake failed; a reconnect is scheduled
    Lost { reason: String },
}

#[derive(Debug, Clone)]
enum Link {
    Connecting,
    Open(mpsc::UnboundedSender<String>),
    Closed,
}

impl Link {
    fn state(&self) -> ConnectionState {
        match self {
            Link::Connecting => ConnectionState::Connecting,
            Link::Open(_) => ConnectionState::Open,
            Link::Closed => ConnectionState::Closed,
        }
    }
}

/// Anything outbound commands can be written to
pub trait CommandSink: Send + Sync {
    fn is_open(&self) -> bool;

    /// Send a message; returns `false` when it was dropped
    fn send(&self, message: &OutboundMessage) -> bool;
}

/// Cloneable send-side view of the transport
#[derive(Debug, Clone)]
pub struct ChannelHandle {
    link: watch::Receiver<Link>,
    publisher: Arc<watch::Sender<Link>>,
    reconnects: Arc<AtomicU64>,
}

impl ChannelHandle {
    pub fn state(&self) -> ConnectionState {
        self.link.borrow().state()
    }

    /// Number of reconnect attempts scheduled so far
    pub fn reconnects(&self) -> u64 {
        self.reconnects.load(Ordering::SeqCst)
    }

    /// Wait until the transport reaches `state`
    pub async fn wait_for(&self, state: ConnectionState) {
        let mut link = self.link.clone();
        let _ = link.wait_for(|current| current.state() == state).await;
    }

    /// Publish `Closed` and drop the outbound queue
    ///
    /// An aborted transport task never reaches its own teardown, so whoever
    /// aborts it calls this afterwards.
    pub fn close(&self) {
        self.publisher.send_replace(Link::Closed);
    }
}

impl CommandSink for ChannelHandle {
    fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    fn send(&self, message: &OutboundMessage) -> bool {
        match &*self.link.borrow() {
            Link::Open(tx) => tx.send(message.to_json()).is_ok(),
            other => {
                tracing::debug!("Dropping {:?} while {:?}", message, other.state());
                false
            }
        }
    }
}

/// Owner of the connection; run it with [`TransportChannel::spawn`]
pub struct TransportChannel {
    url: String,
    dialer: Arc<dyn Dialer>,
    reconnect_delay: Duration,
    link: Arc<watch::Sender<Link>>,
    reconnects: Arc<AtomicU64>,
    events: mpsc::UnboundedSender<TransportEvent>,
}

impl TransportChannel {
    /// Start the connect/reconnect loop
    ///
    /// Lifecycle and frames are reported on `events`. The loop ends when the
    /// events receiver is dropped or the returned task is aborted.
    pub fn spawn(
        url: impl Into<String>,
        dialer: Arc<dyn Dialer>,
        reconnect_delay: Duration,
        events: mpsc::UnboundedSender<TransportEvent>,
    ) -> (ChannelHandle, JoinHandle<()>) {
        let (link, link_rx) = watch::channel(Link::Closed);
        let link = Arc::new(link);
        let reconnects = Arc::new(AtomicU64::new(0));
        let handle = ChannelHandle {
            link: link_rx,
            publisher: link.clone(),
            reconnects: reconnects.clone(),
        };

        let transport = Self {
            url: url.into(),
            dialer,
            reconnect_delay,
            link,
            reconnects,
            events,
        };

        (handle, tokio::spawn(transport.run()))
    }

    async fn run(self) {
        let mut attempt = 0u64;

        loop {
            attempt += 1;
            self.link.send_replace(Link::Connecting);
            tracing::info!("Connecting to {} (attempt {})", self.url, attempt);

            let reason = match self.dialer.dial(&self.url).await {
                Ok((sink, stream)) => {
                    let (tx, rx) = mpsc::unbounded_channel();
                    self.link.send_replace(Link::Open(tx));
                    tracing::info!("Connected to {}", self.url);

                    if self.events.send(TransportEvent::Ready { attempt }).is_err() {
                        break;
                    }

                    match self.pump(sink, stream, rx).await {
                        Some(reason) => reason,
                        None => break,
                    }
                }
                Err(e) => e.to_string(),
            };

            self.link.send_replace(Link::Closed);
            tracing::warn!("Connection lost: {}", reason);
            if self.events.send(TransportEvent::Lost { reason }).is_err() {
                break;
            }

            self.reconnects.fetch_add(1, Ordering::SeqCst);
            tracing::info!("Reconnecting in {:?}...", self.reconnect_delay);
            tokio::time::sleep(self.reconnect_delay).await;
        }

        self.link.send_replace(Link::Closed);
        tracing::debug!("Transport loop stopped");
    }

    /// Shuttle frames until the connection drops.
    ///
    /// Returns the loss reason, or `None` when nobody listens for events anymore.
    async fn pump(
        &self,
        mut sink: FrameSink,
        mut stream: FrameStream,
        mut outbound: mpsc::UnboundedReceiver<String>,
    ) -> Option<String> {
        loop {
            tokio::select! {
                frame = stream.next() => match frame {
                    Some(Ok(text)) => {
                        if self.events.send(TransportEvent::Frame(text)).is_err() {
                            return None;
                        }
                    }
                    Some(Err(e)) => return Some(e.to_string()),
                    None => return Some("Connection closed".to_string()),
                },
                message = outbound.recv() => match message {
                    Some(text) => {
                        if let Err(e) = sink.send(text).await {
                            return Some(e.to_string());
                        }
                    }
                    None => return Some("Outbound channel closed".to_string()),
                },
            }
        }
    }
}
