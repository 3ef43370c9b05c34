//! Focus-serialized execution of operator actions.
//!
//! The host applies user-scoped commands to whichever world is currently
//! focused, so every such action is preceded by `focus <index>` and a wait for
//! that focus to take effect. Every action, focused or not, ends with a
//! delayed refresh of the data it changed.
//!
//! Sequences are mutually exclusive: the executor owns a single FIFO slot and
//! only one focus/act/refresh sequence is ever in flight.

use std::{fmt, sync::Arc, time::Duration};

use tokio::sync::{Mutex, mpsc};

use crate::{
    dispatcher::FRIEND_REQUESTS_COMMAND,
    domain::Role,
    error::ClientError,
    protocol::OutboundMessage,
    scheduler::LIST_BANS_COMMAND,
    transport::CommandSink,
};

pub const FOCUS_SETTLE_DELAY: Duration = Duration::from_millis(500);
pub const REFRESH_DELAY: Duration = Duration::from_millis(1000);
pub const FOCUS_ACK_TIMEOUT: Duration = Duration::from_millis(2000);

/// How the executor decides a focus change has been applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusSync {
    /// Wait a fixed delay; for hosts that never confirm focus changes
    Settle(Duration),
    /// Wait for a `focus_ack` naming the world, failing after `timeout`
    Acknowledged { timeout: Duration },
}

impl Default for FocusSync {
    fn default() -> Self {
        FocusSync::Settle(FOCUS_SETTLE_DELAY)
    }
}

/// Action on a user inside a specific world
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserAction {
    Kick,
    Respawn,
    Silence,
    Unsilence,
    SetRole(Role),
}

impl UserAction {
    fn command(&self, username: &str) -> String {
        match self {
            UserAction::Kick => format!("kick {}", username),
            UserAction::Respawn => format!("respawn {}", username),
            UserAction::Silence => format!("silence {}", username),
            UserAction::Unsilence => format!("unsilence {}", username),
            UserAction::SetRole(role) => format!("role {} {}", username, role),
        }
    }
}

/// Action addressed by username alone
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GlobalAction {
    Ban(String),
    Unban(String),
    AcceptFriendRequest(String),
    DenyFriendRequest(String),
}

/// Lifecycle action on a world, addressed by session id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorldAction {
    Restart,
    Save,
    Close,
}

impl WorldAction {
    fn verb(&self) -> &'static str {
        match self {
            WorldAction::Restart => "restart",
            WorldAction::Save => "save",
            WorldAction::Close => "close",
        }
    }
}

/// Anything the executor can run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    User {
        world_index: usize,
        username: String,
        action: UserAction,
    },
    Global(GlobalAction),
    World {
        session_id: String,
        action: WorldAction,
    },
}

impl Action {
    pub fn user(world_index: usize, username: impl Into<String>, action: UserAction) -> Self {
        Action::User {
            world_index,
            username: username.into(),
            action,
        }
    }

    pub fn world(session_id: impl Into<String>, action: WorldAction) -> Self {
        Action::World {
            session_id: session_id.into(),
            action,
        }
    }

    /// World to focus first, if the action is user-scoped
    pub fn focus_target(&self) -> Option<usize> {
        match self {
            Action::User { world_index, .. } => Some(*world_index),
            _ => None,
        }
    }

    pub fn command(&self) -> String {
        match self {
            Action::User {
                username, action, ..
            } => action.command(username),
            Action::Global(GlobalAction::Ban(username)) => format!("banByName {}", username),
            Action::Global(GlobalAction::Unban(username)) => format!("unbanByName {}", username),
            Action::Global(GlobalAction::AcceptFriendRequest(username)) => {
                format!("acceptFriendRequest {}", username)
            }
            Action::Global(GlobalAction::DenyFriendRequest(username)) => {
                format!("denyFriend {}", username)
            }
            Action::World { session_id, action } => format!("{} {}", action.verb(), session_id),
        }
    }

    /// Request that reconciles the view after the action took effect
    pub fn refresh(&self) -> OutboundMessage {
        match self {
            Action::User { .. } | Action::World { .. } => OutboundMessage::GetWorlds,
            Action::Global(GlobalAction::Ban(_) | GlobalAction::Unban(_)) => {
                OutboundMessage::command(LIST_BANS_COMMAND)
            }
            Action::Global(
                GlobalAction::AcceptFriendRequest(_) | GlobalAction::DenyFriendRequest(_),
            ) => OutboundMessage::command(FRIEND_REQUESTS_COMMAND),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.focus_target() {
            Some(world_index) => write!(f, "{} (world {})", self.command(), world_index),
            None => f.write_str(&self.command()),
        }
    }
}

struct FocusSlot {
    acks: mpsc::UnboundedReceiver<usize>,
    focused: Option<usize>,
}

/// Runs actions one at a time against the host's single focus
pub struct FocusExecutor {
    sink: Arc<dyn CommandSink>,
    sync: FocusSync,
    refresh_delay: Duration,
    slot: Mutex<FocusSlot>,
    ack_tx: mpsc::UnboundedSender<usize>,
}

impl FocusExecutor {
    pub fn new(sink: Arc<dyn CommandSink>, sync: FocusSync, refresh_delay: Duration) -> Self {
        let (ack_tx, acks) = mpsc::unbounded_channel();
        Self {
            sink,
            sync,
            refresh_delay,
            slot: Mutex::new(FocusSlot {
                acks,
                focused: None,
            }),
            ack_tx,
        }
    }

    /// Record a `focus_ack` from the host
    pub fn acknowledge_focus(&self, world_index: usize) {
        // The receiver lives in `self.slot`, so this cannot fail.
        let _ = self.ack_tx.send(world_index);
    }

    /// World most recently focused by a completed focus step
    pub async fn focused_world(&self) -> Option<usize> {
        self.slot.lock().await.focused
    }

    /// Run one action sequence, waiting for any sequence already in flight
    ///
    /// # Errors
    ///
    /// - [`ClientError::ChannelClosed`] if the channel is not open when the
    ///   sequence starts; nothing is sent.
    /// - [`ClientError::FocusTimeout`] if an acknowledged focus is not
    ///   confirmed in time; the action itself is not sent.
    pub async fn execute(&self, action: Action) -> Result<(), ClientError> {
        let mut slot = self.slot.lock().await;

        if !self.sink.is_open() {
            tracing::warn!("Not running '{}': channel is not connected", action);
            return Err(ClientError::ChannelClosed);
        }

        if let Some(world_index) = action.focus_target() {
            self.focus(&mut slot, world_index).await?;
        }

        tracing::info!("Running '{}'", action);
        self.sink.send(&OutboundMessage::command(action.command()));

        tokio::time::sleep(self.refresh_delay).await;
        self.sink.send(&action.refresh());

        Ok(())
    }

    async fn focus(&self, slot: &mut FocusSlot, world_index: usize) -> Result<(), ClientError> {
        // Acks that arrived outside a sequence belong to nobody.
        while slot.acks.try_recv().is_ok() {}

        self.sink.send(&OutboundMessage::command(format!("focus {}", world_index)));

        match self.sync {
            FocusSync::Settle(delay) => tokio::time::sleep(delay).await,
            FocusSync::Acknowledged { timeout } => {
                let acks = &mut slot.acks;
                let confirmed = tokio::time::timeout(timeout, async {
                    while let Some(acked) = acks.recv().await {
                        if acked == world_index {
                            return true;
                        }
                        tracing::debug!("Ignoring focus_ack for world {}", acked);
                    }
                    false
                })
                .await;

                if !matches!(confirmed, Ok(true)) {
                    slot.focused = None;
                    tracing::warn!(
                        "World {} focus not acknowledged within {:?}",
                        world_index,
                        timeout
                    );
                    return Err(ClientError::FocusTimeout {
                        world_index,
                        waited: timeout,
                    });
                }
            }
        }

        slot.focused = Some(world_index);
        Ok(())
    }
}
