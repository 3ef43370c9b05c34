//! One operator session against the backend.
//!
//! [`Session`] owns the transport, the event loop, the poll timers and the
//! executor. Dropping it or calling [`Session::shutdown`] tears all of them
//! down.

use std::sync::Arc;

use tokio::{
    sync::{Mutex, mpsc},
    task::JoinHandle,
};

use headcon_shared::time::{Clock, SystemClock};

use crate::{
    config::SessionConfig,
    dispatcher::{ConsoleKind, ConsoleLine, Dispatcher, Route},
    error::ClientError,
    executor::{Action, FocusExecutor, GlobalAction, UserAction, WorldAction},
    protocol::OutboundMessage,
    reconciler::{
        DeniedSet, SessionView, StatusSnapshot, ViewEvent, ViewSection, reconcile,
        without_friend_request,
    },
    scheduler::{PollPurpose, PollScheduler},
    store::{PreferenceStore, Preferences},
    transport::{
        ChannelHandle, CommandSink, ConnectionState, Dialer, TransportChannel, TransportEvent,
    },
};

/// Where the session reports what the operator should see
pub trait Presenter: Send + Sync {
    fn console(&self, line: &ConsoleLine);

    /// Called after `section` of the view was replaced
    fn view_changed(&self, section: ViewSection, view: &SessionView);

    fn connection_changed(&self, state: ConnectionState);
}

struct SessionState {
    view: Mutex<SessionView>,
    denied: Mutex<DeniedSet>,
    presenter: Arc<dyn Presenter>,
}

impl SessionState {
    async fn apply(&self, event: ViewEvent) {
        let section = event.section();
        let next = {
            let denied = self.denied.lock().await;
            let mut view = self.view.lock().await;
            *view = reconcile(&view, event, &denied);
            view.clone()
        };
        self.presenter.view_changed(section, &next);
    }

    async fn hide_friend_request(&self, username: &str) {
        let next = {
            let mut view = self.view.lock().await;
            *view = without_friend_request(&view, username);
            view.clone()
        };
        self.presenter.view_changed(ViewSection::FriendRequests, &next);
    }
}

pub struct Session {
    channel: ChannelHandle,
    executor: Arc<FocusExecutor>,
    scheduler: Mutex<PollScheduler>,
    preferences: Preferences,
    state: Arc<SessionState>,
    transport_task: JoinHandle<()>,
    event_task: JoinHandle<()>,
}

impl Session {
    /// Connect and start polling with the system clock
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(
        config: SessionConfig,
        dialer: Arc<dyn Dialer>,
        store: Arc<dyn PreferenceStore>,
        presenter: Arc<dyn Presenter>,
    ) -> Self {
        Self::start_with_clock(config, dialer, store, presenter, Arc::new(SystemClock))
    }

    pub fn start_with_clock(
        config: SessionConfig,
        dialer: Arc<dyn Dialer>,
        store: Arc<dyn PreferenceStore>,
        presenter: Arc<dyn Presenter>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let preferences = Preferences::new(store);
        let denied = preferences.load_denied().unwrap_or_else(|e| {
            tracing::warn!("Starting with an empty denied list: {}", e);
            Default::default()
        });

        let state = Arc::new(SessionState {
            view: Mutex::new(SessionView::default()),
            denied: Mutex::new(DeniedSet::new(denied)),
            presenter,
        });

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (channel, transport_task) = TransportChannel::spawn(
            config.url.clone(),
            dialer,
            config.reconnect_delay,
            events_tx,
        );

        let sink: Arc<dyn CommandSink> = Arc::new(channel.clone());
        let executor = Arc::new(FocusExecutor::new(
            sink.clone(),
            config.focus_sync,
            config.refresh_delay,
        ));

        let mut scheduler = PollScheduler::new(sink.clone(), config.limits);
        for purpose in PollPurpose::ALL {
            if let Some(seconds) = config.initial_interval(purpose) {
                scheduler.set_interval(purpose, seconds);
            }
        }

        let event_task = tokio::spawn(run_event_loop(
            events_rx,
            sink,
            Dispatcher::default(),
            executor.clone(),
            state.clone(),
            clock,
        ));

        Self {
            channel,
            executor,
            scheduler: Mutex::new(scheduler),
            preferences,
            state,
            transport_task,
            event_task,
        }
    }

    /// Send a raw console command, echoing it to the console
    ///
    /// # Errors
    ///
    /// [`ClientError::ChannelClosed`] when the command was dropped because
    /// the channel is not open.
    pub fn send_command(&self, text: &str) -> Result<(), ClientError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(());
        }
        if !self.channel.send(&OutboundMessage::command(text)) {
            return Err(ClientError::ChannelClosed);
        }
        self.state
            .presenter
            .console(&ConsoleLine::new(ConsoleKind::Command, text));
        Ok(())
    }

    /// Issue the requests of one poll purpose right now
    pub fn refresh(&self, purpose: PollPurpose) -> Result<(), ClientError> {
        for request in purpose.requests() {
            if !self.channel.send(&request) {
                return Err(ClientError::ChannelClosed);
            }
        }
        Ok(())
    }

    /// Change a poll interval; returns the clamped value applied
    pub async fn set_interval(&self, purpose: PollPurpose, seconds: u64) -> u64 {
        self.scheduler.lock().await.set_interval(purpose, seconds)
    }

    /// Cancel polling for `purpose`; returns whether it was active
    pub async fn stop_polling(&self, purpose: PollPurpose) -> bool {
        self.scheduler.lock().await.stop(purpose)
    }

    pub async fn interval(&self, purpose: PollPurpose) -> Option<u64> {
        self.scheduler.lock().await.interval(purpose)
    }

    pub async fn user_action(
        &self,
        world_index: usize,
        username: &str,
        action: UserAction,
    ) -> Result<(), ClientError> {
        self.executor.execute(Action::user(world_index, username, action)).await
    }

    /// Run a username-addressed action
    ///
    /// Friend-request answers also update the denied list.
    pub async fn global_action(&self, action: GlobalAction) -> Result<(), ClientError> {
        match action {
            GlobalAction::AcceptFriendRequest(username) => {
                self.accept_friend_request(&username).await
            }
            GlobalAction::DenyFriendRequest(username) => self.deny_friend_request(&username).await,
            other => self.executor.execute(Action::Global(other)).await,
        }
    }

    pub async fn world_action(
        &self,
        session_id: &str,
        action: WorldAction,
    ) -> Result<(), ClientError> {
        self.executor.execute(Action::world(session_id, action)).await
    }

    pub async fn accept_friend_request(&self, username: &str) -> Result<(), ClientError> {
        self.update_denied(|denied| denied.remove(username)).await;
        self.state.hide_friend_request(username).await;
        self.executor
            .execute(Action::Global(GlobalAction::AcceptFriendRequest(
                username.to_string(),
            )))
            .await
    }

    /// Deny a request and keep it hidden from later polls
    pub async fn deny_friend_request(&self, username: &str) -> Result<(), ClientError> {
        self.update_denied(|denied| denied.insert(username)).await;
        self.state.hide_friend_request(username).await;
        self.executor
            .execute(Action::Global(GlobalAction::DenyFriendRequest(
                username.to_string(),
            )))
            .await
    }

    /// Forget every denied request; they reappear on the next poll
    pub async fn clear_denied(&self) {
        self.update_denied(|denied| {
            let changed = !denied.is_empty();
            denied.clear();
            changed
        })
        .await;
        // Nothing to re-poll while disconnected; the next tick catches up.
        let _ = self.refresh(PollPurpose::FriendRequests);
    }

    /// Mutate the denied set and persist it when `change` reports a change
    async fn update_denied(&self, change: impl FnOnce(&mut DeniedSet) -> bool) {
        let mut denied = self.state.denied.lock().await;
        if !change(&mut *denied) {
            return;
        }
        if let Err(e) = self.preferences.save_denied(denied.names()) {
            tracing::warn!("Failed to persist denied list: {}", e);
            self.state.presenter.console(&ConsoleLine::error(format!(
                "Denied list not saved: {}",
                e
            )));
        }
    }

    pub async fn view(&self) -> SessionView {
        self.state.view.lock().await.clone()
    }

    pub async fn denied(&self) -> DeniedSet {
        self.state.denied.lock().await.clone()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.channel.state()
    }

    /// Reconnect attempts scheduled since start
    pub fn reconnects(&self) -> u64 {
        self.channel.reconnects()
    }

    pub async fn wait_for(&self, state: ConnectionState) {
        self.channel.wait_for(state).await;
    }

    /// Stop the transport, the event loop and every timer
    pub async fn shutdown(&self) {
        self.scheduler.lock().await.shutdown();
        self.event_task.abort();
        self.transport_task.abort();
        self.channel.close();
        tracing::info!("Session shut down");
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.event_task.abort();
        self.transport_task.abort();
        self.channel.close();
    }
}

async fn run_event_loop(
    mut events: mpsc::UnboundedReceiver<TransportEvent>,
    sink: Arc<dyn CommandSink>,
    dispatcher: Dispatcher,
    executor: Arc<FocusExecutor>,
    state: Arc<SessionState>,
    clock: Arc<dyn Clock>,
) {
    while let Some(event) = events.recv().await {
        match event {
            TransportEvent::Ready { attempt } => {
                tracing::debug!("Channel ready (attempt {})", attempt);
                state.presenter.connection_changed(ConnectionState::Open);
                sink.send(&OutboundMessage::GetStatus);
                sink.send(&OutboundMessage::GetWorlds);
            }
            TransportEvent::Lost { reason } => {
                tracing::debug!("Channel lost: {}", reason);
                state.presenter.connection_changed(ConnectionState::Closed);
            }
            TransportEvent::Frame(frame) => {
                for route in dispatcher.dispatch(&frame) {
                    match route {
                        Route::Console(line) => state.presenter.console(&line),
                        Route::Status(report) => {
                            let snapshot = StatusSnapshot {
                                report,
                                received_at: clock.now(),
                            };
                            state.apply(ViewEvent::Status(snapshot)).await;
                        }
                        Route::Worlds(worlds) => state.apply(ViewEvent::Worlds(worlds)).await,
                        Route::Bans(bans) => state.apply(ViewEvent::Bans(bans)).await,
                        Route::FriendRequests(requests) => {
                            state.apply(ViewEvent::FriendRequests(requests)).await
                        }
                        Route::FocusAck(world_index) => executor.acknowledge_focus(world_index),
                    }
                }
            }
        }
    }
    tracing::debug!("Event loop stopped");
}
