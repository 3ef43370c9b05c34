//! Periodic refresh timers, one per purpose.

use std::{collections::HashMap, fmt, str::FromStr, sync::Arc, time::Duration};

use tokio::{
    task::JoinHandle,
    time::{Instant, MissedTickBehavior},
};

use crate::{
    dispatcher::FRIEND_REQUESTS_COMMAND,
    protocol::OutboundMessage,
    transport::CommandSink,
};

/// Command that lists current bans
pub const LIST_BANS_COMMAND: &str = "listbans";

/// What a periodic timer refreshes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PollPurpose {
    Status,
    Worlds,
    FriendRequests,
    Bans,
}

impl PollPurpose {
    pub const ALL: [PollPurpose; 4] = [
        PollPurpose::Status,
        PollPurpose::Worlds,
        PollPurpose::FriendRequests,
        PollPurpose::Bans,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PollPurpose::Status => "status",
            PollPurpose::Worlds => "worlds",
            PollPurpose::FriendRequests => "friend_requests",
            PollPurpose::Bans => "bans",
        }
    }

    /// Requests emitted on every tick, in order
    ///
    /// A status tick is the dashboard refresh and asks for worlds as well.
    pub fn requests(&self) -> Vec<OutboundMessage> {
        match self {
            PollPurpose::Status => vec![OutboundMessage::GetStatus, OutboundMessage::GetWorlds],
            PollPurpose::Worlds => vec![OutboundMessage::GetWorlds],
            PollPurpose::FriendRequests => {
                vec![OutboundMessage::command(FRIEND_REQUESTS_COMMAND)]
            }
            PollPurpose::Bans => vec![OutboundMessage::command(LIST_BANS_COMMAND)],
        }
    }
}

impl fmt::Display for PollPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PollPurpose {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "status" => Ok(PollPurpose::Status),
            "worlds" => Ok(PollPurpose::Worlds),
            "friend_requests" | "friends" | "requests" => Ok(PollPurpose::FriendRequests),
            "bans" => Ok(PollPurpose::Bans),
            other => Err(format!("Unknown poll purpose '{}'", other)),
        }
    }
}

/// Valid interval range for one purpose, in seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntervalBounds {
    pub min_secs: u64,
    pub max_secs: u64,
    /// Granularity; clamped values are rounded down to a multiple of this
    pub step_secs: u64,
}

impl IntervalBounds {
    pub const fn new(min_secs: u64, max_secs: u64, step_secs: u64) -> Self {
        Self {
            min_secs,
            max_secs,
            step_secs,
        }
    }

    pub fn clamp(&self, secs: u64) -> u64 {
        let clamped = secs.clamp(self.min_secs, self.max_secs);
        let step = self.step_secs.max(1);
        (clamped - clamped % step).max(self.min_secs)
    }
}

/// Interval bounds for every purpose
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollLimits {
    pub status: IntervalBounds,
    pub worlds: IntervalBounds,
    pub friend_requests: IntervalBounds,
    pub bans: IntervalBounds,
}

impl Default for PollLimits {
    fn default() -> Self {
        Self {
            status: IntervalBounds::new(5, 60, 1),
            worlds: IntervalBounds::new(5, 60, 1),
            friend_requests: IntervalBounds::new(60, 3600, 60),
            bans: IntervalBounds::new(10, 3600, 1),
        }
    }
}

impl PollLimits {
    pub fn bounds(&self, purpose: PollPurpose) -> IntervalBounds {
        match purpose {
            PollPurpose::Status => self.status,
            PollPurpose::Worlds => self.worlds,
            PollPurpose::FriendRequests => self.friend_requests,
            PollPurpose::Bans => self.bans,
        }
    }
}

struct ActiveTimer {
    interval_secs: u64,
    task: JoinHandle<()>,
}

/// Owns at most one repeating timer per [`PollPurpose`]
pub struct PollScheduler {
    sink: Arc<dyn CommandSink>,
    limits: PollLimits,
    timers: HashMap<PollPurpose, ActiveTimer>,
}

impl PollScheduler {
    pub fn new(sink: Arc<dyn CommandSink>, limits: PollLimits) -> Self {
        Self {
            sink,
            limits,
            timers: HashMap::new(),
        }
    }

    /// Install or replace the timer for `purpose`
    ///
    /// The value is clamped to the purpose's bounds. Setting the interval a
    /// timer already runs at is a no-op. Returns the applied interval.
    pub fn set_interval(&mut self, purpose: PollPurpose, seconds: u64) -> u64 {
        let seconds = self.limits.bounds(purpose).clamp(seconds);

        if let Some(active) = self.timers.get(&purpose)
            && active.interval_secs == seconds
        {
            tracing::debug!("Interval for {} unchanged ({}s)", purpose, seconds);
            return seconds;
        }

        // Cancel before installing so two timers never coexist.
        if let Some(previous) = self.timers.remove(&purpose) {
            previous.task.abort();
        }

        let task = tokio::spawn(tick_loop(
            self.sink.clone(),
            purpose,
            Duration::from_secs(seconds),
        ));
        self.timers.insert(
            purpose,
            ActiveTimer {
                interval_secs: seconds,
                task,
            },
        );
        tracing::info!("Polling {} every {}s", purpose, seconds);

        seconds
    }

    /// Current interval for `purpose`, if a timer is installed
    pub fn interval(&self, purpose: PollPurpose) -> Option<u64> {
        self.timers.get(&purpose).map(|t| t.interval_secs)
    }

    /// Cancel the timer for `purpose`; returns whether one was installed
    pub fn stop(&mut self, purpose: PollPurpose) -> bool {
        match self.timers.remove(&purpose) {
            Some(timer) => {
                timer.task.abort();
                tracing::info!("Stopped polling {}", purpose);
                true
            }
            None => false,
        }
    }

    /// Number of installed timers
    pub fn active_count(&self) -> usize {
        self.timers.len()
    }

    /// Cancel every timer
    pub fn shutdown(&mut self) {
        for (_, timer) in self.timers.drain() {
            timer.task.abort();
        }
    }
}

impl Drop for PollScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn tick_loop(sink: Arc<dyn CommandSink>, purpose: PollPurpose, period: Duration) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        if !sink.is_open() {
            tracing::trace!("Skipping {} tick while disconnected", purpose);
            continue;
        }
        for request in purpose.requests() {
            sink.send(&request);
        }
    }
}
