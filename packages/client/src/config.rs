//! Session configuration with defaults for every knob.

use std::time::Duration;

use crate::{
    executor::{FocusSync, REFRESH_DELAY},
    scheduler::{PollLimits, PollPurpose},
    transport::RECONNECT_DELAY,
};

pub const DEFAULT_URL: &str = "ws://127.0.0.1:8000/ws";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// WebSocket endpoint of the backend
    pub url: String,
    pub reconnect_delay: Duration,
    pub limits: PollLimits,
    /// Poll interval installed at start, in seconds; `None` leaves it off
    pub status_interval: Option<u64>,
    pub worlds_interval: Option<u64>,
    pub friend_request_interval: Option<u64>,
    pub ban_interval: Option<u64>,
    pub focus_sync: FocusSync,
    pub refresh_delay: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            reconnect_delay: RECONNECT_DELAY,
            limits: PollLimits::default(),
            status_interval: Some(30),
            // Status ticks already refresh the world list.
            worlds_interval: None,
            friend_request_interval: Some(60),
            ban_interval: Some(60),
            focus_sync: FocusSync::default(),
            refresh_delay: REFRESH_DELAY,
        }
    }
}

impl SessionConfig {
    pub fn initial_interval(&self, purpose: PollPurpose) -> Option<u64> {
        match purpose {
            PollPurpose::Status => self.status_interval,
            PollPurpose::Worlds => self.worlds_interval,
            PollPurpose::FriendRequests => self.friend_request_interval,
            PollPurpose::Bans => self.ban_interval,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_intervals() {
        // テスト項目: デフォルトではワールド以外の定期取得が有効になる
        // given (前提条件):
        let config = SessionConfig::default();

        // when (操作):
        let intervals: Vec<_> = PollPurpose::ALL
            .iter()
            .map(|p| config.initial_interval(*p))
            .collect();

        // then (期待する結果):
        assert_eq!(intervals, vec![Some(30), None, Some(60), Some(60)]);
        assert_eq!(config.focus_sync, FocusSync::default());
    }
}
