//! Latest-known view of the remote host.
//!
//! [`reconcile`] is a pure function: it never mutates the previous view and
//! lists are always replaced wholesale.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use crate::{
    domain::{BanEntry, WorldSnapshot},
    protocol::StatusPayload,
};

/// Coarse health of the host derived from a status report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Health {
    Running,
    Stopped,
    Errored,
    Pending,
}

/// Last status report and when it arrived
#[derive(Debug, Clone, PartialEq)]
pub struct StatusSnapshot {
    pub report: StatusPayload,
    pub received_at: DateTime<Utc>,
}

impl StatusSnapshot {
    pub fn health(&self) -> Health {
        if self.report.error.is_some() {
            return Health::Errored;
        }
        match self
            .report
            .status
            .as_deref()
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("running") => Health::Running,
            Some("stopped" | "exited") => Health::Stopped,
            _ => Health::Pending,
        }
    }
}

/// Friend requests the operator dismissed locally
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeniedSet(BTreeSet<String>);

impl DeniedSet {
    pub fn new(names: BTreeSet<String>) -> Self {
        Self(names)
    }

    pub fn contains(&self, username: &str) -> bool {
        self.0.contains(username)
    }

    /// Returns whether the name was newly added
    pub fn insert(&mut self, username: impl Into<String>) -> bool {
        self.0.insert(username.into())
    }

    pub fn remove(&mut self, username: &str) -> bool {
        self.0.remove(username)
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn names(&self) -> &BTreeSet<String> {
        &self.0
    }

    /// Keep only the requests that were not denied, preserving order
    pub fn filter(&self, requests: Vec<String>) -> Vec<String> {
        requests
            .into_iter()
            .filter(|name| !self.contains(name))
            .collect()
    }
}

/// Everything the presenter renders
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionView {
    pub status: Option<StatusSnapshot>,
    pub worlds: Vec<WorldSnapshot>,
    pub bans: Vec<BanEntry>,
    pub friend_requests: Vec<String>,
}

/// Snapshot-carrying events
#[derive(Debug, Clone, PartialEq)]
pub enum ViewEvent {
    Status(StatusSnapshot),
    Worlds(Vec<WorldSnapshot>),
    Bans(Vec<BanEntry>),
    FriendRequests(Vec<String>),
}

/// Section of the view an event touched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewSection {
    Status,
    Worlds,
    Bans,
    FriendRequests,
}

impl ViewEvent {
    pub fn section(&self) -> ViewSection {
        match self {
            ViewEvent::Status(_) => ViewSection::Status,
            ViewEvent::Worlds(_) => ViewSection::Worlds,
            ViewEvent::Bans(_) => ViewSection::Bans,
            ViewEvent::FriendRequests(_) => ViewSection::FriendRequests,
        }
    }
}

/// Fold one event into the view
pub fn reconcile(previous: &SessionView, event: ViewEvent, denied: &DeniedSet) -> SessionView {
    let mut next = previous.clone();
    match event {
        ViewEvent::Status(status) => next.status = Some(status),
        ViewEvent::Worlds(worlds) => next.worlds = worlds,
        ViewEvent::Bans(bans) => next.bans = bans,
        ViewEvent::FriendRequests(requests) => next.friend_requests = denied.filter(requests),
    }
    next
}

/// Drop one username from the visible friend requests
pub fn without_friend_request(previous: &SessionView, username: &str) -> SessionView {
    let mut next = previous.clone();
    next.friend_requests.retain(|name| name != username);
    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Role, UserEntry};
    use headcon_shared::time::{Clock, FixedClock};

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn world(name: &str, users: &[&str]) -> WorldSnapshot {
        WorldSnapshot {
            session_id: format!("S-{}", name),
            name: name.to_string(),
            users: users.len() as u32,
            max_users: 16,
            user_list: users
                .iter()
                .map(|u| UserEntry {
                    username: u.to_string(),
                    role: Role::Guest.into(),
                    present: true,
                    ping: Some(20.0),
                    fps: Some(60.0),
                    silenced: false,
                })
                .collect(),
            ..WorldSnapshot::default()
        }
    }

    #[test]
    fn test_denied_requests_are_filtered() {
        // テスト項目: 拒否リストに含まれるユーザーはフレンド申請一覧から除外される
        // given (前提条件):
        let mut denied = DeniedSet::default();
        denied.insert("B");
        let view = SessionView::default();

        // when (操作):
        let next = reconcile(
            &view,
            ViewEvent::FriendRequests(names(&["A", "B", "C"])),
            &denied,
        );

        // then (期待する結果):
        assert_eq!(next.friend_requests, names(&["A", "C"]));
    }

    #[test]
    fn test_denying_persists_across_refreshes() {
        // テスト項目: A を拒否した後は同じ申請一覧が届いても C のみ表示される
        // given (前提条件):
        let mut denied = DeniedSet::default();
        denied.insert("B");
        let view = reconcile(
            &SessionView::default(),
            ViewEvent::FriendRequests(names(&["A", "B", "C"])),
            &denied,
        );

        // when (操作):
        denied.insert("A");
        let hidden = without_friend_request(&view, "A");
        let refreshed = reconcile(
            &hidden,
            ViewEvent::FriendRequests(names(&["A", "B", "C"])),
            &denied,
        );

        // then (期待する結果):
        assert_eq!(hidden.friend_requests, names(&["C"]));
        assert_eq!(refreshed.friend_requests, names(&["C"]));
    }

    #[test]
    fn test_identical_world_list_is_idempotent() {
        // テスト項目: 同一のワールド一覧で置き換えても表示は変わらない
        // given (前提条件):
        let worlds = vec![world("Hub", &["alice"]), world("Lab", &["bob", "carol"])];
        let denied = DeniedSet::default();
        let first = reconcile(
            &SessionView::default(),
            ViewEvent::Worlds(worlds.clone()),
            &denied,
        );

        // when (操作):
        let second = reconcile(&first, ViewEvent::Worlds(worlds), &denied);

        // then (期待する結果):
        assert_eq!(first, second);
    }

    #[test]
    fn test_world_list_is_replaced_wholesale() {
        // テスト項目: ワールド一覧は差分ではなく丸ごと置き換えられる
        // given (前提条件):
        let denied = DeniedSet::default();
        let view = reconcile(
            &SessionView::default(),
            ViewEvent::Worlds(vec![world("Hub", &["alice"]), world("Lab", &[])]),
            &denied,
        );

        // when (操作):
        let next = reconcile(&view, ViewEvent::Worlds(vec![world("Arena", &[])]), &denied);

        // then (期待する結果):
        assert_eq!(next.worlds.len(), 1);
        assert_eq!(next.worlds[0].name, "Arena");
        // 元のビューは変更されない
        assert_eq!(view.worlds.len(), 2);
    }

    #[test]
    fn test_ban_list_replacement_leaves_other_sections() {
        // テスト項目: BAN リストの更新は他のセクションに影響しない
        // given (前提条件):
        let denied = DeniedSet::default();
        let view = reconcile(
            &SessionView::default(),
            ViewEvent::Worlds(vec![world("Hub", &[])]),
            &denied,
        );
        let bans = vec![BanEntry {
            username: "eve".to_string(),
            user_id: "U-eve".to_string(),
        }];

        // when (操作):
        let next = reconcile(&view, ViewEvent::Bans(bans.clone()), &denied);

        // then (期待する結果):
        assert_eq!(next.bans, bans);
        assert_eq!(next.worlds, view.worlds);
    }

    #[test]
    fn test_status_health_classification() {
        // テスト項目: ステータスの文字列とエラー有無から稼働状態が判定される
        // given (前提条件):
        let received_at = FixedClock::from_millis(0).now();
        let snapshot = |status: Option<&str>, error: Option<&str>| StatusSnapshot {
            report: StatusPayload {
                status: status.map(str::to_string),
                error: error.map(str::to_string),
                ..StatusPayload::default()
            },
            received_at,
        };

        // when (操作):
        let cases = [
            snapshot(Some("Running"), None).health(),
            snapshot(Some("exited"), None).health(),
            snapshot(Some("stopped"), None).health(),
            snapshot(Some("restarting"), None).health(),
            snapshot(None, Some("No such container")).health(),
        ];

        // then (期待する結果):
        assert_eq!(
            cases,
            [
                Health::Running,
                Health::Stopped,
                Health::Stopped,
                Health::Pending,
                Health::Errored
            ]
        );
    }

    #[test]
    fn test_denied_set_clear_restores_requests() {
        // テスト項目: 拒否リストをクリアすると次回の更新で申請が再表示される
        // given (前提条件):
        let mut denied = DeniedSet::default();
        denied.insert("A");
        let view = reconcile(
            &SessionView::default(),
            ViewEvent::FriendRequests(names(&["A"])),
            &denied,
        );

        // when (操作):
        denied.clear();
        let next = reconcile(&view, ViewEvent::FriendRequests(names(&["A"])), &denied);

        // then (期待する結果):
        assert!(view.friend_requests.is_empty());
        assert_eq!(next.friend_requests, names(&["A"]));
        assert!(denied.is_empty());
    }
}
