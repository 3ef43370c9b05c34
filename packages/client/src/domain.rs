//! Snapshot types for the remote host's worlds, users and bans.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Permission role of a user inside a world
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Role {
    Spectator,
    Guest,
    Builder,
    Moderator,
    Admin,
}

impl Role {
    pub const ALL: [Role; 5] = [
        Role::Spectator,
        Role::Guest,
        Role::Builder,
        Role::Moderator,
        Role::Admin,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Spectator => "Spectator",
            Role::Guest => "Guest",
            Role::Builder => "Builder",
            Role::Moderator => "Moderator",
            Role::Admin => "Admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a role name is not one of [`Role::ALL`]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown role '{0}'")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownRole(s.to_string()))
    }
}

impl TryFrom<String> for Role {
    type Error = UnknownRole;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.as_str().to_string()
    }
}

/// Role as reported by the host
///
/// Names outside [`Role::ALL`] are kept verbatim so one odd entry does not
/// invalidate the whole world list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Option<String>", into = "String")]
pub enum UserRole {
    Known(Role),
    Other(String),
}

impl Default for UserRole {
    fn default() -> Self {
        UserRole::Other(String::new())
    }
}

impl From<Role> for UserRole {
    fn from(role: Role) -> Self {
        UserRole::Known(role)
    }
}

impl From<Option<String>> for UserRole {
    fn from(value: Option<String>) -> Self {
        match value {
            Some(name) => match name.parse() {
                Ok(role) => UserRole::Known(role),
                Err(_) => UserRole::Other(name),
            },
            None => UserRole::default(),
        }
    }
}

impl From<UserRole> for String {
    fn from(role: UserRole) -> Self {
        match role {
            UserRole::Known(role) => role.into(),
            UserRole::Other(name) => name,
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserRole::Known(role) => role.fmt(f),
            UserRole::Other(name) if name.is_empty() => f.write_str("unknown"),
            UserRole::Other(name) => f.write_str(name),
        }
    }
}

/// A user connected to a world
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserEntry {
    pub username: String,
    #[serde(default)]
    pub role: UserRole,
    #[serde(default)]
    pub present: bool,
    /// Network latency in milliseconds
    #[serde(default)]
    pub ping: Option<f64>,
    #[serde(default)]
    pub fps: Option<f64>,
    #[serde(default)]
    pub silenced: bool,
}

/// One live world on the remote host
///
/// Always replaced wholesale by the next `worlds_update`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldSnapshot {
    #[serde(rename = "sessionId")]
    pub session_id: String,
    pub name: String,
    pub users: u32,
    #[serde(rename = "maxUsers")]
    pub max_users: u32,
    pub present: u32,
    pub hidden: bool,
    #[serde(rename = "accessLevel")]
    pub access_level: String,
    pub uptime: String,
    pub description: Option<String>,
    /// Comma-separated tag list as sent by the host
    pub tags: Option<String>,
    #[serde(rename = "mobileFriendly")]
    pub mobile_friendly: bool,
    #[serde(rename = "users_list")]
    pub user_list: Vec<UserEntry>,
}

impl WorldSnapshot {
    /// Tags split on commas, trimmed, empty entries dropped
    pub fn tag_list(&self) -> Vec<&str> {
        self.tags
            .as_deref()
            .map(|tags| {
                tags.split(',')
                    .map(str::trim)
                    .filter(|tag| !tag.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn find_user(&self, username: &str) -> Option<&UserEntry> {
        self.user_list.iter().find(|user| user.username == username)
    }
}

/// A banned user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BanEntry {
    pub username: String,
    #[serde(rename = "userId", default)]
    pub user_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parses_case_insensitively() {
        // テスト項目: ロール名は大文字小文字を区別せずにパースされる
        // given (前提条件):
        let inputs = ["admin", "MODERATOR", " Builder "];

        // when (操作):
        let roles: Vec<Role> = inputs.iter().map(|s| s.parse().unwrap()).collect();

        // then (期待する結果):
        assert_eq!(roles, vec![Role::Admin, Role::Moderator, Role::Builder]);
    }

    #[test]
    fn test_role_rejects_unknown_name() {
        // テスト項目: 未知のロール名はエラーになる
        // given (前提条件):
        let input = "Owner";

        // when (操作):
        let result = input.parse::<Role>();

        // then (期待する結果):
        assert_eq!(result, Err(UnknownRole("Owner".to_string())));
    }

    #[test]
    fn test_world_snapshot_deserializes_wire_shape() {
        // テスト項目: サーバーから届くワールドの JSON がスナップショットに変換される
        // given (前提条件):
        let json = r#"{
            "sessionId": "S-1234",
            "name": "Hangout",
            "users": 2,
            "maxUsers": 16,
            "present": 1,
            "hidden": false,
            "accessLevel": "Anyone",
            "uptime": "01:02:03",
            "tags": "chill, music ,",
            "users_list": [
                {"username": "alice", "role": "Admin", "present": true, "ping": 12, "fps": 72.5, "silenced": false},
                {"username": "bob", "role": "guest", "present": false, "ping": 80, "fps": 30.0, "silenced": true}
            ]
        }"#;

        // when (操作):
        let world: WorldSnapshot = serde_json::from_str(json).unwrap();

        // then (期待する結果):
        assert_eq!(world.session_id, "S-1234");
        assert_eq!(world.max_users, 16);
        assert_eq!(world.tag_list(), vec!["chill", "music"]);
        assert_eq!(world.user_list.len(), 2);
        assert_eq!(
            world.find_user("bob").map(|u| u.role.clone()),
            Some(UserRole::Known(Role::Guest))
        );
        assert!(world.find_user("bob").unwrap().silenced);
        assert!(world.description.is_none());
    }

    #[test]
    fn test_user_entry_tolerates_unexpected_values() {
        // テスト項目: 想定外のロール名や小数・null の ping でもユーザーが読み込まれる
        // given (前提条件):
        let json = r#"[
            {"username": "host", "role": "Host", "ping": 12.5, "fps": 60},
            {"username": "ghost", "role": null, "ping": null},
            {"username": "carol"}
        ]"#;

        // when (操作):
        let users: Vec<UserEntry> = serde_json::from_str(json).unwrap();

        // then (期待する結果):
        assert_eq!(users[0].role, UserRole::Other("Host".to_string()));
        assert_eq!(users[0].role.to_string(), "Host");
        assert_eq!(users[0].ping, Some(12.5));
        assert_eq!(users[0].fps, Some(60.0));
        assert_eq!(users[1].role.to_string(), "unknown");
        assert_eq!(users[1].ping, None);
        assert_eq!(users[2].role, UserRole::default());
        assert!(users[2].fps.is_none());
    }

    #[test]
    fn test_world_snapshot_tolerates_minimal_payload() {
        // テスト項目: 最小限のフィールドしかないワールドでもデフォルト値で補完される
        // given (前提条件):
        let json = r#"{"name": "Lobby", "users": 0, "present": 0, "accessLevel": "Private", "maxUsers": 8}"#;

        // when (操作):
        let world: WorldSnapshot = serde_json::from_str(json).unwrap();

        // then (期待する結果):
        assert_eq!(world.name, "Lobby");
        assert_eq!(world.session_id, "");
        assert!(world.user_list.is_empty());
        assert!(world.tag_list().is_empty());
    }
}
