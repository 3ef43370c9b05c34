//! Durable operator preferences.
//!
//! Preferences are JSON values addressed by a fixed key per concern. The
//! denied friend-request list and panel collapse flags survive restarts.

use std::{
    collections::BTreeSet,
    fmt,
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    str::FromStr,
    sync::{Arc, Mutex},
};

use serde_json::{Map, Value};

use crate::error::ClientError;

pub const DENIED_FRIEND_REQUESTS_KEY: &str = "denied_friend_requests";
pub const PANELS_KEY: &str = "panels";

/// Key/value storage for preferences
#[cfg_attr(test, mockall::automock)]
pub trait PreferenceStore: Send + Sync {
    fn load(&self, key: &str) -> Result<Option<Value>, ClientError>;
    fn save(&self, key: &str, value: &Value) -> Result<(), ClientError>;
}

/// Stores every key in one JSON object on disk
pub struct JsonFileStore {
    path: PathBuf,
    // Serializes read-modify-write cycles.
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<Map<String, Value>, ClientError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(ClientError::Store(e.to_string())),
        };
        if text.trim().is_empty() {
            return Ok(Map::new());
        }
        serde_json::from_str(&text).map_err(|e| {
            ClientError::Store(format!("{} is not a JSON object: {}", self.path.display(), e))
        })
    }
}

impl PreferenceStore for JsonFileStore {
    fn load(&self, key: &str) -> Result<Option<Value>, ClientError> {
        Ok(self.read_all()?.remove(key))
    }

    fn save(&self, key: &str, value: &Value) -> Result<(), ClientError> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| ClientError::Store("preference lock poisoned".to_string()))?;

        let mut all = self.read_all()?;
        all.insert(key.to_string(), value.clone());
        let text = serde_json::to_string_pretty(&Value::Object(all))
            .map_err(|e| ClientError::Store(e.to_string()))?;
        fs::write(&self.path, text).map_err(|e| ClientError::Store(e.to_string()))?;

        tracing::debug!("Saved preference '{}' to {}", key, self.path.display());
        Ok(())
    }
}

/// Volatile store
#[derive(Default)]
pub struct MemoryStore {
    values: Mutex<Map<String, Value>>,
}

impl PreferenceStore for MemoryStore {
    fn load(&self, key: &str) -> Result<Option<Value>, ClientError> {
        let values = self
            .values
            .lock()
            .map_err(|_| ClientError::Store("preference lock poisoned".to_string()))?;
        Ok(values.get(key).cloned())
    }

    fn save(&self, key: &str, value: &Value) -> Result<(), ClientError> {
        let mut values = self
            .values
            .lock()
            .map_err(|_| ClientError::Store("preference lock poisoned".to_string()))?;
        values.insert(key.to_string(), value.clone());
        Ok(())
    }
}

/// Collapsible sections of the operator view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Panel {
    Console,
    Status,
    Worlds,
    Bans,
    FriendRequests,
}

impl Panel {
    pub const ALL: [Panel; 5] = [
        Panel::Console,
        Panel::Status,
        Panel::Worlds,
        Panel::Bans,
        Panel::FriendRequests,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Panel::Console => "console",
            Panel::Status => "status",
            Panel::Worlds => "worlds",
            Panel::Bans => "bans",
            Panel::FriendRequests => "friend_requests",
        }
    }
}

impl fmt::Display for Panel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Panel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        Panel::ALL
            .into_iter()
            .find(|panel| panel.as_str() == s)
            .or(match s.as_str() {
                "friends" | "requests" => Some(Panel::FriendRequests),
                _ => None,
            })
            .ok_or_else(|| format!("Unknown panel '{}'", s))
    }
}

/// Typed access to the preferences this client persists
#[derive(Clone)]
pub struct Preferences {
    store: Arc<dyn PreferenceStore>,
}

impl Preferences {
    pub fn new(store: Arc<dyn PreferenceStore>) -> Self {
        Self { store }
    }

    /// Usernames whose friend requests the operator dismissed
    ///
    /// Non-string entries in the stored array are skipped.
    pub fn load_denied(&self) -> Result<BTreeSet<String>, ClientError> {
        let denied = match self.store.load(DENIED_FRIEND_REQUESTS_KEY)? {
            Some(Value::Array(items)) => items
                .into_iter()
                .filter_map(|item| match item {
                    Value::String(name) => Some(name),
                    _ => None,
                })
                .collect(),
            Some(other) => {
                tracing::warn!("Ignoring malformed denied list: {}", other);
                BTreeSet::new()
            }
            None => BTreeSet::new(),
        };
        Ok(denied)
    }

    pub fn save_denied(&self, denied: &BTreeSet<String>) -> Result<(), ClientError> {
        let value = Value::Array(denied.iter().cloned().map(Value::String).collect());
        self.store.save(DENIED_FRIEND_REQUESTS_KEY, &value)
    }

    fn load_panels(&self) -> Result<Map<String, Value>, ClientError> {
        Ok(match self.store.load(PANELS_KEY)? {
            Some(Value::Object(panels)) => panels,
            _ => Map::new(),
        })
    }

    /// Collapsed panels default to expanded when unknown or unreadable
    pub fn panel_collapsed(&self, panel: Panel) -> bool {
        match self.load_panels() {
            Ok(panels) => panels
                .get(panel.as_str())
                .and_then(Value::as_bool)
                .unwrap_or(false),
            Err(e) => {
                tracing::warn!("Failed to read panel state: {}", e);
                false
            }
        }
    }

    pub fn set_panel_collapsed(&self, panel: Panel, collapsed: bool) -> Result<(), ClientError> {
        let mut panels = self.load_panels()?;
        panels.insert(panel.as_str().to_string(), Value::Bool(collapsed));
        self.store.save(PANELS_KEY, &Value::Object(panels))
    }

    /// Flip a panel and return its new collapsed state
    pub fn toggle_panel(&self, panel: Panel) -> Result<bool, ClientError> {
        let collapsed = !self.panel_collapsed(panel);
        self.set_panel_collapsed(panel, collapsed)?;
        Ok(collapsed)
    }
}
