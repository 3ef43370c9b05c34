//! Terminal rendering of console lines and view snapshots.

use std::io::Write;

use headcon_shared::time::format_local_time;

use crate::{
    dispatcher::{ConsoleKind, ConsoleLine},
    domain::{BanEntry, WorldSnapshot},
    reconciler::{Health, SessionView, StatusSnapshot, ViewSection},
    session::Presenter,
    store::{Panel, Preferences},
    transport::ConnectionState,
};

const RULE: &str = "============================================================";

pub const PROMPT: &str = "headcon> ";

/// Redisplay the prompt after asynchronous output
pub fn redisplay_prompt() {
    print!("{}", PROMPT);
    std::io::stdout().flush().ok();
}

/// Text formatting for every panel
pub struct ViewFormatter;

impl ViewFormatter {
    pub fn format_console_line(line: &ConsoleLine) -> String {
        let text = line.text.trim_end();
        match line.kind {
            ConsoleKind::Output => format!("\n{}\n", text),
            ConsoleKind::Command => format!("\n> {}\n", text),
            ConsoleKind::Response => format!("\n< {}\n", text),
            ConsoleKind::Error => format!("\n! {}\n", text),
        }
    }

    /// Format the status panel
    ///
    /// # Arguments
    ///
    /// * `status` - Latest status report, if any arrived yet
    pub fn format_status(status: Option<&StatusSnapshot>) -> String {
        let mut output = String::new();
        output.push_str(&format!("\n{}\nStatus:\n", RULE));

        match status {
            None => output.push_str("(No status yet)\n"),
            Some(snapshot) => {
                let report = &snapshot.report;
                let health = match snapshot.health() {
                    Health::Running => "running",
                    Health::Stopped => "stopped",
                    Health::Errored => "error",
                    Health::Pending => "pending",
                };
                output.push_str(&format!(
                    "{} [{}] at {}\n",
                    report.name.as_deref().unwrap_or("host"),
                    health,
                    format_local_time(snapshot.received_at)
                ));
                if let Some(error) = &report.error {
                    output.push_str(&format!("error: {}\n", error));
                }
                if let Some(cpu) = report.cpu_usage {
                    output.push_str(&format!("cpu: {:.1}%\n", cpu));
                }
                if let Some(memory) = report.memory_percent {
                    output.push_str(&format!("memory: {:.1}%\n", memory));
                }
            }
        }

        output.push_str(RULE);
        output.push('\n');
        output
    }

    /// Rounded value, `?` when the host did not report it
    fn format_metric(value: Option<f64>) -> String {
        value.map_or_else(|| "?".to_string(), |v| format!("{:.0}", v))
    }

    pub fn format_worlds(worlds: &[WorldSnapshot]) -> String {
        let mut output = String::new();
        output.push_str(&format!("\n{}\nWorlds:\n", RULE));

        if worlds.is_empty() {
            output.push_str("(No worlds)\n");
        }
        for (index, world) in worlds.iter().enumerate() {
            output.push_str(&format!(
                "[{}] {} ({}) {}/{} users, {} present, {}{}, up {}\n",
                index,
                world.name,
                world.session_id,
                world.users,
                world.max_users,
                world.present,
                world.access_level,
                if world.hidden { ", hidden" } else { "" },
                world.uptime
            ));
            let tags = world.tag_list();
            if !tags.is_empty() {
                output.push_str(&format!("    tags: {}\n", tags.join(", ")));
            }
            for user in &world.user_list {
                output.push_str(&format!(
                    "    {} ({}) ping {}ms, {} fps{}{}\n",
                    user.username,
                    user.role,
                    Self::format_metric(user.ping),
                    Self::format_metric(user.fps),
                    if user.present { "" } else { ", away" },
                    if user.silenced { ", silenced" } else { "" }
                ));
            }
        }

        output.push_str(RULE);
        output.push('\n');
        output
    }

    pub fn format_bans(bans: &[BanEntry]) -> String {
        let mut output = String::new();
        output.push_str(&format!("\n{}\nBans:\n", RULE));
        if bans.is_empty() {
            output.push_str("(No bans)\n");
        }
        for ban in bans {
            output.push_str(&format!("{} ({})\n", ban.username, ban.user_id));
        }
        output.push_str(RULE);
        output.push('\n');
        output
    }

    pub fn format_friend_requests(requests: &[String]) -> String {
        let mut output = String::new();
        output.push_str(&format!("\n{}\nFriend requests:\n", RULE));
        if requests.is_empty() {
            output.push_str("(No pending requests)\n");
        }
        for username in requests {
            output.push_str(&format!("{}\n", username));
        }
        output.push_str(RULE);
        output.push('\n');
        output
    }

    pub fn format_connection(state: ConnectionState) -> String {
        match state {
            ConnectionState::Open => "\n* connected\n".to_string(),
            ConnectionState::Connecting => "\n* connecting...\n".to_string(),
            ConnectionState::Closed => "\n* disconnected, reconnecting...\n".to_string(),
        }
    }

    pub fn format_section(section: ViewSection, view: &SessionView) -> String {
        match section {
            ViewSection::Status => Self::format_status(view.status.as_ref()),
            ViewSection::Worlds => Self::format_worlds(&view.worlds),
            ViewSection::Bans => Self::format_bans(&view.bans),
            ViewSection::FriendRequests => Self::format_friend_requests(&view.friend_requests),
        }
    }
}

pub fn panel_of(section: ViewSection) -> Panel {
    match section {
        ViewSection::Status => Panel::Status,
        ViewSection::Worlds => Panel::Worlds,
        ViewSection::Bans => Panel::Bans,
        ViewSection::FriendRequests => Panel::FriendRequests,
    }
}

/// Prints to stdout, skipping collapsed panels
pub struct TerminalPresenter {
    preferences: Preferences,
}

impl TerminalPresenter {
    pub fn new(preferences: Preferences) -> Self {
        Self { preferences }
    }
}

impl Presenter for TerminalPresenter {
    fn console(&self, line: &ConsoleLine) {
        // Errors are shown even with the console collapsed.
        if line.kind != ConsoleKind::Error && self.preferences.panel_collapsed(Panel::Console) {
            return;
        }
        print!("{}", ViewFormatter::format_console_line(line));
        redisplay_prompt();
    }

    fn view_changed(&self, section: ViewSection, view: &SessionView) {
        if self.preferences.panel_collapsed(panel_of(section)) {
            tracing::trace!("{:?} collapsed, not printing", section);
            return;
        }
        print!("{}", ViewFormatter::format_section(section, view));
        redisplay_prompt();
    }

    fn connection_changed(&self, state: ConnectionState) {
        print!("{}", ViewFormatter::format_connection(state));
        redisplay_prompt();
    }
}
