//! Operator input parsing.

use std::path::PathBuf;

use thiserror::Error;

use crate::{
    domain::Role,
    executor::{GlobalAction, UserAction, WorldAction},
    scheduler::PollPurpose,
    store::Panel,
};

pub const HELP: &str = "\
Commands:
  /kick W USER            kick USER from world index W
  /respawn W USER         respawn USER in world W
  /silence W USER         silence USER in world W
  /unsilence W USER       unsilence USER in world W
  /role W USER ROLE       set role (spectator, guest, builder, moderator, admin)
  /ban USER               ban USER by name
  /unban USER             lift the ban on USER
  /accept USER            accept a friend request
  /deny USER              deny a friend request and hide it
  /clear-denied           show denied friend requests again
  /restart SESSION        restart a world
  /save SESSION           save a world
  /close SESSION          close a world
  /interval PURPOSE SECS  poll status, worlds, friends or bans every SECS
  /interval PURPOSE off   stop polling PURPOSE
  /status /worlds /bans /requests
                          refresh now and print
  /toggle PANEL           collapse or expand console, status, worlds, bans, friends
  /config                 print the host configuration
  /config-save FILE       validate FILE as JSON and store it as the configuration
  /restart-container      restart the host container
  /help                   show this help
  /quit                   leave
Anything else is sent to the host console as-is.";

/// One parsed input line
#[derive(Debug, Clone, PartialEq)]
pub enum CliCommand {
    Raw(String),
    User {
        world_index: usize,
        username: String,
        action: UserAction,
    },
    Global(GlobalAction),
    ClearDenied,
    World {
        session_id: String,
        action: WorldAction,
    },
    Interval {
        purpose: PollPurpose,
        seconds: u64,
    },
    StopPolling(PollPurpose),
    Refresh(PollPurpose),
    Toggle(Panel),
    ShowConfig,
    SaveConfig(PathBuf),
    RestartContainer,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Unknown command '/{0}' (try /help)")]
    Unknown(String),

    #[error("Usage: {0}")]
    Usage(&'static str),

    #[error("{0}")]
    Invalid(String),
}

/// Parse one input line; blank lines yield `None`
pub fn parse_line(line: &str) -> Result<Option<CliCommand>, ParseError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let Some(rest) = line.strip_prefix('/') else {
        return Ok(Some(CliCommand::Raw(line.to_string())));
    };

    let mut words = rest.split_whitespace();
    let name = words.next().unwrap_or_default().to_ascii_lowercase();
    let args: Vec<&str> = words.collect();

    let command = match name.as_str() {
        "kick" => user(&args, UserAction::Kick, "/kick W USER")?,
        "respawn" => user(&args, UserAction::Respawn, "/respawn W USER")?,
        "silence" => user(&args, UserAction::Silence, "/silence W USER")?,
        "unsilence" => user(&args, UserAction::Unsilence, "/unsilence W USER")?,
        "role" => {
            let [index, username, role] = args[..] else {
                return Err(ParseError::Usage("/role W USER ROLE"));
            };
            let role = role
                .parse::<Role>()
                .map_err(|e| ParseError::Invalid(e.to_string()))?;
            CliCommand::User {
                world_index: world_index(index)?,
                username: username.to_string(),
                action: UserAction::SetRole(role),
            }
        }
        "ban" => CliCommand::Global(GlobalAction::Ban(one(&args, "/ban USER")?)),
        "unban" => CliCommand::Global(GlobalAction::Unban(one(&args, "/unban USER")?)),
        "accept" => CliCommand::Global(GlobalAction::AcceptFriendRequest(one(
            &args,
            "/accept USER",
        )?)),
        "deny" => CliCommand::Global(GlobalAction::DenyFriendRequest(one(
            &args,
            "/deny USER",
        )?)),
        "clear-denied" => CliCommand::ClearDenied,
        "restart" => world(&args, WorldAction::Restart, "/restart SESSION")?,
        "save" => world(&args, WorldAction::Save, "/save SESSION")?,
        "close" => world(&args, WorldAction::Close, "/close SESSION")?,
        "interval" => {
            let [purpose, seconds] = args[..] else {
                return Err(ParseError::Usage("/interval PURPOSE SECONDS|off"));
            };
            let purpose = purpose.parse().map_err(ParseError::Invalid)?;
            if seconds.eq_ignore_ascii_case("off") {
                return Ok(Some(CliCommand::StopPolling(purpose)));
            }
            CliCommand::Interval {
                purpose,
                seconds: seconds
                    .parse()
                    .map_err(|_| ParseError::Invalid(format!("'{}' is not a number", seconds)))?,
            }
        }
        "status" => CliCommand::Refresh(PollPurpose::Status),
        "worlds" => CliCommand::Refresh(PollPurpose::Worlds),
        "bans" => CliCommand::Refresh(PollPurpose::Bans),
        "requests" | "friends" => CliCommand::Refresh(PollPurpose::FriendRequests),
        "toggle" => {
            let panel = one(&args, "/toggle PANEL")?;
            CliCommand::Toggle(panel.parse().map_err(ParseError::Invalid)?)
        }
        "config" => CliCommand::ShowConfig,
        "config-save" => CliCommand::SaveConfig(PathBuf::from(one(&args, "/config-save FILE")?)),
        "restart-container" => CliCommand::RestartContainer,
        "help" | "?" => CliCommand::Help,
        "quit" | "exit" => CliCommand::Quit,
        other => return Err(ParseError::Unknown(other.to_string())),
    };

    Ok(Some(command))
}

fn one(args: &[&str], usage: &'static str) -> Result<String, ParseError> {
    match args {
        [value] => Ok(value.to_string()),
        _ => Err(ParseError::Usage(usage)),
    }
}

fn world_index(text: &str) -> Result<usize, ParseError> {
    text.parse()
        .map_err(|_| ParseError::Invalid(format!("'{}' is not a world index", text)))
}

fn user(args: &[&str], action: UserAction, usage: &'static str) -> Result<CliCommand, ParseError> {
    let [index, username] = args[..] else {
        return Err(ParseError::Usage(usage));
    };
    Ok(CliCommand::User {
        world_index: world_index(index)?,
        username: username.to_string(),
        action,
    })
}

fn world(
    args: &[&str],
    action: WorldAction,
    usage: &'static str,
) -> Result<CliCommand, ParseError> {
    Ok(CliCommand::World {
        session_id: one(args, usage)?,
        action,
    })
}
