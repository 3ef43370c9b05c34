//! Operator console for a headless world host.
//!
//! Connects to the backend's command/control WebSocket, keeps the status,
//! world, ban and friend-request views fresh, and runs moderation actions.
//! Reconnects forever with a one second delay.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin headcon -- --url ws://127.0.0.1:8000/ws
//! cargo run --bin headcon -- -u ws://host:8000/ws --focus-mode ack --status-interval 10
//! ```

use std::{path::PathBuf, time::Duration};

use clap::{Parser, ValueEnum};

use headcon_client::{
    cli::{ConsoleOptions, run_console},
    config::{DEFAULT_URL, SessionConfig},
    executor::{FOCUS_ACK_TIMEOUT, FOCUS_SETTLE_DELAY, FocusSync},
};
use headcon_shared::logger::setup_logger;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum FocusMode {
    /// Wait a fixed delay after every focus change
    Settle,
    /// Wait for the host to acknowledge the focus change
    Ack,
}

#[derive(Parser, Debug)]
#[command(name = "headcon")]
#[command(about = "Operator console multiplexing commands over one WebSocket channel", long_about = None)]
struct Args {
    /// WebSocket URL of the backend
    #[arg(short = 'u', long, default_value = DEFAULT_URL)]
    url: String,

    /// HTTP origin for configuration endpoints (derived from --url when omitted)
    #[arg(long)]
    api: Option<String>,

    /// File holding the denied friend requests and panel state
    #[arg(long, default_value = "headcon-state.json")]
    state_file: PathBuf,

    /// Seconds between status polls
    #[arg(long, default_value_t = 30)]
    status_interval: u64,

    /// Seconds between friend request polls
    #[arg(long, default_value_t = 60)]
    friend_interval: u64,

    /// Seconds between ban list polls
    #[arg(long, default_value_t = 60)]
    ban_interval: u64,

    /// How to wait for a world focus change before acting
    #[arg(long, value_enum, default_value_t = FocusMode::Settle)]
    focus_mode: FocusMode,

    /// Milliseconds to wait for a focus acknowledgement or settle delay
    #[arg(long)]
    focus_wait_ms: Option<u64>,
}

impl Args {
    fn session_config(&self) -> SessionConfig {
        let focus_sync = match self.focus_mode {
            FocusMode::Settle => FocusSync::Settle(
                self.focus_wait_ms
                    .map(Duration::from_millis)
                    .unwrap_or(FOCUS_SETTLE_DELAY),
            ),
            FocusMode::Ack => FocusSync::Acknowledged {
                timeout: self
                    .focus_wait_ms
                    .map(Duration::from_millis)
                    .unwrap_or(FOCUS_ACK_TIMEOUT),
            },
        };

        SessionConfig {
            url: self.url.clone(),
            status_interval: Some(self.status_interval),
            friend_request_interval: Some(self.friend_interval),
            ban_interval: Some(self.ban_interval),
            focus_sync,
            ..SessionConfig::default()
        }
    }
}

fn main() {
    // Interactive output goes to stdout; keep stderr quiet by default
    setup_logger(env!("CARGO_BIN_NAME"), "warn");

    let args = Args::parse();
    let options = ConsoleOptions {
        session: args.session_config(),
        api_url: args.api.clone(),
        state_file: args.state_file.clone(),
    };

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!("Failed to start runtime: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(run_console(options)) {
        tracing::error!("Console error: {}", e);
        std::process::exit(1);
    }
}
