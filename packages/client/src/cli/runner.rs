//! Interactive operator console.

use std::{future::Future, path::PathBuf, sync::Arc};

use rustyline::{DefaultEditor, error::ReadlineError};
use tokio::sync::mpsc;

use crate::{
    admin_http::AdminApi,
    config::SessionConfig,
    dispatcher::ConsoleLine,
    error::ClientError,
    session::Session,
    store::{JsonFileStore, PreferenceStore, Preferences},
    transport::WebSocketDialer,
};

use super::{
    command::{CliCommand, HELP, parse_line},
    presenter::{PROMPT, TerminalPresenter, ViewFormatter, redisplay_prompt},
};

pub struct ConsoleOptions {
    pub session: SessionConfig,
    /// HTTP origin of the backend; derived from the WebSocket URL when absent
    pub api_url: Option<String>,
    pub state_file: PathBuf,
}

/// `ws://host:port/ws` → `http://host:port`
pub fn http_base_from_ws(url: &str) -> Option<String> {
    let (scheme, rest) = url.split_once("://")?;
    let scheme = match scheme {
        "ws" => "http",
        "wss" => "https",
        _ => return None,
    };
    let authority = rest.split('/').next().filter(|a| !a.is_empty())?;
    Some(format!("{}://{}", scheme, authority))
}

fn report_error(error: &ClientError) {
    if error.is_transient() {
        tracing::debug!("{}", error);
    } else {
        tracing::warn!("{}", error);
    }
    print!(
        "{}",
        ViewFormatter::format_console_line(&ConsoleLine::error(error.to_string()))
    );
    redisplay_prompt();
}

fn report(message: &str) {
    println!("\n{}", message);
    redisplay_prompt();
}

/// Run a long operation without blocking input
fn spawn_reported<F>(operation: F)
where
    F: Future<Output = Result<(), ClientError>> + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(e) = operation.await {
            report_error(&e);
        }
    });
}

/// Run the console until `/quit`, Ctrl+C or EOF
pub async fn run_console(options: ConsoleOptions) -> Result<(), ClientError> {
    let file_store = JsonFileStore::new(&options.state_file);
    tracing::info!("Preferences stored in {}", file_store.path().display());
    let store: Arc<dyn PreferenceStore> = Arc::new(file_store);
    let preferences = Preferences::new(store.clone());

    let api_url = options
        .api_url
        .clone()
        .or_else(|| http_base_from_ws(&options.session.url));
    let api = match api_url {
        Some(url) => Some(Arc::new(AdminApi::new(url)?)),
        None => None,
    };

    let url = options.session.url.clone();
    let session = Arc::new(Session::start(
        options.session,
        Arc::new(WebSocketDialer),
        store,
        Arc::new(TerminalPresenter::new(preferences.clone())),
    ));

    println!(
        "\nOperating {}. Type /help for commands, anything else goes to the host console.\n",
        url
    );

    let (input_tx, mut input_rx) = mpsc::unbounded_channel::<String>();

    // rustyline is synchronous, so it gets its own thread
    let _readline_handle = std::thread::spawn(move || {
        let mut rl = match DefaultEditor::new() {
            Ok(rl) => rl,
            Err(e) => {
                eprintln!("Failed to initialize readline: {}", e);
                return;
            }
        };

        loop {
            match rl.readline(PROMPT) {
                Ok(line) => {
                    let line = line.trim();
                    if !line.is_empty() {
                        rl.add_history_entry(line).ok();
                        if input_tx.send(line.to_string()).is_err() {
                            break;
                        }
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    tracing::info!("Interrupted");
                    break;
                }
                Err(ReadlineError::Eof) => {
                    tracing::info!("EOF");
                    break;
                }
                Err(err) => {
                    tracing::error!("Readline error: {}", err);
                    break;
                }
            }
        }
    });

    while let Some(line) = input_rx.recv().await {
        match parse_line(&line) {
            Ok(None) => {}
            Ok(Some(CliCommand::Quit)) => break,
            Ok(Some(command)) => handle(command, &session, &preferences, api.as_ref()).await,
            Err(e) => report(&e.to_string()),
        }
    }

    session.shutdown().await;
    Ok(())
}

async fn handle(
    command: CliCommand,
    session: &Arc<Session>,
    preferences: &Preferences,
    api: Option<&Arc<AdminApi>>,
) {
    match command {
        CliCommand::Raw(text) => {
            if let Err(e) = session.send_command(&text) {
                report_error(&e);
            }
        }
        CliCommand::User {
            world_index,
            username,
            action,
        } => {
            let session = session.clone();
            spawn_reported(async move {
                session.user_action(world_index, &username, action).await
            });
        }
        CliCommand::Global(action) => {
            let session = session.clone();
            spawn_reported(async move { session.global_action(action).await });
        }
        CliCommand::World { session_id, action } => {
            let session = session.clone();
            spawn_reported(async move { session.world_action(&session_id, action).await });
        }
        CliCommand::ClearDenied => {
            session.clear_denied().await;
            report("Denied friend requests cleared");
        }
        CliCommand::Interval { purpose, seconds } => {
            let applied = session.set_interval(purpose, seconds).await;
            report(&format!("Polling {} every {}s", purpose, applied));
        }
        CliCommand::StopPolling(purpose) => {
            if session.stop_polling(purpose).await {
                report(&format!("Stopped polling {}", purpose));
            } else {
                report(&format!("{} was not being polled", purpose));
            }
        }
        CliCommand::Refresh(purpose) => {
            if let Err(e) = session.refresh(purpose) {
                report_error(&e);
            }
        }
        CliCommand::Toggle(panel) => match preferences.toggle_panel(panel) {
            Ok(true) => report(&format!("{} collapsed", panel)),
            Ok(false) => report(&format!("{} expanded", panel)),
            Err(e) => report_error(&e),
        },
        CliCommand::ShowConfig => {
            let Some(api) = api.cloned() else {
                return report("No HTTP endpoint configured (use --api)");
            };
            spawn_reported(async move {
                let config = api.load_config().await?;
                let text = serde_json::to_string_pretty(&config)
                    .map_err(|e| ClientError::Decode(e.to_string()))?;
                report(&text);
                Ok(())
            });
        }
        CliCommand::SaveConfig(path) => {
            let Some(api) = api.cloned() else {
                return report("No HTTP endpoint configured (use --api)");
            };
            let text = match tokio::fs::read_to_string(&path).await {
                Ok(text) => text,
                Err(e) => return report(&format!("Failed to read {}: {}", path.display(), e)),
            };
            spawn_reported(async move {
                api.save_config(&text).await?;
                report("Configuration saved");
                Ok(())
            });
        }
        CliCommand::RestartContainer => {
            let Some(api) = api.cloned() else {
                return report("No HTTP endpoint configured (use --api)");
            };
            spawn_reported(async move { api.restart_container().await });
        }
        CliCommand::Help => report(HELP),
        CliCommand::Quit => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_base_from_ws() {
        // テスト項目: WebSocket URL から HTTP のオリジンが導出される
        // given (前提条件):
        let urls = [
            "ws://127.0.0.1:8000/ws",
            "wss://host.example/ws",
            "ws://",
            "http://host/ws",
        ];

        // when (操作):
        let result: Vec<Option<String>> = urls.iter().map(|u| http_base_from_ws(u)).collect();

        // then (期待する結果):
        assert_eq!(
            result,
            vec![
                Some("http://127.0.0.1:8000".to_string()),
                Some("https://host.example".to_string()),
                None,
                None,
            ]
        );
    }
}
