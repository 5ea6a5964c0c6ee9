//! `tccli` — chat in a Twitch room from the terminal.
//!
//! Reads chat from the room and prints it to stdout; every line typed on
//! stdin is posted to the room. Configuration via CLI flags, environment
//! variables, or a config file (`~/.config/tccli/config.toml` or
//! `~/.tcclirc`).
//!
//! ```bash
//! tccli -n my_bot_account -c my_channel -o 'oauth:abcdefghijkl'
//! tccli --config ./tccli.toml --spectate --timestamps
//! ```

use std::io::BufRead;
use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use tokio::sync::mpsc;
use tracing_appender::non_blocking::WorkerGuard;

use tccli::config::{CliArgs, ClientConfig};
use tccli::console::Input;
use tccli::display::LineFormatter;
use tccli::session::{ConnectParams, Session, SessionError};

/// Capacity of the stdin → main loop channel.
const INPUT_CHANNEL_CAPACITY: usize = 64;

/// Why the console loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Exit {
    Quit,
    InputClosed,
    ServerClosed,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = CliArgs::parse();

    let config = match ClientConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("[ERROR] {e} (-h or --help for help)");
            return ExitCode::FAILURE;
        }
    };
    let params = match config.connect_params() {
        Ok(p) => p,
        Err(e) => {
            eprintln!("[ERROR] wrong configuration data: {e} (-h or --help for help)");
            return ExitCode::FAILURE;
        }
    };

    // Logs go to a file; stdout carries the chat.
    let _log_guard = init_logging(&cli.log_level, cli.log_file.as_deref());
    tracing::info!(?config, "tccli starting");

    let result = run(&config, params).await;
    tracing::info!("tccli exiting");

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "session failed");
            eprintln!("[ERROR] {e}");
            ExitCode::FAILURE
        }
    }
}

/// Send tracing output to `file_path`, or `tccli.log` in the temp dir.
///
/// `RUST_LOG` takes precedence over `level` (from `--log-level` or
/// `TCCLI_LOG`). Nothing is logged when the path has no directory or file
/// name. Keep the returned guard alive until exit or buffered records are lost.
fn init_logging(level: &str, file_path: Option<&Path>) -> Option<WorkerGuard> {
    let log_path = file_path.map_or_else(
        || std::env::temp_dir().join("tccli.log"),
        Path::to_path_buf,
    );
    let (dir, name) = (log_path.parent()?, log_path.file_name()?);

    let appender = tracing_appender::rolling::never(dir, name);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .with_target(false)
        .init();

    Some(guard)
}

/// Connect, pump console input into the room, then disconnect.
async fn run(config: &ClientConfig, params: ConnectParams) -> Result<(), SessionError> {
    let session = Session::new()?;
    let formatter = LineFormatter::new(params.room.clone(), config.timestamps);
    session.add_handler(move |line| println!("{}", formatter.render(line)));

    session.connect(params).await?;
    let mut input = spawn_stdin_reader();

    let exit = console_loop(&session, &mut input, config.spectate).await;
    tracing::info!(?exit, "console loop finished");

    let disconnected = session.disconnect().await;
    if exit != Exit::ServerClosed {
        return disconnected;
    }
    match disconnected {
        Err(e @ SessionError::Framing(_)) => Err(e),
        other => {
            // The server already hung up; failing to say goodbye is expected.
            if let Err(e) = other {
                tracing::debug!(error = %e, "disconnect after server close");
            }
            eprintln!("[ERROR] connection closed by server");
            Ok(())
        }
    }
}

async fn console_loop(
    session: &Session,
    input: &mut mpsc::Receiver<String>,
    spectate: bool,
) -> Exit {
    loop {
        tokio::select! {
            () = session.wait_closed() => return Exit::ServerClosed,
            line = input.recv() => {
                let Some(line) = line else {
                    return Exit::InputClosed;
                };
                match Input::parse(&line, spectate) {
                    Input::Quit => return Exit::Quit,
                    Input::Ignore => {}
                    Input::Message(text) => {
                        if let Err(e) = session.send_message(text).await {
                            tracing::warn!(error = %e, "send failed");
                            eprintln!("[ERROR] message not sent: {e}");
                        }
                    }
                }
            }
        }
    }
}

/// Read stdin on a dedicated thread and forward each line.
///
/// A blocking read on a plain thread does not hold up runtime shutdown the
/// way `tokio::io::stdin` would.
fn spawn_stdin_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(INPUT_CHANNEL_CAPACITY);
    let spawned = std::thread::Builder::new()
        .name("stdin-reader".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                match line {
                    Ok(line) => {
                        if tx.blocking_send(line).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "stdin read failed");
                        break;
                    }
                }
            }
        });
    if let Err(e) = spawned {
        tracing::error!(error = %e, "failed to spawn stdin reader");
    }
    rx
}
