//! Sleep timer CLI
//!
//! Arms a countdown from a headset or media button and pauses the external
//! audio application when it runs out:
//! - `sleep-timer daemon` runs the timer in the foreground
//! - `sleep-timer press play` simulates a media button
//! - `sleep-timer watch` streams timer events

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{CommandFactory, Parser};

use sleep_timer::cli::{Cli, Commands, DaemonArgs, Display, IpcClient};
use sleep_timer::types::SleepTimerConfig;
use sleep_timer::{config, daemon};

/// Main entry point
#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Parse command line arguments
    let cli = Cli::parse();

    // Initialize logging
    init_tracing(cli.verbose);

    // Execute command
    if let Err(e) = execute(cli).await {
        Display::show_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

/// Initializes the tracing subscriber for logging.
fn init_tracing(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_level = if verbose { "info" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();
}

/// Executes the CLI command.
async fn execute(cli: Cli) -> Result<()> {
    let Some(command) = cli.command else {
        // No command provided, show help
        Cli::command().print_help()?;
        return Ok(());
    };

    match command {
        Commands::Daemon(args) => {
            let config = daemon_config(&args)?;
            let socket_path = resolve_socket_path(cli.socket, &config)?;
            daemon::run_daemon(config, socket_path).await?;
        }
        Commands::Completions { shell } => {
            generate_completions(shell);
        }
        command => {
            let client = IpcClient::with_socket_path(client_socket_path(cli.socket, None)?);
            run_client_command(&client, command).await?;
        }
    }

    Ok(())
}

/// Sends a client command to the daemon and prints the result.
async fn run_client_command(client: &IpcClient, command: Commands) -> Result<()> {
    match command {
        Commands::Press(args) => {
            let response = client.press(args.to_request()).await?;
            Display::show_press_result(&response);
        }
        Commands::VolumeDown => {
            let response = client.volume_down().await?;
            Display::show_press_result(&response);
        }
        Commands::Duration { minutes } => {
            let response = client.duration(minutes).await?;
            Display::show_duration_success(&response);
        }
        Commands::Preset { minutes } => {
            let response = client.preset(minutes).await?;
            Display::show_duration_success(&response);
        }
        Commands::Pause => {
            let response = client.pause().await?;
            Display::show_pause_success(&response);
        }
        Commands::Resume => {
            let response = client.resume().await?;
            Display::show_resume_success(&response);
        }
        Commands::Stop => {
            let response = client.stop().await?;
            Display::show_stop_success(&response);
        }
        Commands::Status => {
            let response = client.status().await?;
            Display::show_status(&response);
        }
        Commands::Watch => {
            client
                .watch(|message| Display::show_watch_message(&message))
                .await?;
        }
        Commands::Close => {
            let response = client.close().await?;
            Display::show_close_success(&response);
        }
        Commands::Daemon(_) | Commands::Completions { .. } => {
            anyhow::bail!("このコマンドはDaemonに送信できません");
        }
    }
    Ok(())
}

/// Loads the daemon configuration and applies CLI overrides.
fn daemon_config(args: &DaemonArgs) -> Result<SleepTimerConfig> {
    let mut config = config::load_config(args.config.as_deref())?;
    if let Some(minutes) = args.duration {
        config = config.with_duration_minutes(minutes);
    }
    if let Some(package) = &args.package {
        config = config.with_target_package(package.clone());
    }
    config.validate().map_err(anyhow::Error::msg)?;
    Ok(config)
}

/// Picks the socket path: CLI flag, then config file, then default.
fn resolve_socket_path(flag: Option<PathBuf>, config: &SleepTimerConfig) -> Result<PathBuf> {
    if let Some(path) = flag {
        return Ok(path);
    }
    if let Some(path) = &config.socket_path {
        return Ok(PathBuf::from(path));
    }
    config::default_socket_path()
}

/// Picks the socket path for client commands.
///
/// The config file is only read when no `--socket` flag is given.
fn client_socket_path(flag: Option<PathBuf>, config_path: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = flag {
        return Ok(path);
    }
    let config = config::load_config(config_path)?;
    resolve_socket_path(None, &config)
}

/// Generates shell completion scripts.
fn generate_completions(shell: clap_complete::Shell) {
    use clap_complete::generate;
    use std::io;

    let mut cmd = Cli::command();
    let bin_name = cmd.get_name().to_string();
    generate(shell, &mut cmd, bin_name, &mut io::stdout());
}

// ============================================================================
// Tests
// ============================================================================
