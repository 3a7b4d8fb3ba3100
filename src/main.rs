//! matrixterm - a Matrix-styled chat terminal
//!
//! A full-screen terminal with falling green rain behind a small command
//! prompt. Commands are typed key by key; `chat` streams the reply from a
//! backend service into the panel as it arrives.
//!
//! # Quick Start
//!
//! ```text
//! matrixterm                               # Backend from config or localhost:8000
//! matrixterm -u https://example.test/api   # Explicit backend
//! matrixterm --no-rain                     # Plain background
//! ```
//!
//! # Commands
//!
//! | Command | Action |
//! |---------|--------|
//! | health | Check the backend and whether it holds an API key |
//! | chat <message> | Send a message and stream the reply |
//! | setkey <key> | Use (and remember) your own API key |
//! | clearkey | Forget the stored key |
//! | clear | Clear the terminal |
//! | help | List commands |

mod app;
mod commands;
mod config;
mod core;
mod credentials;
mod net;
mod ui;

use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::app::{App, LaunchOptions};
use crate::config::Config;
use crate::credentials::CredentialStore;
use crate::net::HttpBackend;

/// Version string from Cargo.toml
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Environment variable holding a tracing filter directive
const LOG_ENV: &str = "MATRIXTERM_LOG";

/// Command line options
#[derive(Debug, Default, PartialEq)]
struct CliArgs {
    api_base: Option<String>,
    config_path: Option<PathBuf>,
    no_rain: bool,
    no_welcome: bool,
}

#[derive(Debug)]
enum Command {
    Run(CliArgs),
    Help,
    Version,
}

fn print_version() {
    eprintln!("matrixterm {}", VERSION);
}

fn print_help() {
    eprintln!("matrixterm {} - Matrix-styled chat terminal", VERSION);
    eprintln!();
    eprintln!("Usage: matrixterm [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -u, --api-base <URL>  Backend base URL (default: http://localhost:8000/api)");
    eprintln!("  -c, --config <PATH>   Config file (default: ~/.matrixterm/config.toml)");
    eprintln!("      --no-rain         Disable the rain animation");
    eprintln!("      --no-welcome      Skip the welcome banner");
    eprintln!("  -v, --version         Show version");
    eprintln!("  -h, --help            Show this help");
    eprintln!();
    eprintln!("Keys:");
    eprintln!("  Enter                 Run the typed command");
    eprintln!("  Ctrl+V                Paste from the clipboard");
    eprintln!("  Shift+PageUp/PageDown Scroll the transcript");
    eprintln!("  Ctrl+C, Ctrl+D        Quit");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  {}   Backend base URL", config::API_BASE_ENV);
    eprintln!("  {}        Log filter (e.g. debug)", LOG_ENV);
    eprintln!();
    eprintln!("Log file: ~/.matrixterm/matrixterm.log");
}

fn parse_args<I>(args: I) -> Result<Command, String>
where
    I: IntoIterator<Item = String>,
{
    let mut cli = CliArgs::default();
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => return Ok(Command::Help),
            "-v" | "--version" => return Ok(Command::Version),
            "-u" | "--api-base" => {
                let url = args.next().ok_or("Missing URL for --api-base")?;
                cli.api_base = Some(url);
            }
            "-c" | "--config" => {
                let path = args.next().ok_or("Missing path for --config")?;
                cli.config_path = Some(PathBuf::from(path));
            }
            "--no-rain" => cli.no_rain = true,
            "--no-welcome" => cli.no_welcome = true,
            other => return Err(format!("Unknown argument: {}. Use -h for help.", other)),
        }
    }

    Ok(Command::Run(cli))
}

fn init_logging() {
    let Some(dir) = config::app_dir() else {
        return;
    };
    let log_path = dir.join("matrixterm.log");

    // Create log directory if needed
    let _ = std::fs::create_dir_all(&dir);

    // Open log file (append mode); stdout belongs to the UI
    let Ok(file) = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
    else {
        return;
    };

    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::sync::Mutex::new(file))
        .with_ansi(false)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn main() -> anyhow::Result<()> {
    let cli = match parse_args(env::args().skip(1)) {
        Ok(Command::Run(cli)) => cli,
        Ok(Command::Help) => {
            print_help();
            return Ok(());
        }
        Ok(Command::Version) => {
            print_version();
            return Ok(());
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("Use --help for usage information");
            std::process::exit(1);
        }
    };

    init_logging();
    info!("matrixterm {} starting...", VERSION);

    // Flags override environment, which overrides the file
    let mut config = Config::load(cli.config_path.as_deref());
    config.apply_env();
    if let Some(url) = cli.api_base {
        config.api_base_url = url;
    }

    let backend = Arc::new(HttpBackend::from_config(&config)?);
    let credentials = CredentialStore::default_location();
    match credentials.path() {
        Some(path) => info!("Credential store: {}", path.display()),
        None => info!("Credential store: memory only"),
    }
    let options = LaunchOptions {
        rain: !cli.no_rain,
        welcome: !cli.no_welcome,
    };

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let result = runtime.block_on(async {
        let app = App::new(config, options, backend, credentials)?;
        app.run().await
    });

    if let Err(e) = &result {
        error!("matrixterm exited with error: {:#}", e);
    }
    info!("matrixterm stopped");
    result
}
