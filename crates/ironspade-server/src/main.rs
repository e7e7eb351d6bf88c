// main.rs — CLI entry point
//
// `ironspade start --config configs/server.toml --log-level info` runs
// the server until SIGINT. Exit code 1 for configuration or startup
// failures.

mod bans;
mod masterserver;
mod net;
mod ping;
mod rate_limit;
mod server;
mod shutdown;
mod sv_ccmds;
mod sv_init;
mod sv_main;
mod sv_send;
mod sv_user;
mod vote;

use clap::{Parser, Subcommand};
use ironspade_common::config::Config;
use log::LevelFilter;
use server::Server;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "ironspade", about = "Ace of Spades 0.75 dedicated server")]
struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, default_value = "configs/server.toml")]
    config: PathBuf,

    /// Log level: debug, info, warn, error.
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Start the server (default).
    Start,
    /// Print version information.
    Version,
}

/// stdout plus an optional log file.
struct TeeWriter {
    file: Option<std::fs::File>,
}

impl Write for TeeWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        std::io::stdout().write_all(buf)?;
        if let Some(file) = &mut self.file {
            file.write_all(buf)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        std::io::stdout().flush()?;
        if let Some(file) = &mut self.file {
            file.flush()?;
        }
        Ok(())
    }
}

fn level_filter(name: &str) -> LevelFilter {
    match name {
        "debug" => LevelFilter::Debug,
        "warn" => LevelFilter::Warn,
        "error" => LevelFilter::Error,
        _ => LevelFilter::Info,
    }
}

fn init_logging(level: LevelFilter, log_to_file: bool) -> Result<(), String> {
    let file = if log_to_file {
        std::fs::create_dir_all("logs")
            .map_err(|e| format!("failed to create log directory: {}", e))?;
        let epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        let path = format!("logs/ironspade_{}.log", epoch);
        Some(
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .map_err(|e| format!("failed to open log file {}: {}", path, e))?,
        )
    } else {
        None
    };

    env_logger::Builder::new()
        .filter_level(level)
        .target(env_logger::Target::Pipe(Box::new(TeeWriter { file })))
        .init();
    Ok(())
}

fn run_server(cli: &Cli) -> Result<(), String> {
    let config = Config::load(&cli.config).map_err(|e| e.to_string())?;
    config.validate().map_err(|e| e.to_string())?;

    init_logging(level_filter(&cli.log_level), config.server.log_to_file)?;
    log::info!("starting ironspade v{}", VERSION);

    let (trigger, token) = shutdown::shutdown_pair();
    let mut server = Server::new(config, token).map_err(|e| e.to_string())?;
    server.start();

    let trigger = Arc::new(trigger);
    {
        let trigger = Arc::clone(&trigger);
        ctrlc::set_handler(move || {
            log::info!("shutdown requested");
            trigger.trigger();
        })
        .map_err(|e| format!("failed to install signal handler: {}", e))?;
    }

    let tick_thread = std::thread::Builder::new()
        .name("tick".to_string())
        .spawn(move || {
            server.run();
            server.stop();
        })
        .map_err(|e| format!("failed to spawn tick thread: {}", e))?;

    tick_thread
        .join()
        .map_err(|_| "tick thread panicked".to_string())?;
    log::info!("server stopped successfully");
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match &cli.command {
        Some(Command::Version) => {
            println!("ironspade v{}", VERSION);
            println!("Ace of Spades 0.75 dedicated server");
            ExitCode::SUCCESS
        }
        Some(Command::Start) | None => match run_server(&cli) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("error: {}", e);
                ExitCode::FAILURE
            }
        },
    }
}
