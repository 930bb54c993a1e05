//! ReplayLog Server Binary
//!
//! Appends each client's newline-terminated payload to a shared log and
//! replays the whole log back to that client.

use clap::Parser;
use replaylog::config::ServerConfig;
use replaylog::logging::{self, LogBackend};
use replaylog::server::{daemon, listener, Detached, LogServer, ShutdownLatch};
use replaylog::Result;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "replaylog-server")]
#[command(about = "Sequential TCP server that replays a shared append-only log")]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config/server.toml")]
    config: PathBuf,

    /// Detach into the background once the port is bound
    #[arg(short, long)]
    daemon: bool,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Address to bind to
    #[arg(short, long)]
    bind: Option<String>,

    /// Data file holding the shared log
    #[arg(short = 'f', long)]
    data_file: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Send logs to the local syslog daemon
    #[cfg(feature = "syslog-backend")]
    #[arg(long)]
    syslog: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    // Loaded before logging so a daemonizing server can pick syslog up front.
    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            if logging::init(args.verbose, LogBackend::Stderr).is_ok() {
                error!("{}", e);
            } else {
                eprintln!("{}", e);
            }
            return ExitCode::FAILURE;
        }
    };

    #[cfg(feature = "syslog-backend")]
    let syslog_requested = args.syslog;
    #[cfg(not(feature = "syslog-backend"))]
    let syslog_requested = false;

    let backend = logging::select_backend(syslog_requested, config.server.daemonize);
    if let Err(e) = logging::init(args.verbose, backend) {
        eprintln!("{}", e);
        return ExitCode::FAILURE;
    }

    if !args.config.exists() {
        info!("Config file not found, using defaults");
    }

    match run(config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn load_config(args: &Args) -> Result<ServerConfig> {
    let mut config = if args.config.exists() {
        ServerConfig::from_file(&args.config)?
    } else {
        ServerConfig::default()
    };

    // Override config with CLI arguments
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(bind) = &args.bind {
        config.server.bind_address = bind.clone();
    }
    if let Some(data_file) = &args.data_file {
        config.storage.data_file = data_file.clone();
    }
    if args.daemon {
        config.server.daemonize = true;
    }

    config.validate()?;
    config.resolve_paths_from_cwd()?;
    Ok(config)
}

fn run(config: ServerConfig) -> Result<()> {
    info!("Starting ReplayLog Server v{}", env!("CARGO_PKG_VERSION"));
    info!("Data file: {}", config.storage.data_file.display());

    let latch = ShutdownLatch::new()?;
    latch.install_signal_handlers()?;

    let bound = listener::bind(&config.server)?;

    if config.server.daemonize {
        if let Detached::Parent { child } = daemon::detach()? {
            info!("Daemon started with pid {}", child);
            return Ok(());
        }
    }

    let listener = bound.listen(config.server.backlog)?;

    // Built after detaching so fork never runs in a multi-threaded process.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(LogServer::new(config, latch).run(listener))?;

    info!("ReplayLog Server stopped");
    Ok(())
}
