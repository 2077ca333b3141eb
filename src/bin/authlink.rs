//! Authlink CLI binary.
//!
//! # Commands
//!
//! - `login` - Run the handshake against an authority and list authorized games
//! - `inspect` - Decode a framed packet and print the typed response

use std::io::{self, Read};
use std::path::PathBuf;

use anyhow::Context;
use authlink::{
    protocol::codec, Acknowledge, AutoAck, Client, Config, Packet, StdinAck, TcpTransport,
    Transport, VERSION,
};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "authlink")]
#[command(version = VERSION)]
#[command(about = "Authenticate to a game authority and list authorized games", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Authenticate and print the authorized games
    Login {
        /// Config file (default: <config dir>/authlink/config.toml)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Authority host
        #[arg(long)]
        host: Option<String>,

        /// Authority port
        #[arg(short, long)]
        port: Option<u16>,

        /// Account name
        #[arg(short, long)]
        username: Option<String>,

        /// Account password (or use env AUTHLINK_PASSWORD)
        #[arg(long)]
        password: Option<String>,

        /// Exit without waiting for Enter in terminal states
        #[arg(long)]
        no_wait: bool,

        /// Print the session report as JSON
        #[arg(long)]
        json: bool,

        /// Enable verbose logging
        #[arg(short, long)]
        verbose: bool,
    },

    /// Decode one packet frame
    Inspect {
        /// Frame (or - for stdin)
        input: Option<String>,

        /// Input file path
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Login {
            config,
            host,
            port,
            username,
            password,
            no_wait,
            json,
            verbose,
        } => cmd_login(config, host, port, username, password, no_wait, json, verbose),

        Commands::Inspect { input, file } => cmd_inspect(input, file),
    }
}

#[allow(clippy::too_many_arguments)]
fn cmd_login(
    config_path: Option<PathBuf>,
    host: Option<String>,
    port: Option<u16>,
    username: Option<String>,
    password: Option<String>,
    no_wait: bool,
    json: bool,
    verbose: bool,
) -> anyhow::Result<()> {
    // Initialize logging (stderr, so --json output stays clean)
    let log_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .init();

    let mut config = Config::load(config_path.as_deref())?;
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    if let Some(username) = username {
        config.account.username = username;
    }
    if let Some(password) = password {
        config.account.password = password;
    }

    let mut ack: Box<dyn Acknowledge> = if no_wait {
        Box::new(AutoAck)
    } else {
        Box::new(StdinAck)
    };

    let runtime = tokio::runtime::Runtime::new()?;
    let report = runtime.block_on(async {
        let (mut transport, events) =
            TcpTransport::connect_host(&config.server.host, config.server.port)
                .await
                .with_context(|| format!("failed to connect to {}", config.server.addr()))?;
        tracing::info!("Connected to server {}", config.server.addr());

        let client = Client::from_config(&config);
        let outcome = tokio::select! {
            report = client.run(&mut transport, events, ack.as_mut()) => Some(report),
            _ = tokio::signal::ctrl_c() => None,
        };

        match outcome {
            Some(report) => Ok::<_, anyhow::Error>(Some(report?)),
            None => {
                tracing::warn!("Interrupted");
                transport.shutdown().await;
                Ok(None)
            },
        }
    })?;

    let Some(report) = report else {
        return Ok(());
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for game in &report.games {
            println!(
                "{:>6}  {:<24} {:<10} {} ({})",
                game.id,
                game.name,
                game.version,
                game.process_name,
                if game.is_64bit { "x64" } else { "x86" }
            );
        }
    }

    match report.failure {
        Some(err) => Err(anyhow::anyhow!("session ended in {}: {}", report.state, err)),
        None => Ok(()),
    }
}

fn cmd_inspect(input: Option<String>, file: Option<PathBuf>) -> anyhow::Result<()> {
    let content = read_input(input, file)?;

    for line in content.lines().filter(|l| !l.trim().is_empty()) {
        let packet = Packet::from_frame(line)?;
        let response = codec::decode(&packet)?;
        println!("{}", serde_json::to_string_pretty(&response)?);
    }

    Ok(())
}

fn read_input(input: Option<String>, file: Option<PathBuf>) -> anyhow::Result<String> {
    if let Some(path) = file {
        return std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()));
    }

    match input.as_deref() {
        Some("-") | None => {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            Ok(buffer)
        },
        Some(s) => Ok(s.to_string()),
    }
}
