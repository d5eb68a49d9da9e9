//! Unified quick-tunnel CLI.
//!
//! - `quick-tunnel server` - Run the relay (also available as the standalone
//!   `tunnel-server` binary)

use std::process::ExitCode;

use clap::{Parser, Subcommand};

/// quick-tunnel unified CLI.
#[derive(Parser)]
#[command(
    name = "quick-tunnel",
    version,
    about = "Rendezvous WebSocket tunnel relay",
    propagate_version = true
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the relay server.
    #[command(name = "server", alias = "serve")]
    Server(Box<tunnel_server::ServerArgs>),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Server(args) => tunnel_server::cli::run(*args).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
