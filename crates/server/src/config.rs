//! Command-line configuration.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

/// Runtime configuration, parsed from the command line.
#[derive(Debug, Parser)]
#[command(name = "textline-server", about = "Text-command execution server")]
pub struct Config {
    /// Address and port to listen on.
    #[arg(long, default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// Path to the JSON database file.
    #[arg(long, default_value = "db.json")]
    pub db: PathBuf,
}
