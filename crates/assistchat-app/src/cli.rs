use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Transport used to deliver chat messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Transport {
    /// One HTTP request per message, reply in the response
    Request,
    /// Persistent duplex channel with automatic reconnect
    Channel,
}

/// CLI arguments for assistchat
#[derive(Parser)]
#[command(name = "assistchat")]
#[command(about = "Terminal client for the shop assistant chat")]
#[command(version = "0.1.0")]
pub struct Cli {
    /// Base URL of the assistant server (e.g., http://localhost:8000)
    #[arg(
        long,
        value_name = "URL",
        env = "ASSISTCHAT_BASE_URL",
        default_value = "http://localhost:8000"
    )]
    pub base_url: String,

    /// Message transport
    #[arg(long, value_enum, default_value_t = Transport::Request)]
    pub transport: Transport,

    /// Where the conversation identifier is persisted
    /// (defaults to the platform's local data directory)
    #[arg(long, value_name = "PATH")]
    pub store_path: Option<PathBuf>,

    /// Forget the stored conversation identifier and start fresh
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub reset: bool,

    /// Open the chat panel immediately instead of waiting for /open
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub open: bool,

    /// Disable the unsolicited hint prompt
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub no_hints: bool,

    /// Disable the JSONL transcript log under ./logs
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub no_log: bool,
}
