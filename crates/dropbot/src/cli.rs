use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "dropbot")]
#[command(author, version, about = "Telegram bot that downloads media by URL and sends it back", long_about = None)]
pub struct Cli {
    /// Settings file (defaults to ./dropbot.toml when present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Commands {
    /// Run the bot with long polling
    Run,

    /// List the formats available for a URL without downloading
    Formats {
        /// Media page URL
        url: String,
    },

    /// Create or upgrade the database schema and exit
    Migrate,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
