//! Command-line interface

use clap::{Parser, Subcommand};

/// Telegram bot for merchant onboarding and directory listing
#[derive(Parser, Debug)]
#[command(name = "shangbang", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the bot (default when no command is given)
    Run,

    /// Generate binding codes and print them
    GenCode {
        /// How many codes to generate
        #[arg(long, default_value_t = 1)]
        count: u32,

        /// Code lifetime in hours; 0 means no expiry
        #[arg(long, default_value_t = 24)]
        expiry_hours: i64,
    },

    /// Sweep expired binding codes, stale drafts and old activity logs
    Cleanup,

    /// Seed a default set of posting time slots (skips existing ones)
    SeedSlots {
        /// Comma-separated HH:MM values
        #[arg(long, default_value = "12:00,18:00,20:00,21:00,22:00")]
        times: String,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
