use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "chatrelay", version, about = "Relay chat messages to Claude with per-user history", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Override the config file path globally
    #[arg(short, long, global = true, default_value = "config.yaml")]
    pub config: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the Telegram bot (long polling)
    Bot,

    /// Start the HTTP API server
    Serve,

    /// Chat from the terminal as the given user
    Chat {
        /// The user id to chat as
        #[arg(short, long)]
        user: i64,
        /// Display name registered on first contact
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Inspect registered users
    Users {
        #[command(subcommand)]
        action: UsersAction,
    },

    /// Work with the conversation audit log
    Log {
        #[command(subcommand)]
        action: LogAction,
    },
}

#[derive(Subcommand)]
pub enum UsersAction {
    /// List registered users
    List {
        #[arg(short, long, default_value_t = 50)]
        limit: usize,
    },
}

#[derive(Subcommand)]
pub enum LogAction {
    /// Export a user's audit log to a .txt file
    Export {
        /// The user whose log to export
        #[arg(short, long)]
        user: i64,
        /// The path to the output file (optional)
        #[arg(short, long)]
        path: Option<String>,
    },
}
