pub mod commands;

use std::fmt::Write as _;
use std::sync::Arc;

use thiserror::Error;
use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::bot::{CommandRouter, Inbound};
use crate::chat::ChatService;
use crate::cli::commands::{Commands, LogAction, UsersAction};
use crate::config::{AppConfig, ConfigError};
use crate::db::{get_connection, ChatStore, ConversationTurn, DuckDbStore, StoreError, User};
use crate::history::SessionHistoryManager;
use crate::llm::ProviderFactory;

const EXPORT_PAGE_SIZE: usize = 500;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("database error: {0}")]
    Db(#[from] duckdb::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0} must be handled by the server entry point")]
    NotACliCommand(&'static str),
}

pub fn open_store(config: &AppConfig) -> Result<Arc<DuckDbStore>, CliError> {
    let pool = get_connection(&config.database)?;
    Ok(Arc::new(DuckDbStore::new(pool)))
}

/// Wires store, history manager and model client into the shared command router.
pub fn build_router(config: &AppConfig) -> Result<Arc<CommandRouter>, CliError> {
    let store: Arc<dyn ChatStore> = open_store(config)?;
    let llm = ProviderFactory::create_default(config)?;
    let history = SessionHistoryManager::new(store.clone(), config.chat.max_history_pairs);
    let chat = ChatService::new(store, history, llm, config.chat.clone());
    Ok(Arc::new(CommandRouter::new(Arc::new(chat))))
}

pub async fn run_cli(command: Commands, config: AppConfig) -> Result<(), CliError> {
    match command {
        Commands::Bot => Err(CliError::NotACliCommand("bot")),
        Commands::Serve => Err(CliError::NotACliCommand("serve")),
        Commands::Chat { user, name } => {
            let router = build_router(&config)?;
            run_repl(router, user, name).await
        }
        Commands::Users { action } => {
            let store = open_store(&config)?;
            match action {
                UsersAction::List { limit } => {
                    let users = store.list_users(limit, 0)?;
                    if users.is_empty() {
                        println!("No users found.");
                    } else {
                        println!("{:<20} | {:<32} | {}", "ID", "Created At", "Username");
                        println!("{:-<20}-+-{:-<32}-+-{:-<20}", "", "", "");
                        for u in users {
                            println!(
                                "{:<20} | {:<32} | {}",
                                u.user_id,
                                u.created_at.to_rfc3339(),
                                u.username.as_deref().unwrap_or("-")
                            );
                        }
                    }
                    Ok(())
                }
            }
        }
        Commands::Log { action } => {
            let store = open_store(&config)?;
            match action {
                LogAction::Export { user, path } => {
                    let account = store.get_user(user)?;
                    let mut entries = Vec::new();
                    loop {
                        let page = store.get_conversation_log(user, EXPORT_PAGE_SIZE, entries.len())?;
                        let done = page.len() < EXPORT_PAGE_SIZE;
                        entries.extend(page);
                        if done {
                            break;
                        }
                    }

                    let export_path = path.unwrap_or_else(|| format!("conversations_{}.txt", user));
                    std::fs::write(&export_path, format_export(user, account.as_ref(), &entries))?;
                    println!("Exported {} exchanges to: {}", entries.len(), export_path);
                    Ok(())
                }
            }
        }
    }
}

/// Renders an audit log as plain text, one block per exchange.
pub fn format_export(user_id: i64, account: Option<&User>, entries: &[ConversationTurn]) -> String {
    let mut export = String::new();
    let _ = writeln!(export, "User: {}", user_id);
    if let Some(account) = account {
        let _ = writeln!(export, "Username: {}", account.username.as_deref().unwrap_or("-"));
        let _ = writeln!(export, "Registered At: {}", account.created_at.to_rfc3339());
    }
    export.push_str("---\n");

    for entry in entries {
        let _ = writeln!(export, "[{}]", entry.created_at.to_rfc3339());
        let _ = writeln!(export, "[USER]: {}", entry.user_message);
        let _ = writeln!(export, "[ASSISTANT]: {}", entry.bot_response);
        export.push_str("---\n");
    }
    export
}

async fn run_repl(router: Arc<CommandRouter>, user_id: i64, username: Option<String>) -> Result<(), CliError> {
    let mut stdout = io::stdout();
    let mut lines = BufReader::new(io::stdin()).lines();

    stdout
        .write_all(
            format!(
                "--- chatrelay terminal chat ---\nChatting as user {}\nType /exit to quit, /help for commands.\n-------------------------------\n",
                user_id
            )
            .as_bytes(),
        )
        .await?;

    loop {
        stdout.write_all(b"\nUser> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let text = line.trim();

        if text.is_empty() {
            continue;
        }
        if text == "/exit" || text == "/quit" {
            break;
        }

        let inbound = Inbound {
            user_id,
            username: username.clone(),
            text: text.to_string(),
        };
        let reply = router.handle(&inbound).await;
        stdout.write_all(format!("Claude> {}\n", reply).as_bytes()).await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn export_lists_every_exchange() {
        let at = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        let entries = vec![
            ConversationTurn {
                id: 1,
                user_id: 7,
                user_message: "hi".to_string(),
                bot_response: "hello".to_string(),
                created_at: at,
            },
            ConversationTurn {
                id: 2,
                user_id: 7,
                user_message: "bye".to_string(),
                bot_response: "see you".to_string(),
                created_at: at,
            },
        ];

        let export = format_export(7, None, &entries);
        assert!(export.starts_with("User: 7\n---\n"));
        assert!(export.contains("[USER]: hi\n[ASSISTANT]: hello\n---\n"));
        assert!(export.contains("[USER]: bye\n[ASSISTANT]: see you\n---\n"));
    }
}
