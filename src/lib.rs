pub mod api;
pub mod bot;
pub mod chat;
pub mod cli;
pub mod config;
pub mod db;
pub mod history;
pub mod llm;
pub mod settings;
