use actix_web::{web, App, HttpServer};
use chatrelay::api::middleware::ApiKeyAuth;
use chatrelay::bot::telegram::TelegramBot;
use chatrelay::cli::{
    build_router,
    commands::{Cli, Commands},
    run_cli,
};
use chatrelay::config::AppConfig;
use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

async fn run_bot(config: AppConfig) {
    let bot_token = match config.require_bot_token() {
        Ok(token) => token.to_string(),
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    let router = match build_router(&config) {
        Ok(r) => r,
        Err(e) => {
            error!("Failed to initialize bot: {}", e);
            std::process::exit(1);
        }
    };

    info!("Starting chatrelay Telegram bot...");
    Arc::new(TelegramBot::new(
        config.telegram.api_base.clone(),
        bot_token,
        config.telegram.poll_timeout_secs,
        router,
    ))
    .run()
    .await;
}

async fn serve(config: AppConfig) -> std::io::Result<()> {
    if config.auth.api_keys.is_empty() {
        error!("auth.api_keys is empty; refusing to start an unauthenticated server");
        std::process::exit(1);
    }

    let router = match build_router(&config) {
        Ok(r) => r,
        Err(e) => {
            error!("Failed to initialize server: {}", e);
            std::process::exit(1);
        }
    };

    let host = config.server.host.clone();
    let port = config.server.port;

    info!("Server listening on {}:{}", host, port);

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(config.clone()))
            .app_data(web::Data::from(router.clone()))
            .wrap(ApiKeyAuth)
            .configure(chatrelay::api::routes::configure)
    })
    .bind((host, port))?
    .run()
    .await
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let config = match AppConfig::load(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    match cli.command {
        Commands::Serve => serve(config).await,
        Commands::Bot => {
            run_bot(config).await;
            Ok(())
        }
        command => {
            if let Err(e) = run_cli(command, config).await {
                error!("{}", e);
                std::process::exit(1);
            }
            Ok(())
        }
    }
}
