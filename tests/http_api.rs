#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use actix_web::http::StatusCode;
    use actix_web::{test, web, App};
    use async_trait::async_trait;
    use chatrelay::api::middleware::ApiKeyAuth;
    use chatrelay::api::models::MessageReply;
    use chatrelay::api::routes;
    use chatrelay::bot::CommandRouter;
    use chatrelay::chat::ChatService;
    use chatrelay::config::{AppConfig, ChatConfig};
    use chatrelay::db::{ChatStore, DbPool, DuckDbStore};
    use chatrelay::history::SessionHistoryManager;
    use chatrelay::llm::models::{ChatOptions, ChatResponse, ContentBlock, Turn};
    use chatrelay::llm::{LlmError, LlmProvider};
    use serde_json::json;

    struct Upper;

    #[async_trait]
    impl LlmProvider for Upper {
        fn name(&self) -> &str {
            "upper"
        }

        async fn chat(&self, turns: &[Turn], options: &ChatOptions) -> Result<ChatResponse, LlmError> {
            let last = turns.last().map(|t| t.content.to_uppercase()).unwrap_or_default();
            Ok(ChatResponse {
                id: "msg".to_string(),
                model: options.model.clone(),
                content: vec![ContentBlock::Text { text: last }],
                stop_reason: None,
                usage: None,
            })
        }
    }

    fn setup() -> (AppConfig, Arc<CommandRouter>, Arc<DuckDbStore>) {
        let mut config = AppConfig::default();
        config.auth.api_keys = vec!["secret".to_string()];

        let store = Arc::new(DuckDbStore::new(DbPool::open_in_memory().unwrap()));
        let history = SessionHistoryManager::new(store.clone(), 10);
        let chat = ChatService::new(store.clone(), history, Arc::new(Upper), ChatConfig::default());
        (config, Arc::new(CommandRouter::new(Arc::new(chat))), store)
    }

    macro_rules! app {
        ($config:expr, $router:expr) => {
            test::init_service(
                App::new()
                    .app_data(web::Data::new($config.clone()))
                    .app_data(web::Data::from($router.clone()))
                    .wrap(ApiKeyAuth)
                    .configure(routes::configure),
            )
            .await
        };
    }

    #[actix_web::test]
    async fn test_health_is_public_and_other_routes_need_a_key() {
        let (config, router, _) = setup();
        let app = app!(config, router);

        let resp = test::call_service(&app, test::TestRequest::get().uri("/health").to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);

        for auth in [None, Some("Bearer wrong"), Some("secret")] {
            let mut req = test::TestRequest::get().uri("/users/1/history");
            if let Some(value) = auth {
                req = req.insert_header(("Authorization", value));
            }
            match test::try_call_service(&app, req.to_request()).await {
                Err(e) => assert_eq!(e.as_response_error().status_code(), StatusCode::UNAUTHORIZED),
                Ok(resp) => panic!("expected 401, got {}", resp.status()),
            }
        }
    }

    #[actix_web::test]
    async fn test_message_round_trip_through_router() {
        let (config, router, store) = setup();
        let app = app!(config, router);

        let req = test::TestRequest::post()
            .uri("/users/77/messages")
            .insert_header(("Authorization", "Bearer secret"))
            .set_json(json!({"text": "hello", "username": "dora"}))
            .to_request();
        let reply: MessageReply = test::call_and_read_body_json(&app, req).await;
        assert_eq!(reply.reply, "HELLO");

        assert_eq!(store.get_session_history(77).unwrap().len(), 2);
        assert_eq!(
            store.get_user(77).unwrap().unwrap().username.as_deref(),
            Some("dora")
        );

        let req = test::TestRequest::get()
            .uri("/users/77/conversations")
            .insert_header(("Authorization", "Bearer secret"))
            .to_request();
        let log: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(log[0]["user_message"], "hello");
        assert_eq!(log[0]["bot_response"], "HELLO");

        let req = test::TestRequest::delete()
            .uri("/users/77/history")
            .insert_header(("Authorization", "Bearer secret"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
        assert!(store.get_session_history(77).unwrap().is_empty());
    }

    #[actix_web::test]
    async fn test_settings_route() {
        let (config, router, _) = setup();
        let app = app!(config, router);

        let req = test::TestRequest::get()
            .uri("/users/5/settings")
            .insert_header(("Authorization", "Bearer secret"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let req = test::TestRequest::post()
            .uri("/users/5/messages")
            .insert_header(("Authorization", "Bearer secret"))
            .set_json(json!({"text": "/set_max_tokens 256"}))
            .to_request();
        let reply: MessageReply = test::call_and_read_body_json(&app, req).await;
        assert_eq!(reply.reply, "Max tokens set to 256.");

        let req = test::TestRequest::get()
            .uri("/users/5/settings")
            .insert_header(("Authorization", "Bearer secret"))
            .to_request();
        let settings: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(settings["max_tokens"], 256);
        assert_eq!(settings["model"], "claude-3-7-sonnet-20250219");
    }
}
