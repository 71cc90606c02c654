#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use chatrelay::bot::telegram::{TelegramBot, TelegramError};
    use chatrelay::bot::{CommandRouter, HELP_TEXT};
    use chatrelay::chat::ChatService;
    use chatrelay::config::ChatConfig;
    use chatrelay::db::{ChatStore, DbPool, DuckDbStore};
    use chatrelay::history::SessionHistoryManager;
    use chatrelay::llm::models::{ChatOptions, ChatResponse, ContentBlock, Turn};
    use chatrelay::llm::{LlmError, LlmProvider};
    use serde_json::{json, Value};
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct Echo;

    #[async_trait]
    impl LlmProvider for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        async fn chat(&self, turns: &[Turn], options: &ChatOptions) -> Result<ChatResponse, LlmError> {
            let last = turns.last().map(|t| t.content.clone()).unwrap_or_default();
            Ok(ChatResponse {
                id: "msg".to_string(),
                model: options.model.clone(),
                content: vec![ContentBlock::Text { text: format!("echo: {last}") }],
                stop_reason: None,
                usage: None,
            })
        }
    }

    fn bot(server: &MockServer) -> (Arc<TelegramBot>, Arc<DuckDbStore>) {
        let store = Arc::new(DuckDbStore::new(DbPool::open_in_memory().unwrap()));
        let history = SessionHistoryManager::new(store.clone(), 10);
        let chat = ChatService::new(store.clone(), history, Arc::new(Echo), ChatConfig::default());
        let router = Arc::new(CommandRouter::new(Arc::new(chat)));
        let bot = TelegramBot::new(format!("{}/", server.uri()), "TEST".to_string(), 0, router);
        (Arc::new(bot), store)
    }

    fn text_update(update_id: i64, user_id: i64, text: &str) -> Value {
        json!({
            "update_id": update_id,
            "message": {
                "message_id": update_id,
                "chat": {"id": user_id, "type": "private"},
                "from": {"id": user_id, "is_bot": false, "first_name": "T", "username": format!("user{user_id}")},
                "text": text
            }
        })
    }

    async fn mount_updates(server: &MockServer, offset: i64, updates: Vec<Value>) {
        Mock::given(method("POST"))
            .and(path("/botTEST/getUpdates"))
            .and(body_partial_json(json!({"offset": offset})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true, "result": updates})))
            .expect(1)
            .mount(server)
            .await;
    }

    async fn mount_send_message(server: &MockServer, status: u16, body: Value) {
        Mock::given(method("POST"))
            .and(path("/botTEST/sendMessage"))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .mount(server)
            .await;
    }

    async fn mount_typing(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/botTEST/sendChatAction"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true, "result": true})))
            .mount(server)
            .await;
    }

    async fn bodies_for(server: &MockServer, api_method: &str) -> Vec<Value> {
        let suffix = format!("/{api_method}");
        server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .filter(|r| r.url.path().ends_with(&suffix))
            .map(|r| serde_json::from_slice(&r.body).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_poll_advances_offset_and_answers_each_message() {
        let server = MockServer::start().await;
        mount_updates(
            &server,
            5,
            vec![
                text_update(7, 42, "/help"),
                text_update(8, 43, "hello"),
                json!({"update_id": 9, "edited_message": {"message_id": 1}}),
            ],
        )
        .await;
        mount_typing(&server).await;
        mount_send_message(&server, 200, json!({"ok": true, "result": {"message_id": 100}})).await;

        let (bot, store) = bot(&server);
        let (next, handlers) = bot.poll_once(5).await.unwrap();
        assert_eq!(next, 10);
        assert_eq!(handlers.len(), 2);
        for handler in handlers {
            handler.await.unwrap();
        }

        // Typing is only shown before a model exchange, never for commands
        let typing = bodies_for(&server, "sendChatAction").await;
        assert_eq!(typing, vec![json!({"chat_id": 43, "action": "typing"})]);

        let mut sent = bodies_for(&server, "sendMessage").await;
        sent.sort_by_key(|b| b["chat_id"].as_i64());
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0], json!({"chat_id": 42, "text": HELP_TEXT}));
        assert_eq!(sent[1], json!({"chat_id": 43, "text": "echo: hello"}));

        assert!(store.user_exists(42).unwrap());
        assert_eq!(store.get_conversation_log(43, 10, 0).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_poll_keeps_offset() {
        let server = MockServer::start().await;
        mount_updates(&server, 3, vec![]).await;

        let (bot, _) = bot(&server);
        let (next, handlers) = bot.poll_once(3).await.unwrap();
        assert_eq!(next, 3);
        assert!(handlers.is_empty());
    }

    #[tokio::test]
    async fn test_failed_reply_is_logged_not_fatal() {
        let server = MockServer::start().await;
        mount_updates(&server, 0, vec![text_update(1, 50, "hi")]).await;
        mount_typing(&server).await;
        mount_send_message(
            &server,
            400,
            json!({"ok": false, "description": "Bad Request: chat not found"}),
        )
        .await;

        let (bot, store) = bot(&server);
        let (next, handlers) = bot.poll_once(0).await.unwrap();
        assert_eq!(next, 2);
        for handler in handlers {
            handler.await.unwrap();
        }

        // The exchange itself was completed before delivery failed
        assert_eq!(bodies_for(&server, "sendMessage").await.len(), 1);
        assert_eq!(store.get_conversation_log(50, 10, 0).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_rejected_poll_is_an_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/botTEST/getUpdates"))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(json!({"ok": false, "description": "Unauthorized"})),
            )
            .mount(&server)
            .await;

        let (bot, _) = bot(&server);
        match bot.poll_once(0).await {
            Err(TelegramError::Api(description)) => assert_eq!(description, "Unauthorized"),
            other => panic!("unexpected result: {:?}", other.map(|(next, _)| next)),
        }
    }
}
