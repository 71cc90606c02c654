use actix_web::{delete, get, post, web, HttpResponse, Result as WebResult};

use crate::api::models::{MessageReply, PaginationQuery, PostMessageRequest};
use crate::bot::{CommandRouter, Inbound};

// --- Messages ---

/// Same path as a bot message: commands are executed, plain text goes to the model.
#[post("/{id}/messages")]
pub async fn post_message(
    router: web::Data<CommandRouter>,
    id: web::Path<i64>,
    req: web::Json<PostMessageRequest>,
) -> WebResult<HttpResponse> {
    let req = req.into_inner();
    let inbound = Inbound {
        user_id: id.into_inner(),
        username: req.username,
        text: req.text,
    };

    let reply = router.handle(&inbound).await;
    Ok(HttpResponse::Ok().json(MessageReply { reply }))
}

// --- Settings ---

#[get("/{id}/settings")]
pub async fn get_settings(
    router: web::Data<CommandRouter>,
    id: web::Path<i64>,
) -> WebResult<HttpResponse> {
    let chat = router.chat();
    let id = id.into_inner();

    match chat.store().user_exists(id) {
        Ok(false) => return Ok(HttpResponse::NotFound().finish()),
        Ok(true) => {}
        Err(e) => return Ok(HttpResponse::InternalServerError().body(e.to_string())),
    }

    match chat.resolve_settings(id) {
        Ok(settings) => Ok(HttpResponse::Ok().json(settings)),
        Err(e) => Ok(HttpResponse::InternalServerError().body(e.to_string())),
    }
}

// --- Working history ---

#[get("/{id}/history")]
pub async fn get_history(
    router: web::Data<CommandRouter>,
    id: web::Path<i64>,
) -> WebResult<HttpResponse> {
    match router.chat().history().load(id.into_inner()) {
        Ok(turns) => Ok(HttpResponse::Ok().json(turns)),
        Err(e) => Ok(HttpResponse::InternalServerError().body(e.to_string())),
    }
}

#[delete("/{id}/history")]
pub async fn clear_history(
    router: web::Data<CommandRouter>,
    id: web::Path<i64>,
) -> WebResult<HttpResponse> {
    match router.chat().clear_history(id.into_inner()).await {
        Ok(()) => Ok(HttpResponse::NoContent().finish()),
        Err(e) => Ok(HttpResponse::InternalServerError().body(e.to_string())),
    }
}

// --- Audit log ---

#[get("/{id}/conversations")]
pub async fn get_conversations(
    router: web::Data<CommandRouter>,
    id: web::Path<i64>,
    query: web::Query<PaginationQuery>,
) -> WebResult<HttpResponse> {
    match router
        .chat()
        .store()
        .get_conversation_log(id.into_inner(), query.limit, query.offset)
    {
        Ok(turns) => Ok(HttpResponse::Ok().json(turns)),
        Err(e) => Ok(HttpResponse::InternalServerError().body(e.to_string())),
    }
}

pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({"status": "healthy"}))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health)).service(
        web::scope("/users")
            .service(post_message)
            .service(get_settings)
            .service(get_history)
            .service(clear_history)
            .service(get_conversations),
    );
}
