//! HTTP boundary for the note graph engine.
//!
//! One engine instance is built at startup and shared by every client
//! session; the engine handles its own locking, so handlers just forward
//! requests. JSON in, JSON out.

use actix_web::{middleware::Logger, web, App, HttpResponse, HttpServer, Responder};
use serde::Deserialize;

use cambium_core::{Engine, EngineConfig, EngineError, NoteDraft, NoteId, ResolveModeConfig};

#[derive(Deserialize)]
struct QueryRequest {
    #[serde(rename = "queryString")]
    query_string: String,
    #[serde(default = "default_mode")]
    mode: String,
}

fn default_mode() -> String {
    "note".to_string()
}

#[derive(Deserialize)]
struct WriteRequest {
    note: NoteDraft,
}

#[derive(Deserialize)]
struct DeleteRequest {
    id: String,
}

#[derive(Deserialize)]
struct RenderRequest {
    id: String,
    /// `to-source-markup` | `to-rendered-markup` | `to-id-permalink`
    dest: ResolveModeConfig,
}

fn error_response(err: &EngineError) -> HttpResponse {
    let body = serde_json::json!({ "error": err.to_string() });
    match err {
        EngineError::NameCollision { .. } | EngineError::DuplicateId { .. } => {
            HttpResponse::Conflict().json(body)
        }
        EngineError::Unresolved { .. } => HttpResponse::BadRequest().json(body),
        EngineError::Io { .. } | EngineError::Init { .. } => {
            HttpResponse::InternalServerError().json(body)
        }
    }
}

async fn health() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}

async fn query(engine: web::Data<Engine>, req: web::Json<QueryRequest>) -> impl Responder {
    if req.mode != "note" {
        return HttpResponse::BadRequest().json(serde_json::json!({
            "error": format!("unsupported query mode '{}'", req.mode)
        }));
    }
    HttpResponse::Ok().json(engine.query(&req.query_string))
}

async fn write(engine: web::Data<Engine>, req: web::Json<WriteRequest>) -> impl Responder {
    match engine.write(req.into_inner().note) {
        Ok(note) => HttpResponse::Ok().json(note),
        Err(e) => {
            log::warn!("write failed: {e}");
            error_response(&e)
        }
    }
}

async fn delete(engine: web::Data<Engine>, req: web::Json<DeleteRequest>) -> impl Responder {
    let id = NoteId(req.into_inner().id);
    match engine.delete(&id) {
        Ok(()) => HttpResponse::Ok().json(serde_json::json!({ "ok": true })),
        Err(e) => {
            log::warn!("delete of {id} failed: {e}");
            error_response(&e)
        }
    }
}

async fn render(engine: web::Data<Engine>, req: web::Json<RenderRequest>) -> impl Responder {
    let req = req.into_inner();
    let id = NoteId(req.id);
    match engine.resolve(&id, req.dest.into()) {
        Ok(nodes) => HttpResponse::Ok().json(nodes),
        Err(e) => {
            log::warn!("render of {id} failed: {e}");
            error_response(&e)
        }
    }
}

async fn reload(engine: web::Data<Engine>) -> impl Responder {
    match engine.reload() {
        Ok(summary) => HttpResponse::Ok().json(summary),
        Err(e) => {
            log::error!("reload failed: {e}");
            error_response(&e)
        }
    }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "cambium.yml".to_string());
    let config_text = std::fs::read_to_string(&config_path)?;
    let config = EngineConfig::from_yaml(&config_text)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

    let engine = Engine::init(config)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
    let engine = web::Data::new(engine);

    let bind = std::env::var("CAMBIUM_BIND").unwrap_or_else(|_| "127.0.0.1:3005".to_string());
    log::info!("listening on {bind}");

    HttpServer::new(move || {
        App::new()
            .app_data(engine.clone())
            .wrap(Logger::default())
            .route("/health", web::get().to(health))
            .route("/api/engine/query", web::post().to(query))
            .route("/api/engine/write", web::post().to(write))
            .route("/api/engine/delete", web::post().to(delete))
            .route("/api/note/render", web::post().to(render))
            .route("/api/engine/reload", web::post().to(reload))
    })
    .bind(bind)?
    .run()
    .await
}
