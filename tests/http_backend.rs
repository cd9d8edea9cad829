use axum::{
    body::Body,
    extract::{ Path, State },
    http::{ header, StatusCode },
    response::{ IntoResponse, Response },
    routing::{ delete, get, post },
    Json,
    Router,
};
use futures::StreamExt;
use serde_json::{ json, Value };
use std::sync::{ Arc, Mutex };
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::time::Instant;
use url::Url;

use thursday_chat::backend::{ ApiError, Backend, HttpBackend };
use thursday_chat::models::api::{ ChatMode, ChatRequest };
use thursday_chat::models::chat::{ Message, Role };
use thursday_chat::stream::{ frames, DeltaAccumulator };

#[derive(Clone, Default)]
struct Recorded {
    chat_bodies: Arc<Mutex<Vec<Value>>>,
    renames: Arc<Mutex<Vec<(String, String)>>>,
    deleted: Arc<Mutex<Vec<String>>>,
}

async fn health() -> Json<Value> {
    Json(json!({ "proxy": "ok", "llama_server": "unreachable" }))
}

async fn list_conversations() -> Json<Value> {
    Json(
        json!({
        "conversations": [
            { "id": "c1", "title": "Groceries", "created_at": 1700000000.0, "updated_at": 1700000100.5 },
            { "id": "c2", "updated_at": 1700000200.0 }
        ]
    })
    )
}

async fn create_conversation() -> Json<Value> {
    Json(json!({ "id": "c3", "title": "New Chat", "created_at": 1.0, "updated_at": 1.0 }))
}

async fn get_conversation(Path(id): Path<String>) -> Response {
    if id != "c1" {
        return (StatusCode::NOT_FOUND, Json(json!({ "error": "not found" }))).into_response();
    }
    Json(
        json!({
        "conversation_id": "c1",
        "messages": [
            { "role": "user", "content": "milk?" },
            { "role": "assistant", "content": "Yes, **milk**." }
        ]
    })
    ).into_response()
}

async fn rename_conversation(
    State(recorded): State<Recorded>,
    Path(id): Path<String>,
    Json(body): Json<Value>
) -> Json<Value> {
    let title = body["title"].as_str().unwrap_or_default().to_string();
    recorded.renames.lock().unwrap().push((id, title));
    Json(json!({ "ok": true }))
}

async fn delete_conversation(State(recorded): State<Recorded>, Path(id): Path<String>) -> Json<Value> {
    recorded.deleted.lock().unwrap().push(id);
    Json(json!({ "ok": true }))
}

async fn list_memory() -> Json<Value> {
    Json(json!({ "facts": [{ "id": 1, "content": "likes tea", "created_at": 1700000000.0 }] }))
}

async fn delete_memory(Path(id): Path<i64>) -> StatusCode {
    if id == 1 { StatusCode::OK } else { StatusCode::NOT_FOUND }
}

async fn list_reminders() -> Json<Value> {
    Json(
        json!({
        "reminders": [
            { "id": 5, "message": "stretch", "trigger_at": 1700000300.0, "created_at": 1700000000.0, "conversation_id": "c1" }
        ]
    })
    )
}

async fn list_all_reminders() -> Json<Value> {
    Json(
        json!({
        "reminders": [
            { "id": 5, "message": "stretch", "trigger_at": 1700000300.0, "created_at": 1700000000.0, "fired": false, "conversation_id": "c1" },
            { "id": 2, "message": "call mom", "trigger_at": 1690000000.0, "created_at": 1689990000.0, "fired": true, "conversation_id": null }
        ]
    })
    )
}

async fn delete_reminder(State(recorded): State<Recorded>, Path(id): Path<i64>) -> Response {
    if id != 5 {
        return (StatusCode::NOT_FOUND, Json(json!({ "status": "not_found" }))).into_response();
    }
    recorded.deleted.lock().unwrap().push(format!("reminder {}", id));
    Json(json!({ "status": "deleted", "id": id })).into_response()
}

async fn clear() -> Json<Value> {
    Json(json!({ "ok": true }))
}

fn event(text: &str) -> String {
    format!("data: {}\n\n", json!({ "choices": [{ "delta": { "content": text } }] }))
}

async fn chat(State(recorded): State<Recorded>, Json(body): Json<Value>) -> Response {
    let overloaded = body["temperature"].as_f64().unwrap_or_default() > 1.5;
    recorded.chat_bodies.lock().unwrap().push(body);
    if overloaded {
        return (StatusCode::SERVICE_UNAVAILABLE, "overloaded").into_response();
    }

    // Chunk boundaries deliberately fall inside events.
    let whole = format!("{}{}: keepalive\n\n{}data: [DONE]\n\n", event("Hello"), event(", wörld"), event("!"));
    let bytes = whole.into_bytes();
    let pieces: Vec<Vec<u8>> = bytes.chunks(7).map(<[u8]>::to_vec).collect();
    let body = futures::stream::unfold(pieces.into_iter(), |mut pieces| async move {
        let piece = pieces.next()?;
        tokio::time::sleep(Duration::from_millis(1)).await;
        Some((Ok::<_, std::io::Error>(piece), pieces))
    });
    ([(header::CONTENT_TYPE, "text/event-stream")], Body::from_stream(body)).into_response()
}

fn routes(recorded: Recorded) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/v1/conversations", get(list_conversations).post(create_conversation))
        .route(
            "/v1/conversations/{id}",
            get(get_conversation).patch(rename_conversation).delete(delete_conversation)
        )
        .route("/v1/memory", get(list_memory))
        .route("/v1/memory/{id}", delete(delete_memory))
        .route("/v1/reminders", get(list_reminders))
        .route("/v1/reminders/all", get(list_all_reminders))
        .route("/v1/reminders/{id}", delete(delete_reminder))
        .route("/v1/clear", post(clear))
        .route("/v1/chat/completions", post(chat))
        .with_state(recorded)
}

async fn spawn(app: Router, prefix: &str) -> HttpBackend {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    let base = Url::parse(&format!("http://{}{}/", addr, prefix)).unwrap();
    HttpBackend::new(base, Duration::from_secs(5)).unwrap()
}

fn request(temperature: f32) -> ChatRequest {
    ChatRequest {
        messages: vec![Message::user("hi")],
        conversation_id: Some("c1".into()),
        mode: ChatMode::Raw,
        stream: true,
        temperature,
        max_tokens: 32,
    }
}

#[tokio::test]
async fn conversation_endpoints() {
    let recorded = Recorded::default();
    let backend = spawn(routes(recorded.clone()), "").await;

    let health = backend.health().await.unwrap();
    assert!(!health.llama_ok());

    let list = backend.list_conversations().await.unwrap();
    assert_eq!(list.len(), 2);
    assert_eq!(list[0].title, "Groceries");
    assert_eq!(list[1].title, "New Chat");

    assert_eq!(backend.create_conversation().await.unwrap().id, "c3");

    let messages = backend.get_conversation("c1").await.unwrap();
    assert_eq!(messages[1].role, Role::Assistant);
    assert_eq!(messages[1].content, "Yes, **milk**.");

    let missing = backend.get_conversation("nope").await.unwrap_err();
    assert!(matches!(missing, ApiError::NotFound(_)));
    assert_eq!(missing.status(), Some(404));

    backend.rename_conversation("c1", "Shopping").await.unwrap();
    backend.delete_conversation("c2").await.unwrap();
    assert_eq!(*recorded.renames.lock().unwrap(), vec![("c1".to_string(), "Shopping".to_string())]);
    assert_eq!(*recorded.deleted.lock().unwrap(), vec!["c2".to_string()]);
}

#[tokio::test]
async fn memory_and_history_endpoints() {
    let backend = spawn(routes(Recorded::default()), "").await;

    let facts = backend.list_memory().await.unwrap();
    assert_eq!(facts[0].id, 1);
    assert_eq!(facts[0].content, "likes tea");

    backend.delete_memory(1).await.unwrap();
    assert!(matches!(backend.delete_memory(9).await, Err(ApiError::NotFound(_))));
    backend.clear_history().await.unwrap();
}

#[tokio::test]
async fn reminder_endpoints() {
    let recorded = Recorded::default();
    let backend = spawn(routes(recorded.clone()), "").await;

    let active = backend.list_reminders(false).await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].message, "stretch");
    assert!(!active[0].fired);
    assert_eq!(active[0].conversation_id.as_deref(), Some("c1"));

    let all = backend.list_reminders(true).await.unwrap();
    assert_eq!(all.len(), 2);
    assert!(all[1].fired);
    assert_eq!(all[1].conversation_id, None);

    backend.delete_reminder(5).await.unwrap();
    assert_eq!(*recorded.deleted.lock().unwrap(), vec!["reminder 5".to_string()]);
    let missing = backend.delete_reminder(8).await.unwrap_err();
    assert!(matches!(missing, ApiError::NotFound(_)));
}

#[tokio::test]
async fn chat_stream_delivers_events_across_chunk_boundaries() {
    let recorded = Recorded::default();
    let backend = spawn(routes(recorded.clone()), "").await;

    let body = backend.chat_stream(&request(0.2)).await.unwrap();
    let mut events = Box::pin(frames(body));
    let mut accumulator = DeltaAccumulator::new();
    while let Some(payload) = events.next().await {
        accumulator.apply(&payload.unwrap(), Instant::now());
    }
    assert_eq!(accumulator.text(), "Hello, wörld!");
    assert_eq!(accumulator.token_count(), 3);

    let sent = recorded.chat_bodies.lock().unwrap()[0].clone();
    assert_eq!(sent["mode"], "raw");
    assert_eq!(sent["stream"], true);
    assert_eq!(sent["max_tokens"], 32);
    assert_eq!(sent["conversation_id"], "c1");
    assert_eq!(sent["messages"][0]["content"], "hi");
}

#[tokio::test]
async fn chat_stream_error_status_is_not_a_stream() {
    let backend = spawn(routes(Recorded::default()), "").await;

    match backend.chat_stream(&request(1.9)).await {
        Err(ApiError::Status { status, body }) => {
            assert_eq!(status, 503);
            assert_eq!(body, "overloaded");
        }
        Err(other) => panic!("unexpected error: {}", other),
        Ok(_) => panic!("expected an error status"),
    }
}

#[tokio::test]
async fn base_url_path_prefix_is_kept() {
    let app = Router::new().nest("/api", routes(Recorded::default()));
    let backend = spawn(app, "/api").await;

    assert_eq!(backend.list_conversations().await.unwrap().len(), 2);
}

#[tokio::test]
async fn unreachable_server_is_a_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let base = Url::parse(&format!("http://{}/", addr)).unwrap();
    let backend = HttpBackend::new(base, Duration::from_secs(2)).unwrap();

    assert!(matches!(backend.health().await, Err(ApiError::Transport(_))));
}
