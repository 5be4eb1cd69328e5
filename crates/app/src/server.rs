use crate::config::ServerConfig;
use crate::error::ApiError;
use anyhow::Context;
use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, Multipart, Query, State};
use axum::http::header::HeaderName;
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use docrelay_core::{
    ChatMessage, ChatRelay, SearchCoordinator, SearchQuery, SearchResult, UploadCoordinator,
    DEFAULT_TOP_K,
};
use futures::StreamExt;
use serde::Deserialize;
use serde_json::{json, Value};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

const X_ACCEL_BUFFERING: HeaderName = HeaderName::from_static("x-accel-buffering");

#[derive(Clone)]
pub struct AppState {
    pub uploads: Arc<UploadCoordinator>,
    pub search: Arc<SearchCoordinator>,
    pub chat: Arc<ChatRelay>,
}

impl AppState {
    pub fn new(uploads: UploadCoordinator, search: SearchCoordinator, chat: ChatRelay) -> Self {
        Self {
            uploads: Arc::new(uploads),
            search: Arc::new(search),
            chat: Arc::new(chat),
        }
    }
}

pub fn app_router(state: AppState, config: &ServerConfig) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/api/upload", post(upload))
        .route("/api/search", get(search))
        .route("/api/chat", post(chat))
        .with_state(state)
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

pub async fn run_server(config: ServerConfig, state: AppState) -> anyhow::Result<()> {
    let app = app_router(state, &config);
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| "invalid host/port for docrelay server")?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("docrelay listening on http://{}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok", "service": "docrelay" }))
}

async fn upload(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Value>, ApiError> {
    let mut multipart =
        multipart.map_err(|_| ApiError::bad_request("No file part in the request"))?;

    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await?;
        state.uploads.upload(&file_name, &bytes).await?;
        return Ok(Json(json!({ "success": "File uploaded and indexed successfully" })));
    }

    Err(ApiError::bad_request("No file part in the request"))
}

#[derive(Debug, Deserialize)]
struct SearchParams {
    #[serde(default)]
    query: String,
    #[serde(default)]
    k: Option<String>,
}

async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<SearchResult>>, ApiError> {
    // Unparseable k falls back to the default rather than failing.
    let top_k = params
        .k
        .as_deref()
        .and_then(|k| k.trim().parse::<usize>().ok())
        .unwrap_or(DEFAULT_TOP_K);

    let query = SearchQuery::new(params.query).with_top_k(top_k);
    let results = state.search.search(&query).await?;
    Ok(Json(results))
}

#[derive(Debug, Deserialize)]
struct SingleChatRequest {
    message: String,
    images: Vec<String>,
}

async fn chat(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(body) = payload.map_err(|_| ApiError::bad_request("No message or images provided"))?;

    if let Some(messages) = body.get("messages") {
        let messages: Vec<ChatMessage> = serde_json::from_value(messages.clone())
            .map_err(|error| ApiError::bad_request(format!("Invalid messages: {error}")))?;
        let relay = state.chat.chat_stream(messages)?;

        let events = relay.map(|event| {
            // SSE field values cannot carry carriage returns. A token with
            // newlines becomes one `data:` line per line, which standard
            // EventSource clients join back with `\n`.
            let data = event.data().replace("\r\n", "\n").replace('\r', "\n");
            Ok::<_, Infallible>(Event::default().data(data))
        });
        return Ok(([(X_ACCEL_BUFFERING, "no")], Sse::new(events)).into_response());
    }

    let request: SingleChatRequest = serde_json::from_value(body)
        .map_err(|_| ApiError::bad_request("No message or images provided"))?;
    let response = state.chat.chat(&request.message, &request.images).await?;
    Ok(Json(json!({ "response": response })).into_response())
}
