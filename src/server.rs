//!
//! todod HTTP server
//! -----------------
//! This module defines the Axum-based JSON API: user registration, login and
//! logout, plus owner-scoped to-do CRUD.
//!
//! Responsibilities:
//! - Token transport via the `x-auth` request/response header.
//! - Principal resolution as a pre-condition of every protected handler.
//! - Mapping of application errors to HTTP statuses with empty bodies
//!   (store-internal errors are logged, never echoed to clients).
//! - Identifier shape validation at the route boundary: a malformed id is
//!   404 on the read/delete routes but 400 on the update route, a historical
//!   contract preserved for compatibility.

use std::net::SocketAddr;

use anyhow::Context;
use axum::{routing::{delete, get, post}, Router, extract::{Path, State}, Json};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::identity::{Authenticator, Principal, PublicPrincipal, SessionManager, TokenCodec};
use crate::storage::SharedStore;
use crate::todos::{Todo, TodoGate, TodoPatch};

/// Header carrying the auth token in both directions.
pub const AUTH_HEADER: &str = "x-auth";

/// Shared server state injected into all handlers. Components are constructed
/// once at startup around the same store handle and signing secret; nothing
/// here is ambient global state.
#[derive(Clone)]
pub struct AppState {
    pub sessions: SessionManager,
    pub auth: Authenticator,
    pub todos: TodoGate,
}

pub struct ServerConfig {
    pub port: u16,
    pub db_root: String,
    pub secret: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 3000, db_root: "dbs".to_string(), secret: "todod-dev-secret".to_string() }
    }
}

/// Convenience entry point using default port, store root and dev secret.
pub async fn run() -> anyhow::Result<()> {
    run_with_config(ServerConfig::default()).await
}

pub async fn run_with_config(cfg: ServerConfig) -> anyhow::Result<()> {
    let store = SharedStore::new(&cfg.db_root)
        .with_context(|| format!("while opening store under root: {}", cfg.db_root))?;
    let state = build_state(store, &cfg.secret);
    let app = router(state);

    let addr: SocketAddr = format!("0.0.0.0:{}", cfg.port).parse()?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

pub fn build_state(store: SharedStore, secret: &str) -> AppState {
    let codec = TokenCodec::new(secret);
    AppState {
        sessions: SessionManager::new(store.clone(), codec.clone()),
        auth: Authenticator::new(store.clone(), codec.clone()),
        todos: TodoGate::new(store),
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { "todod ok" }))
        .route("/todos", post(todos_create).get(todos_list))
        .route("/todos/{id}", get(todos_get).delete(todos_remove).patch(todos_update))
        .route("/users", post(users_create))
        .route("/users/login", post(users_login))
        .route("/users/me", get(users_me))
        .route("/users/me/token", delete(users_remove_token))
        .with_state(state)
}

/// Failure responses carry only the mapped status; codes and messages stay in
/// the logs.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let AppError::Internal { .. } = &self {
            error!("internal failure: {self}");
        }
        let status = StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        status.into_response()
    }
}

#[derive(Debug, Deserialize)]
struct CredentialsPayload {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

#[derive(Debug, Deserialize)]
struct CreateTodoPayload {
    #[serde(default)]
    text: String,
}

/// Pre-condition for every protected route: resolve the `x-auth` header to a
/// principal, or fail with 401. Returns the raw token too so logout can
/// revoke exactly the credential that authenticated this request.
async fn authenticate(state: &AppState, headers: &HeaderMap) -> AppResult<(Principal, String)> {
    let token = headers
        .get(AUTH_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let principal = state.auth.resolve(&token).await?;
    Ok((principal, token))
}

fn parse_id(raw: &str) -> AppResult<String> {
    Uuid::parse_str(raw)
        .map(|u| u.to_string())
        .map_err(|_| AppError::malformed_id("malformed_id", "not a valid todo id"))
}

fn with_auth_header(token: &str, body: impl IntoResponse) -> Response {
    let mut resp = body.into_response();
    if let Ok(v) = HeaderValue::from_str(token) {
        resp.headers_mut().insert(AUTH_HEADER, v);
    }
    resp
}

async fn users_create(
    State(state): State<AppState>,
    Json(payload): Json<CredentialsPayload>,
) -> Result<Response, AppError> {
    let (principal, token) = state.sessions.register(&payload.email, &payload.password).await?;
    Ok(with_auth_header(&token, Json(principal.to_public())))
}

async fn users_login(
    State(state): State<AppState>,
    Json(payload): Json<CredentialsPayload>,
) -> Result<Response, AppError> {
    let (principal, token) = state.sessions.login(&payload.email, &payload.password).await?;
    Ok(with_auth_header(&token, Json(principal.to_public())))
}

async fn users_me(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<PublicPrincipal>, AppError> {
    let (principal, _) = authenticate(&state, &headers).await?;
    Ok(Json(principal.to_public()))
}

async fn users_remove_token(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<StatusCode, AppError> {
    let (principal, token) = authenticate(&state, &headers).await?;
    // This route reports internal failure as 400, not 500.
    state
        .sessions
        .logout(&principal.id, &token)
        .await
        .map_err(|e| AppError::validation("logout_failed", e.message().to_string()))?;
    Ok(StatusCode::OK)
}

async fn todos_create(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateTodoPayload>,
) -> Result<Json<Todo>, AppError> {
    let (principal, _) = authenticate(&state, &headers).await?;
    let todo = state.todos.create(&principal, &payload.text).await?;
    Ok(Json(todo))
}

async fn todos_list(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, AppError> {
    let (principal, _) = authenticate(&state, &headers).await?;
    let todos = state.todos.list(&principal).await?;
    Ok(Json(json!({ "todos": todos })))
}

async fn todos_get(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, AppError> {
    let (principal, _) = authenticate(&state, &headers).await?;
    let id = parse_id(&id)?;
    let todo = state.todos.get_by_id(&principal, &id).await?;
    Ok(Json(json!({ "todo": todo })))
}

async fn todos_remove(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, AppError> {
    let (principal, _) = authenticate(&state, &headers).await?;
    let id = parse_id(&id)?;
    let todo = state.todos.remove(&principal, &id).await?;
    Ok(Json(json!({ "todo": todo })))
}

async fn todos_update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(patch): Json<TodoPatch>,
) -> Result<Json<serde_json::Value>, AppError> {
    let (principal, _) = authenticate(&state, &headers).await?;
    // Unlike the read/delete routes, this route has always answered 400 for
    // an id that is not even well-formed.
    let id = parse_id(&id).map_err(|_| AppError::validation("malformed_id", "not a valid todo id"))?;
    let todo = state.todos.update(&principal, &id, patch).await?;
    Ok(Json(json!({ "todo": todo })))
}
