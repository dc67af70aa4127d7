//! Router and request handlers.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, Json, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Router;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{error, info};

use textline_engine::{CommandRegistry, Context, Response, SessionState, Store};

/// Request bodies above this size are rejected outright.
pub const MAX_BODY_BYTES: usize = 8 * 1024;

type ClientState = HashMap<String, HashMap<String, Value>>;

/// Shared handles the handlers operate on.
#[derive(Clone)]
pub struct AppState {
    registry: Arc<CommandRegistry>,
    store: Store,
}

impl AppState {
    /// Bundle a registry and store for the router.
    pub fn new(registry: Arc<CommandRegistry>, store: Store) -> Self {
        Self { registry, store }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommandRequest {
    command: String,
    #[serde(default)]
    client_state: Option<ClientState>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CommandReply {
    response: Response,
    /// `null` on error responses so a failed command never mutates the
    /// caller's state.
    client_state: Option<ClientState>,
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/commands", post(run_command))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn run_command(
    State(state): State<AppState>,
    Json(request): Json<CommandRequest>,
) -> Result<Json<CommandReply>, StatusCode> {
    let session = match request.client_state {
        Some(map) => SessionState::from_map(map),
        None => SessionState::new(),
    };
    let mut ctx = Context::new(
        Arc::clone(&state.registry),
        state.store.clone(),
        session.clone(),
    );

    info!(command = %request.command, "request");
    match ctx.run_command(&request.command).await {
        Ok(response) => {
            let client_state = if response.is_error {
                None
            } else {
                Some(session.snapshot())
            };
            Ok(Json(CommandReply {
                response,
                client_state,
            }))
        }
        Err(err) => {
            error!(command = %request.command, error = %err, "invariant violation");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}
