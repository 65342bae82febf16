use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex},
};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::bracket::BracketInstance;
use crate::error::BracketError;
use crate::types::{
    AdvancementEffects, BracketOptions, BracketSnapshot, Format, MatchRecord, ParticipantId, Standing,
};

// ── Registry ───────────────────────────────────────────────────────────

/// Brackets held by one server process, keyed by a sequential id.
#[derive(Debug, Default)]
pub struct BracketRegistry {
    next_id: u64,
    brackets: BTreeMap<u64, BracketInstance>,
}

impl BracketRegistry {
    pub fn insert(&mut self, bracket: BracketInstance) -> u64 {
        self.next_id += 1;
        self.brackets.insert(self.next_id, bracket);
        self.next_id
    }

    pub fn get(&self, id: u64) -> Option<&BracketInstance> {
        self.brackets.get(&id)
    }

    pub fn get_mut(&mut self, id: u64) -> Option<&mut BracketInstance> {
        self.brackets.get_mut(&id)
    }

    pub fn len(&self) -> usize {
        self.brackets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.brackets.is_empty()
    }
}

pub type SharedRegistry = Arc<Mutex<BracketRegistry>>;

#[derive(Clone)]
pub struct ServerState {
    pub registry: SharedRegistry,
    pub defaults: BracketOptions,
}

impl ServerState {
    pub fn new(defaults: BracketOptions) -> Self {
        ServerState {
            registry: Arc::new(Mutex::new(BracketRegistry::default())),
            defaults,
        }
    }
}

// ── Errors ─────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    fn unknown_bracket(id: u64) -> Self {
        ApiError {
            status: StatusCode::NOT_FOUND,
            message: format!("bracket {id} not found"),
        }
    }
}

impl From<BracketError> for ApiError {
    fn from(err: BracketError) -> Self {
        let status = match &err {
            _ if err.is_fatal() => StatusCode::INTERNAL_SERVER_ERROR,
            BracketError::MatchNotFound(_) => StatusCode::NOT_FOUND,
            BracketError::MatchNotReady(_)
            | BracketError::MatchNotPlayable { .. }
            | BracketError::ResultConflict { .. } => StatusCode::CONFLICT,
            _ => StatusCode::UNPROCESSABLE_ENTITY,
        };
        ApiError {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

// ── Handlers ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBracketRequest {
    pub format: String,
    pub participants: Vec<String>,
    #[serde(default)]
    pub options: Option<BracketOptions>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedBracket {
    pub id: u64,
    pub bracket: BracketSnapshot,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ResultRequest {
    pub score1: u32,
    pub score2: u32,
}

pub fn router(state: ServerState) -> Router {
    Router::new()
        .route("/brackets", post(create_bracket))
        .route("/brackets/:id", get(get_bracket))
        .route("/brackets/:id/records", get(get_records))
        .route("/brackets/:id/standings", get(get_standings))
        .route("/brackets/:id/matches/:match_id/start", post(start_match))
        .route("/brackets/:id/matches/:match_id/result", post(submit_result))
        .with_state(state)
}

pub async fn create_bracket(
    State(state): State<ServerState>,
    Json(request): Json<CreateBracketRequest>,
) -> Result<(StatusCode, Json<CreatedBracket>), ApiError> {
    let format = request.format.parse::<Format>()?;
    let participants = request
        .participants
        .iter()
        .map(|name| ParticipantId::new(name.trim()))
        .collect::<Vec<_>>();
    let options = request.options.unwrap_or_else(|| state.defaults.clone());
    let bracket = BracketInstance::generate(format, participants, options)?;
    let snapshot = bracket.inspect();

    let id = {
        let mut guard = state.registry.lock().unwrap_or_else(|e| e.into_inner());
        guard.insert(bracket)
    };
    info!("bracket {id} created ({format}, {} matches)", snapshot.matches.len());
    Ok((StatusCode::CREATED, Json(CreatedBracket { id, bracket: snapshot })))
}

fn with_bracket<T>(
    state: &ServerState,
    id: u64,
    read: impl FnOnce(&BracketInstance) -> T,
) -> Result<T, ApiError> {
    let guard = state.registry.lock().unwrap_or_else(|e| e.into_inner());
    guard.get(id).map(read).ok_or_else(|| ApiError::unknown_bracket(id))
}

pub async fn get_bracket(
    State(state): State<ServerState>,
    Path(id): Path<u64>,
) -> Result<Json<BracketSnapshot>, ApiError> {
    with_bracket(&state, id, |bracket| bracket.inspect()).map(Json)
}

pub async fn get_records(
    State(state): State<ServerState>,
    Path(id): Path<u64>,
) -> Result<Json<Vec<MatchRecord>>, ApiError> {
    with_bracket(&state, id, |bracket| bracket.records()).map(Json)
}

pub async fn get_standings(
    State(state): State<ServerState>,
    Path(id): Path<u64>,
) -> Result<Json<Vec<Standing>>, ApiError> {
    with_bracket(&state, id, |bracket| bracket.standings()).map(Json)
}

pub async fn start_match(
    State(state): State<ServerState>,
    Path((id, match_id)): Path<(u64, String)>,
) -> Result<Json<MatchRecord>, ApiError> {
    let mut guard = state.registry.lock().unwrap_or_else(|e| e.into_inner());
    let bracket = guard.get_mut(id).ok_or_else(|| ApiError::unknown_bracket(id))?;
    bracket.start_match(&match_id)?;
    let idx = bracket.index_of(&match_id)?;
    Ok(Json(MatchRecord::from(&bracket.matches()[idx])))
}

pub async fn submit_result(
    State(state): State<ServerState>,
    Path((id, match_id)): Path<(u64, String)>,
    Json(request): Json<ResultRequest>,
) -> Result<Json<AdvancementEffects>, ApiError> {
    let mut guard = state.registry.lock().unwrap_or_else(|e| e.into_inner());
    let bracket = guard.get_mut(id).ok_or_else(|| ApiError::unknown_bracket(id))?;
    let effects = bracket.submit_result(&match_id, request.score1, request.score2)?;
    Ok(Json(effects))
}

pub async fn serve(addr: &str, defaults: BracketOptions) -> Result<(), String> {
    let app = router(ServerState::new(defaults));
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| format!("bind {addr}: {e}"))?;
    info!("bracket server listening at http://{addr}/");
    if let Err(e) = axum::serve(listener, app).await {
        error!("bracket server error: {e}");
        return Err(e.to_string());
    }
    Ok(())
}
