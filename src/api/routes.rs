//! API route handlers.
//!
//! All endpoints speak JSON. State is shared via `Arc<ApiState>`; every
//! handler takes the ledger lock for its whole duration, so ledger
//! operations run strictly one after another.

use axum::{
    extract::{rejection::JsonRejection, FromRequest, Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error};

use crate::access::{AccessControl, Identity};
use crate::ledger::{Ledger, NewOption};
use crate::types::{ErrorKind, LedgerError, OddsMode, SettlementReport};
use crate::views::{self, AccountView, EventView, LeaderboardEntry, SettlementView, UserSummary};

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// Shared state accessible by all route handlers.
///
/// Lock order is always `ledger` before `access`.
pub struct ApiState {
    pub ledger: Mutex<Ledger>,
    pub access: Mutex<AccessControl>,
    pub leaderboard_size: usize,
}

impl ApiState {
    pub fn new(ledger: Ledger, access: AccessControl) -> Self {
        let leaderboard_size = ledger.config().leaderboard_size;
        Self {
            ledger: Mutex::new(ledger),
            access: Mutex::new(access),
            leaderboard_size,
        }
    }
}

pub type AppState = Arc<ApiState>;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// A failed request on its way out as an HTTP response.
#[derive(Debug)]
pub enum ApiError {
    Ledger(LedgerError),
    /// The request body could not be read as the expected JSON.
    Body { status: StatusCode, message: String },
}

impl From<LedgerError> for ApiError {
    fn from(e: LedgerError) -> Self {
        ApiError::Ledger(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Body {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

/// `Json` extractor whose rejections use the `{"error": ...}` body.
#[derive(FromRequest)]
#[from_request(via(Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Body { status, .. } => *status,
            ApiError::Ledger(LedgerError::UserBlocked(_)) => StatusCode::FORBIDDEN,
            ApiError::Ledger(LedgerError::Unauthenticated | LedgerError::InvalidCredentials) => {
                StatusCode::UNAUTHORIZED
            }
            ApiError::Ledger(e) => match e.kind() {
                ErrorKind::NotFound => StatusCode::NOT_FOUND,
                ErrorKind::Validation => StatusCode::BAD_REQUEST,
                ErrorKind::StateConflict => StatusCode::CONFLICT,
                ErrorKind::Authorization => StatusCode::FORBIDDEN,
                ErrorKind::Storage | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            ApiError::Ledger(e) => {
                if status.is_server_error() {
                    error!(error = ?e, "Request failed");
                }
                e.to_string()
            }
            ApiError::Body { message, .. } => {
                debug!(%status, %message, "Rejected request body");
                message
            }
        };
        (status, Json(ErrorBody { error: message })).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub admin_code: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub username: String,
    pub is_admin: bool,
}

#[derive(Debug, Deserialize)]
pub struct PlaceBetRequest {
    pub event_id: u64,
    pub option_index: usize,
    pub amount: Decimal,
}

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub balance: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct PromoteRequest {
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct OptionInput {
    pub label: String,
    #[serde(default)]
    pub cote: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
pub struct CreateEventRequest {
    pub title: String,
    pub options: Vec<OptionInput>,
    #[serde(default)]
    pub odds_mode: Option<OddsMode>,
}

#[derive(Debug, Deserialize)]
pub struct CloseEventRequest {
    pub winning_option: usize,
}

#[derive(Debug, Serialize)]
pub struct BlockResponse {
    pub username: String,
    pub is_blocked: bool,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
}

async fn identify(state: &ApiState, ledger: &Ledger, headers: &HeaderMap) -> ApiResult<Identity> {
    let token = bearer_token(headers).ok_or(LedgerError::Unauthenticated)?;
    Ok(state.access.lock().await.resolve(ledger, token)?)
}

// ---------------------------------------------------------------------------
// Public routes
// ---------------------------------------------------------------------------

/// GET /health
pub async fn health() -> StatusCode {
    StatusCode::OK
}

/// POST /signup
pub async fn signup(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<SignupRequest>,
) -> ApiResult<(StatusCode, Json<AccountView>)> {
    let mut ledger = state.ledger.lock().await;
    let identity = state.access.lock().await.signup(
        &mut ledger,
        &req.username,
        &req.password,
        req.admin_code.as_deref(),
    )?;
    let view = views::account(&ledger, &identity.username)?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// POST /login
pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let ledger = state.ledger.lock().await;
    let mut access = state.access.lock().await;
    let token = access.login(&ledger, &req.username, &req.password)?;
    let identity = access.resolve(&ledger, &token)?;
    Ok(Json(LoginResponse {
        token,
        username: identity.username,
        is_admin: identity.is_admin,
    }))
}

/// POST /logout
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> StatusCode {
    if let Some(token) = bearer_token(&headers) {
        state.access.lock().await.logout(token);
    }
    StatusCode::NO_CONTENT
}

/// GET /events
pub async fn list_events(State(state): State<AppState>) -> Json<Vec<EventView>> {
    let ledger = state.ledger.lock().await;
    Json(views::open_events(&ledger))
}

/// GET /leaderboard
pub async fn leaderboard(State(state): State<AppState>) -> Json<Vec<LeaderboardEntry>> {
    let ledger = state.ledger.lock().await;
    Json(views::leaderboard(&ledger, state.leaderboard_size))
}

/// GET /history
pub async fn history(State(state): State<AppState>) -> Json<Vec<SettlementView>> {
    let ledger = state.ledger.lock().await;
    Json(views::settlement_history(&ledger))
}

// ---------------------------------------------------------------------------
// Authenticated routes
// ---------------------------------------------------------------------------

/// GET /me
pub async fn me(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<Json<AccountView>> {
    let ledger = state.ledger.lock().await;
    let identity = identify(&state, &ledger, &headers).await?;
    Ok(Json(views::account(&ledger, &identity.username)?))
}

/// POST /bets
pub async fn place_bet(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(req): ApiJson<PlaceBetRequest>,
) -> ApiResult<Json<BalanceResponse>> {
    let mut ledger = state.ledger.lock().await;
    let identity = identify(&state, &ledger, &headers).await?;
    let balance = ledger.place_bet(&identity.username, req.event_id, req.option_index, req.amount)?;
    Ok(Json(BalanceResponse { balance }))
}

/// POST /promote
pub async fn promote(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(req): ApiJson<PromoteRequest>,
) -> ApiResult<Json<AccountView>> {
    let mut ledger = state.ledger.lock().await;
    let identity = identify(&state, &ledger, &headers).await?;
    state
        .access
        .lock()
        .await
        .promote(&mut ledger, &identity.username, &req.code)?;
    Ok(Json(views::account(&ledger, &identity.username)?))
}

// ---------------------------------------------------------------------------
// Admin routes
// ---------------------------------------------------------------------------

/// GET /admin/events
pub async fn admin_events(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<Vec<EventView>>> {
    let ledger = state.ledger.lock().await;
    identify(&state, &ledger, &headers).await?.require_admin("list events")?;
    Ok(Json(views::all_events(&ledger)))
}

/// POST /admin/events
pub async fn create_event(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(req): ApiJson<CreateEventRequest>,
) -> ApiResult<(StatusCode, Json<EventView>)> {
    let mut ledger = state.ledger.lock().await;
    identify(&state, &ledger, &headers).await?.require_admin("create event")?;

    let options: Vec<NewOption> = req
        .options
        .into_iter()
        .map(|o| NewOption {
            label: o.label,
            cote: o.cote,
        })
        .collect();
    let id = ledger.create_event(&req.title, &options, req.odds_mode)?;
    let event = ledger.find_event(id).ok_or(LedgerError::EventNotFound(id))?;
    Ok((StatusCode::CREATED, Json(views::event_view(&ledger, event))))
}

/// POST /admin/events/:id/close
pub async fn close_event(
    State(state): State<AppState>,
    Path(event_id): Path<u64>,
    headers: HeaderMap,
    ApiJson(req): ApiJson<CloseEventRequest>,
) -> ApiResult<Json<SettlementReport>> {
    let mut ledger = state.ledger.lock().await;
    identify(&state, &ledger, &headers).await?.require_admin("close event")?;
    Ok(Json(ledger.close_event(event_id, req.winning_option)?))
}

/// GET /admin/users
pub async fn admin_users(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<Vec<UserSummary>>> {
    let ledger = state.ledger.lock().await;
    identify(&state, &ledger, &headers).await?.require_admin("list users")?;
    Ok(Json(views::users_with_history(&ledger)))
}

/// POST /admin/users/:username/block
pub async fn toggle_block(
    State(state): State<AppState>,
    Path(username): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Json<BlockResponse>> {
    let mut ledger = state.ledger.lock().await;
    identify(&state, &ledger, &headers).await?.require_admin("block user")?;
    let is_blocked = ledger.toggle_block(&username)?;
    Ok(Json(BlockResponse { username, is_blocked }))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
