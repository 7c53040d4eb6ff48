//! The HTTP side surface: auth, profile, stats, daily bonus, the room
//! browser, and the leaderboard. The game itself runs over `/ws`.

use crate::error::ServerError;
use crate::users::{LeaderboardEntry, UserRecord, UserStats};
use crate::{ws, AppState};
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_governor::governor::GovernorConfigBuilder;
use tower_governor::key_extractor::SmartIpKeyExtractor;
use tower_governor::GovernorLayer;
use tower_http::cors::{Any, CorsLayer};

/// Build the full application router.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_millisecond(10)
            .burst_size(1_000)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .expect("governor config is valid"),
    );

    Router::new()
        .route("/ws", get(ws::ws_handler))
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
        .route("/api/auth/guest", post(guest))
        .route("/api/user/profile", get(get_profile).put(update_profile))
        .route("/api/user/stats", get(get_stats))
        .route("/api/user/daily", post(claim_daily))
        .route("/api/user/history", get(user_history))
        .route("/api/rooms", get(list_rooms))
        .route("/api/rooms/:id/history", get(room_history))
        .route("/api/leaderboard", get(leaderboard))
        .layer(cors)
        .layer(GovernorLayer {
            config: governor_conf,
        })
        .with_state(state)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    error: String,
}

fn error_response(err: ServerError) -> Response {
    let status = match &err {
        ServerError::Unauthenticated
        | ServerError::InvalidToken
        | ServerError::TokenExpired
        | ServerError::InvalidCredentials => StatusCode::UNAUTHORIZED,
        ServerError::NameTaken => StatusCode::CONFLICT,
        ServerError::UnknownTable => StatusCode::NOT_FOUND,
        _ => StatusCode::BAD_REQUEST,
    };
    (
        status,
        Json(ErrorBody {
            error: err.client_message(),
        }),
    )
        .into_response()
}

async fn bearer_user(state: &AppState, headers: &HeaderMap) -> Result<UserRecord, ServerError> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or(ServerError::Unauthenticated)?;
    let claims = state.signer.verify(token)?;
    state
        .users
        .get(&claims.sub)
        .await
        .ok_or(ServerError::InvalidToken)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegisterBody {
    username: String,
    password: String,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct GuestBody {
    name: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TokenResponse {
    token: String,
    player_id: String,
    name: String,
    chips: u64,
}

impl TokenResponse {
    fn for_user(state: &AppState, user: &UserRecord) -> Self {
        Self {
            token: state.signer.mint(&user.id, &user.name),
            player_id: user.id.clone(),
            name: user.name.clone(),
            chips: user.chips,
        }
    }
}

async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterBody>,
) -> Response {
    match state.users.register(&body.username, &body.password).await {
        Ok(user) => Json(TokenResponse::for_user(&state, &user)).into_response(),
        Err(err) => error_response(err),
    }
}

async fn login(State(state): State<AppState>, Json(body): Json<RegisterBody>) -> Response {
    match state.users.login(&body.username, &body.password).await {
        Ok(user) => Json(TokenResponse::for_user(&state, &user)).into_response(),
        Err(err) => error_response(err),
    }
}

async fn guest(
    State(state): State<AppState>,
    body: Option<Json<GuestBody>>,
) -> Response {
    let name = body.and_then(|Json(b)| b.name);
    match state.users.guest(name.as_deref()).await {
        Ok(user) => Json(TokenResponse::for_user(&state, &user)).into_response(),
        Err(err) => error_response(err),
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProfileResponse {
    player_id: String,
    name: String,
    chips: u64,
    is_guest: bool,
    created_at: i64,
}

impl From<UserRecord> for ProfileResponse {
    fn from(user: UserRecord) -> Self {
        Self {
            player_id: user.id,
            name: user.name,
            chips: user.chips,
            is_guest: user.is_guest,
            created_at: user.created_at,
        }
    }
}

async fn get_profile(State(state): State<AppState>, headers: HeaderMap) -> Response {
    match bearer_user(&state, &headers).await {
        Ok(user) => Json(ProfileResponse::from(user)).into_response(),
        Err(err) => error_response(err),
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateProfileBody {
    name: String,
}

async fn update_profile(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<UpdateProfileBody>,
) -> Response {
    let user = match bearer_user(&state, &headers).await {
        Ok(user) => user,
        Err(err) => return error_response(err),
    };
    match state.users.rename(&user.id, &body.name).await {
        Ok(user) => Json(ProfileResponse::from(user)).into_response(),
        Err(err) => error_response(err),
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatsResponse {
    player_id: String,
    stats: UserStats,
}

async fn get_stats(State(state): State<AppState>, headers: HeaderMap) -> Response {
    match bearer_user(&state, &headers).await {
        Ok(user) => Json(StatsResponse {
            player_id: user.id,
            stats: user.stats,
        })
        .into_response(),
        Err(err) => error_response(err),
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DailyResponse {
    granted: bool,
    chips: u64,
}

async fn claim_daily(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let user = match bearer_user(&state, &headers).await {
        Ok(user) => user,
        Err(err) => return error_response(err),
    };
    match state.users.claim_daily(&user.id).await {
        Ok(Some(chips)) => Json(DailyResponse {
            granted: true,
            chips,
        })
        .into_response(),
        Ok(None) => Json(DailyResponse {
            granted: false,
            chips: user.chips,
        })
        .into_response(),
        Err(err) => error_response(err),
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HistoriesResponse {
    histories: Vec<felt_types::HandHistory>,
}

/// The caller's own hand histories, most recent last.
async fn user_history(State(state): State<AppState>, headers: HeaderMap) -> Response {
    match bearer_user(&state, &headers).await {
        Ok(user) => Json(HistoriesResponse {
            histories: state.histories.for_user(&user.id),
        })
        .into_response(),
        Err(err) => error_response(err),
    }
}

/// A table's retained hand histories. Histories outlive reaped tables, so
/// the id only 404s when neither the registry nor the store knows it.
async fn room_history(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let histories = state.histories.for_table(&id);
    if histories.is_empty() && state.registry.get(&id).await.is_none() {
        return error_response(ServerError::UnknownTable);
    }
    Json(HistoriesResponse { histories }).into_response()
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RoomsResponse {
    rooms: Vec<felt_types::RoomInfo>,
}

async fn list_rooms(State(state): State<AppState>) -> Response {
    Json(RoomsResponse {
        rooms: state.registry.list_public().await,
    })
    .into_response()
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LeaderboardResponse {
    leaderboard: Vec<LeaderboardEntry>,
}

async fn leaderboard(State(state): State<AppState>) -> Response {
    Json(LeaderboardResponse {
        leaderboard: state.users.leaderboard(10).await,
    })
    .into_response()
}
