use std::net::SocketAddr;

use axum::{
    extract::{rejection::JsonRejection, ConnectInfo, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use crate::{
    accounts::{
        dto::{SignupRequest, SignupResponse, UserList, VerifyRequest, VerifyResponse},
        errors::AccountError,
        repo_types::Stats,
        services,
    },
    state::AppState,
};

pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/api/signup", post(signup))
        .route("/api/verify", post(verify))
        .route("/api/users", get(list_users))
        .route("/api/stats", get(stats))
}

#[instrument(skip(state, payload))]
pub async fn signup(
    State(state): State<AppState>,
    payload: Result<Json<SignupRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<SignupResponse>), AccountError> {
    let Json(payload) = payload?;
    let user = services::register(&state.db, payload.try_into()?).await?;
    Ok((
        StatusCode::CREATED,
        Json(SignupResponse {
            success: true,
            message: "User registered successfully",
            user,
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn verify(
    State(state): State<AppState>,
    peer: Option<ConnectInfo<SocketAddr>>,
    payload: Result<Json<VerifyRequest>, JsonRejection>,
) -> Result<Json<VerifyResponse>, AccountError> {
    let Json(payload) = payload?;
    let (email, password) = payload.into_credentials()?;
    let origin = peer.map(|ConnectInfo(addr)| addr.ip().to_string());
    let user = services::verify(&state.db, &email, &password, origin.as_deref()).await?;
    Ok(Json(VerifyResponse {
        success: true,
        message: "Login successful",
        user,
    }))
}

#[instrument(skip(state))]
pub async fn list_users(State(state): State<AppState>) -> Result<Json<UserList>, AccountError> {
    let users = services::list_users(&state.db).await?;
    Ok(Json(UserList {
        count: users.len(),
        users,
    }))
}

#[instrument(skip(state))]
pub async fn stats(State(state): State<AppState>) -> Result<Json<Stats>, AccountError> {
    Ok(Json(services::stats(&state.db).await?))
}
