use axum::Json;
use axum::extract::{FromRequestParts, State};
use axum::http::request::Parts;
use axum::http::{StatusCode, header};
use pitwatch_shared::{LoginRequest, LoginResponse};
use tracing::{info, warn};

use crate::state::{AppState, Session};

/// A request carrying a valid `Authorization: Bearer <token>` header.
pub struct Authenticated(pub Session);

impl FromRequestParts<AppState> for Authenticated {
    type Rejection = StatusCode;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(bearer_token)
            .ok_or(StatusCode::UNAUTHORIZED)?;
        state
            .session(token)
            .map(Authenticated)
            .ok_or(StatusCode::UNAUTHORIZED)
    }
}

pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, StatusCode> {
    match state.login(&request.username, &request.password) {
        Some(token) => {
            info!(username = %request.username, sessions = state.sessions.len(), "login accepted");
            Ok(Json(LoginResponse { token }))
        }
        None => {
            warn!(username = %request.username, "login rejected");
            Err(StatusCode::UNAUTHORIZED)
        }
    }
}

fn bearer_token(value: &str) -> Option<&str> {
    let (scheme, token) = value.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}
