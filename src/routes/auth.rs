use axum::extract::{Request, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::{Deserialize, Serialize};

use crate::auth::provider::{self, ProviderUser};
use crate::auth::session;
use crate::error::AppResult;
use crate::extractors::{session_token, CurrentUser};
use crate::social::actions;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/session", get(current_session))
        .route("/auth/logout", post(logout))
}

/// Test-only routes, mounted when `BLAZE_TEST_SEED` is set.
pub fn seed_router() -> Router<AppState> {
    Router::new().route("/test/seed", post(test_seed))
}

fn session_cookie(name: &str, token: &str, max_age_secs: u64) -> String {
    format!("{name}={token}; HttpOnly; SameSite=Strict; Path=/; Max-Age={max_age_secs}")
}

#[derive(Debug, Serialize)]
struct SessionResponse {
    user_id: String,
    name: Option<String>,
    username: Option<String>,
}

/// GET /auth/session: who the session belongs to, or 401.
async fn current_session(user: CurrentUser) -> Json<SessionResponse> {
    Json(SessionResponse {
        user_id: user.id,
        name: user.name,
        username: user.username,
    })
}

/// POST /auth/logout: drop the caller's session and clear the cookie.
async fn logout(State(state): State<AppState>, request: Request) -> AppResult<Response> {
    let (parts, _body) = request.into_parts();
    let cookie_name = &state.config.auth.cookie_name;

    if let Some(token) = session_token(&parts, cookie_name) {
        session::delete_session(&state.db, token)?;
    }

    Ok((
        StatusCode::NO_CONTENT,
        [(header::SET_COOKIE, session_cookie(cookie_name, "", 0))],
    )
        .into_response())
}

#[derive(Debug, Deserialize)]
struct SeedRequest {
    id: String,
    name: Option<String>,
    email: Option<String>,
    username: Option<String>,
}

#[derive(Debug, Serialize)]
struct SeedResponse {
    user_id: String,
    username: Option<String>,
    token: String,
}

/// Create or refresh a user, claim the username if given, and open a session.
async fn test_seed(
    State(state): State<AppState>,
    Json(seed): Json<SeedRequest>,
) -> AppResult<Response> {
    let user = provider::sync_user(
        &state.db,
        &ProviderUser {
            id: seed.id,
            name: seed.name,
            email: seed.email,
            image: None,
        },
    )?;

    let username = match (user.username, seed.username) {
        (Some(existing), _) => Some(existing),
        (None, Some(wanted)) => {
            let mut conn = state.db.get()?;
            Some(actions::setup_username(&mut conn, &user.id, &wanted)?)
        }
        (None, None) => None,
    };

    let hours = state.config.auth.session_hours;
    let token = session::create_session(&state.db, &user.id, hours)?;
    let cookie = session_cookie(&state.config.auth.cookie_name, &token, hours * 3600);

    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, cookie)],
        Json(SeedResponse {
            user_id: user.id,
            username,
            token,
        }),
    )
        .into_response())
}
