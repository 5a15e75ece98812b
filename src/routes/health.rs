use axum::extract::State;
use axum::response::Json;
use axum::routing::get;
use axum::Router;
use serde_json::{json, Value};

use crate::error::AppResult;
use crate::state::AppState;

/// GET /health: confirms the store answers.
async fn health(State(state): State<AppState>) -> AppResult<Json<Value>> {
    let conn = state.db.get()?;
    conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
    Ok(Json(json!({ "status": "ok" })))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}
