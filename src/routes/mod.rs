pub mod auth;
pub mod graphql;
pub mod health;

use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Full HTTP surface. The seed route is only mounted when `BLAZE_TEST_SEED` is set.
pub fn app(state: AppState) -> Router {
    let mut app = Router::new()
        .merge(graphql::router())
        .merge(auth::router())
        .merge(health::router());

    if std::env::var("BLAZE_TEST_SEED").is_ok() {
        tracing::warn!("BLAZE_TEST_SEED is set, mounting /test/seed");
        app = app.merge(auth::seed_router());
    }

    app.layer(TraceLayer::new_for_http()).with_state(state)
}
