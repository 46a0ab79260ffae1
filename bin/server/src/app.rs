//! Application router.

use axum::{Json, Router, middleware, routing::get};
use coursegate_identity::Session;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::auth::{self, Auth, OptionalSession, RequireSession, refresh_session};

/// Builds the full application router.
pub fn router(auth: Arc<Auth>) -> Router {
    Router::new()
        .route("/api/me", get(me))
        .route("/api/whoami", get(whoami))
        .route_layer(middleware::from_fn_with_state(auth.clone(), refresh_session))
        .nest(auth::AUTH_BASE_PATH, auth::routes::router())
        .layer(TraceLayer::new_for_http())
        .with_state(auth)
}

/// Returns the signed-in user's session; redirects to sign-in otherwise.
async fn me(RequireSession(session): RequireSession) -> Json<Session> {
    Json(session)
}

/// Returns the signed-in user's role, or `null` for anonymous requests.
async fn whoami(OptionalSession(session): OptionalSession) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "id": session.as_ref().and_then(|s| s.user_id()),
        "role": session.as_ref().and_then(Session::role),
    }))
}
