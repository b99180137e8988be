use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Read-only listings, the sign-in upsert and token issuance. None of these require a
/// session token.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /
        // Liveness check.
        .route("/", get(handlers::liveness))
        // POST /jwt
        // Signs the posted identity into a one-hour session token.
        .route("/jwt", post(handlers::issue_token))
        // GET/POST /users
        // Lists all users; records a user on first sign-in (no-op if the email exists).
        .route("/users", get(handlers::list_users).post(handlers::create_user))
        // GET /users/{email}
        .route("/users/{email}", get(handlers::get_user))
        // GET /instructor
        // Users with role "instructor".
        .route("/instructor", get(handlers::list_instructors))
        // GET /classes
        .route("/classes", get(handlers::list_classes))
}
