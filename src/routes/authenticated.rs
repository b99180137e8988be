use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Authenticated Router Module
///
/// Every handler here receives the `AuthUser` attached by the gate layered on this
/// router in `create_router`.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /enroll?email=...
        // Lists the caller's bookings. The email must match the token's claim.
        .route("/enroll", get(handlers::list_enrollments))
}
