use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{delete, patch, post},
};

/// Management Router Module
///
/// Writes that change roles, classes and bookings. No handler here checks the caller's
/// identity, so whether these are reachable anonymously is decided entirely by the
/// layer `create_router` puts on this router.
pub fn management_routes() -> Router<AppState> {
    Router::new()
        // PATCH /users/admin/{id}
        .route("/users/admin/{id}", patch(handlers::make_admin))
        // PATCH /users/instructor/{id}
        .route("/users/instructor/{id}", patch(handlers::make_instructor))
        // POST /classes
        // Submits a class listing as-is.
        .route("/classes", post(handlers::create_class))
        // PATCH /classes/status/{id}
        // Instructor-facing enrollment toggle, written to the `enroll` field.
        .route("/classes/status/{id}", patch(handlers::update_enroll_status))
        // PATCH /classes/admin/status/{id}
        // Administrative approval, written to the `status` field.
        .route(
            "/classes/admin/status/{id}",
            patch(handlers::update_approval_status),
        )
        // POST /enroll
        .route("/enroll", post(handlers::create_enrollment))
        // DELETE /enroll/{id}
        // No ownership check: any caller holding the id can delete the booking.
        .route("/enroll/{id}", delete(handlers::delete_enrollment))
}
