use crate::{
    AppState,
    auth::AuthUser,
    error::AppError,
    models::{
        Class, CreateUserOutcome, DeleteResult, EnrollQuery, Enrollment, InsertResult, Role,
        StatusUpdateRequest, TokenResponse, UpdateResult, User,
    },
};
use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde_json::{Map, Value};

pub const LIVENESS_MESSAGE: &str = "Dance school Server is running..";

// --- Session ---

/// issue_token
///
/// [Public Route] Signs the posted identity object into a one-hour session token.
///
/// *Note*: No credential is checked here. The client is expected to post the identity
/// it obtained from the upstream sign-in provider.
#[utoipa::path(
    post,
    path = "/jwt",
    responses((status = 200, description = "Session token", body = TokenResponse))
)]
pub async fn issue_token(
    State(state): State<AppState>,
    Json(identity): Json<Map<String, Value>>,
) -> Result<Json<TokenResponse>, AppError> {
    let token = state.tokens.issue(identity)?;
    Ok(Json(TokenResponse { token }))
}

/// liveness
#[utoipa::path(
    get,
    path = "/",
    responses((status = 200, description = "Server is up", body = String))
)]
pub async fn liveness() -> &'static str {
    LIVENESS_MESSAGE
}

// --- Users ---

/// list_users
///
/// [Public Route] Every user document, unfiltered.
#[utoipa::path(
    get,
    path = "/users",
    responses((status = 200, description = "All users", body = [User]))
)]
pub async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<User>>, AppError> {
    Ok(Json(state.users.list_all().await?))
}

/// list_instructors
///
/// [Public Route] Users whose role is exactly "instructor".
#[utoipa::path(
    get,
    path = "/instructor",
    responses((status = 200, description = "Instructors", body = [User]))
)]
pub async fn list_instructors(State(state): State<AppState>) -> Result<Json<Vec<User>>, AppError> {
    Ok(Json(state.users.list_by_role(Role::Instructor).await?))
}

/// create_user
///
/// [Public Route] Records a user on first sign-in.
///
/// *Idempotency*: when the email is already stored nothing is inserted and the body is
/// `{"message": "user already exists"}`, still with status 200. A body without an
/// `email` is rejected with 422.
#[utoipa::path(
    post,
    path = "/users",
    request_body = User,
    responses(
        (status = 200, description = "Insert acknowledgment or conflict message", body = CreateUserOutcome),
        (status = 422, description = "No email in the body")
    )
)]
pub async fn create_user(
    State(state): State<AppState>,
    Json(user): Json<User>,
) -> Result<Json<CreateUserOutcome>, AppError> {
    if user.email.is_empty() {
        return Err(AppError::MissingField("email"));
    }
    tracing::debug!(email = %user.email, "sign-in upsert");
    Ok(Json(state.users.create_if_absent(user).await?))
}

/// get_user
///
/// [Public Route] Looks a user up by email. Responds `null` when there is none.
#[utoipa::path(
    get,
    path = "/users/{email}",
    params(("email" = String, Path, description = "User email")),
    responses((status = 200, description = "User or null", body = Option<User>))
)]
pub async fn get_user(
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> Result<Json<Option<User>>, AppError> {
    Ok(Json(state.users.get_by_email(&email).await?))
}

/// make_admin
///
/// [Management Route] Sets the user's role to "admin".
#[utoipa::path(
    patch,
    path = "/users/admin/{id}",
    params(("id" = String, Path, description = "User id")),
    responses((status = 200, description = "Update acknowledgment", body = UpdateResult))
)]
pub async fn make_admin(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<UpdateResult>, AppError> {
    tracing::info!(user_id = %id, "promoting user to admin");
    Ok(Json(state.users.set_role(&id, Role::Admin).await?))
}

/// make_instructor
///
/// [Management Route] Sets the user's role to "instructor".
#[utoipa::path(
    patch,
    path = "/users/instructor/{id}",
    params(("id" = String, Path, description = "User id")),
    responses((status = 200, description = "Update acknowledgment", body = UpdateResult))
)]
pub async fn make_instructor(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<UpdateResult>, AppError> {
    tracing::info!(user_id = %id, "promoting user to instructor");
    Ok(Json(state.users.set_role(&id, Role::Instructor).await?))
}

// --- Classes ---

#[utoipa::path(
    get,
    path = "/classes",
    responses((status = 200, description = "All classes", body = [Class]))
)]
pub async fn list_classes(State(state): State<AppState>) -> Result<Json<Vec<Class>>, AppError> {
    Ok(Json(state.classes.list_all().await?))
}

/// create_class
///
/// [Management Route] Stores a submitted class as-is. No field is required.
#[utoipa::path(
    post,
    path = "/classes",
    request_body = Class,
    responses((status = 200, description = "Insert acknowledgment", body = InsertResult))
)]
pub async fn create_class(
    State(state): State<AppState>,
    Json(class): Json<Class>,
) -> Result<Json<InsertResult>, AppError> {
    Ok(Json(state.classes.create(class).await?))
}

/// update_enroll_status
///
/// [Management Route] Overwrites the class's `enroll` field with `status`.
#[utoipa::path(
    patch,
    path = "/classes/status/{id}",
    params(("id" = String, Path, description = "Class id")),
    request_body = StatusUpdateRequest,
    responses((status = 200, description = "Update acknowledgment", body = UpdateResult))
)]
pub async fn update_enroll_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<StatusUpdateRequest>,
) -> Result<Json<UpdateResult>, AppError> {
    Ok(Json(state.classes.set_enroll_status(&id, payload.status).await?))
}

/// update_approval_status
///
/// [Management Route] Overwrites the class's approval `status` field. Leaves `enroll`
/// untouched.
#[utoipa::path(
    patch,
    path = "/classes/admin/status/{id}",
    params(("id" = String, Path, description = "Class id")),
    request_body = StatusUpdateRequest,
    responses((status = 200, description = "Update acknowledgment", body = UpdateResult))
)]
pub async fn update_approval_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<StatusUpdateRequest>,
) -> Result<Json<UpdateResult>, AppError> {
    Ok(Json(state.classes.set_approval_status(&id, payload.status).await?))
}

// --- Enrollments ---

/// list_enrollments
///
/// [Authenticated Route] Lists the caller's own bookings.
///
/// *Authorization*: the `email` query parameter must equal the email claim of the
/// bearer token, otherwise 403. Without an `email` the response is an empty list and
/// the handler stops there.
#[utoipa::path(
    get,
    path = "/enroll",
    params(EnrollQuery),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Caller's bookings", body = [Enrollment]),
        (status = 401, description = "Missing Authorization header"),
        (status = 403, description = "Invalid token or not the owner")
    )
)]
pub async fn list_enrollments(
    caller: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<EnrollQuery>,
) -> Result<Json<Vec<Enrollment>>, AppError> {
    let Some(email) = query.email.filter(|e| !e.is_empty()) else {
        return Ok(Json(Vec::new()));
    };

    if caller.email() != Some(email.as_str()) {
        tracing::warn!(requested = %email, caller = ?caller.email(), "booking list for another owner");
        return Err(AppError::Forbidden);
    }

    Ok(Json(state.enrollments.list_by_email(&email).await?))
}

/// create_enrollment
///
/// [Management Route] Stores a booking. No ownership or duplicate check.
#[utoipa::path(
    post,
    path = "/enroll",
    request_body = Enrollment,
    responses((status = 200, description = "Insert acknowledgment", body = InsertResult))
)]
pub async fn create_enrollment(
    State(state): State<AppState>,
    Json(enrollment): Json<Enrollment>,
) -> Result<Json<InsertResult>, AppError> {
    Ok(Json(state.enrollments.create(enrollment).await?))
}

/// delete_enrollment
///
/// [Management Route] Deletes a booking by id. A repeated delete reports
/// `deletedCount: 0`.
#[utoipa::path(
    delete,
    path = "/enroll/{id}",
    params(("id" = String, Path, description = "Booking id")),
    responses((status = 200, description = "Delete acknowledgment", body = DeleteResult))
)]
pub async fn delete_enrollment(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeleteResult>, AppError> {
    Ok(Json(state.enrollments.delete_by_id(&id).await?))
}
