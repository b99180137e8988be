use axum::{
    Router,
    extract::{FromRef, Request},
    http::HeaderName,
    middleware::{self, Next},
    response::Response,
};
use std::sync::Arc;
use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod repository;

// Routers segregated by access level (public, bearer-gated, management).
pub mod routes;
use auth::AuthUser;
use routes::{authenticated, management, public};

// --- Public Re-exports ---

pub use auth::TokenService;
pub use config::AppConfig;
pub use error::AppError;
pub use repository::{ClassStoreState, EnrollmentStoreState, UserStoreState};

/// ApiDoc
///
/// OpenAPI document aggregated from the `#[utoipa::path]` handlers and the
/// `ToSchema` models. Served at `/api-docs/openapi.json`, browsable at `/swagger-ui`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::liveness, handlers::issue_token,
        handlers::list_users, handlers::list_instructors, handlers::create_user,
        handlers::get_user, handlers::make_admin, handlers::make_instructor,
        handlers::list_classes, handlers::create_class, handlers::update_enroll_status,
        handlers::update_approval_status,
        handlers::list_enrollments, handlers::create_enrollment, handlers::delete_enrollment
    ),
    components(
        schemas(
            models::User, models::Role, models::Class, models::Enrollment,
            models::InsertResult, models::UpdateResult, models::DeleteResult,
            models::MessageResponse, models::CreateUserOutcome,
            models::StatusUpdateRequest, models::TokenResponse,
        )
    ),
    modifiers(&BearerSecurity),
    tags(
        (name = "dance-school", description = "Dance School API")
    )
)]
struct ApiDoc;

/// Registers the `bearer` scheme referenced by the gated routes.
struct BearerSecurity;

impl Modify for BearerSecurity {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// AppState
///
/// The single immutable container shared by every request: one store per collection,
/// the token service, and the loaded configuration.
#[derive(Clone)]
pub struct AppState {
    pub users: UserStoreState,
    pub classes: ClassStoreState,
    pub enrollments: EnrollmentStoreState,
    pub tokens: TokenService,
    pub config: AppConfig,
}

impl AppState {
    /// Builds the state around the given stores. The token service is keyed with the
    /// configured secret.
    pub fn new(
        users: UserStoreState,
        classes: ClassStoreState,
        enrollments: EnrollmentStoreState,
        config: AppConfig,
    ) -> Self {
        Self {
            users,
            classes,
            enrollments,
            tokens: TokenService::new(&config.token_secret),
            config,
        }
    }

    /// State backed by empty in-memory stores.
    pub fn in_memory(config: AppConfig) -> Self {
        Self::new(
            Arc::new(repository::InMemoryUserStore::new()),
            Arc::new(repository::InMemoryClassStore::new()),
            Arc::new(repository::InMemoryEnrollmentStore::new()),
            config,
        )
    }
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for TokenService {
    fn from_ref(app_state: &AppState) -> TokenService {
        app_state.tokens.clone()
    }
}

/// auth_middleware
///
/// The authorization gate. Resolving `AuthUser` rejects the request with 401 (no
/// header) or 403 (bad token) before the handler runs; on success the identity is
/// attached to the request for the handler to read.
async fn auth_middleware(auth_user: AuthUser, mut request: Request, next: Next) -> Response {
    tracing::debug!(email = ?auth_user.email(), "bearer token accepted");
    request.extensions_mut().insert(auth_user);
    next.run(request).await
}

/// create_router
///
/// Assembles the routing structure, applies the gate where required, and layers the
/// observability and CORS middleware on top.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    let gate_state = state.clone();
    let gate = move || middleware::from_fn_with_state(gate_state.clone(), auth_middleware);

    // Management routes stay open unless the deployment opts into gating them.
    let management_routes = if state.config.protect_management_routes {
        management::management_routes().route_layer(gate())
    } else {
        management::management_routes()
    };

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(authenticated::authenticated_routes().route_layer(gate()))
        .merge(management_routes)
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Opens the per-request span, tagged with the `x-request-id` set by the layer above
/// so every log line of one request can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
