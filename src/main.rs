use dance_school::{
    AppState, create_router,
    config::{AppConfig, Env, StoreBackend},
    repository::{
        ClassStoreState, EnrollmentStoreState, MongoClassStore, MongoEnrollmentStore,
        MongoUserStore, UserStoreState, mongo,
    },
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Loads configuration, initializes logging, connects the stores and serves the API.
#[tokio::main]
async fn main() {
    // 1. Configuration (fail-fast on missing production secrets)
    dotenv::dotenv().ok();
    let config = AppConfig::load().expect("FATAL: invalid configuration");

    // 2. Logging: RUST_LOG wins, otherwise sensible local defaults.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "dance_school=debug,tower_http=info".into());

    // Pretty output locally, JSON for log aggregation in production.
    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);

    // 3. Stores
    let app_state = match config.store_backend {
        StoreBackend::Mongo => {
            // Connected once and shared by every request; never closed while running.
            let db = mongo::connect(&config.db_uri, &config.db_name)
                .await
                .expect("FATAL: Failed to connect to MongoDB. Check MONGODB_URI or DB_USER/DB_PASS.");

            let users = Arc::new(MongoUserStore::new(&db)) as UserStoreState;
            let classes = Arc::new(MongoClassStore::new(&db)) as ClassStoreState;
            let enrollments = Arc::new(MongoEnrollmentStore::new(&db)) as EnrollmentStoreState;
            AppState::new(users, classes, enrollments, config.clone())
        }
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory stores; data is lost on restart");
            AppState::in_memory(config.clone())
        }
    };

    if config.protect_management_routes {
        tracing::info!("Management routes require a bearer token");
    }

    // 4. Router and server
    let app = create_router(app_state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .expect("FATAL: Failed to bind HTTP listener");

    tracing::info!("Dance school is running on port {}", config.port);
    tracing::info!(
        "API Documentation (Swagger UI) available at: http://localhost:{}/swagger-ui",
        config.port
    );

    axum::serve(listener, app).await.expect("FATAL: HTTP server error");
}
