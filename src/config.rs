use std::env;
use thiserror::Error;

/// Fallback signing secret for local runs. Never accepted in production.
pub const LOCAL_TOKEN_SECRET: &str = "dance-school-local-token-secret";

/// Connection string used in local mode when nothing else is configured.
pub const LOCAL_MONGODB_URI: &str = "mongodb://localhost:27017";

/// AppConfig
///
/// Holds the application's entire configuration state. Loaded once at startup and
/// then shared read-only through `AppState` (pulled into handlers via `FromRef`).
#[derive(Clone, Debug)]
pub struct AppConfig {
    // Runtime environment marker. Selects log format and which secrets are mandatory.
    pub env: Env,
    // TCP port the HTTP server binds on.
    pub port: u16,
    // MongoDB connection string.
    pub db_uri: String,
    // Database holding the `users`, `classes` and `bookings` collections.
    pub db_name: String,
    // HMAC secret used to sign and verify session tokens.
    pub token_secret: String,
    // Which persistence backend the stores are built on.
    pub store_backend: StoreBackend,
    // When true, the management routes sit behind the bearer-token gate as well.
    pub protect_management_routes: bool,
}

/// Env
///
/// Runtime context. `Local` falls back to development defaults; `Production`
/// refuses to start without explicit secrets.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Env {
    Local,
    Production,
}

/// StoreBackend
///
/// `Mongo` talks to a real deployment; `Memory` keeps everything in process and is
/// lost on restart.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum StoreBackend {
    Mongo,
    Memory,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set in production")]
    Missing(&'static str),

    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },
}

impl Default for AppConfig {
    /// Safe, non-panicking values for test state scaffolding.
    fn default() -> Self {
        Self {
            env: Env::Local,
            port: 5000,
            db_uri: LOCAL_MONGODB_URI.to_string(),
            db_name: "danceDb".to_string(),
            token_secret: LOCAL_TOKEN_SECRET.to_string(),
            store_backend: StoreBackend::Memory,
            protect_management_routes: false,
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads every parameter from environment variables. In production the token secret
    /// and the database credentials are mandatory, so a misconfigured deployment fails
    /// at startup instead of signing tokens with a development secret.
    pub fn load() -> Result<Self, ConfigError> {
        let env = match env::var("APP_ENV").as_deref() {
            Ok("production") => Env::Production,
            _ => Env::Local,
        };

        let token_secret = match (env, env::var("ACCESS_TOKEN_SECRET")) {
            (_, Ok(secret)) => secret,
            (Env::Production, Err(_)) => return Err(ConfigError::Missing("ACCESS_TOKEN_SECRET")),
            (Env::Local, Err(_)) => LOCAL_TOKEN_SECRET.to_string(),
        };

        let port = match env::var("PORT") {
            Ok(raw) => raw.parse::<u16>().map_err(|_| ConfigError::Invalid {
                name: "PORT",
                value: raw,
            })?,
            Err(_) => 5000,
        };

        let store_backend = match env::var("STORE_BACKEND").as_deref() {
            Ok("memory") => StoreBackend::Memory,
            Ok("mongo") | Err(_) => StoreBackend::Mongo,
            Ok(other) => {
                return Err(ConfigError::Invalid {
                    name: "STORE_BACKEND",
                    value: other.to_string(),
                });
            }
        };

        let protect_management_routes = match env::var("PROTECT_MANAGEMENT_ROUTES").as_deref() {
            Ok("true") | Ok("1") => true,
            Ok("false") | Ok("0") | Err(_) => false,
            Ok(other) => {
                return Err(ConfigError::Invalid {
                    name: "PROTECT_MANAGEMENT_ROUTES",
                    value: other.to_string(),
                });
            }
        };

        let db_uri = match resolve_db_uri() {
            Some(uri) => uri,
            // The in-memory backend never dials the database, so no URI is needed.
            None if env == Env::Local || store_backend == StoreBackend::Memory => {
                LOCAL_MONGODB_URI.to_string()
            }
            None => return Err(ConfigError::Missing("MONGODB_URI or DB_USER/DB_PASS")),
        };

        Ok(Self {
            env,
            port,
            db_uri,
            db_name: env::var("DB_NAME").unwrap_or_else(|_| "danceDb".to_string()),
            token_secret,
            store_backend,
            protect_management_routes,
        })
    }
}

/// An explicit `MONGODB_URI` wins; otherwise an Atlas SRV string is composed from the
/// `DB_USER`/`DB_PASS` credential pair.
fn resolve_db_uri() -> Option<String> {
    if let Ok(uri) = env::var("MONGODB_URI") {
        return Some(uri);
    }

    let user = env::var("DB_USER").ok()?;
    let pass = env::var("DB_PASS").ok()?;
    let host = env::var("DB_HOST").unwrap_or_else(|_| "cluster0.mongodb.net".to_string());

    Some(format!(
        "mongodb+srv://{user}:{pass}@{host}/?retryWrites=true&w=majority"
    ))
}
