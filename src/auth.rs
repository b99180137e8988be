use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::error::AppError;

/// Session tokens expire one hour after issuance.
pub const TOKEN_VALIDITY_SECS: i64 = 60 * 60;

/// Claims
///
/// Payload of a session token: the identity object the client posted to `/jwt`,
/// plus the registered `iat`/`exp` claims added at signing time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// The identity claim used for ownership checks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Issued At (iat), seconds since the epoch.
    pub iat: usize,
    /// Expiration Time (exp), seconds since the epoch.
    pub exp: usize,
    /// Every other field the client supplied, signed as-is.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    /// Malformed, tampered with, or signed with another secret.
    #[error("token signature is invalid")]
    InvalidSignature,

    #[error("token has expired")]
    Expired,
}

/// TokenService
///
/// Issues and verifies HS256 session tokens with the server secret. Stateless: tokens
/// are never stored and cannot be revoked before they expire.
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validity: Duration,
}

impl TokenService {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validity: Duration::seconds(TOKEN_VALIDITY_SECS),
        }
    }

    /// issue
    ///
    /// Signs whatever identity object the caller supplies. No credential check happens
    /// here; the payload is assumed to come from an upstream sign-in. Caller-supplied
    /// `iat`/`exp` values are replaced, and a non-string `email` is dropped.
    #[instrument(skip_all)]
    pub fn issue(&self, mut identity: Map<String, Value>) -> Result<String, jsonwebtoken::errors::Error> {
        let now = Utc::now();
        identity.remove("iat");
        identity.remove("exp");

        let email = match identity.remove("email") {
            Some(Value::String(email)) => Some(email),
            Some(other) => {
                debug!(email = %other, "ignoring non-string email claim");
                None
            }
            None => None,
        };

        let claims = Claims {
            email,
            iat: now.timestamp() as usize,
            exp: (now + self.validity).timestamp() as usize,
            extra: identity,
        };

        debug!(email = ?claims.email, exp = claims.exp, "issuing session token");
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
    }

    /// verify
    ///
    /// Checks signature and expiration with no clock leeway.
    #[instrument(skip_all)]
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;

        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                debug!(error = %e, "session token rejected");
                match e.kind() {
                    ErrorKind::ExpiredSignature => TokenError::Expired,
                    _ => TokenError::InvalidSignature,
                }
            })
    }
}

/// AuthUser
///
/// The identity resolved by the authorization gate for the current request.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub claims: Claims,
}

impl AuthUser {
    pub fn email(&self) -> Option<&str> {
        self.claims.email.as_deref()
    }
}

/// AuthUser Extractor Implementation
///
/// 1. Reuses the identity already attached by the gate middleware, if any.
/// 2. No `Authorization` header: 401.
/// 3. The token is the second whitespace-separated segment of the header; the
///    scheme word is not checked.
/// 4. Verification failure (including a missing second segment): 403.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    TokenService: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<AuthUser>() {
            return Ok(user.clone());
        }

        let authorization = parts
            .headers
            .get(header::AUTHORIZATION)
            .ok_or(AppError::Unauthenticated)?;

        let token = authorization
            .to_str()
            .ok()
            .and_then(|value| value.split_whitespace().nth(1))
            .unwrap_or_default();

        let tokens = TokenService::from_ref(state);
        let claims = tokens.verify(token)?;

        Ok(AuthUser { claims })
    }
}
