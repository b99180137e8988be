use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use utoipa::{IntoParams, ToSchema};

// --- Stored Documents ---
//
// Documents are schemaless in the database. Each model names the fields this API
// reads or writes and carries everything else through a flattened map, so a record
// comes back exactly as it was submitted.

/// Role
///
/// The recognised values of a user's `role` field. A user without a role is a student.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Instructor,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Instructor => "instructor",
            Role::Admin => "admin",
        }
    }
}

/// User
///
/// An account document from the `users` collection. `email` is the identifying key;
/// at most one document exists per email.
///
/// Reads are lenient: accounts written before `email` was enforced come back with an
/// empty `email`, and `role` keeps whatever value was stored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct User {
    /// Store-assigned id, rendered as a 24-digit hex string.
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "String::is_empty"
    )]
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>)]
    pub role: Option<Value>,
    /// Name, photo and whatever else the client stored with the account.
    #[serde(flatten)]
    #[schema(value_type = Object)]
    pub profile: Map<String, Value>,
}

impl User {
    /// The stored role when it is a string.
    pub fn role_name(&self) -> Option<&str> {
        self.role.as_ref().and_then(Value::as_str)
    }
}

/// `null` reads as empty; any other non-string scalar keeps its JSON text.
fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

/// Class
///
/// A class listing from the `classes` collection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Class {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Enrollment status toggled by instructors. Free-form.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Object)]
    pub enroll: Option<Value>,
    /// Administrative approval status (pending, approved, denied).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Object)]
    pub status: Option<Value>,
    /// Name, instructor, price, seats and the rest of the listing.
    #[serde(flatten)]
    #[schema(value_type = Object)]
    pub details: Map<String, Value>,
}

/// Enrollment
///
/// A booking from the `bookings` collection, owned by exactly one email.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Enrollment {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Owner of the booking.
    pub email: String,
    /// Class reference and any other booking metadata.
    #[serde(flatten)]
    #[schema(value_type = Object)]
    pub booking: Map<String, Value>,
}

// --- Store Acknowledgments ---

/// InsertResult
///
/// Acknowledgment of a single-document insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InsertResult {
    pub acknowledged: bool,
    pub inserted_id: String,
}

/// UpdateResult
///
/// Acknowledgment of a single-document update. `matched_count` is zero when no
/// document carried the id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateResult {
    pub acknowledged: bool,
    pub matched_count: u64,
    pub modified_count: u64,
    pub upserted_id: Option<String>,
    pub upserted_count: u64,
}

/// DeleteResult
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeleteResult {
    pub acknowledged: bool,
    pub deleted_count: u64,
}

/// MessageResponse
///
/// Sentinel payload returned with a 200 when an operation was skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

/// CreateUserOutcome
///
/// Result of a sign-in upsert: either the insert acknowledgment or the
/// "user already exists" message. Both serialize untagged with HTTP 200, so callers
/// tell them apart by payload shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum CreateUserOutcome {
    Created(InsertResult),
    AlreadyExists(MessageResponse),
}

pub const USER_EXISTS_MESSAGE: &str = "user already exists";

impl CreateUserOutcome {
    pub fn already_exists() -> Self {
        CreateUserOutcome::AlreadyExists(MessageResponse {
            message: USER_EXISTS_MESSAGE.to_string(),
        })
    }
}

// --- Request Payloads ---

/// StatusUpdateRequest
///
/// Body of both class status routes. The value is stored as given.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StatusUpdateRequest {
    #[schema(value_type = Object, example = "approved")]
    pub status: Value,
}

/// EnrollQuery
///
/// Query string of `GET /enroll`.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct EnrollQuery {
    /// Owner whose bookings are listed. Must match the token's email claim.
    pub email: Option<String>,
}

/// TokenResponse
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    pub token: String,
}
