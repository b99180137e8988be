use crate::models::{
    Class, CreateUserOutcome, DeleteResult, Enrollment, InsertResult, Role, UpdateResult, User,
};
use async_trait::async_trait;
use bson::oid::ObjectId;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

pub mod memory;
pub mod mongo;

pub use memory::{InMemoryClassStore, InMemoryEnrollmentStore, InMemoryUserStore};
pub use mongo::{MongoClassStore, MongoEnrollmentStore, MongoUserStore};

/// StoreError
///
/// Failures of a store operation. Nothing here is retried; handlers surface the error
/// to the client as-is.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The path id is not a 24-digit hex object id.
    #[error("invalid id: {0}")]
    InvalidId(String),

    #[error("database error: {0}")]
    Database(#[from] mongodb::error::Error),

    #[error("failed to encode document: {0}")]
    Encode(#[from] bson::ser::Error),

    #[error("failed to decode document: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Parses a client-supplied document id.
pub fn parse_id(id: &str) -> Result<ObjectId, StoreError> {
    ObjectId::parse_str(id).map_err(|_| StoreError::InvalidId(id.to_string()))
}

/// UserStore
///
/// Accessor over the `users` collection.
///
/// **Send + Sync + async_trait** make `Arc<dyn UserStore>` shareable across Axum's
/// request tasks.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Every user, unfiltered.
    async fn list_all(&self) -> Result<Vec<User>, StoreError>;
    /// Users whose `role` equals `role` exactly.
    async fn list_by_role(&self, role: Role) -> Result<Vec<User>, StoreError>;
    async fn get_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    /// Inserts `user` unless a user with the same email exists. Idempotent sign-in.
    async fn create_if_absent(&self, user: User) -> Result<CreateUserOutcome, StoreError>;
    /// Overwrites `role`. Does not check that the id exists; a miss reports zero matches.
    async fn set_role(&self, id: &str, role: Role) -> Result<UpdateResult, StoreError>;
}

/// ClassStore
///
/// Accessor over the `classes` collection.
#[async_trait]
pub trait ClassStore: Send + Sync {
    async fn list_all(&self) -> Result<Vec<Class>, StoreError>;
    async fn create(&self, class: Class) -> Result<InsertResult, StoreError>;
    /// Overwrites the `enroll` field only.
    async fn set_enroll_status(&self, id: &str, status: Value) -> Result<UpdateResult, StoreError>;
    /// Overwrites the `status` (approval) field only.
    async fn set_approval_status(&self, id: &str, status: Value) -> Result<UpdateResult, StoreError>;
}

/// EnrollmentStore
///
/// Accessor over the `bookings` collection. Ownership is enforced by the handler, not
/// here.
#[async_trait]
pub trait EnrollmentStore: Send + Sync {
    async fn list_by_email(&self, email: &str) -> Result<Vec<Enrollment>, StoreError>;
    async fn create(&self, enrollment: Enrollment) -> Result<InsertResult, StoreError>;
    async fn delete_by_id(&self, id: &str) -> Result<DeleteResult, StoreError>;
}

pub type UserStoreState = Arc<dyn UserStore>;
pub type ClassStoreState = Arc<dyn ClassStore>;
pub type EnrollmentStoreState = Arc<dyn EnrollmentStore>;
