use super::{ClassStore, EnrollmentStore, StoreError, UserStore, parse_id};
use crate::models::{
    Class, CreateUserOutcome, DeleteResult, Enrollment, InsertResult, Role, UpdateResult, User,
};
use async_trait::async_trait;
use bson::oid::ObjectId;
use serde_json::Value;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, instrument};

// In-memory stores
//
// Process-local implementations of the store traits for tests and for running the
// server without a database (`STORE_BACKEND=memory`). They follow the database's
// observable behaviour: ids are generated object ids, malformed ids are rejected,
// an update that writes the current value matches without modifying.

fn lock<T>(mutex: &Mutex<Vec<T>>) -> MutexGuard<'_, Vec<T>> {
    // A panic while holding the lock cannot leave a half-written record behind.
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn new_id() -> String {
    ObjectId::new().to_hex()
}

fn updated(matched: bool, modified: bool) -> UpdateResult {
    UpdateResult {
        acknowledged: true,
        matched_count: u64::from(matched),
        modified_count: u64::from(modified),
        upserted_id: None,
        upserted_count: 0,
    }
}

/// Applies `change` to the record whose id is `id` and reports the counts an update
/// of one document would.
fn update_one<T>(
    records: &mut [T],
    id: &str,
    id_of: impl Fn(&T) -> Option<&str>,
    change: impl FnOnce(&mut T) -> bool,
) -> Result<UpdateResult, StoreError> {
    let id = parse_id(id)?.to_hex();
    match records.iter_mut().find(|r| id_of(r) == Some(id.as_str())) {
        Some(record) => {
            let modified = change(record);
            Ok(updated(true, modified))
        }
        None => Ok(updated(false, false)),
    }
}

// --- Users ---

#[derive(Default)]
pub struct InMemoryUserStore {
    users: Mutex<Vec<User>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the store. Records without an id get one.
    pub fn with_users(users: Vec<User>) -> Self {
        let users = users
            .into_iter()
            .map(|mut u| {
                u.id.get_or_insert_with(new_id);
                u
            })
            .collect();
        Self {
            users: Mutex::new(users),
        }
    }

    pub fn count(&self) -> usize {
        lock(&self.users).len()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn list_all(&self) -> Result<Vec<User>, StoreError> {
        Ok(lock(&self.users).clone())
    }

    async fn list_by_role(&self, role: Role) -> Result<Vec<User>, StoreError> {
        Ok(lock(&self.users)
            .iter()
            .filter(|u| u.role_name() == Some(role.as_str()))
            .cloned()
            .collect())
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(lock(&self.users).iter().find(|u| u.email == email).cloned())
    }

    #[instrument(skip(self, user), fields(email = %user.email))]
    async fn create_if_absent(&self, mut user: User) -> Result<CreateUserOutcome, StoreError> {
        let mut users = lock(&self.users);
        if users.iter().any(|u| u.email == user.email) {
            debug!("user already exists");
            return Ok(CreateUserOutcome::already_exists());
        }

        let id = new_id();
        user.id = Some(id.clone());
        users.push(user);
        Ok(CreateUserOutcome::Created(InsertResult {
            acknowledged: true,
            inserted_id: id,
        }))
    }

    async fn set_role(&self, id: &str, role: Role) -> Result<UpdateResult, StoreError> {
        update_one(lock(&self.users).as_mut_slice(), id, |u| u.id.as_deref(), |u| {
            let modified = u.role_name() != Some(role.as_str());
            u.role = Some(Value::from(role.as_str()));
            modified
        })
    }
}

// --- Classes ---

#[derive(Default)]
pub struct InMemoryClassStore {
    classes: Mutex<Vec<Class>>,
}

impl InMemoryClassStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        lock(&self.classes).len()
    }
}

#[async_trait]
impl ClassStore for InMemoryClassStore {
    async fn list_all(&self) -> Result<Vec<Class>, StoreError> {
        Ok(lock(&self.classes).clone())
    }

    async fn create(&self, mut class: Class) -> Result<InsertResult, StoreError> {
        let id = new_id();
        class.id = Some(id.clone());
        lock(&self.classes).push(class);
        Ok(InsertResult {
            acknowledged: true,
            inserted_id: id,
        })
    }

    async fn set_enroll_status(&self, id: &str, status: Value) -> Result<UpdateResult, StoreError> {
        update_one(lock(&self.classes).as_mut_slice(), id, |c| c.id.as_deref(), |c| {
            let modified = c.enroll.as_ref() != Some(&status);
            c.enroll = Some(status);
            modified
        })
    }

    async fn set_approval_status(&self, id: &str, status: Value) -> Result<UpdateResult, StoreError> {
        update_one(lock(&self.classes).as_mut_slice(), id, |c| c.id.as_deref(), |c| {
            let modified = c.status.as_ref() != Some(&status);
            c.status = Some(status);
            modified
        })
    }
}

// --- Bookings ---

#[derive(Default)]
pub struct InMemoryEnrollmentStore {
    enrollments: Mutex<Vec<Enrollment>>,
}

impl InMemoryEnrollmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        lock(&self.enrollments).len()
    }
}

#[async_trait]
impl EnrollmentStore for InMemoryEnrollmentStore {
    async fn list_by_email(&self, email: &str) -> Result<Vec<Enrollment>, StoreError> {
        Ok(lock(&self.enrollments)
            .iter()
            .filter(|e| e.email == email)
            .cloned()
            .collect())
    }

    async fn create(&self, mut enrollment: Enrollment) -> Result<InsertResult, StoreError> {
        let id = new_id();
        enrollment.id = Some(id.clone());
        lock(&self.enrollments).push(enrollment);
        Ok(InsertResult {
            acknowledged: true,
            inserted_id: id,
        })
    }

    async fn delete_by_id(&self, id: &str) -> Result<DeleteResult, StoreError> {
        let id = parse_id(id)?.to_hex();
        let mut enrollments = lock(&self.enrollments);
        let before = enrollments.len();
        enrollments.retain(|e| e.id.as_deref() != Some(id.as_str()));
        Ok(DeleteResult {
            acknowledged: true,
            deleted_count: (before - enrollments.len()) as u64,
        })
    }
}
