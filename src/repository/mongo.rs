use super::{ClassStore, EnrollmentStore, StoreError, UserStore, parse_id};
use crate::models::{
    Class, CreateUserOutcome, DeleteResult, Enrollment, InsertResult, Role, UpdateResult, User,
};
use async_trait::async_trait;
use bson::{Bson, Document, doc};
use futures::TryStreamExt;
use mongodb::{Client, Collection, Database, results};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use tracing::{debug, instrument};

pub const USERS_COLLECTION: &str = "users";
pub const CLASSES_COLLECTION: &str = "classes";
pub const BOOKINGS_COLLECTION: &str = "bookings";

/// connect
///
/// Opens the client, pings the deployment so a bad URI fails at startup rather than on
/// the first request, and returns the application database. The client is reused for
/// the life of the process and never explicitly closed.
pub async fn connect(uri: &str, db_name: &str) -> Result<Database, StoreError> {
    let client = Client::with_uri_str(uri).await?;
    client.database("admin").run_command(doc! { "ping": 1 }).await?;
    tracing::info!("Pinged deployment, MongoDB connection established");
    Ok(client.database(db_name))
}

// --- Document Conversion ---

/// Renders a stored document as an API model. The document goes through relaxed
/// extended JSON, then every `{"$oid": ..}` and string `{"$date": ..}` wrapper is
/// replaced by its plain string, at any depth.
fn decode<T: DeserializeOwned>(document: Document) -> Result<T, StoreError> {
    let mut value = plain_json(Bson::Document(document).into_relaxed_extjson());
    // Legacy ids that are not object ids still render as a string.
    if let Some(id) = value.get_mut("_id") {
        if !id.is_string() {
            *id = Value::String(id.to_string());
        }
    }
    Ok(serde_json::from_value(value)?)
}

fn plain_json(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            if map.len() == 1 {
                if let Some(Value::String(s)) = map.get("$oid").or_else(|| map.get("$date")) {
                    return Value::String(s.clone());
                }
            }
            Value::Object(map.into_iter().map(|(k, v)| (k, plain_json(v))).collect())
        }
        Value::Array(items) => Value::Array(items.into_iter().map(plain_json).collect()),
        other => other,
    }
}

fn decode_all<T: DeserializeOwned>(documents: Vec<Document>) -> Result<Vec<T>, StoreError> {
    documents.into_iter().map(decode).collect()
}

/// Serializes a model for insertion. Any client-supplied `_id` is dropped so the
/// database assigns one.
fn encode<T: Serialize>(item: &T) -> Result<Document, StoreError> {
    let mut document = bson::to_document(item)?;
    document.remove("_id");
    Ok(document)
}

fn id_string(id: Bson) -> String {
    match id {
        Bson::ObjectId(oid) => oid.to_hex(),
        Bson::String(s) => s,
        other => other.to_string(),
    }
}

fn insert_result(result: results::InsertOneResult) -> InsertResult {
    InsertResult {
        acknowledged: true,
        inserted_id: id_string(result.inserted_id),
    }
}

fn update_result(result: results::UpdateResult) -> UpdateResult {
    let upserted_count = u64::from(result.upserted_id.is_some());
    UpdateResult {
        acknowledged: true,
        matched_count: result.matched_count,
        modified_count: result.modified_count,
        upserted_id: result.upserted_id.map(id_string),
        upserted_count,
    }
}

fn delete_result(result: results::DeleteResult) -> DeleteResult {
    DeleteResult {
        acknowledged: true,
        deleted_count: result.deleted_count,
    }
}

// --- Users ---

/// MongoUserStore
///
/// `UserStore` over the `users` collection.
#[derive(Clone)]
pub struct MongoUserStore {
    collection: Collection<Document>,
}

impl MongoUserStore {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection(USERS_COLLECTION),
        }
    }
}

#[async_trait]
impl UserStore for MongoUserStore {
    #[instrument(skip(self))]
    async fn list_all(&self) -> Result<Vec<User>, StoreError> {
        let documents: Vec<Document> = self.collection.find(doc! {}).await?.try_collect().await?;
        decode_all(documents)
    }

    #[instrument(skip(self))]
    async fn list_by_role(&self, role: Role) -> Result<Vec<User>, StoreError> {
        let documents: Vec<Document> = self
            .collection
            .find(doc! { "role": role.as_str() })
            .await?
            .try_collect()
            .await?;
        decode_all(documents)
    }

    #[instrument(skip(self))]
    async fn get_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        self.collection
            .find_one(doc! { "email": email })
            .await?
            .map(decode)
            .transpose()
    }

    /// Lookup-then-insert. Two concurrent first sign-ins for the same email can both
    /// miss the lookup and insert twice; no unique index on `email` is created here.
    #[instrument(skip(self, user), fields(email = %user.email))]
    async fn create_if_absent(&self, user: User) -> Result<CreateUserOutcome, StoreError> {
        if let Some(existing) = self.collection.find_one(doc! { "email": user.email.as_str() }).await? {
            debug!(existing_id = ?existing.get("_id"), "user already exists");
            return Ok(CreateUserOutcome::already_exists());
        }

        let result = self.collection.insert_one(encode(&user)?).await?;
        Ok(CreateUserOutcome::Created(insert_result(result)))
    }

    #[instrument(skip(self))]
    async fn set_role(&self, id: &str, role: Role) -> Result<UpdateResult, StoreError> {
        let filter = doc! { "_id": parse_id(id)? };
        let update = doc! { "$set": { "role": role.as_str() } };
        let result = self.collection.update_one(filter, update).await?;
        Ok(update_result(result))
    }
}

// --- Classes ---

/// MongoClassStore
///
/// `ClassStore` over the `classes` collection.
#[derive(Clone)]
pub struct MongoClassStore {
    collection: Collection<Document>,
}

impl MongoClassStore {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection(CLASSES_COLLECTION),
        }
    }

    async fn set_field(&self, id: &str, field: &str, value: Value) -> Result<UpdateResult, StoreError> {
        let filter = doc! { "_id": parse_id(id)? };
        let mut fields = Document::new();
        fields.insert(field, bson::to_bson(&value)?);
        let result = self.collection.update_one(filter, doc! { "$set": fields }).await?;
        Ok(update_result(result))
    }
}

#[async_trait]
impl ClassStore for MongoClassStore {
    #[instrument(skip(self))]
    async fn list_all(&self) -> Result<Vec<Class>, StoreError> {
        let documents: Vec<Document> = self.collection.find(doc! {}).await?.try_collect().await?;
        decode_all(documents)
    }

    #[instrument(skip(self, class))]
    async fn create(&self, class: Class) -> Result<InsertResult, StoreError> {
        let result = self.collection.insert_one(encode(&class)?).await?;
        Ok(insert_result(result))
    }

    #[instrument(skip(self))]
    async fn set_enroll_status(&self, id: &str, status: Value) -> Result<UpdateResult, StoreError> {
        self.set_field(id, "enroll", status).await
    }

    #[instrument(skip(self))]
    async fn set_approval_status(&self, id: &str, status: Value) -> Result<UpdateResult, StoreError> {
        self.set_field(id, "status", status).await
    }
}

// --- Bookings ---

/// MongoEnrollmentStore
///
/// `EnrollmentStore` over the `bookings` collection.
#[derive(Clone)]
pub struct MongoEnrollmentStore {
    collection: Collection<Document>,
}

impl MongoEnrollmentStore {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection(BOOKINGS_COLLECTION),
        }
    }
}

#[async_trait]
impl EnrollmentStore for MongoEnrollmentStore {
    #[instrument(skip(self))]
    async fn list_by_email(&self, email: &str) -> Result<Vec<Enrollment>, StoreError> {
        let documents: Vec<Document> = self
            .collection
            .find(doc! { "email": email })
            .await?
            .try_collect()
            .await?;
        decode_all(documents)
    }

    #[instrument(skip(self, enrollment), fields(email = %enrollment.email))]
    async fn create(&self, enrollment: Enrollment) -> Result<InsertResult, StoreError> {
        let result = self.collection.insert_one(encode(&enrollment)?).await?;
        Ok(insert_result(result))
    }

    #[instrument(skip(self))]
    async fn delete_by_id(&self, id: &str) -> Result<DeleteResult, StoreError> {
        let result = self.collection.delete_one(doc! { "_id": parse_id(id)? }).await?;
        Ok(delete_result(result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::oid::ObjectId;
    use serde_json::json;

    #[test]
    fn decode_flattens_object_id_and_keeps_extra_fields() {
        let oid = ObjectId::new();
        let user: User = decode(doc! {
            "_id": oid,
            "email": "a@x.com",
            "role": "instructor",
            "name": "Ada",
            "seats": 12,
        })
        .unwrap();

        assert_eq!(user.id.as_deref(), Some(oid.to_hex().as_str()));
        assert_eq!(user.role_name(), Some("instructor"));
        assert_eq!(user.profile.get("name"), Some(&json!("Ada")));
        assert_eq!(user.profile.get("seats"), Some(&json!(12)));
    }

    #[test]
    fn legacy_user_without_email_and_numeric_role_decodes() {
        let oid = ObjectId::new();
        let user: User = decode(doc! { "_id": oid, "name": "legacy", "role": 3 }).unwrap();

        assert_eq!(user.id.as_deref(), Some(oid.to_hex().as_str()));
        assert!(user.email.is_empty());
        assert_eq!(user.role, Some(json!(3)));
        assert_eq!(user.role_name(), None);

        let rendered = serde_json::to_value(&user).unwrap();
        assert_eq!(rendered, json!({ "_id": oid.to_hex(), "name": "legacy", "role": 3 }));
    }

    #[test]
    fn listing_survives_heterogeneous_documents() {
        let users: Vec<User> = decode_all(vec![
            doc! { "_id": ObjectId::new(), "email": "a@x.com", "role": "admin" },
            doc! { "_id": ObjectId::new(), "name": "no email" },
            doc! { "_id": ObjectId::new(), "email": null, "role": { "level": 2 } },
            doc! { "_id": 7, "email": "seeded@x.com" },
        ])
        .unwrap();

        assert_eq!(users.len(), 4);
        assert_eq!(users[0].role_name(), Some("admin"));
        assert!(users[2].email.is_empty());
        assert_eq!(users[3].id.as_deref(), Some("7"));
    }

    #[test]
    fn nested_object_ids_and_dates_render_as_strings() {
        let class_id = ObjectId::new();
        let booked_at = bson::DateTime::parse_rfc3339_str("2024-03-01T18:30:00Z").unwrap();
        let booking: Enrollment = decode(doc! {
            "_id": ObjectId::new(),
            "email": "a@x.com",
            "classId": class_id,
            "bookedAt": booked_at,
            "history": [{ "classId": class_id }],
        })
        .unwrap();

        assert_eq!(booking.booking.get("classId"), Some(&json!(class_id.to_hex())));
        let rendered_date = booking.booking["bookedAt"].as_str().unwrap();
        assert!(rendered_date.starts_with("2024-03-01T18:30:00"));
        assert_eq!(booking.booking["history"][0]["classId"], json!(class_id.to_hex()));
    }

    #[test]
    fn encode_drops_client_supplied_id() {
        let class: Class = serde_json::from_value(json!({
            "_id": "client-chosen",
            "name": "Salsa",
            "enroll": "open",
        }))
        .unwrap();

        let document = encode(&class).unwrap();
        assert!(!document.contains_key("_id"));
        assert_eq!(document.get_str("name").unwrap(), "Salsa");
        assert_eq!(document.get_str("enroll").unwrap(), "open");
    }

    #[test]
    fn inserted_object_id_is_rendered_as_hex() {
        let oid = ObjectId::new();
        assert_eq!(id_string(Bson::ObjectId(oid)), oid.to_hex());
    }
}
