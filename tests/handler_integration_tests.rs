use async_trait::async_trait;
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use dance_school::{
    AppError, AppState,
    auth::{AuthUser, Claims},
    config::AppConfig,
    handlers,
    models::{
        Class, CreateUserOutcome, EnrollQuery, Enrollment, Role, StatusUpdateRequest,
        USER_EXISTS_MESSAGE, UpdateResult, User,
    },
    repository::{
        InMemoryClassStore, InMemoryEnrollmentStore, InMemoryUserStore, StoreError, UserStore,
    },
};
use serde_json::{Map, Value, json};
use std::sync::Arc;

// --- Failing Store ---

// Every call fails the way a driver decode error would.
struct BrokenUserStore;

fn broken() -> StoreError {
    StoreError::Decode(serde_json::from_str::<Value>("{").unwrap_err())
}

#[async_trait]
impl UserStore for BrokenUserStore {
    async fn list_all(&self) -> Result<Vec<User>, StoreError> {
        Err(broken())
    }
    async fn list_by_role(&self, _role: Role) -> Result<Vec<User>, StoreError> {
        Err(broken())
    }
    async fn get_by_email(&self, _email: &str) -> Result<Option<User>, StoreError> {
        Err(broken())
    }
    async fn create_if_absent(&self, _user: User) -> Result<CreateUserOutcome, StoreError> {
        Err(broken())
    }
    async fn set_role(&self, _id: &str, _role: Role) -> Result<UpdateResult, StoreError> {
        Err(broken())
    }
}

// --- TEST UTILITIES ---

struct Fixture {
    state: AppState,
    users: Arc<InMemoryUserStore>,
    classes: Arc<InMemoryClassStore>,
    enrollments: Arc<InMemoryEnrollmentStore>,
}

fn fixture() -> Fixture {
    let users = Arc::new(InMemoryUserStore::new());
    let classes = Arc::new(InMemoryClassStore::new());
    let enrollments = Arc::new(InMemoryEnrollmentStore::new());
    let state = AppState::new(
        users.clone(),
        classes.clone(),
        enrollments.clone(),
        AppConfig::default(),
    );
    Fixture {
        state,
        users,
        classes,
        enrollments,
    }
}

fn caller(email: &str) -> AuthUser {
    AuthUser {
        claims: Claims {
            email: Some(email.to_string()),
            iat: 0,
            exp: 0,
            extra: Map::new(),
        },
    }
}

fn user(email: &str) -> User {
    User {
        email: email.to_string(),
        ..User::default()
    }
}

fn booking(email: &str, class_id: &str) -> Enrollment {
    let mut booking = Map::new();
    booking.insert("classId".to_string(), json!(class_id));
    Enrollment {
        id: None,
        email: email.to_string(),
        booking,
    }
}

fn email_query(email: Option<&str>) -> Query<EnrollQuery> {
    Query(EnrollQuery {
        email: email.map(str::to_string),
    })
}

// --- USER HANDLERS ---

#[tokio::test]
async fn test_create_user_then_lookup() {
    let fx = fixture();

    let Json(outcome) = handlers::create_user(State(fx.state.clone()), Json(user("new@x.com")))
        .await
        .unwrap();
    assert!(matches!(outcome, CreateUserOutcome::Created(_)));

    let Json(found) = handlers::get_user(State(fx.state), Path("new@x.com".to_string()))
        .await
        .unwrap();
    assert_eq!(found.unwrap().email, "new@x.com");
}

#[tokio::test]
async fn test_create_user_twice_returns_message() {
    let fx = fixture();
    handlers::create_user(State(fx.state.clone()), Json(user("a@x.com")))
        .await
        .unwrap();

    let Json(outcome) = handlers::create_user(State(fx.state), Json(user("a@x.com")))
        .await
        .unwrap();

    assert_eq!(fx.users.count(), 1);
    match outcome {
        CreateUserOutcome::AlreadyExists(body) => assert_eq!(body.message, USER_EXISTS_MESSAGE),
        other => panic!("expected conflict message, got {other:?}"),
    }
}

#[tokio::test]
async fn test_create_user_without_email_is_rejected() {
    let fx = fixture();

    let err = handlers::create_user(State(fx.state), Json(user("")))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::MissingField("email")));
    assert_eq!(fx.users.count(), 0);
}

#[tokio::test]
async fn test_legacy_users_do_not_break_listings() {
    let mut no_email = User::default();
    no_email.profile.insert("name".to_string(), json!("legacy"));
    let mut odd_role = user("odd@x.com");
    odd_role.role = Some(json!(3));
    let state = AppState::new(
        Arc::new(InMemoryUserStore::with_users(vec![no_email, odd_role])),
        Arc::new(InMemoryClassStore::new()),
        Arc::new(InMemoryEnrollmentStore::new()),
        AppConfig::default(),
    );

    let Json(users) = handlers::list_users(State(state.clone())).await.unwrap();
    assert_eq!(users.len(), 2);

    let Json(instructors) = handlers::list_instructors(State(state)).await.unwrap();
    assert!(instructors.is_empty());
}

#[tokio::test]
async fn test_unknown_user_is_null() {
    let fx = fixture();

    let Json(found) = handlers::get_user(State(fx.state), Path("ghost@x.com".to_string()))
        .await
        .unwrap();

    assert!(found.is_none());
}

#[tokio::test]
async fn test_promotions_and_instructor_listing() {
    let fx = fixture();
    for email in ["a@x.com", "b@x.com"] {
        handlers::create_user(State(fx.state.clone()), Json(user(email)))
            .await
            .unwrap();
    }
    let a = fx.users.get_by_email("a@x.com").await.unwrap().unwrap();
    let b = fx.users.get_by_email("b@x.com").await.unwrap().unwrap();

    handlers::make_admin(State(fx.state.clone()), Path(a.id.unwrap()))
        .await
        .unwrap();
    let Json(result) = handlers::make_instructor(State(fx.state.clone()), Path(b.id.unwrap()))
        .await
        .unwrap();
    assert_eq!(result.matched_count, 1);
    assert_eq!(result.modified_count, 1);

    let Json(instructors) = handlers::list_instructors(State(fx.state.clone()))
        .await
        .unwrap();
    assert_eq!(instructors.len(), 1);
    assert_eq!(instructors[0].email, "b@x.com");

    let admin = fx.users.get_by_email("a@x.com").await.unwrap().unwrap();
    assert_eq!(admin.role_name(), Some("admin"));
}

#[tokio::test]
async fn test_malformed_id_is_bad_request() {
    let fx = fixture();

    let err = handlers::make_admin(State(fx.state), Path("12345".to_string()))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Store(StoreError::InvalidId(_))));
    assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_store_failure_is_internal_error() {
    let state = AppState::new(
        Arc::new(BrokenUserStore),
        Arc::new(InMemoryClassStore::new()),
        Arc::new(InMemoryEnrollmentStore::new()),
        AppConfig::default(),
    );

    let err = handlers::list_users(State(state)).await.unwrap_err();

    assert_eq!(
        err.into_response().status(),
        StatusCode::INTERNAL_SERVER_ERROR
    );
}

// --- CLASS HANDLERS ---

#[tokio::test]
async fn test_class_status_updates_touch_separate_fields() {
    let fx = fixture();
    let Json(inserted) = handlers::create_class(
        State(fx.state.clone()),
        Json(serde_json::from_value::<Class>(json!({ "name": "Salsa", "seats": 20 })).unwrap()),
    )
    .await
    .unwrap();
    let id = inserted.inserted_id;

    handlers::update_approval_status(
        State(fx.state.clone()),
        Path(id.clone()),
        Json(StatusUpdateRequest {
            status: json!("approved"),
        }),
    )
    .await
    .unwrap();
    handlers::update_enroll_status(
        State(fx.state.clone()),
        Path(id.clone()),
        Json(StatusUpdateRequest {
            status: json!("full"),
        }),
    )
    .await
    .unwrap();

    let Json(classes) = handlers::list_classes(State(fx.state)).await.unwrap();
    assert_eq!(fx.classes.count(), 1);
    let class = &classes[0];
    assert_eq!(class.id.as_deref(), Some(id.as_str()));
    assert_eq!(class.status, Some(json!("approved")));
    assert_eq!(class.enroll, Some(json!("full")));
    assert_eq!(class.details.get("name"), Some(&json!("Salsa")));
}

// --- ENROLLMENT HANDLERS ---

#[tokio::test]
async fn test_list_enrollments_returns_only_own_bookings() {
    let fx = fixture();
    for (email, class_id) in [("a@x.com", "c1"), ("b@x.com", "c2"), ("a@x.com", "c3")] {
        handlers::create_enrollment(State(fx.state.clone()), Json(booking(email, class_id)))
            .await
            .unwrap();
    }

    let Json(mine) = handlers::list_enrollments(
        caller("a@x.com"),
        State(fx.state),
        email_query(Some("a@x.com")),
    )
    .await
    .unwrap();

    assert_eq!(mine.len(), 2);
    assert!(mine.iter().all(|e| e.email == "a@x.com"));
}

#[tokio::test]
async fn test_list_enrollments_for_someone_else_is_forbidden() {
    let fx = fixture();
    handlers::create_enrollment(State(fx.state.clone()), Json(booking("a@x.com", "c1")))
        .await
        .unwrap();

    let err = handlers::list_enrollments(
        caller("b@x.com"),
        State(fx.state),
        email_query(Some("a@x.com")),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, AppError::Forbidden));
    assert_eq!(err.into_response().status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_list_enrollments_without_email_is_empty() {
    let fx = fixture();
    handlers::create_enrollment(State(fx.state.clone()), Json(booking("a@x.com", "c1")))
        .await
        .unwrap();

    // Even a caller whose claim would not match gets the empty list, not a 403.
    for query in [None, Some("")] {
        let Json(result) =
            handlers::list_enrollments(caller("b@x.com"), State(fx.state.clone()), email_query(query))
                .await
                .unwrap();
        assert!(result.is_empty());
    }
}

#[tokio::test]
async fn test_delete_enrollment_twice() {
    let fx = fixture();
    let Json(inserted) =
        handlers::create_enrollment(State(fx.state.clone()), Json(booking("a@x.com", "c1")))
            .await
            .unwrap();

    let Json(first) =
        handlers::delete_enrollment(State(fx.state.clone()), Path(inserted.inserted_id.clone()))
            .await
            .unwrap();
    let Json(second) =
        handlers::delete_enrollment(State(fx.state), Path(inserted.inserted_id))
            .await
            .unwrap();

    assert_eq!(first.deleted_count, 1);
    assert_eq!(second.deleted_count, 0);
    assert_eq!(fx.enrollments.count(), 0);
}
