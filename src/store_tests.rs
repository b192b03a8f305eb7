//! Round trips through the router against a real PostgreSQL database.
//!
//! Run with `DATABASE_URL=postgres://... cargo test -- --ignored`.

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use chrono::Local;
use diesel::dsl::insert_into;
use diesel::{Connection, ExpressionMethods, PgConnection, QueryDsl, SelectableHelper};
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde_json::{json, Value};
use tower::ServiceExt;

use crate::auth::Keys;
use crate::model::{NewUser, User};
use crate::password::hash_password;
use crate::schema::users;
use crate::{access, app, run_migrations, State};

const PASSWORD: &str = "Xk9#mVq2pL";

async fn state() -> State {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let mut migration_connection = PgConnection::establish(&url).unwrap();
    run_migrations(&mut migration_connection).unwrap();
    let manager = AsyncDieselConnectionManager::<AsyncPgConnection>::new(url);
    State {
        pool: bb8::Pool::builder().build(manager).await.unwrap(),
        enforcer: Arc::new(access::test_enforcer().await),
        keys: Arc::new(Keys::new("test-secret", 1)),
    }
}

fn unique_email(prefix: &str) -> String {
    format!(
        "{}-{}@example.com",
        prefix,
        Local::now().timestamp_nanos_opt().unwrap_or_default()
    )
}

async fn insert_user(state: &State, email: &str, is_superuser: bool) -> User {
    let mut conn = state.pool.get().await.unwrap();
    insert_into(users::table)
        .values(&NewUser {
            password: hash_password(PASSWORD.to_string()).await.unwrap(),
            email: email.to_string(),
            username: email.to_string(),
            first_name: String::new(),
            last_name: String::new(),
            is_staff: is_superuser,
            is_superuser,
            is_active: true,
            date_joined: Local::now().naive_utc(),
        })
        .returning(User::as_returning())
        .get_result(&mut conn)
        .await
        .unwrap()
}

async fn call(
    state: &State,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => request
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string())),
        None => request.body(Body::empty()),
    }
    .unwrap();
    let response = app(state.clone()).oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

async fn admin_token(state: &State) -> String {
    let admin = insert_user(state, &unique_email("root"), true).await;
    state.keys.issue(&admin).unwrap().access_token
}

#[tokio::test]
#[ignore = "needs DATABASE_URL pointing at a scratch PostgreSQL database"]
async fn created_user_gets_email_as_username() {
    let state = state().await;
    let token = admin_token(&state).await;
    let email = unique_email("guest");

    let (status, body) = call(
        &state,
        "POST",
        "/api/admin/users",
        Some(&token),
        Some(json!({
            "email": email,
            "password1": PASSWORD,
            "password2": PASSWORD,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["next"], "admin_dashboard");

    let mut conn = state.pool.get().await.unwrap();
    let user = users::table
        .filter(users::email.eq(&email))
        .select(User::as_select())
        .first::<User>(&mut conn)
        .await
        .unwrap();
    assert_eq!(user.username, email);
    assert_eq!(user.login, "");
    assert!(user.is_active);

    let (status, body) = call(
        &state,
        "POST",
        "/api/admin/users",
        Some(&token),
        Some(json!({
            "email": email,
            "password1": PASSWORD,
            "password2": PASSWORD,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["fields"]["email"].is_array());
}

#[tokio::test]
#[ignore = "needs DATABASE_URL pointing at a scratch PostgreSQL database"]
async fn mismatched_sign_up_creates_nothing() {
    let state = state().await;
    let token = admin_token(&state).await;
    let email = unique_email("mismatch");

    let (status, body) = call(
        &state,
        "POST",
        "/api/admin/users",
        Some(&token),
        Some(json!({
            "email": email,
            "password1": PASSWORD,
            "password2": "Xk9#mVq2pX",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["fields"]["password2"].is_array());

    let mut conn = state.pool.get().await.unwrap();
    let count: i64 = users::table
        .filter(users::email.eq(&email))
        .count()
        .get_result(&mut conn)
        .await
        .unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
#[ignore = "needs DATABASE_URL pointing at a scratch PostgreSQL database"]
async fn blocking_twice_restores_the_user() {
    let state = state().await;
    let token = admin_token(&state).await;
    let guest = insert_user(&state, &unique_email("blocked"), false).await;
    let uri = format!("/api/admin/users/{}/block", guest.id);

    let (status, body) = call(&state, "POST", &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], format!("User {} blocked.", guest.email));

    // A blocked account cannot sign in or use an old session.
    let (status, body) = call(
        &state,
        "POST",
        "/api/account/login",
        None,
        Some(json!({ "email": guest.email, "password": PASSWORD })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "This account is inactive.");

    let (status, body) = call(&state, "POST", &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], format!("User {} unblocked.", guest.email));

    let mut conn = state.pool.get().await.unwrap();
    let active: bool = users::table
        .find(guest.id)
        .select(users::is_active)
        .first(&mut conn)
        .await
        .unwrap();
    assert!(active);
}

#[tokio::test]
#[ignore = "needs DATABASE_URL pointing at a scratch PostgreSQL database"]
async fn non_superuser_is_kept_out_of_admin_views() {
    let state = state().await;
    let guest = insert_user(&state, &unique_email("guest"), false).await;
    let token = state.keys.issue(&guest).unwrap().access_token;

    for (method, uri) in [
        ("GET", "/api/admin/dashboard".to_string()),
        ("GET", "/api/admin/users".to_string()),
        ("GET", format!("/api/admin/users/{}", guest.id)),
        ("POST", format!("/api/admin/users/{}/block", guest.id)),
    ] {
        let (status, body) = call(&state, method, &uri, Some(&token), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{uri}");
        assert_eq!(body["error"], "Permission denied");
    }

    let (status, body) = call(&state, "GET", "/api/account/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["email"], guest.email);
}

#[tokio::test]
#[ignore = "needs DATABASE_URL pointing at a scratch PostgreSQL database"]
async fn login_failures_share_one_message() {
    let state = state().await;
    let guest = insert_user(&state, &unique_email("login"), false).await;

    let (wrong_status, wrong_body) = call(
        &state,
        "POST",
        "/api/account/login",
        None,
        Some(json!({ "email": guest.email, "password": "not-the-password" })),
    )
    .await;
    let (unknown_status, unknown_body) = call(
        &state,
        "POST",
        "/api/account/login",
        None,
        Some(json!({ "email": unique_email("nobody"), "password": PASSWORD })),
    )
    .await;
    assert_eq!(wrong_status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_status, unknown_status);
    assert_eq!(wrong_body, unknown_body);

    let (status, body) = call(
        &state,
        "POST",
        "/api/account/login",
        None,
        Some(json!({ "email": guest.email, "password": PASSWORD })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["next"], "change_password");
}

#[tokio::test]
#[ignore = "needs DATABASE_URL pointing at a scratch PostgreSQL database"]
async fn join_pairs_are_unique() {
    let state = state().await;
    let token = admin_token(&state).await;

    let (_, category) = call(
        &state,
        "POST",
        "/api/catalog/room-categories",
        Some(&token),
        Some(json!({ "name": "Suite" })),
    )
    .await;
    let (_, element) = call(
        &state,
        "POST",
        "/api/catalog/room-elements",
        Some(&token),
        Some(json!({ "name": "Minibar" })),
    )
    .await;
    let (status, room) = call(
        &state,
        "POST",
        "/api/rooms",
        Some(&token),
        Some(json!({
            "category_id": category["id"],
            "floor": 4,
            "status_id": null,
            "cost": "4200.00",
            "room_name": "401"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let equipment_uri = format!("/api/rooms/{}/equipment", room["room_id"]);
    let pair = json!({ "element_id": element["id"] });
    let (first, _) = call(&state, "POST", &equipment_uri, Some(&token), Some(pair.clone())).await;
    let (second, _) = call(&state, "POST", &equipment_uri, Some(&token), Some(pair)).await;
    assert_eq!(first, StatusCode::CREATED);
    assert_eq!(second, StatusCode::CONFLICT);

    let guest = insert_user(&state, &unique_email("client"), false).await;
    let (status, order) = call(
        &state,
        "POST",
        "/api/orders",
        Some(&token),
        Some(json!({
            "room_id": room["room_id"],
            "date_start": "2024-06-01",
            "date_end": "2024-06-05",
            "sum": "16800.00",
            "client_id": guest.id
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let (_, service) = call(
        &state,
        "POST",
        "/api/services",
        Some(&token),
        Some(json!({ "service_name": "Breakfast", "cost": "500.00" })),
    )
    .await;

    let services_uri = format!("/api/orders/{}/services", order["order_id"]);
    let pair = json!({ "service_id": service["service_id"] });
    let (first, _) = call(&state, "POST", &services_uri, Some(&token), Some(pair.clone())).await;
    let (second, _) = call(&state, "POST", &services_uri, Some(&token), Some(pair)).await;
    assert_eq!(first, StatusCode::CREATED);
    assert_eq!(second, StatusCode::CONFLICT);
}

#[tokio::test]
#[ignore = "needs DATABASE_URL pointing at a scratch PostgreSQL database"]
async fn unknown_references_are_field_errors() {
    let state = state().await;
    let token = admin_token(&state).await;

    let (status, body) = call(
        &state,
        "POST",
        "/api/rooms",
        Some(&token),
        Some(json!({
            "category_id": i32::MAX,
            "floor": 1,
            "status_id": null,
            "cost": "100.00",
            "room_name": "nowhere"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["fields"]["category_id"].is_array());

    let (status, _) = call(
        &state,
        "PUT",
        "/api/admin/users/2147483647",
        Some(&token),
        Some(json!({
            "email": unique_email("ghost"),
            "is_staff": false,
            "is_active": true,
            "block": false,
            "first_auth": false
        })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
#[ignore = "needs DATABASE_URL pointing at a scratch PostgreSQL database"]
async fn editing_a_blocked_user_keeps_them_blocked() {
    let state = state().await;
    let token = admin_token(&state).await;
    let guest = insert_user(&state, &unique_email("edited"), false).await;
    let block_uri = format!("/api/admin/users/{}/block", guest.id);
    let edit_uri = format!("/api/admin/users/{}", guest.id);

    let (status, _) = call(&state, "POST", &block_uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = call(
        &state,
        "PUT",
        &edit_uri,
        Some(&token),
        Some(json!({ "email": guest.email, "phone_number": "+7 900 000-00-00" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(
        &state,
        "PUT",
        &edit_uri,
        Some(&token),
        Some(json!({
            "email": guest.email,
            "phone_number": "+7 900 000-00-00",
            "is_staff": false,
            "is_active": false,
            "block": false,
            "first_auth": false
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let mut conn = state.pool.get().await.unwrap();
    let (active, phone): (bool, String) = users::table
        .find(guest.id)
        .select((users::is_active, users::phone_number))
        .first(&mut conn)
        .await
        .unwrap();
    assert!(!active);
    assert_eq!(phone, "+7 900 000-00-00");
}
