pub mod access;
pub mod account;
pub mod admin;
pub mod auth;
pub mod catalog;
pub mod config;
pub mod error;
mod model;
pub mod order;
pub mod password;
pub mod room;
mod schema;
pub mod service;
#[cfg(test)]
mod store_tests;
pub mod validate;

use std::sync::Arc;

use auth::{Keys, SecurityAddon};
use axum::Router;
use casbin::Enforcer;
use config::Config;
use diesel::{pg::Pg, Connection, PgConnection};
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::AsyncPgConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use tokio::net::TcpListener;
use tracing::info;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi;
use utoipa_axum::router::OpenApiRouter;
use utoipa_swagger_ui::SwaggerUi;

const ACCOUNT_TAG: &str = "account";
const ADMIN_TAG: &str = "admin";
const CATALOG_TAG: &str = "catalog";
const ROOM_TAG: &str = "room";
const SERVICE_TAG: &str = "service";
const ORDER_TAG: &str = "order";

pub type Pool = bb8::Pool<AsyncDieselConnectionManager<AsyncPgConnection>>;

#[derive(Clone)]
pub struct State {
    pool: Pool,
    enforcer: Arc<Enforcer>,
    keys: Arc<Keys>,
}

#[derive(OpenApi)]
#[openapi(
    modifiers(&SecurityAddon),
    tags(
        (name = ACCOUNT_TAG, description = "Sign in, sign out and own profile"),
        (name = ADMIN_TAG, description = "User administration"),
        (name = CATALOG_TAG, description = "Roles, genders and room reference data"),
        (name = ROOM_TAG, description = "Rooms and their equipment"),
        (name = SERVICE_TAG, description = "Bookable services"),
        (name = ORDER_TAG, description = "Orders and their services")
    )
)]
struct ApiDoc;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!();

fn run_migrations(
    connection: &mut impl MigrationHarness<Pg>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    connection.run_pending_migrations(MIGRATIONS)?;
    Ok(())
}

fn app(state: State) -> Router {
    let (router, api) = OpenApiRouter::with_openapi(ApiDoc::openapi())
        .nest("/api/account", account::account_router())
        .nest("/api/admin", admin::admin_router())
        .nest("/api/catalog", catalog::catalog_router())
        .nest("/api/rooms", room::room_router())
        .nest("/api/services", service::service_router())
        .nest("/api/orders", order::order_router())
        .with_state(state)
        .split_for_parts();

    router.merge(SwaggerUi::new("/swagger-ui").url("/apidoc/openapi.json", api))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::DEBUG.into())
        .from_env()?;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_level(true)
                .with_filter(filter),
        )
        .init();

    let mut migration_connection = PgConnection::establish(&config.database_url)?;
    run_migrations(&mut migration_connection).map_err(|e| e.to_string())?;
    drop(migration_connection);
    // set up connection pool
    let manager = AsyncDieselConnectionManager::<AsyncPgConnection>::new(&config.database_url);
    let pool = bb8::Pool::builder().build(manager).await?;

    if let Some(seed) = &config.admin {
        admin::ensure_superuser(&pool, seed).await?;
    }

    let enforcer = access::load_enforcer(
        config.acl_model.clone().leak(),
        config.acl_policy.clone().leak(),
    )
    .await?;
    let state = State {
        pool,
        enforcer: Arc::new(enforcer),
        keys: Arc::new(Keys::new(&config.jwt_secret, config.token_ttl_hours)),
    };

    let listener = TcpListener::bind(config.bind_addr).await?;
    info!("Listening on {}", config.bind_addr);
    Ok(axum::serve(listener, app(state)).await?)
}

#[cfg(test)]
mod tests {
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;

    /// Pool that never connects until a handler asks for a connection.
    async fn state() -> State {
        let manager = AsyncDieselConnectionManager::<AsyncPgConnection>::new(
            "postgres://nobody@127.0.0.1:1/unused",
        );
        State {
            pool: bb8::Pool::builder().build_unchecked(manager),
            enforcer: Arc::new(access::test_enforcer().await),
            keys: Arc::new(Keys::new("test-secret", 1)),
        }
    }

    async fn send(request: Request<Body>) -> (StatusCode, Value) {
        let response = app(state().await).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn admin_routes_need_a_token() {
        for uri in [
            "/api/admin/dashboard",
            "/api/admin/users",
            "/api/admin/users/1",
            "/api/catalog/roles",
            "/api/rooms",
            "/api/orders/1/services",
        ] {
            let (status, body) = send(Request::get(uri).body(Body::empty()).unwrap()).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
            assert_eq!(body["error"], "Authentication required");
        }
    }

    #[tokio::test]
    async fn block_needs_a_token() {
        let (status, _) = send(
            Request::post("/api/admin/users/3/block")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn forged_token_is_rejected() {
        let token = Keys::new("someone-else", 1)
            .issue(&model::test_user(1, "root@example.com", true))
            .unwrap()
            .access_token;
        let (status, body) = send(
            Request::get("/api/admin/users")
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Invalid token");
    }

    #[tokio::test]
    async fn login_validates_before_touching_the_store() {
        let (status, body) = send(post_json(
            "/api/account/login",
            json!({ "email": "not-an-email", "password": "" }),
        ))
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["fields"]["email"].is_array());
        assert!(body["fields"]["password"].is_array());
    }

    #[tokio::test]
    async fn malformed_body_is_a_bad_request() {
        let (status, _) = send(post_json("/api/account/login", json!({ "email": 5 }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn logout_points_back_to_login() {
        let (status, body) = send(
            Request::post("/api/account/logout")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["next"], "login");
    }

    #[tokio::test]
    async fn openapi_document_lists_routes() {
        let (status, body) = send(
            Request::get("/apidoc/openapi.json")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["paths"]["/api/account/login"].is_object());
        assert!(body["paths"]["/api/admin/users/{id}/block"].is_object());
    }
}
