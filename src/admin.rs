use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Local;
use diesel::dsl::{insert_into, not};
use diesel::{ExpressionMethods, OptionalExtension, QueryDsl, SelectableHelper};
use diesel_async::RunQueryDsl;
use serde::Serialize;
use utoipa::ToSchema;
use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

use crate::access::require_admin;
use crate::auth::CurrentUser;
use crate::config::AdminSeed;
use crate::error::{db_error, pool_error, ApiError};
use crate::model::{
    normalize_email, EditUserForm, Flash, NewUser, SignUpForm, User, UserChanges,
};
use crate::password::{hash_password, strength_errors};
use crate::schema::users;
use crate::validate::ValidatedForm;
use crate::{Pool, ADMIN_TAG};

pub fn admin_router() -> OpenApiRouter<crate::State> {
    OpenApiRouter::new()
        .routes(routes!(admin_dashboard))
        .routes(routes!(user_list, create_user))
        .routes(routes!(get_user, edit_user))
        .routes(routes!(block_user))
}

#[derive(Debug, ToSchema, Serialize)]
pub struct Dashboard {
    users: Vec<User>,
    total: usize,
    active: usize,
    superusers: usize,
}

impl Dashboard {
    fn new(users: Vec<User>) -> Self {
        Self {
            total: users.len(),
            active: users.iter().filter(|u| u.is_active).count(),
            superusers: users.iter().filter(|u| u.is_superuser).count(),
            users,
        }
    }
}

pub fn block_message(user: &User) -> String {
    let action = if user.is_active { "unblocked" } else { "blocked" };
    format!("User {} {}.", user.email, action)
}

async fn all_users(pool: &Pool, context: &'static str) -> Result<Vec<User>, ApiError> {
    let mut conn = pool.get().await.map_err(pool_error)?;
    users::table
        .order(users::id)
        .select(User::as_select())
        .load::<User>(&mut conn)
        .await
        .map_err(db_error(context, "User"))
}

/// Admin dashboard
#[utoipa::path(get, path = "/dashboard", responses((status = OK, body = Dashboard)), tag = ADMIN_TAG, security(
    ("session_jwt" = [])
))]
async fn admin_dashboard(
    CurrentUser(admin): CurrentUser,
    State(crate::State { pool, enforcer, .. }): State<crate::State>,
) -> Result<Json<Dashboard>, ApiError> {
    require_admin(&enforcer, &admin)?;
    Ok(Json(Dashboard::new(
        all_users(&pool, "admin_dashboard").await?,
    )))
}

/// List users
#[utoipa::path(get, path = "/users", responses((status = OK, body = Vec<User>)), tag = ADMIN_TAG, security(
    ("session_jwt" = [])
))]
async fn user_list(
    CurrentUser(admin): CurrentUser,
    State(crate::State { pool, enforcer, .. }): State<crate::State>,
) -> Result<Json<Vec<User>>, ApiError> {
    require_admin(&enforcer, &admin)?;
    Ok(Json(all_users(&pool, "user_list").await?))
}

/// Create user
#[utoipa::path(post, path = "/users", request_body = SignUpForm, responses((status = CREATED, body = Flash)), tag = ADMIN_TAG, security(
    ("session_jwt" = [])
))]
async fn create_user(
    CurrentUser(admin): CurrentUser,
    State(crate::State { pool, enforcer, .. }): State<crate::State>,
    ValidatedForm(form): ValidatedForm<SignUpForm>,
) -> Result<(StatusCode, Json<Flash>), ApiError> {
    require_admin(&enforcer, &admin)?;
    let hash = hash_password(form.password1.clone()).await?;
    let new_user = form.into_new_user(hash, Local::now().naive_utc());

    let mut conn = pool.get().await.map_err(pool_error)?;
    let user = insert_into(users::table)
        .values(&new_user)
        .returning(User::as_returning())
        .get_result::<User>(&mut conn)
        .await
        .map_err(db_error("create_user", "User"))?;

    tracing::info!("{} created user {}", admin.email, user.email);
    Ok((
        StatusCode::CREATED,
        Json(Flash::new("User created successfully!", "admin_dashboard")),
    ))
}

/// Get user for editing
#[utoipa::path(get, path = "/users/{id}", responses((status = OK, body = User)), tag = ADMIN_TAG, security(
    ("session_jwt" = [])
),
params(
    ("id" = i32, Path, description = "User database id"),
)
)]
async fn get_user(
    CurrentUser(admin): CurrentUser,
    State(crate::State { pool, enforcer, .. }): State<crate::State>,
    Path(id): Path<i32>,
) -> Result<Json<User>, ApiError> {
    require_admin(&enforcer, &admin)?;
    let mut conn = pool.get().await.map_err(pool_error)?;
    let user = users::table
        .find(id)
        .select(User::as_select())
        .first::<User>(&mut conn)
        .await
        .map_err(db_error("get_user", "User"))?;
    Ok(Json(user))
}

/// Edit user
#[utoipa::path(put, path = "/users/{id}", request_body = EditUserForm, responses((status = OK, body = Flash)), tag = ADMIN_TAG, security(
    ("session_jwt" = [])
),
params(
    ("id" = i32, Path, description = "User database id"),
)
)]
async fn edit_user(
    CurrentUser(admin): CurrentUser,
    State(crate::State { pool, enforcer, .. }): State<crate::State>,
    Path(id): Path<i32>,
    ValidatedForm(form): ValidatedForm<EditUserForm>,
) -> Result<Json<Flash>, ApiError> {
    require_admin(&enforcer, &admin)?;
    let mut conn = pool.get().await.map_err(pool_error)?;
    let user = diesel::update(users::table.find(id))
        .set(UserChanges::from(form))
        .returning(User::as_returning())
        .get_result::<User>(&mut conn)
        .await
        .map_err(db_error("edit_user", "User"))?;

    tracing::info!("{} edited user {}", admin.email, user.email);
    Ok(Json(Flash::new(
        "User data updated successfully!",
        "admin_dashboard",
    )))
}

/// Block or unblock user
#[utoipa::path(post, path = "/users/{id}/block", responses((status = OK, body = Flash)), tag = ADMIN_TAG, security(
    ("session_jwt" = [])
),
params(
    ("id" = i32, Path, description = "User database id"),
)
)]
async fn block_user(
    CurrentUser(admin): CurrentUser,
    State(crate::State { pool, enforcer, .. }): State<crate::State>,
    Path(id): Path<i32>,
) -> Result<Json<Flash>, ApiError> {
    require_admin(&enforcer, &admin)?;
    let mut conn = pool.get().await.map_err(pool_error)?;
    let user = diesel::update(users::table.find(id))
        .set(users::is_active.eq(not(users::is_active)))
        .returning(User::as_returning())
        .get_result::<User>(&mut conn)
        .await
        .map_err(db_error("block_user", "User"))?;

    if user.id == admin.id {
        tracing::warn!("{} toggled their own account", admin.email);
    }
    tracing::info!("{} set is_active={} for {}", admin.email, user.is_active, user.email);
    Ok(Json(Flash::new(block_message(&user), "admin_dashboard")))
}

/// Creates the configured superuser unless an account with that email exists.
pub async fn ensure_superuser(pool: &Pool, seed: &AdminSeed) -> Result<(), ApiError> {
    let email = normalize_email(&seed.email);
    let mut conn = pool.get().await.map_err(pool_error)?;
    let existing = users::table
        .filter(users::email.eq(&email))
        .select(users::id)
        .first::<i32>(&mut conn)
        .await
        .optional()
        .map_err(db_error("ensure_superuser", "User"))?;
    if existing.is_some() {
        return Ok(());
    }

    for rule in strength_errors(&seed.password) {
        tracing::warn!("ADMIN_PASSWORD: {}", rule);
    }
    let new_user = NewUser {
        password: hash_password(seed.password.clone()).await?,
        username: email.clone(),
        email,
        first_name: String::new(),
        last_name: String::new(),
        is_staff: true,
        is_superuser: true,
        is_active: true,
        date_joined: Local::now().naive_utc(),
    };
    insert_into(users::table)
        .values(&new_user)
        .execute(&mut conn)
        .await
        .map_err(db_error("ensure_superuser", "User"))?;
    tracing::info!("created superuser {}", new_user.email);
    Ok(())
}
