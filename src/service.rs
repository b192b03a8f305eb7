use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use diesel::dsl::insert_into;
use diesel::{QueryDsl, SelectableHelper};
use diesel_async::RunQueryDsl;
use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

use crate::access::require_admin;
use crate::auth::CurrentUser;
use crate::error::{db_error, pool_error, ApiError};
use crate::model::{Service, ServiceForm};
use crate::schema::services;
use crate::validate::ValidatedForm;
use crate::SERVICE_TAG;

pub fn service_router() -> OpenApiRouter<crate::State> {
    OpenApiRouter::new()
        .routes(routes!(list_services, create_service))
        .routes(routes!(get_service, update_service, delete_service))
}

/// List services
#[utoipa::path(get, path = "/", responses((status = OK, body = Vec<Service>)), tag = SERVICE_TAG, security(
    ("session_jwt" = [])
))]
async fn list_services(
    CurrentUser(admin): CurrentUser,
    State(crate::State { pool, enforcer, .. }): State<crate::State>,
) -> Result<Json<Vec<Service>>, ApiError> {
    require_admin(&enforcer, &admin)?;
    let mut conn = pool.get().await.map_err(pool_error)?;
    let all = services::table
        .order(services::service_id)
        .select(Service::as_select())
        .load::<Service>(&mut conn)
        .await
        .map_err(db_error("list_services", "Service"))?;
    Ok(Json(all))
}

/// Get service
#[utoipa::path(get, path = "/{id}", responses((status = OK, body = Service)), tag = SERVICE_TAG, security(
    ("session_jwt" = [])
),
params(
    ("id" = i32, Path, description = "Service database id"),
)
)]
async fn get_service(
    CurrentUser(admin): CurrentUser,
    State(crate::State { pool, enforcer, .. }): State<crate::State>,
    Path(id): Path<i32>,
) -> Result<Json<Service>, ApiError> {
    require_admin(&enforcer, &admin)?;
    let mut conn = pool.get().await.map_err(pool_error)?;
    let service = services::table
        .find(id)
        .select(Service::as_select())
        .first::<Service>(&mut conn)
        .await
        .map_err(db_error("get_service", "Service"))?;
    Ok(Json(service))
}

/// Create service
#[utoipa::path(post, path = "/", request_body = ServiceForm, responses((status = CREATED, body = Service)), tag = SERVICE_TAG, security(
    ("session_jwt" = [])
))]
async fn create_service(
    CurrentUser(admin): CurrentUser,
    State(crate::State { pool, enforcer, .. }): State<crate::State>,
    ValidatedForm(service): ValidatedForm<ServiceForm>,
) -> Result<(StatusCode, Json<Service>), ApiError> {
    require_admin(&enforcer, &admin)?;
    let mut conn = pool.get().await.map_err(pool_error)?;
    let service = insert_into(services::table)
        .values(&service)
        .returning(Service::as_returning())
        .get_result::<Service>(&mut conn)
        .await
        .map_err(db_error("create_service", "Service"))?;
    tracing::info!("{} created service {}", admin.email, service.service_name);
    Ok((StatusCode::CREATED, Json(service)))
}

/// Update service
#[utoipa::path(put, path = "/{id}", request_body = ServiceForm, responses((status = OK, body = Service)), tag = SERVICE_TAG, security(
    ("session_jwt" = [])
),
params(
    ("id" = i32, Path, description = "Service database id"),
)
)]
async fn update_service(
    CurrentUser(admin): CurrentUser,
    State(crate::State { pool, enforcer, .. }): State<crate::State>,
    Path(id): Path<i32>,
    ValidatedForm(service): ValidatedForm<ServiceForm>,
) -> Result<Json<Service>, ApiError> {
    require_admin(&enforcer, &admin)?;
    let mut conn = pool.get().await.map_err(pool_error)?;
    let service = diesel::update(services::table.find(id))
        .set(&service)
        .returning(Service::as_returning())
        .get_result::<Service>(&mut conn)
        .await
        .map_err(db_error("update_service", "Service"))?;
    Ok(Json(service))
}

/// Delete service
#[utoipa::path(delete, path = "/{id}", responses((status = OK, body = ())), tag = SERVICE_TAG, security(
    ("session_jwt" = [])
),
params(
    ("id" = i32, Path, description = "Service database id"),
)
)]
async fn delete_service(
    CurrentUser(admin): CurrentUser,
    State(crate::State { pool, enforcer, .. }): State<crate::State>,
    Path(id): Path<i32>,
) -> Result<(), ApiError> {
    require_admin(&enforcer, &admin)?;
    let mut conn = pool.get().await.map_err(pool_error)?;
    if diesel::delete(services::table.find(id))
        .execute(&mut conn)
        .await
        .map_err(db_error("delete_service", "Service"))?
        == 0
    {
        Err(ApiError::NotFound("Service"))
    } else {
        tracing::info!("{} deleted service {}", admin.email, id);
        Ok(())
    }
}
