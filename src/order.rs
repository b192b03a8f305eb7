use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use diesel::dsl::insert_into;
use diesel::{ExpressionMethods, QueryDsl, SelectableHelper};
use diesel_async::RunQueryDsl;
use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

use crate::access::require_admin;
use crate::auth::CurrentUser;
use crate::error::{db_error, pool_error, ApiError};
use crate::model::{Order, OrderForm, OrderServiceForm, OrderServiceLink, Service};
use crate::schema::{order_services, orders, services};
use crate::validate::ValidatedForm;
use crate::ORDER_TAG;

pub fn order_router() -> OpenApiRouter<crate::State> {
    OpenApiRouter::new()
        .routes(routes!(list_orders, create_order))
        .routes(routes!(get_order, update_order, delete_order))
        .routes(routes!(list_order_services, add_order_service))
        .routes(routes!(remove_order_service))
}

/// List orders
#[utoipa::path(get, path = "/", responses((status = OK, body = Vec<Order>)), tag = ORDER_TAG, security(
    ("session_jwt" = [])
))]
async fn list_orders(
    CurrentUser(admin): CurrentUser,
    State(crate::State { pool, enforcer, .. }): State<crate::State>,
) -> Result<Json<Vec<Order>>, ApiError> {
    require_admin(&enforcer, &admin)?;
    let mut conn = pool.get().await.map_err(pool_error)?;
    let all = orders::table
        .order(orders::order_id)
        .select(Order::as_select())
        .load::<Order>(&mut conn)
        .await
        .map_err(db_error("list_orders", "Order"))?;
    Ok(Json(all))
}

/// Get order
#[utoipa::path(get, path = "/{id}", responses((status = OK, body = Order)), tag = ORDER_TAG, security(
    ("session_jwt" = [])
),
params(
    ("id" = i32, Path, description = "Order database id"),
)
)]
async fn get_order(
    CurrentUser(admin): CurrentUser,
    State(crate::State { pool, enforcer, .. }): State<crate::State>,
    Path(id): Path<i32>,
) -> Result<Json<Order>, ApiError> {
    require_admin(&enforcer, &admin)?;
    let mut conn = pool.get().await.map_err(pool_error)?;
    let order = orders::table
        .find(id)
        .select(Order::as_select())
        .first::<Order>(&mut conn)
        .await
        .map_err(db_error("get_order", "Order"))?;
    Ok(Json(order))
}

/// Create order
#[utoipa::path(post, path = "/", request_body = OrderForm, responses((status = CREATED, body = Order)), tag = ORDER_TAG, security(
    ("session_jwt" = [])
))]
async fn create_order(
    CurrentUser(admin): CurrentUser,
    State(crate::State { pool, enforcer, .. }): State<crate::State>,
    ValidatedForm(order): ValidatedForm<OrderForm>,
) -> Result<(StatusCode, Json<Order>), ApiError> {
    require_admin(&enforcer, &admin)?;
    let mut conn = pool.get().await.map_err(pool_error)?;
    let order = insert_into(orders::table)
        .values(&order)
        .returning(Order::as_returning())
        .get_result::<Order>(&mut conn)
        .await
        .map_err(db_error("create_order", "Order"))?;
    tracing::info!(
        "{} booked room {} for client {} ({} - {})",
        admin.email,
        order.room_id,
        order.client_id,
        order.date_start,
        order.date_end
    );
    Ok((StatusCode::CREATED, Json(order)))
}

/// Update order
#[utoipa::path(put, path = "/{id}", request_body = OrderForm, responses((status = OK, body = Order)), tag = ORDER_TAG, security(
    ("session_jwt" = [])
),
params(
    ("id" = i32, Path, description = "Order database id"),
)
)]
async fn update_order(
    CurrentUser(admin): CurrentUser,
    State(crate::State { pool, enforcer, .. }): State<crate::State>,
    Path(id): Path<i32>,
    ValidatedForm(order): ValidatedForm<OrderForm>,
) -> Result<Json<Order>, ApiError> {
    require_admin(&enforcer, &admin)?;
    let mut conn = pool.get().await.map_err(pool_error)?;
    let order = diesel::update(orders::table.find(id))
        .set(&order)
        .returning(Order::as_returning())
        .get_result::<Order>(&mut conn)
        .await
        .map_err(db_error("update_order", "Order"))?;
    Ok(Json(order))
}

/// Delete order
#[utoipa::path(delete, path = "/{id}", responses((status = OK, body = ())), tag = ORDER_TAG, security(
    ("session_jwt" = [])
),
params(
    ("id" = i32, Path, description = "Order database id"),
)
)]
async fn delete_order(
    CurrentUser(admin): CurrentUser,
    State(crate::State { pool, enforcer, .. }): State<crate::State>,
    Path(id): Path<i32>,
) -> Result<(), ApiError> {
    require_admin(&enforcer, &admin)?;
    let mut conn = pool.get().await.map_err(pool_error)?;
    if diesel::delete(orders::table.find(id))
        .execute(&mut conn)
        .await
        .map_err(db_error("delete_order", "Order"))?
        == 0
    {
        Err(ApiError::NotFound("Order"))
    } else {
        tracing::info!("{} deleted order {}", admin.email, id);
        Ok(())
    }
}

/// List services booked with an order
#[utoipa::path(get, path = "/{id}/services", responses((status = OK, body = Vec<Service>)), tag = ORDER_TAG, security(
    ("session_jwt" = [])
),
params(
    ("id" = i32, Path, description = "Order database id"),
)
)]
async fn list_order_services(
    CurrentUser(admin): CurrentUser,
    State(crate::State { pool, enforcer, .. }): State<crate::State>,
    Path(id): Path<i32>,
) -> Result<Json<Vec<Service>>, ApiError> {
    require_admin(&enforcer, &admin)?;
    let mut conn = pool.get().await.map_err(pool_error)?;
    orders::table
        .find(id)
        .select(orders::order_id)
        .first::<i32>(&mut conn)
        .await
        .map_err(db_error("list_order_services", "Order"))?;
    let booked = order_services::table
        .inner_join(services::table)
        .filter(order_services::order_id.eq(id))
        .select(Service::as_select())
        .order(services::service_id)
        .load::<Service>(&mut conn)
        .await
        .map_err(db_error("list_order_services", "Service"))?;
    Ok(Json(booked))
}

/// Add service to order
#[utoipa::path(post, path = "/{id}/services", request_body = OrderServiceForm, responses((status = CREATED, body = OrderServiceLink)), tag = ORDER_TAG, security(
    ("session_jwt" = [])
),
params(
    ("id" = i32, Path, description = "Order database id"),
)
)]
async fn add_order_service(
    CurrentUser(admin): CurrentUser,
    State(crate::State { pool, enforcer, .. }): State<crate::State>,
    Path(id): Path<i32>,
    ValidatedForm(OrderServiceForm { service_id }): ValidatedForm<OrderServiceForm>,
) -> Result<(StatusCode, Json<OrderServiceLink>), ApiError> {
    require_admin(&enforcer, &admin)?;
    let mut conn = pool.get().await.map_err(pool_error)?;
    let link = insert_into(order_services::table)
        .values(&OrderServiceLink {
            order_id: id,
            service_id,
        })
        .returning(OrderServiceLink::as_returning())
        .get_result::<OrderServiceLink>(&mut conn)
        .await
        .map_err(db_error("add_order_service", "Order service"))?;
    Ok((StatusCode::CREATED, Json(link)))
}

/// Remove service from order
#[utoipa::path(delete, path = "/{id}/services/{service_id}", responses((status = OK, body = ())), tag = ORDER_TAG, security(
    ("session_jwt" = [])
),
params(
    ("id" = i32, Path, description = "Order database id"),
    ("service_id" = i32, Path, description = "Service database id"),
)
)]
async fn remove_order_service(
    CurrentUser(admin): CurrentUser,
    State(crate::State { pool, enforcer, .. }): State<crate::State>,
    Path((id, service_id)): Path<(i32, i32)>,
) -> Result<(), ApiError> {
    require_admin(&enforcer, &admin)?;
    let mut conn = pool.get().await.map_err(pool_error)?;
    if diesel::delete(order_services::table.find((id, service_id)))
        .execute(&mut conn)
        .await
        .map_err(db_error("remove_order_service", "Order service"))?
        == 0
    {
        Err(ApiError::NotFound("Order service"))
    } else {
        Ok(())
    }
}
