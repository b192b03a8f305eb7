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
use crate::model::{Equipment, EquipmentForm, LookupEntry, Room, RoomForm};
use crate::schema::{room_elements, room_equipment, rooms};
use crate::validate::ValidatedForm;
use crate::ROOM_TAG;

pub fn room_router() -> OpenApiRouter<crate::State> {
    OpenApiRouter::new()
        .routes(routes!(list_rooms, create_room))
        .routes(routes!(get_room, update_room, delete_room))
        .routes(routes!(list_equipment, add_equipment))
        .routes(routes!(remove_equipment))
}

/// List rooms
#[utoipa::path(get, path = "/", responses((status = OK, body = Vec<Room>)), tag = ROOM_TAG, security(
    ("session_jwt" = [])
))]
async fn list_rooms(
    CurrentUser(admin): CurrentUser,
    State(crate::State { pool, enforcer, .. }): State<crate::State>,
) -> Result<Json<Vec<Room>>, ApiError> {
    require_admin(&enforcer, &admin)?;
    let mut conn = pool.get().await.map_err(pool_error)?;
    let all = rooms::table
        .order(rooms::room_id)
        .select(Room::as_select())
        .load::<Room>(&mut conn)
        .await
        .map_err(db_error("list_rooms", "Room"))?;
    Ok(Json(all))
}

/// Get room
#[utoipa::path(get, path = "/{id}", responses((status = OK, body = Room)), tag = ROOM_TAG, security(
    ("session_jwt" = [])
),
params(
    ("id" = i32, Path, description = "Room database id"),
)
)]
async fn get_room(
    CurrentUser(admin): CurrentUser,
    State(crate::State { pool, enforcer, .. }): State<crate::State>,
    Path(id): Path<i32>,
) -> Result<Json<Room>, ApiError> {
    require_admin(&enforcer, &admin)?;
    let mut conn = pool.get().await.map_err(pool_error)?;
    let room = rooms::table
        .find(id)
        .select(Room::as_select())
        .first::<Room>(&mut conn)
        .await
        .map_err(db_error("get_room", "Room"))?;
    Ok(Json(room))
}

/// Create room
#[utoipa::path(post, path = "/", request_body = RoomForm, responses((status = CREATED, body = Room)), tag = ROOM_TAG, security(
    ("session_jwt" = [])
))]
async fn create_room(
    CurrentUser(admin): CurrentUser,
    State(crate::State { pool, enforcer, .. }): State<crate::State>,
    ValidatedForm(room): ValidatedForm<RoomForm>,
) -> Result<(StatusCode, Json<Room>), ApiError> {
    require_admin(&enforcer, &admin)?;
    let mut conn = pool.get().await.map_err(pool_error)?;
    let room = insert_into(rooms::table)
        .values(&room)
        .returning(Room::as_returning())
        .get_result::<Room>(&mut conn)
        .await
        .map_err(db_error("create_room", "Room"))?;
    tracing::info!("{} created room {}", admin.email, room.room_name);
    Ok((StatusCode::CREATED, Json(room)))
}

/// Update room
#[utoipa::path(put, path = "/{id}", request_body = RoomForm, responses((status = OK, body = Room)), tag = ROOM_TAG, security(
    ("session_jwt" = [])
),
params(
    ("id" = i32, Path, description = "Room database id"),
)
)]
async fn update_room(
    CurrentUser(admin): CurrentUser,
    State(crate::State { pool, enforcer, .. }): State<crate::State>,
    Path(id): Path<i32>,
    ValidatedForm(room): ValidatedForm<RoomForm>,
) -> Result<Json<Room>, ApiError> {
    require_admin(&enforcer, &admin)?;
    let mut conn = pool.get().await.map_err(pool_error)?;
    let room = diesel::update(rooms::table.find(id))
        .set(&room)
        .returning(Room::as_returning())
        .get_result::<Room>(&mut conn)
        .await
        .map_err(db_error("update_room", "Room"))?;
    Ok(Json(room))
}

/// Delete room
#[utoipa::path(delete, path = "/{id}", responses((status = OK, body = ())), tag = ROOM_TAG, security(
    ("session_jwt" = [])
),
params(
    ("id" = i32, Path, description = "Room database id"),
)
)]
async fn delete_room(
    CurrentUser(admin): CurrentUser,
    State(crate::State { pool, enforcer, .. }): State<crate::State>,
    Path(id): Path<i32>,
) -> Result<(), ApiError> {
    require_admin(&enforcer, &admin)?;
    let mut conn = pool.get().await.map_err(pool_error)?;
    if diesel::delete(rooms::table.find(id))
        .execute(&mut conn)
        .await
        .map_err(db_error("delete_room", "Room"))?
        == 0
    {
        Err(ApiError::NotFound("Room"))
    } else {
        tracing::info!("{} deleted room {}", admin.email, id);
        Ok(())
    }
}

/// List room equipment
#[utoipa::path(get, path = "/{id}/equipment", responses((status = OK, body = Vec<LookupEntry>)), tag = ROOM_TAG, security(
    ("session_jwt" = [])
),
params(
    ("id" = i32, Path, description = "Room database id"),
)
)]
async fn list_equipment(
    CurrentUser(admin): CurrentUser,
    State(crate::State { pool, enforcer, .. }): State<crate::State>,
    Path(id): Path<i32>,
) -> Result<Json<Vec<LookupEntry>>, ApiError> {
    require_admin(&enforcer, &admin)?;
    let mut conn = pool.get().await.map_err(pool_error)?;
    rooms::table
        .find(id)
        .select(rooms::room_id)
        .first::<i32>(&mut conn)
        .await
        .map_err(db_error("list_equipment", "Room"))?;
    let elements = room_equipment::table
        .inner_join(room_elements::table)
        .filter(room_equipment::room_id.eq(id))
        .select((room_elements::element_id, room_elements::element_name))
        .order(room_elements::element_id)
        .load::<LookupEntry>(&mut conn)
        .await
        .map_err(db_error("list_equipment", "Room element"))?;
    Ok(Json(elements))
}

/// Attach element to room
#[utoipa::path(post, path = "/{id}/equipment", request_body = EquipmentForm, responses((status = CREATED, body = Equipment)), tag = ROOM_TAG, security(
    ("session_jwt" = [])
),
params(
    ("id" = i32, Path, description = "Room database id"),
)
)]
async fn add_equipment(
    CurrentUser(admin): CurrentUser,
    State(crate::State { pool, enforcer, .. }): State<crate::State>,
    Path(id): Path<i32>,
    ValidatedForm(EquipmentForm { element_id }): ValidatedForm<EquipmentForm>,
) -> Result<(StatusCode, Json<Equipment>), ApiError> {
    require_admin(&enforcer, &admin)?;
    let mut conn = pool.get().await.map_err(pool_error)?;
    let equipment = insert_into(room_equipment::table)
        .values(&Equipment {
            room_id: id,
            element_id,
        })
        .returning(Equipment::as_returning())
        .get_result::<Equipment>(&mut conn)
        .await
        .map_err(db_error("add_equipment", "Room equipment"))?;
    Ok((StatusCode::CREATED, Json(equipment)))
}

/// Detach element from room
#[utoipa::path(delete, path = "/{id}/equipment/{element_id}", responses((status = OK, body = ())), tag = ROOM_TAG, security(
    ("session_jwt" = [])
),
params(
    ("id" = i32, Path, description = "Room database id"),
    ("element_id" = i32, Path, description = "Room element database id"),
)
)]
async fn remove_equipment(
    CurrentUser(admin): CurrentUser,
    State(crate::State { pool, enforcer, .. }): State<crate::State>,
    Path((id, element_id)): Path<(i32, i32)>,
) -> Result<(), ApiError> {
    require_admin(&enforcer, &admin)?;
    let mut conn = pool.get().await.map_err(pool_error)?;
    if diesel::delete(room_equipment::table.find((id, element_id)))
        .execute(&mut conn)
        .await
        .map_err(db_error("remove_equipment", "Room equipment"))?
        == 0
    {
        Err(ApiError::NotFound("Room equipment"))
    } else {
        Ok(())
    }
}
