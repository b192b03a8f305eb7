//! Id/name reference tables: roles, genders, room categories, room statuses
//! and room elements.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use diesel::dsl::insert_into;
use diesel::{ExpressionMethods, QueryDsl};
use diesel_async::RunQueryDsl;
use serde::Deserialize;
use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

use crate::access::require_admin;
use crate::auth::CurrentUser;
use crate::error::{db_error, pool_error, ApiError};
use crate::model::{LookupEntry, LookupForm};
use crate::validate::ValidatedForm;
use crate::CATALOG_TAG;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Lookup {
    Roles,
    Genders,
    RoomCategories,
    RoomStatuses,
    RoomElements,
}

impl Lookup {
    pub fn entity(self) -> &'static str {
        match self {
            Lookup::Roles => "Role",
            Lookup::Genders => "Gender",
            Lookup::RoomCategories => "Room category",
            Lookup::RoomStatuses => "Room status",
            Lookup::RoomElements => "Room element",
        }
    }
}

/// Runs `$body` with `$table`, `$id` and `$name` bound to the table and
/// columns behind `$kind`.
macro_rules! with_lookup_table {
    ($kind:expr, |$table:ident, $id:ident, $name:ident| $body:block) => {
        match $kind {
            Lookup::Roles => {
                #[allow(unused_imports)]
                use crate::schema::roles::{role_id as $id, role_name as $name, table as $table};
                $body
            }
            Lookup::Genders => {
                #[allow(unused_imports)]
                use crate::schema::genders::{gender_id as $id, gender_name as $name, table as $table};
                $body
            }
            Lookup::RoomCategories => {
                #[allow(unused_imports)]
                use crate::schema::room_categories::{
                    category_id as $id, category_name as $name, table as $table,
                };
                $body
            }
            Lookup::RoomStatuses => {
                #[allow(unused_imports)]
                use crate::schema::room_statuses::{
                    status_id as $id, status_name as $name, table as $table,
                };
                $body
            }
            Lookup::RoomElements => {
                #[allow(unused_imports)]
                use crate::schema::room_elements::{
                    element_id as $id, element_name as $name, table as $table,
                };
                $body
            }
        }
    };
}

pub fn catalog_router() -> OpenApiRouter<crate::State> {
    OpenApiRouter::new()
        .routes(routes!(list_entries, create_entry))
        .routes(routes!(rename_entry, delete_entry))
}

/// List reference entries
#[utoipa::path(get, path = "/{kind}", responses((status = OK, body = Vec<LookupEntry>)), tag = CATALOG_TAG, security(
    ("session_jwt" = [])
),
params(
    ("kind" = String, Path, description = "roles, genders, room-categories, room-statuses or room-elements"),
)
)]
async fn list_entries(
    CurrentUser(admin): CurrentUser,
    State(crate::State { pool, enforcer, .. }): State<crate::State>,
    Path(kind): Path<Lookup>,
) -> Result<Json<Vec<LookupEntry>>, ApiError> {
    require_admin(&enforcer, &admin)?;
    let mut conn = pool.get().await.map_err(pool_error)?;
    let entries = with_lookup_table!(kind, |table, id, name| {
        table
            .select((id, name))
            .order(id)
            .load::<LookupEntry>(&mut conn)
            .await
    })
    .map_err(db_error("list_entries", kind.entity()))?;
    Ok(Json(entries))
}

/// Create reference entry
#[utoipa::path(post, path = "/{kind}", request_body = LookupForm, responses((status = CREATED, body = LookupEntry)), tag = CATALOG_TAG, security(
    ("session_jwt" = [])
),
params(
    ("kind" = String, Path, description = "roles, genders, room-categories, room-statuses or room-elements"),
)
)]
async fn create_entry(
    CurrentUser(admin): CurrentUser,
    State(crate::State { pool, enforcer, .. }): State<crate::State>,
    Path(kind): Path<Lookup>,
    ValidatedForm(form): ValidatedForm<LookupForm>,
) -> Result<(StatusCode, Json<LookupEntry>), ApiError> {
    require_admin(&enforcer, &admin)?;
    let mut conn = pool.get().await.map_err(pool_error)?;
    let entry = with_lookup_table!(kind, |table, id, name| {
        insert_into(table)
            .values(name.eq(form.name))
            .returning((id, name))
            .get_result::<LookupEntry>(&mut conn)
            .await
    })
    .map_err(db_error("create_entry", kind.entity()))?;
    tracing::info!("{} added {} {:?}", admin.email, kind.entity(), entry.name);
    Ok((StatusCode::CREATED, Json(entry)))
}

/// Rename reference entry
#[utoipa::path(put, path = "/{kind}/{id}", request_body = LookupForm, responses((status = OK, body = LookupEntry)), tag = CATALOG_TAG, security(
    ("session_jwt" = [])
),
params(
    ("kind" = String, Path, description = "roles, genders, room-categories, room-statuses or room-elements"),
    ("id" = i32, Path, description = "Entry database id"),
)
)]
async fn rename_entry(
    CurrentUser(admin): CurrentUser,
    State(crate::State { pool, enforcer, .. }): State<crate::State>,
    Path((kind, entry_id)): Path<(Lookup, i32)>,
    ValidatedForm(form): ValidatedForm<LookupForm>,
) -> Result<Json<LookupEntry>, ApiError> {
    require_admin(&enforcer, &admin)?;
    let mut conn = pool.get().await.map_err(pool_error)?;
    let entry = with_lookup_table!(kind, |table, id, name| {
        diesel::update(table.find(entry_id))
            .set(name.eq(form.name))
            .returning((id, name))
            .get_result::<LookupEntry>(&mut conn)
            .await
    })
    .map_err(db_error("rename_entry", kind.entity()))?;
    Ok(Json(entry))
}

/// Delete reference entry
#[utoipa::path(delete, path = "/{kind}/{id}", responses((status = OK, body = ())), tag = CATALOG_TAG, security(
    ("session_jwt" = [])
),
params(
    ("kind" = String, Path, description = "roles, genders, room-categories, room-statuses or room-elements"),
    ("id" = i32, Path, description = "Entry database id"),
)
)]
async fn delete_entry(
    CurrentUser(admin): CurrentUser,
    State(crate::State { pool, enforcer, .. }): State<crate::State>,
    Path((kind, entry_id)): Path<(Lookup, i32)>,
) -> Result<(), ApiError> {
    require_admin(&enforcer, &admin)?;
    let mut conn = pool.get().await.map_err(pool_error)?;
    let deleted = with_lookup_table!(kind, |table, _id, _name| {
        diesel::delete(table.find(entry_id)).execute(&mut conn).await
    })
    .map_err(db_error("delete_entry", kind.entity()))?;
    if deleted == 0 {
        Err(ApiError::NotFound(kind.entity()))
    } else {
        tracing::info!("{} deleted {} {}", admin.email, kind.entity(), entry_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_parse_from_path_segments() {
        let kind: Lookup = serde_json::from_str("\"room-categories\"").unwrap();
        assert_eq!(kind, Lookup::RoomCategories);
        let kind: Lookup = serde_json::from_str("\"genders\"").unwrap();
        assert_eq!(kind.entity(), "Gender");
        assert!(serde_json::from_str::<Lookup>("\"users\"").is_err());
    }
}
