use std::borrow::Cow;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use serde_json::json;
use thiserror::Error;
use validator::{ValidationError, ValidationErrors};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid email or password. Please check the data you entered.")]
    WrongCredentials,
    #[error("This account is inactive.")]
    InactiveAccount,
    #[error("Authentication required")]
    MissingCredentials,
    #[error("Invalid token")]
    InvalidToken,
    #[error("Token creation error")]
    TokenCreation,
    #[error("Password hashing error")]
    Hashing,
    #[error("Db connection error")]
    DBConnection,
    #[error("Permission denied")]
    PermissionDenied,
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("Please correct the errors in the form.")]
    Validation(ValidationErrors),
}

impl ApiError {
    /// Validation failure carrying a single field error.
    pub fn field(field: &'static str, code: &'static str, message: &'static str) -> Self {
        let mut errors = ValidationErrors::new();
        errors.add(
            field,
            ValidationError::new(code).with_message(Cow::Borrowed(message)),
        );
        ApiError::Validation(errors)
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::WrongCredentials => StatusCode::UNAUTHORIZED,
            ApiError::InactiveAccount => StatusCode::FORBIDDEN,
            ApiError::MissingCredentials => StatusCode::UNAUTHORIZED,
            ApiError::InvalidToken => StatusCode::UNAUTHORIZED,
            ApiError::TokenCreation => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Hashing => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::DBConnection => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::PermissionDenied => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            ApiError::Validation(errors) => Json(json!({
                "error": self.to_string(),
                "fields": errors,
            })),
            _ => Json(json!({
                "error": self.to_string(),
            })),
        };
        (status, body).into_response()
    }
}

/// Foreign key constraints and the form field that names the referenced row.
const REFERENCES: &[(&str, &str)] = &[
    ("users_role_id_fkey", "role_id"),
    ("users_gender_id_fkey", "gender_id"),
    ("rooms_category_id_fkey", "category_id"),
    ("rooms_status_id_fkey", "status_id"),
    ("room_equipment_room_id_fkey", "room_id"),
    ("room_equipment_element_id_fkey", "element_id"),
    ("orders_room_id_fkey", "room_id"),
    ("orders_client_id_fkey", "client_id"),
    ("order_services_order_id_fkey", "order_id"),
    ("order_services_service_id_fkey", "service_id"),
];

const CHECKS: &[(&str, &str)] = &[
    ("rooms_cost_check", "cost"),
    ("services_cost_check", "cost"),
    ("orders_sum_check", "sum"),
    ("orders_date_range_check", "date_end"),
];

fn lookup(table: &[(&str, &'static str)], constraint: Option<&str>) -> &'static str {
    constraint
        .and_then(|name| table.iter().find(|(c, _)| *c == name))
        .map(|(_, field)| *field)
        .unwrap_or("__all__")
}

/// Maps a diesel error raised while working on `entity` to an API error.
pub fn db_error(context: &'static str, entity: &'static str) -> impl Fn(DieselError) -> ApiError {
    move |e| {
        tracing::debug!("{}: {}", context, e);
        match e {
            DieselError::NotFound => ApiError::NotFound(entity),
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
                if info.constraint_name() == Some("users_email_key") {
                    ApiError::field(
                        "email",
                        "unique",
                        "User with this email address already exists.",
                    )
                } else {
                    ApiError::Conflict(format!("{} already exists", entity))
                }
            }
            DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, info) => {
                ApiError::field(
                    lookup(REFERENCES, info.constraint_name()),
                    "invalid_choice",
                    "Select a valid choice. That choice is not one of the available choices.",
                )
            }
            DieselError::DatabaseError(DatabaseErrorKind::CheckViolation, info) => ApiError::field(
                lookup(CHECKS, info.constraint_name()),
                "check",
                "Value violates a store constraint.",
            ),
            _ => ApiError::DBConnection,
        }
    }
}

pub fn pool_error(e: impl std::fmt::Display) -> ApiError {
    tracing::error!("connection pool: {}", e);
    ApiError::DBConnection
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_errors_share_one_message() {
        assert_eq!(
            ApiError::WrongCredentials.to_string(),
            "Invalid email or password. Please check the data you entered."
        );
        assert_eq!(ApiError::WrongCredentials.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn status_mapping() {
        assert_eq!(ApiError::PermissionDenied.status(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::NotFound("User").status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::NotFound("User").to_string(), "User not found");
        assert_eq!(
            ApiError::field("email", "email", "Enter a valid email address.").status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[test]
    fn not_found_from_diesel() {
        let err = db_error("test", "Room")(DieselError::NotFound);
        assert!(matches!(err, ApiError::NotFound("Room")));
    }

    #[test]
    fn constraint_lookup_falls_back_to_form_level() {
        assert_eq!(lookup(REFERENCES, Some("orders_client_id_fkey")), "client_id");
        assert_eq!(lookup(CHECKS, Some("orders_date_range_check")), "date_end");
        assert_eq!(lookup(CHECKS, Some("unknown")), "__all__");
        assert_eq!(lookup(CHECKS, None), "__all__");
    }
}
