use std::borrow::Cow;

use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveDateTime};
use diesel::{pg::Pg, AsChangeset, Insertable, Queryable, Selectable};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::password::strength_errors;
use crate::schema::{order_services, orders, room_equipment, rooms, services, users};
use crate::validate::{merge_errors, Form};

#[derive(ToSchema, Serialize, Selectable, Queryable, Debug, Clone)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(Pg))]
pub struct User {
    pub id: i32,
    #[serde(skip_serializing)]
    pub password: String,
    pub last_login: Option<NaiveDateTime>,
    pub is_superuser: bool,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub is_staff: bool,
    pub is_active: bool,
    pub date_joined: NaiveDateTime,
    pub patronymic: String,
    pub login: String,
    pub birthday: Option<NaiveDate>,
    pub phone_number: String,
    pub serial_passport: String,
    pub number_passport: String,
    pub block: bool,
    pub first_auth: bool,
    pub role_id: Option<i32>,
    pub address: String,
    pub gender_id: Option<i32>,
}

impl User {
    pub fn full_name(&self) -> String {
        if self.patronymic.is_empty() {
            format!("{} {}", self.first_name, self.last_name)
        } else {
            format!("{} {} {}", self.first_name, self.last_name, self.patronymic)
        }
    }
}

#[derive(Insertable, Debug)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub password: String,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub is_active: bool,
    pub date_joined: NaiveDateTime,
}

/// Lowercases the domain part of an address.
pub fn normalize_email(email: &str) -> String {
    let email = email.trim();
    match email.rsplit_once('@') {
        Some((local, domain)) => format!("{}@{}", local, domain.to_lowercase()),
        None => email.to_string(),
    }
}

fn required(field: &'static str) -> (&'static str, ValidationError) {
    (
        field,
        ValidationError::new("required").with_message(Cow::Borrowed("This field is required.")),
    )
}

#[derive(Deserialize, ToSchema, Debug, Validate)]
pub struct SignUpForm {
    #[validate(
        email(message = "Enter a valid email address."),
        length(max = 254)
    )]
    pub email: String,
    #[serde(default)]
    #[validate(length(max = 150))]
    pub first_name: String,
    #[serde(default)]
    #[validate(length(max = 150))]
    pub last_name: String,
    pub password1: String,
    #[validate(must_match(other = "password1", message = "The two password fields didn't match."))]
    pub password2: String,
}

impl Form for SignUpForm {
    fn clean(&self) -> Result<(), ValidationErrors> {
        merge_errors(
            self.validate(),
            strength_errors(&self.password1)
                .into_iter()
                .map(|e| ("password1", e)),
        )
    }
}

impl SignUpForm {
    /// Account row for this form; the address doubles as the legacy username.
    pub fn into_new_user(self, password_hash: String, now: NaiveDateTime) -> NewUser {
        let email = normalize_email(&self.email);
        NewUser {
            password: password_hash,
            username: email.clone(),
            email,
            first_name: self.first_name,
            last_name: self.last_name,
            is_staff: false,
            is_superuser: false,
            is_active: true,
            date_joined: now,
        }
    }
}

#[derive(ToSchema, Default, Deserialize, Debug, Validate)]
pub struct LoginForm {
    #[validate(
        email(message = "Enter a valid email address."),
        length(max = 254)
    )]
    pub email: String,
    pub password: String,
}

impl Form for LoginForm {
    fn clean(&self) -> Result<(), ValidationErrors> {
        merge_errors(
            self.validate(),
            self.password.is_empty().then(|| required("password")),
        )
    }
}

#[derive(ToSchema, Deserialize, Debug, Validate)]
pub struct PasswordChangeForm {
    pub old_password: String,
    pub new_password1: String,
    #[validate(must_match(
        other = "new_password1",
        message = "The two password fields didn't match."
    ))]
    pub new_password2: String,
}

impl Form for PasswordChangeForm {
    fn clean(&self) -> Result<(), ValidationErrors> {
        merge_errors(
            self.validate(),
            self.old_password
                .is_empty()
                .then(|| required("old_password"))
                .into_iter()
                .chain(
                    strength_errors(&self.new_password1)
                        .into_iter()
                        .map(|e| ("new_password1", e)),
                ),
        )
    }
}

#[derive(ToSchema, Deserialize, Debug, Validate)]
pub struct EditUserForm {
    #[validate(
        email(message = "Enter a valid email address."),
        length(max = 254)
    )]
    pub email: String,
    #[serde(default)]
    #[validate(length(max = 150))]
    pub first_name: String,
    #[serde(default)]
    #[validate(length(max = 150))]
    pub last_name: String,
    #[serde(default)]
    #[validate(length(max = 255))]
    pub patronymic: String,
    #[serde(default)]
    #[validate(length(max = 255))]
    pub login: String,
    pub birthday: Option<NaiveDate>,
    #[serde(default)]
    #[validate(length(max = 255))]
    pub phone_number: String,
    #[serde(default)]
    #[validate(length(max = 255))]
    pub serial_passport: String,
    #[serde(default)]
    #[validate(length(max = 255))]
    pub number_passport: String,
    #[serde(default)]
    #[validate(length(max = 255))]
    pub address: String,
    pub gender_id: Option<i32>,
    pub is_staff: bool,
    pub is_active: bool,
    pub block: bool,
    pub first_auth: bool,
    pub role_id: Option<i32>,
}

impl Form for EditUserForm {}

#[derive(AsChangeset, Debug)]
#[diesel(table_name = users)]
#[diesel(treat_none_as_null = true)]
pub struct UserChanges {
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub patronymic: String,
    pub login: String,
    pub birthday: Option<NaiveDate>,
    pub phone_number: String,
    pub serial_passport: String,
    pub number_passport: String,
    pub address: String,
    pub gender_id: Option<i32>,
    pub is_staff: bool,
    pub is_active: bool,
    pub block: bool,
    pub first_auth: bool,
    pub role_id: Option<i32>,
}

impl From<EditUserForm> for UserChanges {
    fn from(form: EditUserForm) -> Self {
        let email = normalize_email(&form.email);
        Self {
            username: email.clone(),
            email,
            first_name: form.first_name,
            last_name: form.last_name,
            patronymic: form.patronymic,
            login: form.login,
            birthday: form.birthday,
            phone_number: form.phone_number,
            serial_passport: form.serial_passport,
            number_passport: form.number_passport,
            address: form.address,
            gender_id: form.gender_id,
            is_staff: form.is_staff,
            is_active: form.is_active,
            block: form.block,
            first_auth: form.first_auth,
            role_id: form.role_id,
        }
    }
}

/// Row of any of the id/name reference tables.
#[derive(ToSchema, Serialize, Queryable, Debug, PartialEq)]
pub struct LookupEntry {
    pub id: i32,
    pub name: String,
}

#[derive(ToSchema, Deserialize, Debug, Validate)]
pub struct LookupForm {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
}

impl Form for LookupForm {}

/// Money column check: non-negative, two decimal places, fits `NUMERIC(10, 2)`.
pub fn validate_amount(value: &BigDecimal) -> Result<(), ValidationError> {
    if *value < BigDecimal::from(0) {
        return Err(ValidationError::new("min_value")
            .with_message(Cow::Borrowed("Ensure this value is greater than or equal to 0.")));
    }
    // Has to run before anything that rescales `value`.
    if *value >= BigDecimal::from(100_000_000) {
        return Err(ValidationError::new("max_whole_digits").with_message(Cow::Borrowed(
            "Ensure that there are no more than 8 digits before the decimal point.",
        )));
    }
    if value.fractional_digit_count() > 2 {
        return Err(ValidationError::new("max_decimal_places").with_message(Cow::Borrowed(
            "Ensure that there are no more than 2 decimal places.",
        )));
    }
    Ok(())
}

#[derive(ToSchema, Serialize, Selectable, Queryable, Debug)]
#[diesel(table_name = rooms)]
#[diesel(check_for_backend(Pg))]
pub struct Room {
    pub room_id: i32,
    pub category_id: i32,
    pub floor: i32,
    pub status_id: Option<i32>,
    #[schema(value_type = String, example = "1500.00")]
    pub cost: BigDecimal,
    pub description: String,
    pub room_name: String,
}

#[derive(ToSchema, Deserialize, Validate, Insertable, AsChangeset, Debug)]
#[diesel(table_name = rooms)]
#[diesel(treat_none_as_null = true)]
pub struct RoomForm {
    pub category_id: i32,
    pub floor: i32,
    pub status_id: Option<i32>,
    #[schema(value_type = String, example = "1500.00")]
    #[validate(custom(function = "validate_amount"))]
    pub cost: BigDecimal,
    #[serde(default)]
    #[validate(length(max = 255))]
    pub description: String,
    #[validate(length(min = 1, max = 255))]
    pub room_name: String,
}

impl Form for RoomForm {}

#[derive(ToSchema, Serialize, Deserialize, Selectable, Queryable, Insertable, Debug)]
#[diesel(table_name = room_equipment)]
#[diesel(check_for_backend(Pg))]
pub struct Equipment {
    pub room_id: i32,
    pub element_id: i32,
}

#[derive(ToSchema, Deserialize, Validate, Debug)]
pub struct EquipmentForm {
    pub element_id: i32,
}

impl Form for EquipmentForm {}

#[derive(ToSchema, Serialize, Selectable, Queryable, Debug)]
#[diesel(table_name = services)]
#[diesel(check_for_backend(Pg))]
pub struct Service {
    pub service_id: i32,
    pub service_name: String,
    #[schema(value_type = String, example = "250.00")]
    pub cost: BigDecimal,
    pub description: String,
}

#[derive(ToSchema, Deserialize, Validate, Insertable, AsChangeset, Debug)]
#[diesel(table_name = services)]
pub struct ServiceForm {
    #[validate(length(min = 1, max = 255))]
    pub service_name: String,
    #[schema(value_type = String, example = "250.00")]
    #[validate(custom(function = "validate_amount"))]
    pub cost: BigDecimal,
    #[serde(default)]
    #[validate(length(max = 255))]
    pub description: String,
}

impl Form for ServiceForm {}

#[derive(ToSchema, Serialize, Selectable, Queryable, Debug)]
#[diesel(table_name = orders)]
#[diesel(check_for_backend(Pg))]
pub struct Order {
    pub order_id: i32,
    pub room_id: i32,
    pub date_start: NaiveDate,
    pub date_end: NaiveDate,
    #[schema(value_type = String, example = "4500.00")]
    pub sum: BigDecimal,
    pub is_cost: bool,
    pub client_id: i32,
}

#[derive(ToSchema, Deserialize, Validate, Insertable, AsChangeset, Debug)]
#[diesel(table_name = orders)]
pub struct OrderForm {
    pub room_id: i32,
    pub date_start: NaiveDate,
    pub date_end: NaiveDate,
    #[schema(value_type = String, example = "4500.00")]
    #[validate(custom(function = "validate_amount"))]
    pub sum: BigDecimal,
    #[serde(default)]
    pub is_cost: bool,
    pub client_id: i32,
}

impl Form for OrderForm {
    fn clean(&self) -> Result<(), ValidationErrors> {
        let range = (self.date_end < self.date_start).then(|| {
            (
                "date_end",
                ValidationError::new("date_range").with_message(Cow::Borrowed(
                    "The end date cannot be earlier than the start date.",
                )),
            )
        });
        merge_errors(self.validate(), range)
    }
}

#[derive(ToSchema, Serialize, Deserialize, Selectable, Queryable, Insertable, Debug)]
#[diesel(table_name = order_services)]
#[diesel(check_for_backend(Pg))]
pub struct OrderServiceLink {
    pub order_id: i32,
    pub service_id: i32,
}

#[derive(ToSchema, Deserialize, Validate, Debug)]
pub struct OrderServiceForm {
    pub service_id: i32,
}

impl Form for OrderServiceForm {}

/// Outcome message plus the route the client should show next.
#[derive(ToSchema, Serialize, Debug)]
pub struct Flash {
    pub message: String,
    pub next: String,
}

impl Flash {
    pub fn new(message: impl Into<String>, next: &str) -> Self {
        Self {
            message: message.into(),
            next: next.to_string(),
        }
    }
}

#[cfg(test)]
pub fn test_user(id: i32, email: &str, is_superuser: bool) -> User {
    User {
        id,
        password: String::new(),
        last_login: None,
        is_superuser,
        email: email.to_string(),
        username: email.to_string(),
        first_name: "Anna".to_string(),
        last_name: "Petrova".to_string(),
        is_staff: is_superuser,
        is_active: true,
        date_joined: chrono::Local::now().naive_utc(),
        patronymic: String::new(),
        login: String::new(),
        birthday: None,
        phone_number: String::new(),
        serial_passport: String::new(),
        number_passport: String::new(),
        block: false,
        first_auth: false,
        role_id: None,
        address: String::new(),
        gender_id: None,
    }
}
