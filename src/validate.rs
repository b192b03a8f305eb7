use axum::{
    async_trait,
    extract::{FromRequest, Request},
    Json,
};
use serde::de::DeserializeOwned;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::error::ApiError;

/// Request body that has to pass its validation rules before a handler sees it.
pub trait Form: Validate {
    /// Field rules plus anything that spans fields.
    fn clean(&self) -> Result<(), ValidationErrors> {
        self.validate()
    }
}

/// Adds `extra` field errors on top of the derived validation result.
pub fn merge_errors(
    derived: Result<(), ValidationErrors>,
    extra: impl IntoIterator<Item = (&'static str, ValidationError)>,
) -> Result<(), ValidationErrors> {
    let mut errors = derived.err().unwrap_or_else(ValidationErrors::new);
    for (field, error) in extra {
        errors.add(field, error);
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

pub struct ValidatedForm<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidatedForm<T>
where
    T: DeserializeOwned + Form,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
        value.clean().map_err(ApiError::Validation)?;
        Ok(ValidatedForm(value))
    }
}
