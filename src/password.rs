//! Password hashing and strength rules.

use std::borrow::Cow;
use std::collections::HashSet;
use std::sync::LazyLock;

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use validator::ValidationError;

use crate::error::ApiError;

pub const MIN_PASSWORD_LENGTH: usize = 8;

/// One lowercase password per line.
static COMMON_PASSWORDS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    include_str!("../data/common-passwords.txt")
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect()
});

/// Hash used when the account does not exist, so a failed lookup costs the
/// same as a failed comparison.
static DUMMY_HASH: LazyLock<Option<String>> =
    LazyLock::new(|| hash_blocking("not-a-real-password").ok());

fn rule(code: &'static str, message: &'static str) -> ValidationError {
    ValidationError::new(code).with_message(Cow::Borrowed(message))
}

/// Returns every strength rule the password breaks.
pub fn strength_errors(password: &str) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        errors.push(rule(
            "password_too_short",
            "This password is too short. It must contain at least 8 characters.",
        ));
    }
    if COMMON_PASSWORDS.contains(password.trim().to_lowercase().as_str()) {
        errors.push(rule("password_too_common", "This password is too common."));
    }
    if !password.is_empty() && password.chars().all(|c| c.is_ascii_digit()) {
        errors.push(rule(
            "password_entirely_numeric",
            "This password is entirely numeric.",
        ));
    }
    errors
}

fn hash_blocking(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    Ok(Argon2::default()
        .hash_password(password.as_bytes(), &salt)?
        .to_string())
}

fn verify_blocking(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            tracing::warn!("stored password hash is malformed: {}", e);
            false
        }
    }
}

pub async fn hash_password(password: String) -> Result<String, ApiError> {
    tokio::task::spawn_blocking(move || hash_blocking(&password))
        .await
        .map_err(|e| {
            tracing::error!("hash_password: {}", e);
            ApiError::Hashing
        })?
        .map_err(|e| {
            tracing::error!("hash_password: {}", e);
            ApiError::Hashing
        })
}

pub async fn verify_password(password: String, hash: String) -> Result<bool, ApiError> {
    tokio::task::spawn_blocking(move || verify_blocking(&password, &hash))
        .await
        .map_err(|e| {
            tracing::error!("verify_password: {}", e);
            ApiError::Hashing
        })
}

/// Burns one verification against a throwaway hash.
pub async fn verify_dummy(password: String) {
    let _ = tokio::task::spawn_blocking(move || {
        if let Some(hash) = DUMMY_HASH.as_deref() {
            verify_blocking(&password, hash);
        }
    })
    .await;
}
