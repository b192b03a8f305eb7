use axum::{async_trait, extract::FromRequestParts, http::request::Parts, RequestPartsExt};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use chrono::{Duration, Local};
use diesel::{QueryDsl, SelectableHelper};
use diesel_async::RunQueryDsl;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use utoipa::{Modify, ToSchema};

use crate::error::{pool_error, ApiError};
use crate::model::User;
use crate::schema::users;

pub struct Keys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl Keys {
    pub fn new(secret: &str, ttl_hours: u32) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::try_hours(i64::from(ttl_hours)).unwrap_or(Duration::MAX),
        }
    }

    /// Signs a session token for `user`.
    pub fn issue(&self, user: &User) -> Result<AuthBody, ApiError> {
        let claims = SessionClaims {
            sub: user.id.to_string(),
            email: user.email.clone(),
            exp: Local::now()
                .checked_add_signed(self.ttl)
                .ok_or(ApiError::TokenCreation)?
                .timestamp(),
        };
        let access_token =
            encode(&Header::default(), &claims, &self.encoding).map_err(|_| ApiError::TokenCreation)?;
        Ok(AuthBody {
            access_token,
            token_type: "Bearer".to_string(),
        })
    }

    pub fn verify(&self, token: &str) -> Result<SessionClaims, ApiError> {
        decode::<SessionClaims>(token, &self.decoding, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!("verify token: {}", e);
                ApiError::InvalidToken
            })
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: String,
    pub email: String,
    pub exp: i64,
}

#[derive(Debug, ToSchema, Serialize)]
pub struct AuthBody {
    pub access_token: String,
    pub token_type: String,
}

/// The signed-in, still active account behind the bearer token.
#[derive(Debug)]
pub struct CurrentUser(pub User);

#[async_trait]
impl FromRequestParts<crate::State> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &crate::State,
    ) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) = parts
            .extract::<TypedHeader<Authorization<Bearer>>>()
            .await
            .map_err(|_| ApiError::MissingCredentials)?;
        let claims = state.keys.verify(bearer.token())?;
        let id: i32 = claims.sub.parse().map_err(|_| ApiError::InvalidToken)?;

        let mut conn = state.pool.get().await.map_err(pool_error)?;
        let user = users::table
            .find(id)
            .select(User::as_select())
            .first::<User>(&mut conn)
            .await
            .map_err(|e| {
                tracing::debug!("current user {}: {}", id, e);
                ApiError::InvalidToken
            })?;
        // Blocked accounts lose their sessions.
        if !user.is_active {
            return Err(ApiError::InvalidToken);
        }
        Ok(CurrentUser(user))
    }
}

pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "session_jwt",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            );
        }
    }
}
