use axum::extract::State;
use axum::Json;
use chrono::Local;
use diesel::{ExpressionMethods, OptionalExtension, QueryDsl, SelectableHelper};
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::Serialize;
use utoipa::ToSchema;
use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

use crate::access::{self, ACCOUNT};
use crate::auth::CurrentUser;
use crate::error::{db_error, pool_error, ApiError};
use crate::model::{normalize_email, Flash, LoginForm, PasswordChangeForm, User};
use crate::password::{hash_password, verify_dummy, verify_password};
use crate::schema::users;
use crate::validate::ValidatedForm;
use crate::ACCOUNT_TAG;

pub fn account_router() -> OpenApiRouter<crate::State> {
    OpenApiRouter::new()
        .routes(routes!(login))
        .routes(routes!(logout))
        .routes(routes!(change_password))
        .routes(routes!(user_page))
}

#[derive(Debug, ToSchema, Serialize)]
pub struct SessionResponse {
    access_token: String,
    token_type: String,
    message: String,
    next: String,
}

#[derive(Debug, ToSchema, Serialize)]
pub struct UserPage {
    user: User,
    full_name: String,
}

/// Where a freshly signed-in user is sent.
pub fn landing_route(user: &User) -> &'static str {
    if user.is_superuser {
        "user_page"
    } else {
        "change_password"
    }
}

/// Resolves the account for a login attempt. An unknown email and a wrong
/// password fail the same way.
pub async fn check_credentials(found: Option<User>, password: String) -> Result<User, ApiError> {
    let Some(user) = found else {
        verify_dummy(password).await;
        return Err(ApiError::WrongCredentials);
    };
    if !verify_password(password, user.password.clone()).await? {
        return Err(ApiError::WrongCredentials);
    }
    if !user.is_active {
        return Err(ApiError::InactiveAccount);
    }
    Ok(user)
}

pub async fn authenticate(
    conn: &mut AsyncPgConnection,
    email: &str,
    password: String,
) -> Result<User, ApiError> {
    let found = users::table
        .filter(users::email.eq(normalize_email(email)))
        .select(User::as_select())
        .first::<User>(conn)
        .await
        .optional()
        .map_err(db_error("authenticate", "User"))?;
    check_credentials(found, password).await
}

/// Sign in
#[utoipa::path(
    post,
    path = "/login",
    request_body = LoginForm,
    responses(
        (status = OK, body = SessionResponse),
        (status = UNAUTHORIZED, description = "Invalid email or password"),
        (status = FORBIDDEN, description = "Account is inactive"),
    ),
    tag = ACCOUNT_TAG
)]
async fn login(
    State(crate::State { pool, keys, .. }): State<crate::State>,
    ValidatedForm(form): ValidatedForm<LoginForm>,
) -> Result<Json<SessionResponse>, ApiError> {
    let mut conn = pool.get().await.map_err(pool_error)?;
    let user = authenticate(&mut conn, &form.email, form.password)
        .await
        .inspect_err(|e| tracing::info!("login failed for {}: {}", form.email, e))?;

    diesel::update(users::table.find(user.id))
        .set(users::last_login.eq(Local::now().naive_utc()))
        .execute(&mut conn)
        .await
        .map_err(db_error("login", "User"))?;

    let session = keys.issue(&user)?;
    tracing::info!("{} signed in", user.email);
    Ok(Json(SessionResponse {
        access_token: session.access_token,
        token_type: session.token_type,
        message: "You have signed in successfully!".to_string(),
        next: landing_route(&user).to_string(),
    }))
}

/// Sign out
#[utoipa::path(post, path = "/logout", responses((status = OK, body = Flash)), tag = ACCOUNT_TAG)]
async fn logout() -> Json<Flash> {
    Json(Flash::new("You have signed out.", "login"))
}

/// Change own password
#[utoipa::path(
    post,
    path = "/password",
    request_body = PasswordChangeForm,
    responses((status = OK, body = SessionResponse)),
    tag = ACCOUNT_TAG,
    security(("session_jwt" = []))
)]
async fn change_password(
    CurrentUser(user): CurrentUser,
    State(crate::State {
        pool,
        enforcer,
        keys,
    }): State<crate::State>,
    ValidatedForm(form): ValidatedForm<PasswordChangeForm>,
) -> Result<Json<SessionResponse>, ApiError> {
    access::require(&enforcer, &user, ACCOUNT)?;
    if !verify_password(form.old_password, user.password.clone()).await? {
        return Err(ApiError::field(
            "old_password",
            "password_incorrect",
            "Your old password was entered incorrectly. Please enter it again.",
        ));
    }
    let hash = hash_password(form.new_password1).await?;

    let mut conn = pool.get().await.map_err(pool_error)?;
    let user = diesel::update(users::table.find(user.id))
        .set(users::password.eq(hash))
        .returning(User::as_returning())
        .get_result::<User>(&mut conn)
        .await
        .map_err(db_error("change_password", "User"))?;

    // The old token stays valid; hand out a fresh one for the new credentials.
    let session = keys.issue(&user)?;
    tracing::info!("{} changed their password", user.email);
    Ok(Json(SessionResponse {
        access_token: session.access_token,
        token_type: session.token_type,
        message: "Password changed successfully!".to_string(),
        next: "user_page".to_string(),
    }))
}

/// Own profile
#[utoipa::path(
    get,
    path = "/me",
    responses((status = OK, body = UserPage)),
    tag = ACCOUNT_TAG,
    security(("session_jwt" = []))
)]
async fn user_page(
    CurrentUser(user): CurrentUser,
    State(crate::State { enforcer, .. }): State<crate::State>,
) -> Result<Json<UserPage>, ApiError> {
    access::require(&enforcer, &user, ACCOUNT)?;
    Ok(Json(UserPage {
        full_name: user.full_name(),
        user,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::test_user;

    async fn with_password(password: &str, active: bool) -> User {
        let mut user = test_user(7, "a@b.com", false);
        user.password = hash_password(password.to_string()).await.unwrap();
        user.is_active = active;
        user
    }

    #[tokio::test]
    async fn correct_password_signs_in() {
        let user = with_password("Xk9#mVq2pL", true).await;
        let signed_in = check_credentials(Some(user), "Xk9#mVq2pL".to_string())
            .await
            .unwrap();
        assert_eq!(signed_in.id, 7);
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_email_look_alike() {
        let user = with_password("Xk9#mVq2pL", true).await;
        let wrong_password = check_credentials(Some(user), "nope-nope".to_string())
            .await
            .unwrap_err();
        let unknown_email = check_credentials(None, "Xk9#mVq2pL".to_string())
            .await
            .unwrap_err();
        assert!(matches!(wrong_password, ApiError::WrongCredentials));
        assert!(matches!(unknown_email, ApiError::WrongCredentials));
        assert_eq!(wrong_password.to_string(), unknown_email.to_string());
        assert_eq!(wrong_password.status(), unknown_email.status());
    }

    #[tokio::test]
    async fn blocked_user_is_told_the_account_is_inactive() {
        let user = with_password("Xk9#mVq2pL", false).await;
        let err = check_credentials(Some(user), "Xk9#mVq2pL".to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::InactiveAccount));
    }

    #[tokio::test]
    async fn blocked_user_with_wrong_password_gets_generic_error() {
        let user = with_password("Xk9#mVq2pL", false).await;
        let err = check_credentials(Some(user), "bad-guess".to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::WrongCredentials));
    }

    #[test]
    fn superusers_land_on_their_page() {
        assert_eq!(landing_route(&test_user(1, "root@example.com", true)), "user_page");
        assert_eq!(
            landing_route(&test_user(2, "guest@example.com", false)),
            "change_password"
        );
    }
}
